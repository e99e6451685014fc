//! Trait definitions for statement builders.

use std::sync::OnceLock;

use crate::client::{Command, Connection};
use crate::cond_builder::CondInput;
use crate::error::{DbalError, DbalResult};
use crate::expr::{Expression, Junction};
use crate::qb::QueryKind;
use crate::value::Value;

/// Rendered-expression cache. Cleared by every mutation, filled on the next read.
#[derive(Debug, Clone, Default)]
pub(crate) struct BuildCache(OnceLock<Expression>);

impl BuildCache {
    pub(crate) fn clear(&mut self) {
        self.0.take();
    }

    pub(crate) fn is_built(&self) -> bool {
        self.0.get().is_some()
    }

    pub(crate) fn get_or_build(
        &self,
        build: impl FnOnce() -> DbalResult<Expression>,
    ) -> DbalResult<&Expression> {
        if let Some(expr) = self.0.get() {
            return Ok(expr);
        }
        let expr = build()?;
        Ok(self.0.get_or_init(|| expr))
    }
}

/// Base trait for all statement builders.
pub trait SqlStatement: Sync {
    /// Statement kind.
    fn kind(&self) -> QueryKind;

    /// The first error recorded while building, if any.
    fn error(&self) -> Option<&DbalError>;

    /// Render to SQL plus parameters. Repeated calls without mutation return the cached
    /// rendering.
    fn to_expression(&self) -> DbalResult<Expression>;

    /// Rendered SQL text.
    fn to_sql(&self) -> DbalResult<String> {
        Ok(self.to_expression()?.sql().to_string())
    }

    /// Positional parameters, in placeholder order.
    fn params(&self) -> DbalResult<Vec<Value>> {
        Ok(self.to_expression()?.into_parts().1)
    }

    /// SQL with parameters inlined as literals. For logs only.
    fn debug_sql(&self) -> DbalResult<String> {
        Ok(self.to_expression()?.debug_sql())
    }
}

/// Trait for statements executed for their affected-row count (INSERT/UPDATE/DELETE).
pub trait MutationStatement: SqlStatement {
    /// Check builder state before execution.
    fn validate(&self) -> DbalResult<()> {
        Ok(())
    }

    /// When set, execution renders the statement but never reaches the connection.
    fn is_emulated(&self) -> bool {
        false
    }

    /// Execute and return the affected row count.
    fn execute(
        &self,
        conn: &impl Connection,
    ) -> impl std::future::Future<Output = DbalResult<u64>> + Send {
        async move {
            self.validate()?;
            let command = Command::statement(self.to_expression()?);
            if self.is_emulated() {
                return Ok(0);
            }
            command.execute_statement(conn).await
        }
    }
}

fn list(items: Vec<CondInput>) -> CondInput {
    CondInput::List(items)
}

fn collect_params<V: Into<Value>>(params: impl IntoIterator<Item = V>) -> Vec<Value> {
    params.into_iter().map(Into::into).collect()
}

/// Typed shortcuts over a `push` method. Each helper builds the list form of a condition so
/// it goes through the same normalization as caller-supplied lists.
macro_rules! condition_helpers {
    (
        $push:ident, $junction:expr;
        $column:ident, $column_eq:ident,
        $exists:ident, $not_exists:ident,
        $null:ident, $not_null:ident,
        $value:ident, $value_eq:ident,
        $value_in:ident, $value_not_in:ident,
        $value_between:ident, $value_not_between:ident $(,)?
    ) => {
        /// `left <operator> right`, both sides column names.
        fn $column(self, left: impl Into<String>, operator: &str, right: impl Into<String>) -> Self {
            let cond = list(vec![
                "col".into(),
                CondInput::Str(left.into()),
                operator.into(),
                CondInput::Str(right.into()),
            ]);
            self.$push($junction, cond, Vec::new())
        }

        /// `left = right`, both sides column names.
        fn $column_eq(self, left: impl Into<String>, right: impl Into<String>) -> Self {
            self.$column(left, "=", right)
        }

        /// `EXISTS (query)`.
        fn $exists(self, query: impl Into<CondInput>) -> Self {
            self.$push($junction, list(vec!["exists".into(), query.into()]), Vec::new())
        }

        /// `NOT EXISTS (query)`.
        fn $not_exists(self, query: impl Into<CondInput>) -> Self {
            self.$push($junction, list(vec!["not exists".into(), query.into()]), Vec::new())
        }

        /// `column IS NULL`.
        fn $null(self, column: impl Into<CondInput>) -> Self {
            self.$value(column, "=", Value::Null)
        }

        /// `column IS NOT NULL`.
        fn $not_null(self, column: impl Into<CondInput>) -> Self {
            self.$value(column, "<>", Value::Null)
        }

        /// `column <operator> ?`.
        fn $value(
            self,
            column: impl Into<CondInput>,
            operator: &str,
            value: impl Into<CondInput>,
        ) -> Self {
            let cond = list(vec!["val".into(), column.into(), operator.into(), value.into()]);
            self.$push($junction, cond, Vec::new())
        }

        /// `column = ?`.
        fn $value_eq(self, column: impl Into<CondInput>, value: impl Into<CondInput>) -> Self {
            self.$value(column, "=", value)
        }

        /// `column IN (?, ..)`.
        fn $value_in(self, column: impl Into<CondInput>, values: impl Into<CondInput>) -> Self {
            self.$push($junction, list(vec!["in".into(), column.into(), values.into()]), Vec::new())
        }

        /// `column NOT IN (?, ..)`.
        fn $value_not_in(self, column: impl Into<CondInput>, values: impl Into<CondInput>) -> Self {
            let cond = list(vec!["not in".into(), column.into(), values.into()]);
            self.$push($junction, cond, Vec::new())
        }

        /// `column BETWEEN ? AND ?`.
        fn $value_between(
            self,
            column: impl Into<CondInput>,
            min: impl Into<CondInput>,
            max: impl Into<CondInput>,
        ) -> Self {
            let cond = list(vec!["between".into(), column.into(), min.into(), max.into()]);
            self.$push($junction, cond, Vec::new())
        }

        /// `column NOT BETWEEN ? AND ?`.
        fn $value_not_between(
            self,
            column: impl Into<CondInput>,
            min: impl Into<CondInput>,
            max: impl Into<CondInput>,
        ) -> Self {
            let cond = list(vec!["not between".into(), column.into(), min.into(), max.into()]);
            self.$push($junction, cond, Vec::new())
        }
    };
}

/// WHERE clause mutators.
///
/// `where_` replaces the condition (empty input clears it); `and_where` / `or_where` combine
/// with the current one, ignore empty input, and behave like `where_` when nothing is set.
pub trait WhereClause: Sized {
    /// Apply `input` to the WHERE slot. `None` replaces, `Some(junction)` combines.
    fn push_where(self, junction: Option<Junction>, input: CondInput, params: Vec<Value>) -> Self;

    fn where_(self, input: impl Into<CondInput>) -> Self {
        self.push_where(None, input.into(), Vec::new())
    }

    /// `where_` with explicit positional parameters for the condition's placeholders.
    fn where_params<V: Into<Value>>(
        self,
        input: impl Into<CondInput>,
        params: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push_where(None, input.into(), collect_params(params))
    }

    fn and_where(self, input: impl Into<CondInput>) -> Self {
        self.push_where(Some(Junction::And), input.into(), Vec::new())
    }

    fn and_where_params<V: Into<Value>>(
        self,
        input: impl Into<CondInput>,
        params: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push_where(Some(Junction::And), input.into(), collect_params(params))
    }

    fn or_where(self, input: impl Into<CondInput>) -> Self {
        self.push_where(Some(Junction::Or), input.into(), Vec::new())
    }

    fn or_where_params<V: Into<Value>>(
        self,
        input: impl Into<CondInput>,
        params: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push_where(Some(Junction::Or), input.into(), collect_params(params))
    }

    condition_helpers!(
        push_where, None;
        where_column, where_column_eq,
        where_exists, where_not_exists,
        where_null, where_not_null,
        where_value, where_value_eq,
        where_value_in, where_value_not_in,
        where_value_between, where_value_not_between,
    );

    condition_helpers!(
        push_where, Some(Junction::And);
        and_where_column, and_where_column_eq,
        and_where_exists, and_where_not_exists,
        and_where_null, and_where_not_null,
        and_where_value, and_where_value_eq,
        and_where_value_in, and_where_value_not_in,
        and_where_value_between, and_where_value_not_between,
    );

    condition_helpers!(
        push_where, Some(Junction::Or);
        or_where_column, or_where_column_eq,
        or_where_exists, or_where_not_exists,
        or_where_null, or_where_not_null,
        or_where_value, or_where_value_eq,
        or_where_value_in, or_where_value_not_in,
        or_where_value_between, or_where_value_not_between,
    );
}

/// JOIN ... ON mutators, with the same semantics as [`WhereClause`].
pub trait OnClause: Sized {
    /// Apply `input` to the ON slot. `None` replaces, `Some(junction)` combines.
    fn push_on(self, junction: Option<Junction>, input: CondInput, params: Vec<Value>) -> Self;

    fn on(self, input: impl Into<CondInput>) -> Self {
        self.push_on(None, input.into(), Vec::new())
    }

    fn on_params<V: Into<Value>>(
        self,
        input: impl Into<CondInput>,
        params: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push_on(None, input.into(), collect_params(params))
    }

    fn and_on(self, input: impl Into<CondInput>) -> Self {
        self.push_on(Some(Junction::And), input.into(), Vec::new())
    }

    fn and_on_params<V: Into<Value>>(
        self,
        input: impl Into<CondInput>,
        params: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push_on(Some(Junction::And), input.into(), collect_params(params))
    }

    fn or_on(self, input: impl Into<CondInput>) -> Self {
        self.push_on(Some(Junction::Or), input.into(), Vec::new())
    }

    fn or_on_params<V: Into<Value>>(
        self,
        input: impl Into<CondInput>,
        params: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push_on(Some(Junction::Or), input.into(), collect_params(params))
    }

    condition_helpers!(
        push_on, None;
        on_column, on_column_eq,
        on_exists, on_not_exists,
        on_null, on_not_null,
        on_value, on_value_eq,
        on_value_in, on_value_not_in,
        on_value_between, on_value_not_between,
    );

    condition_helpers!(
        push_on, Some(Junction::And);
        and_on_column, and_on_column_eq,
        and_on_exists, and_on_not_exists,
        and_on_null, and_on_not_null,
        and_on_value, and_on_value_eq,
        and_on_value_in, and_on_value_not_in,
        and_on_value_between, and_on_value_not_between,
    );

    condition_helpers!(
        push_on, Some(Junction::Or);
        or_on_column, or_on_column_eq,
        or_on_exists, or_on_not_exists,
        or_on_null, or_on_not_null,
        or_on_value, or_on_value_eq,
        or_on_value_in, or_on_value_not_in,
        or_on_value_between, or_on_value_not_between,
    );
}
