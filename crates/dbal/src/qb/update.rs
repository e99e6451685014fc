//! UPDATE statement builder.

use std::sync::Arc;

use crate::composer::SqlComposer;
use crate::cond_builder::CondInput;
use crate::condition::Operand;
use crate::error::{DbalError, DbalResult};
use crate::expr::{Expression, Junction};
use crate::qb::traits::BuildCache;
use crate::qb::where_clause::ConditionSlot;
use crate::qb::{MutationStatement, QueryContext, QueryKind, SqlStatement, Table, WhereClause};
use crate::value::Value;

/// UPDATE statement builder.
///
/// Execution without a WHERE condition fails with [`DbalError::EmptyWhereNotAllowed`] unless
/// [`DbalConfig::allow_empty_where`](crate::DbalConfig) is set.
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    ctx: Arc<QueryContext>,
    table: Table,
    /// `(column, value expression)` in insertion order.
    sets: Vec<(String, Expression)>,
    where_: ConditionSlot,
    emulate_execution: bool,
    built: BuildCache,
    build_error: Option<DbalError>,
}

impl UpdateQuery {
    pub(crate) fn new(ctx: Arc<QueryContext>, table: Table) -> Self {
        Self {
            ctx,
            table,
            sets: Vec::new(),
            where_: ConditionSlot::default(),
            emulate_execution: false,
            built: BuildCache::default(),
            build_error: None,
        }
    }

    fn mutate(mut self, f: impl FnOnce(&mut Self) -> DbalResult<()>) -> Self {
        if self.build_error.is_some() {
            return self;
        }
        self.built.clear();
        if let Err(err) = f(&mut self) {
            self.build_error = Some(err);
        }
        self
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// `column = ?`. Expressions are inlined with their parameters. Setting a column twice
    /// keeps the last value.
    pub fn set(self, column: impl Into<String>, value: impl Into<Operand>) -> Self {
        let column = column.into();
        let value = value.into();
        self.mutate(|q| {
            let expr = q.ctx.expr().value(value)?;
            q.put(column, expr);
            Ok(())
        })
    }

    /// `column = <expr>`.
    pub fn set_expr(self, column: impl Into<String>, expr: impl Into<Expression>) -> Self {
        let column = column.into();
        let expr = expr.into();
        self.mutate(|q| {
            q.put(column, expr);
            Ok(())
        })
    }

    /// `column = <sql>`; `wrap` expands identifier markers.
    pub fn set_raw(
        self,
        column: impl Into<String>,
        sql: &str,
        params: Vec<Value>,
        wrap: bool,
    ) -> Self {
        let column = column.into();
        self.mutate(|q| {
            let expr = q.ctx.expr().raw(sql, params, wrap);
            q.put(column, expr);
            Ok(())
        })
    }

    fn put(&mut self, column: String, expr: Expression) {
        match self.sets.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = expr,
            None => self.sets.push((column, expr)),
        }
    }

    pub fn emulate_execution(mut self, value: bool) -> Self {
        self.emulate_execution = value;
        self
    }

    fn build(&self) -> DbalResult<Expression> {
        if let Some(err) = &self.build_error {
            return Err(err.clone());
        }
        if self.sets.is_empty() {
            return Err(DbalError::invalid_argument(
                "UPDATE requires at least one SET column.",
            ));
        }
        let eb = self.ctx.expr();

        let mut sets = SqlComposer::new(", ");
        for (column, value) in &self.sets {
            sets.add_with_prefix(&format!("{} = ", eb.wrap(column)), value.clone());
        }

        let mut composer = SqlComposer::new(self.ctx.config().separator.as_str());
        composer.add_with_prefix("UPDATE ", self.table.render(eb)?);
        composer.add_opt(sets.compose(Some("SET ")));
        composer.add_opt_with_prefix("WHERE ", self.where_.build(&self.ctx, Vec::new())?);
        composer.compose_required(None)
    }
}

impl SqlStatement for UpdateQuery {
    fn kind(&self) -> QueryKind {
        QueryKind::Update
    }

    fn error(&self) -> Option<&DbalError> {
        self.build_error.as_ref()
    }

    fn to_expression(&self) -> DbalResult<Expression> {
        self.built.get_or_build(|| self.build()).cloned()
    }
}

impl MutationStatement for UpdateQuery {
    fn validate(&self) -> DbalResult<()> {
        if self.where_.is_empty() && !self.ctx.config().allow_empty_where {
            return Err(DbalError::EmptyWhereNotAllowed("UPDATE".to_string()));
        }
        Ok(())
    }

    fn is_emulated(&self) -> bool {
        self.emulate_execution
    }
}

impl WhereClause for UpdateQuery {
    fn push_where(self, junction: Option<Junction>, input: CondInput, params: Vec<Value>) -> Self {
        self.mutate(|q| {
            let ctx = Arc::clone(&q.ctx);
            q.where_.apply(&ctx, junction, input, params)
        })
    }
}
