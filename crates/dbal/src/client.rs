//! Connection collaborator interface and guarded command execution.
//!
//! The builders never talk to a database directly. They hand a rendered [`Expression`] to a
//! [`Command`], which checks the command kind, logs the SQL and delegates to a [`Connection`].

use crate::error::{DbalError, DbalResult};
use crate::expr::Expression;
use crate::ident::Dialect;
use crate::value::Value;

/// A result row that can hand out its values as [`Value`]s.
pub trait ValueRow {
    /// Number of columns in the row.
    fn column_count(&self) -> usize;

    /// Value at `idx` (zero-based).
    fn value(&self, idx: usize) -> DbalResult<Value>;

    /// Value of the column named `name`.
    fn value_by_name(&self, name: &str) -> DbalResult<Value>;
}

/// A database connection able to run rendered SQL.
///
/// SQL arrives with `?` positional placeholders; implementations translate them to the
/// driver's syntax (see the `pg` module for PostgreSQL).
pub trait Connection: Send + Sync {
    /// Row type returned by queries.
    type Row: ValueRow + Send;

    /// Run a query and return all rows.
    fn execute_query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = DbalResult<Vec<Self::Row>>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute_statement(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = DbalResult<u64>> + Send;
}

/// What a command is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Returns rows; statement execution is refused.
    Query,
    /// Returns an affected-row count; query execution is refused.
    Statement,
    /// Either.
    Unknown,
}

/// SQL plus parameters, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    expr: Expression,
    kind: CommandKind,
}

impl Command {
    pub fn new(expr: Expression, kind: CommandKind) -> Self {
        Self { expr, kind }
    }

    /// A command that may only be run as a query.
    pub fn query(expr: Expression) -> Self {
        Self::new(expr, CommandKind::Query)
    }

    /// A command that may only be run as a statement.
    pub fn statement(expr: Expression) -> Self {
        Self::new(expr, CommandKind::Statement)
    }

    /// Hand-written SQL. `{{table}}` / `[[column]]` markers are expanded through `dialect`.
    pub fn raw(dialect: &(impl Dialect + ?Sized), sql: &str, params: Vec<Value>) -> Self {
        Self::new(
            Expression::new(dialect.wrap_sql(sql), params),
            CommandKind::Unknown,
        )
    }

    pub fn add_param(mut self, value: impl Into<Value>) -> Self {
        self.expr = self.expr.with_params([value.into()]);
        self
    }

    pub fn add_params<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.expr = self.expr.with_params(values.into_iter().map(Into::into));
        self
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn sql(&self) -> &str {
        self.expr.sql()
    }

    pub fn params(&self) -> &[Value] {
        self.expr.params()
    }

    pub fn to_expression(&self) -> Expression {
        self.expr.clone()
    }

    /// Run as a query. Fails with [`DbalError::NotSupported`] for statement commands.
    pub async fn execute_query<C: Connection>(&self, conn: &C) -> DbalResult<Vec<C::Row>> {
        if self.kind == CommandKind::Statement {
            return Err(DbalError::not_supported(
                "A statement command cannot be executed as a query.",
            ));
        }
        self.log("query");
        conn.execute_query(self.expr.sql(), self.expr.params()).await
    }

    /// Run as a statement. Fails with [`DbalError::NotSupported`] for query commands.
    pub async fn execute_statement<C: Connection>(&self, conn: &C) -> DbalResult<u64> {
        if self.kind == CommandKind::Query {
            return Err(DbalError::not_supported(
                "A query command cannot be executed as a statement.",
            ));
        }
        self.log("statement");
        conn.execute_statement(self.expr.sql(), self.expr.params())
            .await
    }

    #[cfg(feature = "tracing")]
    fn log(&self, mode: &str) {
        tracing::debug!(
            target: "dbal.sql",
            mode,
            param_count = self.expr.params().len(),
            sql = %truncate_sql(self.expr.sql(), MAX_LOGGED_SQL),
        );
    }

    #[cfg(not(feature = "tracing"))]
    fn log(&self, _mode: &str) {}
}

#[cfg(feature = "tracing")]
const MAX_LOGGED_SQL: usize = 500;

#[cfg(feature = "tracing")]
fn truncate_sql(sql: &str, max: usize) -> std::borrow::Cow<'_, str> {
    if sql.len() <= max {
        return std::borrow::Cow::Borrowed(sql);
    }
    let mut end = max;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(format!("{}...", &sql[..end]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::PostgresDialect;

    #[test]
    fn raw_command_expands_markers() {
        let cmd = Command::raw(&PostgresDialect, "SELECT [[id]] FROM {{%users}}", vec![]);
        assert_eq!(cmd.sql(), "SELECT \"id\" FROM users");
        assert_eq!(cmd.kind(), CommandKind::Unknown);
    }

    #[test]
    fn params_append_in_order() {
        let cmd = Command::query(Expression::new("a = ? AND b = ?", vec![Value::Int(1)]))
            .add_param(2)
            .add_params(["x"]);
        assert_eq!(
            cmd.params(),
            &[Value::Int(1), Value::Int(2), Value::from("x")]
        );
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql("héllo", 2), "h...");
        assert_eq!(truncate_sql("abc", 10), "abc");
    }
}
