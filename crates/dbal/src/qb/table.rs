//! FROM / JOIN / UPDATE / DELETE table references.

use crate::error::{DbalError, DbalResult};
use crate::expr::{Expression, ExpressionBuilder};
use crate::qb::{SelectQuery, SqlStatement};

#[derive(Debug, Clone)]
enum TableSource {
    Name {
        name: String,
        database: Option<String>,
    },
    Expr(Expression),
    Query(Box<SelectQuery>),
}

/// A table, derived table or subquery, with an optional alias.
///
/// Expressions and subqueries need an alias when used in FROM or JOIN.
#[derive(Debug, Clone)]
pub struct Table {
    source: TableSource,
    alias: Option<String>,
}

impl Table {
    /// A named table. Dotted names (`schema.table`) are quoted part by part.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            source: TableSource::Name {
                name: name.into(),
                database: None,
            },
            alias: None,
        }
    }

    /// `database.table`.
    pub fn in_database(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: TableSource::Name {
                name: name.into(),
                database: Some(database.into()),
            },
            alias: None,
        }
    }

    /// A derived table given as SQL.
    pub fn expr(expr: impl Into<Expression>) -> Self {
        Self {
            source: TableSource::Expr(expr.into()),
            alias: None,
        }
    }

    /// A subquery.
    pub fn query(query: SelectQuery) -> Self {
        Self {
            source: TableSource::Query(Box::new(query)),
            alias: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Name later joins use to attach under this table: the alias, else the table name.
    pub fn reference(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.source {
            TableSource::Name {
                name,
                database: Some(db),
            } => format!("{db}.{name}"),
            TableSource::Name { name, .. } => name.clone(),
            TableSource::Expr(expr) => expr.sql().to_string(),
            TableSource::Query(_) => String::new(),
        }
    }

    /// Fails for an expression or subquery without alias. `context` names the clause.
    pub(crate) fn ensure_alias(&self, context: &str) -> DbalResult<()> {
        match (&self.source, &self.alias) {
            (TableSource::Expr(_), None) => Err(DbalError::invalid_argument(format!(
                "Adding an Expression to {context} requires an alias."
            ))),
            (TableSource::Query(_), None) => Err(DbalError::invalid_argument(format!(
                "Adding a Query to {context} requires an alias."
            ))),
            _ => Ok(()),
        }
    }

    /// `<table>`, `<table> <alias>` or `(<subquery>) <alias>`.
    pub(crate) fn render(&self, eb: &ExpressionBuilder) -> DbalResult<Expression> {
        let source = match &self.source {
            TableSource::Name { name, database } => {
                let quoted = eb.table_name(name, database.as_deref());
                return Ok(Expression::raw(match &self.alias {
                    Some(alias) if alias != name => format!("{quoted} {}", eb.wrap_single(alias)),
                    _ => quoted,
                }));
            }
            TableSource::Expr(expr) => expr.clone(),
            TableSource::Query(query) => query.to_expression()?,
        };
        Ok(match &self.alias {
            Some(alias) => {
                let (sql, params) = source.into_parts();
                Expression::new(format!("({sql}) {}", eb.wrap_single(alias)), params)
            }
            None => source,
        })
    }
}

impl From<&str> for Table {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Table {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&String> for Table {
    fn from(name: &String) -> Self {
        Self::new(name.clone())
    }
}

impl From<Expression> for Table {
    fn from(expr: Expression) -> Self {
        Self::expr(expr)
    }
}

impl From<SelectQuery> for Table {
    fn from(query: SelectQuery) -> Self {
        Self::query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{PlainDialect, PostgresDialect};
    use crate::value::Value;

    #[test]
    fn named_tables() {
        let eb = ExpressionBuilder::new(PostgresDialect);
        assert_eq!(Table::new("users").render(&eb).unwrap().sql(), r#""users""#);
        assert_eq!(
            Table::new("public.users").alias("u").render(&eb).unwrap().sql(),
            r#""public"."users" "u""#
        );
        assert_eq!(
            Table::in_database("main", "users").render(&eb).unwrap().sql(),
            r#""main"."users""#
        );
        assert_eq!(Table::new("users").alias("users").render(&eb).unwrap().sql(), r#""users""#);
    }

    #[test]
    fn derived_table_keeps_params() {
        let eb = ExpressionBuilder::new(PlainDialect);
        let table = Table::expr(Expression::new("SELECT * FROM t WHERE a = ?", vec![Value::Int(1)]))
            .alias("d");
        let expr = table.render(&eb).unwrap();
        assert_eq!(expr.sql(), "(SELECT * FROM t WHERE a = ?) d");
        assert_eq!(expr.params(), &[Value::Int(1)]);
    }

    #[test]
    fn references() {
        assert_eq!(Table::new("users").reference(), "users");
        assert_eq!(Table::new("users").alias("u").reference(), "u");
        assert_eq!(Table::in_database("db", "users").reference(), "db.users");
    }

    #[test]
    fn expression_without_alias_is_rejected() {
        let err = Table::expr("SELECT 1").ensure_alias("From").unwrap_err();
        assert_eq!(
            err,
            DbalError::invalid_argument("Adding an Expression to From requires an alias.")
        );
        assert!(Table::new("t").ensure_alias("From").is_ok());
    }
}
