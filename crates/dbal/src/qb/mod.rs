//! Statement builders.
//!
//! Every statement is created by a [`QueryBuilder`], which binds one dialect-aware
//! [`ExpressionBuilder`], one [`ConditionBuilder`] and one [`DbalConfig`] to everything it
//! creates. Builders are consuming (`fn where_(self, ..) -> Self`) and cache their rendered
//! [`Expression`] until the next mutation.
//!
//! # Usage
//!
//! ```ignore
//! use dbal::prelude::*;
//!
//! let qb = QueryBuilder::new(PostgresDialect);
//!
//! let users = qb
//!     .select(["id", "name"])
//!     .from("users")
//!     .where_(cond_map! { "status" => "active" })
//!     .and_where_value("age", ">=", 18)
//!     .order_by("name", Order::Asc)
//!     .limit(20)
//!     .get_all(&client)
//!     .await?;
//!
//! qb.update("users")
//!     .set("status", "inactive")
//!     .where_value_eq("id", user_id)
//!     .execute(&client)
//!     .await?;
//! ```

mod delete;
mod insert;
mod join;
mod select;
mod table;
mod traits;
mod update;
mod where_clause;

#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use delete::DeleteQuery;
pub use insert::InsertQuery;
pub use join::{Join, JoinType};
pub use select::{Order, SelectQuery};
pub use table::Table;
pub use traits::{MutationStatement, OnClause, SqlStatement, WhereClause};
pub use update::UpdateQuery;

use crate::client::Command;
use crate::cond_builder::ConditionBuilder;
use crate::config::DbalConfig;
use crate::expr::ExpressionBuilder;
use crate::ident::Dialect;
use crate::value::Value;

/// Statement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl QueryKind {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Capabilities shared by every statement of one [`QueryBuilder`].
#[derive(Debug)]
pub struct QueryContext {
    expr: ExpressionBuilder,
    conditions: ConditionBuilder,
    config: DbalConfig,
}

impl QueryContext {
    pub fn expr(&self) -> &ExpressionBuilder {
        &self.expr
    }

    pub fn conditions(&self) -> &ConditionBuilder {
        &self.conditions
    }

    pub fn config(&self) -> &DbalConfig {
        &self.config
    }
}

/// Statement factory.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    ctx: Arc<QueryContext>,
}

impl QueryBuilder {
    /// Create a factory for `dialect` with the default configuration.
    pub fn new(dialect: impl Dialect + 'static) -> Self {
        Self::with_config(dialect, DbalConfig::default())
    }

    pub fn with_config(dialect: impl Dialect + 'static, config: DbalConfig) -> Self {
        Self {
            ctx: Arc::new(QueryContext {
                expr: ExpressionBuilder::new(dialect),
                conditions: ConditionBuilder::new(config.realtime_cond_building),
                config,
            }),
        }
    }

    pub fn context(&self) -> &Arc<QueryContext> {
        &self.ctx
    }

    pub fn expr(&self) -> &ExpressionBuilder {
        &self.ctx.expr
    }

    pub fn config(&self) -> &DbalConfig {
        &self.ctx.config
    }

    /// `SELECT <columns>`. An empty list selects `*` once a FROM table is added.
    pub fn select<I, S>(&self, columns: I) -> SelectQuery
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SelectQuery::new(Arc::clone(&self.ctx)).select(columns)
    }

    /// `SELECT * FROM <table>`.
    pub fn from(&self, table: impl Into<Table>) -> SelectQuery {
        SelectQuery::new(Arc::clone(&self.ctx)).from(table)
    }

    pub fn update(&self, table: impl Into<Table>) -> UpdateQuery {
        UpdateQuery::new(Arc::clone(&self.ctx), table.into())
    }

    pub fn delete(&self, table: impl Into<Table>) -> DeleteQuery {
        DeleteQuery::new(Arc::clone(&self.ctx), table.into())
    }

    pub fn insert(&self, table: impl Into<Table>) -> InsertQuery {
        InsertQuery::new(Arc::clone(&self.ctx), table.into())
    }

    /// Hand-written SQL with `{{table}}` / `[[column]]` markers expanded for this dialect.
    pub fn command<V: Into<Value>>(
        &self,
        sql: &str,
        params: impl IntoIterator<Item = V>,
    ) -> Command {
        Command::raw(
            self.ctx.expr.dialect(),
            sql,
            params.into_iter().map(Into::into).collect(),
        )
    }
}
