//! # dbal
//!
//! A database-agnostic SQL query builder.
//!
//! ## Features
//!
//! - **Builds, never parses**: statements render to SQL text with `?` placeholders plus an
//!   ordered parameter list
//! - **Condition engine**: strings, lists, maps and typed conditions normalize into one tree;
//!   AND/OR groups of the same kind flatten instead of nesting
//! - **Dialect aware**: identifier quoting and `{{table}}` / `[[column]]` marker expansion come
//!   from a [`Dialect`]
//! - **Immutable-by-move builders**: every mutator consumes and returns the builder; the rendered
//!   statement is cached until the next mutation
//! - **Safe defaults**: UPDATE/DELETE without WHERE refuse to execute
//! - **Execution is delegated**: anything implementing [`Connection`] runs the SQL; a
//!   `tokio-postgres` implementation ships behind the `postgres` feature
//!
//! ## Example
//!
//! ```ignore
//! use dbal::prelude::*;
//!
//! let qb = QueryBuilder::new(PostgresDialect);
//!
//! let q = qb
//!     .select(["u.id", "u.name"])
//!     .from(Table::new("users").alias("u"))
//!     .left_join(Table::new("orders").alias("o"), cond!["col", "o.user_id", "=", "u.id"])
//!     .where_(cond_map! { "u.status" => "active", "!u.deleted_at" => Value::Null })
//!     .or_where_value_in("u.role", ["admin", "owner"])
//!     .limit(10);
//!
//! assert_eq!(q.params()?.len(), 3);
//! let rows = q.get_all(&client).await?;
//! ```

pub mod client;
pub mod composer;
pub mod cond_builder;
pub mod condition;
pub mod config;
pub mod error;
pub mod expr;
pub mod ident;
pub mod prelude;
pub mod qb;
pub mod value;

#[cfg(feature = "postgres")]
pub mod pg;

pub use client::{Command, CommandKind, Connection, ValueRow};
pub use composer::SqlComposer;
pub use cond_builder::{CondInput, ConditionBuilder};
pub use condition::{Column, CompositeCondition, CondNode, Condition, Operand, Operator};
pub use config::DbalConfig;
pub use error::{DbalError, DbalResult};
pub use expr::{CompositeExpression, Expression, ExpressionBuilder, Junction};
pub use ident::{Dialect, Ident, MySqlDialect, PlainDialect, PostgresDialect};
pub use qb::{
    DeleteQuery, InsertQuery, Join, JoinType, MutationStatement, OnClause, Order, QueryBuilder,
    QueryContext, QueryKind, SelectQuery, SqlStatement, Table, UpdateQuery, WhereClause,
};
pub use value::Value;
