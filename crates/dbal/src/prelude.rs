//! Convenient imports for typical `dbal` usage.
//!
//! ```ignore
//! use dbal::prelude::*;
//! ```

pub use crate::{
    CondInput, Connection, DbalConfig, DbalError, DbalResult, Dialect, Expression, JoinType,
    MutationStatement, MySqlDialect, OnClause, Order, PlainDialect, PostgresDialect, QueryBuilder,
    SqlStatement, Table, Value, ValueRow, WhereClause, cond, cond_map,
};
