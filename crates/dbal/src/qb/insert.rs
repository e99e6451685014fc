//! INSERT statement builder.

use std::sync::Arc;

use crate::composer::SqlComposer;
use crate::condition::Operand;
use crate::error::{DbalError, DbalResult};
use crate::expr::Expression;
use crate::qb::traits::BuildCache;
use crate::qb::{MutationStatement, QueryContext, QueryKind, SqlStatement, Table};
use crate::value::Value;

/// INSERT statement builder.
///
/// Either list the columns once and add rows with [`values`](Self::values), or build a single
/// row column by column with [`set`](Self::set).
#[derive(Debug, Clone)]
pub struct InsertQuery {
    ctx: Arc<QueryContext>,
    table: Table,
    columns: Vec<String>,
    rows: Vec<Vec<Expression>>,
    emulate_execution: bool,
    built: BuildCache,
    build_error: Option<DbalError>,
}

impl InsertQuery {
    pub(crate) fn new(ctx: Arc<QueryContext>, table: Table) -> Self {
        Self {
            ctx,
            table,
            columns: Vec::new(),
            rows: Vec::new(),
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

    /// Number of rows added so far.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Set the column list. Fails once rows have been added.
    pub fn columns<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutate(|q| {
            if !q.rows.is_empty() {
                return Err(DbalError::invalid_argument(
                    "INSERT columns cannot change after rows were added.",
                ));
            }
            q.columns = columns.into_iter().map(Into::into).collect();
            Ok(())
        })
    }

    /// Add one row. Its length must match the column list.
    pub fn values<I, V>(self, row: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        self.mutate(|q| {
            let row = row
                .into_iter()
                .map(|v| q.ctx.expr().value(v))
                .collect::<DbalResult<Vec<_>>>()?;
            if row.len() != q.columns.len() {
                return Err(DbalError::invalid_argument(format!(
                    "INSERT row has {} values but {} columns are listed.",
                    row.len(),
                    q.columns.len()
                )));
            }
            q.rows.push(row);
            Ok(())
        })
    }

    /// Set `column` in the single-row form. Setting a column twice keeps the last value.
    ///
    /// Columns listed through [`columns`](Self::columns) but never set are sent as NULL.
    pub fn set(self, column: impl Into<String>, value: impl Into<Operand>) -> Self {
        let column = column.into();
        let value = value.into();
        self.mutate(|q| {
            if q.rows.len() > 1 {
                return Err(DbalError::invalid_argument(
                    "INSERT set() cannot be combined with multiple rows.",
                ));
            }
            let eb = q.ctx.expr();
            let expr = eb.value(value)?;
            if q.rows.is_empty() {
                let row = q
                    .columns
                    .iter()
                    .map(|_| eb.value(Value::Null))
                    .collect::<DbalResult<Vec<_>>>()?;
                q.rows.push(row);
            }
            let idx = q.columns.iter().position(|c| *c == column);
            let Some(row) = q.rows.first_mut() else {
                return Err(DbalError::internal("INSERT row missing after initialization."));
            };
            match idx {
                Some(idx) if idx < row.len() => row[idx] = expr,
                Some(_) => {
                    return Err(DbalError::invalid_argument(format!(
                        "INSERT row has {} values but {} columns are listed.",
                        row.len(),
                        q.columns.len()
                    )));
                }
                None => {
                    q.columns.push(column);
                    row.push(expr);
                }
            }
            Ok(())
        })
    }

    pub fn emulate_execution(mut self, value: bool) -> Self {
        self.emulate_execution = value;
        self
    }

    fn build(&self) -> DbalResult<Expression> {
        if let Some(err) = &self.build_error {
            return Err(err.clone());
        }
        if self.rows.is_empty() || self.columns.is_empty() {
            return Err(DbalError::invalid_argument(
                "INSERT requires at least one row of values.",
            ));
        }
        let eb = self.ctx.expr();

        let columns = self
            .columns
            .iter()
            .map(|c| eb.wrap_single(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut rows = SqlComposer::new(", ");
        for row in &self.rows {
            let mut values = SqlComposer::new(", ");
            row.iter().cloned().for_each(|v| values.add(v));
            rows.add(values.compose_required(None)?.parenthesized());
        }

        let mut composer = SqlComposer::new(self.ctx.config().separator.as_str());
        composer.add_with_prefix("INSERT INTO ", self.table.render(eb)?);
        composer.add(format!("({columns})"));
        composer.add_opt(rows.compose(Some("VALUES ")));
        composer.compose_required(None)
    }
}

impl SqlStatement for InsertQuery {
    fn kind(&self) -> QueryKind {
        QueryKind::Insert
    }

    fn error(&self) -> Option<&DbalError> {
        self.build_error.as_ref()
    }

    fn to_expression(&self) -> DbalResult<Expression> {
        self.built.get_or_build(|| self.build()).cloned()
    }
}

impl MutationStatement for InsertQuery {
    fn is_emulated(&self) -> bool {
        self.emulate_execution
    }
}
