//! DELETE statement builder.

use std::sync::Arc;

use crate::composer::SqlComposer;
use crate::cond_builder::CondInput;
use crate::error::{DbalError, DbalResult};
use crate::expr::{Expression, Junction};
use crate::qb::traits::BuildCache;
use crate::qb::where_clause::ConditionSlot;
use crate::qb::{MutationStatement, QueryContext, QueryKind, SqlStatement, Table, WhereClause};
use crate::value::Value;

/// DELETE statement builder. Shares the empty-WHERE guard of [`UpdateQuery`](crate::qb::UpdateQuery).
#[derive(Debug, Clone)]
pub struct DeleteQuery {
    ctx: Arc<QueryContext>,
    table: Table,
    where_: ConditionSlot,
    emulate_execution: bool,
    built: BuildCache,
    build_error: Option<DbalError>,
}

impl DeleteQuery {
    pub(crate) fn new(ctx: Arc<QueryContext>, table: Table) -> Self {
        Self {
            ctx,
            table,
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

    pub fn emulate_execution(mut self, value: bool) -> Self {
        self.emulate_execution = value;
        self
    }

    fn build(&self) -> DbalResult<Expression> {
        if let Some(err) = &self.build_error {
            return Err(err.clone());
        }
        let mut composer = SqlComposer::new(self.ctx.config().separator.as_str());
        composer.add_with_prefix("DELETE FROM ", self.table.render(self.ctx.expr())?);
        composer.add_opt_with_prefix("WHERE ", self.where_.build(&self.ctx, Vec::new())?);
        composer.compose_required(None)
    }
}

impl SqlStatement for DeleteQuery {
    fn kind(&self) -> QueryKind {
        QueryKind::Delete
    }

    fn error(&self) -> Option<&DbalError> {
        self.build_error.as_ref()
    }

    fn to_expression(&self) -> DbalResult<Expression> {
        self.built.get_or_build(|| self.build()).cloned()
    }
}

impl MutationStatement for DeleteQuery {
    fn validate(&self) -> DbalResult<()> {
        if self.where_.is_empty() && !self.ctx.config().allow_empty_where {
            return Err(DbalError::EmptyWhereNotAllowed("DELETE".to_string()));
        }
        Ok(())
    }

    fn is_emulated(&self) -> bool {
        self.emulate_execution
    }
}

impl WhereClause for DeleteQuery {
    fn push_where(self, junction: Option<Junction>, input: CondInput, params: Vec<Value>) -> Self {
        self.mutate(|q| {
            let ctx = Arc::clone(&q.ctx);
            q.where_.apply(&ctx, junction, input, params)
        })
    }
}
