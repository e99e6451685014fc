//! JOIN clauses.

use std::fmt;
use std::sync::Arc;

use crate::composer::SqlComposer;
use crate::cond_builder::CondInput;
use crate::condition::CondNode;
use crate::error::{DbalError, DbalResult};
use crate::expr::{Expression, Junction};
use crate::qb::where_clause::ConditionSlot;
use crate::qb::{OnClause, QueryContext, Table, WhereClause};
use crate::value::Value;

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Cross,
    Full,
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Cross => "CROSS JOIN",
            Self::Full => "FULL JOIN",
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One JOIN of a SELECT.
///
/// Conditions added with [`OnClause`] go to `ON`. Conditions added with [`WhereClause`]
/// are AND-merged into the statement's WHERE clause when the statement is built.
#[derive(Debug, Clone)]
pub struct Join {
    ctx: Arc<QueryContext>,
    kind: JoinType,
    table: Table,
    on: ConditionSlot,
    where_: ConditionSlot,
    build_error: Option<DbalError>,
}

impl Join {
    pub(crate) fn new(ctx: Arc<QueryContext>, kind: JoinType, table: Table) -> Self {
        let build_error = table.ensure_alias("Join").err();
        Self {
            ctx,
            kind,
            table,
            on: ConditionSlot::default(),
            where_: ConditionSlot::default(),
            build_error,
        }
    }

    pub fn kind(&self) -> JoinType {
        self.kind
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Name nested joins use to attach under this one.
    pub fn reference(&self) -> String {
        self.table.reference()
    }

    pub fn error(&self) -> Option<&DbalError> {
        self.build_error.as_ref()
    }

    /// `<TYPE> <table> [ON <cond>]`, plus this join's WHERE fragment.
    pub(crate) fn build(&self) -> DbalResult<(Expression, Option<CondNode>)> {
        if let Some(err) = &self.build_error {
            return Err(err.clone());
        }
        let table = self.table.render(self.ctx.expr())?;
        let on = self
            .on
            .build(&self.ctx, Vec::new())?
            .map(|on| on.prefixed("ON "));
        let expr = SqlComposer::compose_items(
            " ",
            [Some(Expression::raw(self.kind.keyword())), Some(table), on],
        )?;
        let where_ = self.where_.build(&self.ctx, Vec::new())?.map(CondNode::Expr);
        Ok((expr, where_))
    }

    fn push(
        mut self,
        slot: fn(&mut Self) -> &mut ConditionSlot,
        junction: Option<Junction>,
        input: CondInput,
        params: Vec<Value>,
    ) -> Self {
        if self.build_error.is_some() {
            return self;
        }
        let ctx = Arc::clone(&self.ctx);
        if let Err(err) = slot(&mut self).apply(&ctx, junction, input, params) {
            self.build_error = Some(err);
        }
        self
    }
}

impl OnClause for Join {
    fn push_on(self, junction: Option<Junction>, input: CondInput, params: Vec<Value>) -> Self {
        self.push(|join| &mut join.on, junction, input, params)
    }
}

impl WhereClause for Join {
    fn push_where(self, junction: Option<Junction>, input: CondInput, params: Vec<Value>) -> Self {
        self.push(|join| &mut join.where_, junction, input, params)
    }
}
