//! Condition slot shared by WHERE, HAVING and JOIN ... ON.

use crate::cond_builder::CondInput;
use crate::condition::{CompositeCondition, CondNode, Condition};
use crate::error::DbalResult;
use crate::expr::{Expression, Junction};
use crate::qb::QueryContext;
use crate::value::Value;

/// Holds the normalized condition of one clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ConditionSlot(Option<CondNode>);

impl ConditionSlot {
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Replace (`junction == None`) or AND/OR `input` onto the current condition.
    ///
    /// Empty input clears the slot on replace and is ignored otherwise.
    pub(crate) fn apply(
        &mut self,
        ctx: &QueryContext,
        junction: Option<Junction>,
        input: CondInput,
        params: Vec<Value>,
    ) -> DbalResult<()> {
        if input.is_empty() {
            if junction.is_none() {
                self.0 = None;
            }
            return Ok(());
        }
        let eb = ctx.expr();
        let cb = ctx.conditions();
        let node = match (junction, self.0.take()) {
            (Some(Junction::And), Some(current)) => {
                composite(cb.and_cond(current, input, params, eb)?)
            }
            (Some(Junction::Or), Some(current)) => {
                composite(cb.or_cond(current, input, params, eb)?)
            }
            _ => cb.cond(input, params, eb)?,
        };
        self.0 = Some(node);
        Ok(())
    }

    /// Render, AND-merging `extra` fragments onto the stored condition.
    pub(crate) fn build(
        &self,
        ctx: &QueryContext,
        extra: Vec<CondNode>,
    ) -> DbalResult<Option<Expression>> {
        let Some(node) = ctx.conditions().merge(self.0.clone(), extra) else {
            return Ok(None);
        };
        let expr = ctx.conditions().build(&node, ctx.expr())?;
        Ok((!expr.is_empty()).then_some(expr))
    }
}

fn composite(group: CompositeCondition) -> CondNode {
    CondNode::Cond(Condition::Composite(group))
}
