//! Clause assembly.

use crate::error::{DbalError, DbalResult};
use crate::expr::Expression;
use crate::value::Value;

/// Accumulates SQL fragments and their parameters, then joins them with a separator.
///
/// Empty fragments are skipped, but their parameters are kept in order.
#[derive(Debug, Clone)]
pub struct SqlComposer {
    separator: String,
    parts: Vec<String>,
    params: Vec<Value>,
}

impl SqlComposer {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            parts: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Join `items` in one go. Fails when every item is empty.
    pub fn compose_items(
        separator: &str,
        items: impl IntoIterator<Item = Option<Expression>>,
    ) -> DbalResult<Expression> {
        let mut composer = Self::new(separator);
        for item in items.into_iter().flatten() {
            composer.add(item);
        }
        composer.compose_required(None)
    }

    pub fn add(&mut self, item: impl Into<Expression>) {
        self.add_with_prefix("", item);
    }

    /// Add a fragment, prefixing its text when the text is non-empty.
    pub fn add_with_prefix(&mut self, prefix: &str, item: impl Into<Expression>) {
        let (sql, params) = item.into().into_parts();
        if !sql.is_empty() {
            self.parts.push(format!("{prefix}{sql}"));
        }
        self.params.extend(params);
    }

    pub fn add_opt(&mut self, item: Option<Expression>) {
        if let Some(item) = item {
            self.add(item);
        }
    }

    pub fn add_opt_with_prefix(&mut self, prefix: &str, item: Option<Expression>) {
        if let Some(item) = item {
            self.add_with_prefix(prefix, item);
        }
    }

    /// Add parameters without SQL text.
    pub fn add_params(&mut self, params: impl IntoIterator<Item = Value>) {
        self.params.extend(params);
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Join the fragments. `None` when nothing was added; `prefix` applies only otherwise.
    pub fn compose(self, prefix: Option<&str>) -> Option<Expression> {
        if self.parts.is_empty() {
            return None;
        }
        let sql = self.parts.join(&self.separator);
        let sql = match prefix {
            Some(prefix) => format!("{prefix}{sql}"),
            None => sql,
        };
        Some(Expression::new(sql, self.params))
    }

    /// Like [`compose`](Self::compose), but an empty composer is a builder bug.
    pub fn compose_required(self, prefix: Option<&str>) -> DbalResult<Expression> {
        self.compose(prefix)
            .ok_or_else(|| DbalError::internal("No parts in SqlComposer::compose."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_parts_with_separator_and_prefix() {
        let mut c = SqlComposer::new(", ");
        c.add("a");
        c.add(Expression::new("b = ?", vec![Value::Int(1)]));
        let expr = c.compose(Some("SET ")).unwrap();
        assert_eq!(expr.sql(), "SET a, b = ?");
        assert_eq!(expr.params(), &[Value::Int(1)]);
    }

    #[test]
    fn empty_fragments_keep_their_params() {
        let mut c = SqlComposer::new(" ");
        c.add("x");
        c.add(Expression::new("", vec![Value::Int(9)]));
        c.add_params([Value::Int(10)]);
        let expr = c.compose(None).unwrap();
        assert_eq!(expr.sql(), "x");
        assert_eq!(expr.params(), &[Value::Int(9), Value::Int(10)]);
    }

    #[test]
    fn prefix_only_applies_with_parts() {
        let c = SqlComposer::new(" ");
        assert!(c.compose(Some("WHERE ")).is_none());
    }

    #[test]
    fn required_composition_fails_when_empty() {
        let err = SqlComposer::new(" ").compose_required(None).unwrap_err();
        assert!(matches!(err, DbalError::Internal(_)));
    }

    #[test]
    fn compose_items_skips_missing() {
        let expr = SqlComposer::compose_items(
            " ",
            [
                Some(Expression::raw("INNER JOIN t")),
                None,
                Some(Expression::new("ON a = ?", vec![Value::Int(1)])),
            ],
        )
        .unwrap();
        assert_eq!(expr.sql(), "INNER JOIN t ON a = ?");
    }
}
