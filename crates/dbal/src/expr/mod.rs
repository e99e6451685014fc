//! Rendered SQL fragments.
//!
//! An [`Expression`] is SQL text plus the ordered values bound to its `?` placeholders.
//! A [`CompositeExpression`] joins several of them with AND/OR, flattening same-kind chains
//! so `(a AND b) AND c` renders as `(a) AND (b) AND (c)`.

mod builder;

pub use builder::ExpressionBuilder;

use std::fmt;

use crate::value::Value;

/// AND/OR junction of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Junction {
    And,
    Or,
}

impl Junction {
    /// SQL keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// Parse `"and"` / `"or"`, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("and") {
            Some(Self::And)
        } else if name.eq_ignore_ascii_case("or") {
            Some(Self::Or)
        } else {
            None
        }
    }
}

/// SQL text with its positional bind parameters.
///
/// The number of placeholders in `sql` must match `params`; callers own that invariant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expression {
    sql: String,
    params: Vec<Value>,
}

impl Expression {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// An expression without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }

    /// True when there is neither SQL text nor parameters.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty() && self.params.is_empty()
    }

    /// Prepend text, keeping the parameters.
    pub fn prefixed(self, prefix: &str) -> Self {
        Self {
            sql: format!("{prefix}{}", self.sql),
            params: self.params,
        }
    }

    /// Wrap in parentheses, keeping the parameters.
    pub fn parenthesized(self) -> Self {
        Self {
            sql: format!("({})", self.sql),
            params: self.params,
        }
    }

    /// Append positional parameters after the existing ones.
    pub fn with_params(mut self, params: impl IntoIterator<Item = Value>) -> Self {
        self.params.extend(params);
        self
    }

    /// SQL text with every placeholder replaced by its literal value.
    ///
    /// For logging only. Never execute the result.
    pub fn debug_sql(&self) -> String {
        let mut params = self.params.iter();
        replace_placeholders(&self.sql, |_| {
            params
                .next()
                .map_or_else(|| "?".to_string(), Value::to_literal)
        })
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl From<&str> for Expression {
    fn from(sql: &str) -> Self {
        Self::raw(sql)
    }
}

impl From<String> for Expression {
    fn from(sql: String) -> Self {
        Self::raw(sql)
    }
}

impl From<CompositeExpression> for Expression {
    fn from(composite: CompositeExpression) -> Self {
        composite.to_expression()
    }
}

/// AND/OR tree of expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeExpression {
    kind: Junction,
    parts: Vec<Expression>,
}

impl CompositeExpression {
    /// Build a composite, dropping empty parts.
    pub fn new(kind: Junction, parts: impl IntoIterator<Item = Expression>) -> Self {
        Self {
            kind,
            parts: Self::filter_empty_parts(parts),
        }
    }

    pub fn and(parts: impl IntoIterator<Item = Expression>) -> Self {
        Self::new(Junction::And, parts)
    }

    pub fn or(parts: impl IntoIterator<Item = Expression>) -> Self {
        Self::new(Junction::Or, parts)
    }

    /// Drop parts that carry neither SQL nor parameters.
    pub fn filter_empty_parts(parts: impl IntoIterator<Item = Expression>) -> Vec<Expression> {
        parts.into_iter().filter(|part| !part.is_empty()).collect()
    }

    pub fn kind(&self) -> Junction {
        self.kind
    }

    pub fn parts(&self) -> &[Expression] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Append parts of the same kind, extending this node instead of nesting it.
    pub fn with(mut self, parts: impl IntoIterator<Item = Expression>) -> Self {
        self.parts.extend(Self::filter_empty_parts(parts));
        self
    }

    /// Append AND parts. An OR composite becomes the left operand of a new AND node.
    pub fn with_and(self, parts: impl IntoIterator<Item = Expression>) -> Self {
        self.with_kind(Junction::And, parts)
    }

    /// Append OR parts. An AND composite becomes the left operand of a new OR node.
    pub fn with_or(self, parts: impl IntoIterator<Item = Expression>) -> Self {
        self.with_kind(Junction::Or, parts)
    }

    fn with_kind(self, kind: Junction, parts: impl IntoIterator<Item = Expression>) -> Self {
        // A single part has no junction of its own, so it can adopt either kind.
        if self.kind == kind || self.parts.len() <= 1 {
            return Self {
                kind,
                parts: self.parts,
            }
            .with(parts);
        }
        Self::new(kind, std::iter::once(self.to_expression()).chain(parts))
    }

    /// Render. One part renders verbatim, several render as `(a) AND (b)`.
    pub fn to_expression(&self) -> Expression {
        match self.parts.as_slice() {
            [] => Expression::default(),
            [single] => single.clone(),
            parts => {
                let glue = format!(" {} ", self.kind.keyword());
                let sql = parts
                    .iter()
                    .map(|part| format!("({})", part.sql))
                    .collect::<Vec<_>>()
                    .join(&glue);
                let params = parts
                    .iter()
                    .flat_map(|part| part.params.iter().cloned())
                    .collect();
                Expression::new(sql, params)
            }
        }
    }
}

impl fmt::Display for CompositeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_expression().sql())
    }
}

/// Rewrite every `?` placeholder outside quoted regions.
///
/// `'...'`, `"..."` and `` `...` `` regions are copied verbatim (doubled quotes included).
/// `f` receives the zero-based placeholder index.
pub(crate) fn replace_placeholders(sql: &str, mut f: impl FnMut(usize) -> String) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => {
                    out.push_str(&f(index));
                    index += 1;
                }
                _ => out.push(c),
            },
        }
    }
    out
}

/// Count `?` placeholders outside quoted regions.
pub(crate) fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    replace_placeholders(sql, |_| {
        count += 1;
        String::new()
    });
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(sql: &str) -> Expression {
        Expression::raw(sql)
    }

    fn e(sql: &str, params: &[i64]) -> Expression {
        Expression::new(sql, params.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn single_part_renders_verbatim() {
        let c = CompositeExpression::and([Expression::raw("a")]);
        assert_eq!(c.to_expression().sql(), "a");
    }

    #[test]
    fn two_parts_are_parenthesized() {
        let c = CompositeExpression::and([r("a"), r("b")]);
        assert_eq!(c.to_string(), "(a) AND (b)");
    }

    #[test]
    fn zero_parts_render_empty() {
        let c = CompositeExpression::or(Vec::new());
        assert!(c.to_expression().is_empty());
    }

    #[test]
    fn with_flattens_same_kind() {
        let c = CompositeExpression::and([r("a"), r("b")]).with([r("c")]);
        assert_eq!(c.to_string(), "(a) AND (b) AND (c)");
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn single_part_upgrades_to_multi_part() {
        let c = CompositeExpression::or([r("a")]).with_and([r("b")]);
        assert_eq!(c.kind(), Junction::And);
        assert_eq!(c.to_string(), "(a) AND (b)");
    }

    #[test]
    fn switching_kind_nests_prior_composite() {
        let c = CompositeExpression::and([r("a"), r("b")]).with_or([r("c")]);
        assert_eq!(c.to_string(), "((a) AND (b)) OR (c)");
    }

    #[test]
    fn params_follow_part_order() {
        let c = CompositeExpression::and([e("x = ?", &[1]), e("y IN (?,?)", &[2, 3])])
            .with_or([e("z = ?", &[4])]);
        assert_eq!(
            c.to_expression().params(),
            &[Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
        );
    }

    #[test]
    fn empty_parts_are_filtered() {
        let c = CompositeExpression::and([Expression::raw(""), r("a")]);
        assert_eq!(c.to_string(), "a");
    }

    #[test]
    fn debug_sql_inlines_literals() {
        let expr = Expression::new(
            "name = ? AND note = '?' AND id = ?",
            vec![Value::from("bob"), Value::Int(7)],
        );
        assert_eq!(expr.debug_sql(), "name = 'bob' AND note = '?' AND id = 7");
    }

    #[test]
    fn placeholder_count_skips_literals() {
        assert_eq!(count_placeholders("a = ? AND b = '??' AND \"c?\" = ?"), 2);
    }
}
