//! Typed condition tree.
//!
//! [`Condition`] is a closed sum of every predicate shape the builder accepts. Conditions
//! are plain values; rendering happens in [`Condition::build`], which resolves the whole
//! tree to an [`Expression`] through an [`ExpressionBuilder`].

use std::fmt;

use crate::error::{DbalError, DbalResult};
use crate::expr::{CompositeExpression, Expression, ExpressionBuilder, Junction};
use crate::value::{Value, impl_scalar_conversions};

/// Comparison operators accepted by value conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
}

impl Operator {
    /// Parse an operator. `!=` is accepted as an alias of `<>`; IN / NOT IN are
    /// case-insensitive.
    pub fn parse(op: &str) -> Option<Self> {
        let op = op.trim();
        Some(match op {
            "=" => Self::Eq,
            "<>" | "!=" => Self::Neq,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            _ if op.eq_ignore_ascii_case("in") => Self::In,
            _ if is_not_in(op) => Self::NotIn,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    /// IN / NOT IN.
    pub fn is_set(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

fn is_not_in(op: &str) -> bool {
    let mut words = op.split_whitespace();
    matches!(
        (words.next(), words.next(), words.next()),
        (Some(a), Some(b), None) if a.eq_ignore_ascii_case("not") && b.eq_ignore_ascii_case("in")
    )
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Left-hand side of a predicate: a column name (quoted by the dialect) or an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Name(String),
    Expr(Expression),
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for Column {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl From<Expression> for Column {
    fn from(expr: Expression) -> Self {
        Self::Expr(expr)
    }
}

impl From<CompositeExpression> for Column {
    fn from(expr: CompositeExpression) -> Self {
        Self::Expr(expr.to_expression())
    }
}

impl From<&Column> for Column {
    fn from(column: &Column) -> Self {
        column.clone()
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// One bound value.
    Value(Value),
    /// Several bound values, rendered as `(?,?,...)`.
    List(Vec<Value>),
    /// A rendered fragment or subquery, rendered as `(sql)`.
    Expr(Expression),
}

impl Operand {
    pub(crate) fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }

    pub(crate) fn is_empty_list(&self) -> bool {
        matches!(self, Self::List(values) if values.is_empty())
    }
}

impl_scalar_conversions!(Operand, |v| Operand::Value(v));

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Self::Value(Value::from(v))
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Self::Value(Value::Text(v))
    }
}

impl From<serde_json::Value> for Operand {
    fn from(v: serde_json::Value) -> Self {
        Self::Value(Value::Json(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Self::Value(Value::from(v))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Operand {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Operand {
    fn from(values: [T; N]) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<Expression> for Operand {
    fn from(expr: Expression) -> Self {
        Self::Expr(expr)
    }
}

impl From<CompositeExpression> for Operand {
    fn from(expr: CompositeExpression) -> Self {
        Self::Expr(expr.to_expression())
    }
}

impl From<&Operand> for Operand {
    fn from(operand: &Operand) -> Self {
        operand.clone()
    }
}

/// An item of a condition tree: already rendered, or still a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum CondNode {
    Expr(Expression),
    Cond(Condition),
}

impl CondNode {
    /// Render to an expression.
    pub fn build(&self, eb: &ExpressionBuilder) -> DbalResult<Expression> {
        match self {
            Self::Expr(expr) => Ok(expr.clone()),
            Self::Cond(cond) => cond.build(eb),
        }
    }

    /// The composite this node holds, if it is one of kind `kind`.
    pub(crate) fn as_composite(&self, kind: Junction) -> Option<&CompositeCondition> {
        match self {
            Self::Cond(Condition::Composite(c)) if c.kind == kind => Some(c),
            _ => None,
        }
    }
}

impl From<Expression> for CondNode {
    fn from(expr: Expression) -> Self {
        Self::Expr(expr)
    }
}

impl From<Condition> for CondNode {
    fn from(cond: Condition) -> Self {
        Self::Cond(cond)
    }
}

/// Every supported condition shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column <op> value`. A NULL value turns `=` into IS NULL and `<>` into IS NOT NULL.
    Simple {
        column: Column,
        operator: Operator,
        value: Operand,
    },
    /// `left <op> right` between two columns.
    ColumnSimple {
        left: String,
        operator: Operator,
        right: String,
    },
    Between {
        column: Column,
        min: Operand,
        max: Operand,
        negated: bool,
    },
    In {
        column: Column,
        values: Operand,
        negated: bool,
    },
    Exists {
        query: Expression,
        negated: bool,
    },
    Not(Box<CondNode>),
    /// Map shorthand. A `!` key prefix negates the item.
    Arrow(Vec<(String, Operand)>),
    /// Internal fragment, emitted verbatim.
    Raw(String),
    /// Caller SQL, emitted after identifier-marker expansion.
    String(String),
    /// Explicit positional parameters appended after the inner node's own.
    Params {
        inner: Box<CondNode>,
        params: Vec<Value>,
    },
    Composite(CompositeCondition),
}

impl Condition {
    /// Value comparison. Fails for NULL with anything but `=` / `<>`, for a list with a
    /// non-set operator, and for an empty IN set.
    pub fn simple(
        column: impl Into<Column>,
        operator: Operator,
        value: impl Into<Operand>,
    ) -> DbalResult<Self> {
        let value = value.into();
        if value.is_null() && !matches!(operator, Operator::Eq | Operator::Neq) {
            return Err(DbalError::invalid_format(format!(
                "Operator \"{operator}\" cannot be used with a NULL value."
            )));
        }
        if operator.is_set() {
            if matches!(value, Operand::Value(_)) {
                return Err(DbalError::invalid_format(format!(
                    "Operator \"{operator}\" expects a list of values or a subquery."
                )));
            }
            ensure_non_empty(&value)?;
        } else if matches!(value, Operand::List(_)) {
            return Err(DbalError::invalid_format(format!(
                "Operator \"{operator}\" does not accept a list of values."
            )));
        }
        Ok(Self::Simple {
            column: column.into(),
            operator,
            value,
        })
    }

    /// Column-to-column comparison. IN / NOT IN are rejected.
    pub fn column_simple(
        left: impl Into<String>,
        operator: Operator,
        right: impl Into<String>,
    ) -> DbalResult<Self> {
        if operator.is_set() {
            return Err(DbalError::invalid_format(format!(
                "Operator \"{operator}\" cannot compare two columns."
            )));
        }
        Ok(Self::ColumnSimple {
            left: left.into(),
            operator,
            right: right.into(),
        })
    }

    pub fn between(
        column: impl Into<Column>,
        min: impl Into<Operand>,
        max: impl Into<Operand>,
        negated: bool,
    ) -> DbalResult<Self> {
        let (min, max) = (min.into(), max.into());
        if matches!(min, Operand::List(_)) || matches!(max, Operand::List(_)) {
            return Err(DbalError::invalid_format(
                "BETWEEN bounds must be single values",
            ));
        }
        Ok(Self::Between {
            column: column.into(),
            min,
            max,
            negated,
        })
    }

    /// IN / NOT IN. A single value counts as a one-element list; an empty list fails.
    pub fn in_list(
        column: impl Into<Column>,
        values: impl Into<Operand>,
        negated: bool,
    ) -> DbalResult<Self> {
        let values = match values.into() {
            Operand::Value(v) => Operand::List(vec![v]),
            other => other,
        };
        ensure_non_empty(&values)?;
        Ok(Self::In {
            column: column.into(),
            values,
            negated,
        })
    }

    pub fn exists(query: Expression, negated: bool) -> Self {
        Self::Exists { query, negated }
    }

    pub fn not(inner: impl Into<CondNode>) -> Self {
        Self::Not(Box::new(inner.into()))
    }

    /// Map shorthand: `{col: v}` is `col = ?`, `{col: null}` IS NULL, `{col: [..]}` IN.
    pub fn arrow<K, V>(items: impl IntoIterator<Item = (K, V)>) -> DbalResult<Self>
    where
        K: Into<String>,
        V: Into<Operand>,
    {
        let items: Vec<(String, Operand)> = items
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if items.is_empty() {
            return Err(DbalError::invalid_format(
                "An empty list of expressions is not allowed.",
            ));
        }
        for (key, value) in &items {
            if key.trim_start_matches('!').is_empty() {
                return Err(DbalError::invalid_format("Empty column key in map condition."));
            }
            ensure_non_empty(value)?;
        }
        Ok(Self::Arrow(items))
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    pub fn string(sql: impl Into<String>) -> Self {
        Self::String(sql.into())
    }

    pub fn params(inner: impl Into<CondNode>, params: Vec<Value>) -> Self {
        Self::Params {
            inner: Box::new(inner.into()),
            params,
        }
    }

    /// Render this condition.
    pub fn build(&self, eb: &ExpressionBuilder) -> DbalResult<Expression> {
        match self {
            Self::Simple {
                column,
                operator,
                value,
            } => match (operator, value.is_null()) {
                (Operator::Eq, true) => Ok(eb.is_null(column)),
                (Operator::Neq, true) => Ok(eb.is_not_null(column)),
                (_, true) => Err(DbalError::invalid_format(format!(
                    "Operator \"{operator}\" cannot be used with a NULL value."
                ))),
                (_, false) => eb.comparison(column, *operator, value),
            },
            Self::ColumnSimple {
                left,
                operator,
                right,
            } => Ok(eb.comparison_columns(left, *operator, right)),
            Self::Between {
                column,
                min,
                max,
                negated: false,
            } => eb.between(column, min, max),
            Self::Between {
                column,
                min,
                max,
                negated: true,
            } => eb.not_between(column, min, max),
            Self::In {
                column,
                values,
                negated: false,
            } => eb.in_(column, values),
            Self::In {
                column,
                values,
                negated: true,
            } => eb.not_in(column, values),
            Self::Exists {
                query,
                negated: false,
            } => Ok(eb.exists(query)),
            Self::Exists {
                query,
                negated: true,
            } => Ok(eb.not_exists(query)),
            Self::Not(inner) => Ok(match inner.as_ref() {
                CondNode::Cond(Self::String(sql)) => eb.not(eb.wrap_sql(sql)),
                CondNode::Cond(Self::Raw(sql)) => eb.not(sql),
                other => eb.not(other.build(eb)?),
            }),
            Self::Arrow(items) => {
                let mut parts = items
                    .iter()
                    .map(|(key, value)| build_arrow_item(key, value, eb))
                    .collect::<DbalResult<Vec<_>>>()?;
                if parts.len() == 1 {
                    return Ok(parts.remove(0));
                }
                Ok(eb.and(parts).to_expression())
            }
            Self::Raw(sql) => Ok(Expression::raw(sql.clone())),
            Self::String(sql) => Ok(Expression::raw(eb.wrap_sql(sql))),
            Self::Params { inner, params } => {
                Ok(inner.build(eb)?.with_params(params.iter().cloned()))
            }
            Self::Composite(composite) => composite.build(eb),
        }
    }
}

fn ensure_non_empty(operand: &Operand) -> DbalResult<()> {
    if operand.is_empty_list() {
        return Err(DbalError::invalid_format(
            "For the \"in/not in\" condition, an empty array of elements is not allowed.",
        ));
    }
    Ok(())
}

fn build_arrow_item(key: &str, value: &Operand, eb: &ExpressionBuilder) -> DbalResult<Expression> {
    let (column, negated) = match key.strip_prefix('!') {
        Some(column) => (column, true),
        None => (key, false),
    };
    match (value, negated) {
        (Operand::Value(Value::Null), false) => Ok(eb.is_null(column)),
        (Operand::Value(Value::Null), true) => Ok(eb.is_not_null(column)),
        (Operand::List(_), false) => eb.in_(column, value),
        (Operand::List(_), true) => eb.not_in(column, value),
        (_, false) => eb.eq(column, value),
        (_, true) => eb.neq(column, value),
    }
}

/// AND/OR group of condition nodes.
///
/// The kind is fixed at construction. Extending with more items keeps the group flat.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeCondition {
    kind: Junction,
    items: Vec<CondNode>,
}

impl CompositeCondition {
    pub fn new(kind: Junction, items: Vec<CondNode>) -> Self {
        Self { kind, items }
    }

    pub fn kind(&self) -> Junction {
        self.kind
    }

    pub fn items(&self) -> &[CondNode] {
        &self.items
    }

    /// Append items to this group.
    pub fn extend(mut self, items: impl IntoIterator<Item = CondNode>) -> Self {
        self.items.extend(items);
        self
    }

    pub fn build(&self, eb: &ExpressionBuilder) -> DbalResult<Expression> {
        let parts = self
            .items
            .iter()
            .map(|item| item.build(eb))
            .collect::<DbalResult<Vec<_>>>()?;
        Ok(CompositeExpression::new(self.kind, parts).to_expression())
    }
}

impl From<CompositeCondition> for Condition {
    fn from(composite: CompositeCondition) -> Self {
        Self::Composite(composite)
    }
}
