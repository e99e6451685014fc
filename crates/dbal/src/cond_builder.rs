//! Condition normalization.
//!
//! [`CondInput`] is everything a caller may pass to `where_` / `on`. The
//! [`ConditionBuilder`] classifies it into a [`Condition`] tree, merging AND/OR groups of
//! the same kind instead of nesting them.
//!
//! List input is keyed by its first element:
//!
//! | Shape | Meaning |
//! |---|---|
//! | `["and", c1, c2, ..]` / `["or", ..]` | composite, flattened into a same-kind parent |
//! | `["val", col, op, value]` | value comparison |
//! | `["col", left, op, right]` | column comparison |
//! | `["in", col, values]`, `["not in", ..]` | set membership |
//! | `["between", col, min, max]`, `["not between", ..]` | range |
//! | `["exists", query]`, `["not exists", query]` | subquery test |
//! | `["not", cond]` | negation |
//! | `["string", sql]`, `["raw", sql]` | SQL fragment (marker-expanded / verbatim) |
//! | `["params", cond, [values]]` | explicit positional parameters |
//! | `["compare", {map}]` | map shorthand |
//! | `[col, op, value]` | positional comparison |
//!
//! A map (`cond_map!{"id" => 5}`) is the arrow shorthand.

use crate::condition::{Column, CompositeCondition, CondNode, Condition, Operand, Operator};
use crate::error::{DbalError, DbalResult};
use crate::expr::{CompositeExpression, Expression, ExpressionBuilder, Junction};
use crate::qb::{SelectQuery, SqlStatement};
use crate::value::{Value, impl_scalar_conversions};

/// Caller-supplied condition input.
#[derive(Debug, Clone)]
pub enum CondInput {
    /// SQL text, or a column name / text value inside a list.
    Str(String),
    Value(Value),
    List(Vec<CondInput>),
    Map(Vec<(String, CondInput)>),
    Expr(Expression),
    Cond(Condition),
    Query(Box<SelectQuery>),
}

impl CondInput {
    /// Build a map input from key/value pairs, preserving order.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<CondInput>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Empty input clears a WHERE / ON slot instead of setting it.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Str(s) => s.trim().is_empty(),
            Self::Value(v) => v.is_null(),
            Self::List(items) => items.is_empty(),
            Self::Map(items) => items.is_empty(),
            Self::Expr(expr) => expr.is_empty(),
            Self::Cond(_) | Self::Query(_) => false,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Value(v) => v.type_name(),
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Expr(_) => "Expression",
            Self::Cond(_) => "Condition",
            Self::Query(_) => "SelectQuery",
        }
    }

    fn into_column(self, argument: &str) -> DbalResult<Column> {
        match self {
            Self::Str(s) | Self::Value(Value::Text(s)) => Ok(Column::Name(s)),
            Self::Expr(expr) => Ok(Column::Expr(expr)),
            Self::Query(query) => Ok(Column::Expr(query.to_expression()?)),
            other => Err(DbalError::invalid_argument_type(
                argument,
                "string|Expression",
                other.type_name(),
            )),
        }
    }

    fn into_operand(self, argument: &str, eb: &ExpressionBuilder) -> DbalResult<Operand> {
        match self {
            Self::Str(s) => Ok(Operand::Value(Value::Text(s))),
            Self::Value(v) => Ok(Operand::Value(v)),
            Self::List(items) => items
                .into_iter()
                .map(|item| item.into_value(argument))
                .collect::<DbalResult<Vec<_>>>()
                .map(Operand::List),
            Self::Expr(expr) => Ok(Operand::Expr(expr)),
            Self::Query(query) => Ok(Operand::Expr(query.to_expression()?)),
            Self::Cond(cond) => Ok(Operand::Expr(cond.build(eb)?)),
            other @ Self::Map(_) => Err(DbalError::invalid_argument_type(
                argument,
                "scalar|list|Expression|SelectQuery",
                other.type_name(),
            )),
        }
    }

    fn into_value(self, argument: &str) -> DbalResult<Value> {
        match self {
            Self::Str(s) => Ok(Value::Text(s)),
            Self::Value(v) => Ok(v),
            other => Err(DbalError::invalid_argument_type(
                argument,
                "scalar",
                other.type_name(),
            )),
        }
    }

    fn into_query(self, argument: &str) -> DbalResult<Expression> {
        match self {
            Self::Expr(expr) => Ok(expr),
            Self::Query(query) => query.to_expression(),
            other => Err(DbalError::invalid_argument_type(
                argument,
                "Expression|SelectQuery",
                other.type_name(),
            )),
        }
    }

    fn into_text(self, argument: &str) -> DbalResult<String> {
        match self {
            Self::Str(s) | Self::Value(Value::Text(s)) => Ok(s),
            other => Err(DbalError::invalid_argument_type(
                argument,
                "string",
                other.type_name(),
            )),
        }
    }

    fn as_name(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl_scalar_conversions!(CondInput, |v| CondInput::Value(v));

impl From<&str> for CondInput {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for CondInput {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&String> for CondInput {
    fn from(s: &String) -> Self {
        Self::Str(s.clone())
    }
}

impl From<Value> for CondInput {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for CondInput {
    fn from(v: Option<T>) -> Self {
        Self::Value(Value::from(v))
    }
}

impl<T: Into<CondInput>> From<Vec<T>> for CondInput {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<CondInput>, const N: usize> From<[T; N]> for CondInput {
    fn from(items: [T; N]) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Expression> for CondInput {
    fn from(expr: Expression) -> Self {
        Self::Expr(expr)
    }
}

impl From<CompositeExpression> for CondInput {
    fn from(expr: CompositeExpression) -> Self {
        Self::Expr(expr.to_expression())
    }
}

impl From<Condition> for CondInput {
    fn from(cond: Condition) -> Self {
        Self::Cond(cond)
    }
}

impl From<CondNode> for CondInput {
    fn from(node: CondNode) -> Self {
        match node {
            CondNode::Expr(expr) => Self::Expr(expr),
            CondNode::Cond(cond) => Self::Cond(cond),
        }
    }
}

impl From<SelectQuery> for CondInput {
    fn from(query: SelectQuery) -> Self {
        Self::Query(Box::new(query))
    }
}

/// Structural conversion. Objects become maps in key order and arrays become lists; strings stay SQL text.
impl From<serde_json::Value> for CondInput {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Value(Value::Null),
            Json::Bool(b) => Self::Value(Value::Bool(b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Value(Value::Int(i)),
                None => Self::Value(n.as_f64().map_or(Value::Null, Value::Float)),
            },
            Json::String(s) => Self::Str(s),
            Json::Array(items) => Self::List(items.into_iter().map(Into::into).collect()),
            Json::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Build a list-shaped [`CondInput`] from heterogeneous items.
///
/// ```ignore
/// let c = cond!["or", cond!["in", "status", ["new", "open"]], "archived_at IS NULL"];
/// ```
#[macro_export]
macro_rules! cond {
    ($($item:expr),* $(,)?) => {
        $crate::CondInput::List(vec![$($crate::CondInput::from($item)),*])
    };
}

/// Build a map-shaped [`CondInput`] (the arrow shorthand).
///
/// ```ignore
/// let c = cond_map! { "status" => "active", "!deleted_at" => dbal::Value::Null };
/// ```
#[macro_export]
macro_rules! cond_map {
    ($($key:expr => $value:expr),* $(,)?) => {
        $crate::CondInput::Map(vec![$((
            ::std::string::String::from($key),
            $crate::CondInput::from($value),
        )),*])
    };
}

/// Normalizes [`CondInput`] into condition trees and renders them.
#[derive(Debug, Clone, Default)]
pub struct ConditionBuilder {
    realtime: bool,
}

impl ConditionBuilder {
    /// With `realtime` on, leaf conditions are rendered to expressions as soon as they are
    /// normalized; composites stay as groups so they can keep flattening.
    pub fn new(realtime: bool) -> Self {
        Self { realtime }
    }

    pub fn realtime(&self) -> bool {
        self.realtime
    }

    /// Toggle realtime building, returning the previous setting.
    pub fn set_realtime(&mut self, value: bool) -> bool {
        std::mem::replace(&mut self.realtime, value)
    }

    /// Normalize one input. Non-empty `params` wrap the result as explicit parameters.
    pub fn cond(
        &self,
        input: CondInput,
        params: Vec<Value>,
        eb: &ExpressionBuilder,
    ) -> DbalResult<CondNode> {
        let node = single(self.prepare(input, eb, None)?)?;
        if params.is_empty() {
            return Ok(node);
        }
        self.finish(Condition::params(node, params).into(), eb)
    }

    /// `cond1 AND cond2`, extending `cond1` when it already is an AND group.
    pub fn and_cond(
        &self,
        cond1: CondNode,
        cond2: CondInput,
        params: Vec<Value>,
        eb: &ExpressionBuilder,
    ) -> DbalResult<CompositeCondition> {
        self.composite_cond(Junction::And, cond1, cond2, params, eb)
    }

    /// `cond1 OR cond2`, extending `cond1` when it already is an OR group.
    pub fn or_cond(
        &self,
        cond1: CondNode,
        cond2: CondInput,
        params: Vec<Value>,
        eb: &ExpressionBuilder,
    ) -> DbalResult<CompositeCondition> {
        self.composite_cond(Junction::Or, cond1, cond2, params, eb)
    }

    /// AND-merge already normalized nodes into `item`.
    pub fn merge(&self, item: Option<CondNode>, items: Vec<CondNode>) -> Option<CondNode> {
        if items.is_empty() {
            return item;
        }
        let merged = match item {
            None if items.len() == 1 => return items.into_iter().next(),
            None => CompositeCondition::new(Junction::And, items),
            Some(CondNode::Cond(Condition::Composite(c))) if c.kind() == Junction::And => {
                c.extend(items)
            }
            Some(node) => {
                let mut all = Vec::with_capacity(items.len() + 1);
                all.push(node);
                all.extend(items);
                CompositeCondition::new(Junction::And, all)
            }
        };
        Some(CondNode::Cond(Condition::Composite(merged)))
    }

    /// Render a node.
    pub fn build(&self, node: &CondNode, eb: &ExpressionBuilder) -> DbalResult<Expression> {
        node.build(eb)
    }

    fn composite_cond(
        &self,
        kind: Junction,
        cond1: CondNode,
        cond2: CondInput,
        params: Vec<Value>,
        eb: &ExpressionBuilder,
    ) -> DbalResult<CompositeCondition> {
        let rhs = if params.is_empty() {
            self.prepare(cond2, eb, Some(kind))?
        } else {
            vec![self.cond(cond2, params, eb)?]
        };
        if cond1.as_composite(kind).is_some() {
            if let CondNode::Cond(Condition::Composite(c)) = cond1 {
                return Ok(c.extend(rhs));
            }
        }
        let mut items = vec![self.finish(cond1, eb)?];
        items.extend(rhs);
        Ok(CompositeCondition::new(kind, items))
    }

    fn finish(&self, node: CondNode, eb: &ExpressionBuilder) -> DbalResult<CondNode> {
        match node {
            CondNode::Cond(Condition::Composite(_)) => Ok(node),
            CondNode::Cond(cond) if self.realtime => Ok(CondNode::Expr(cond.build(eb)?)),
            other => Ok(other),
        }
    }

    fn prepare(
        &self,
        input: CondInput,
        eb: &ExpressionBuilder,
        parent: Option<Junction>,
    ) -> DbalResult<Vec<CondNode>> {
        if input.is_empty() {
            return Err(DbalError::invalid_format("An empty condition is not allowed."));
        }
        let node = match input {
            CondInput::Str(sql) => Condition::string(sql).into(),
            CondInput::Expr(expr) => CondNode::Expr(expr),
            CondInput::Cond(Condition::Composite(group)) if Some(group.kind()) == parent => {
                return Ok(group.items().to_vec());
            }
            CondInput::Cond(cond) => CondNode::Cond(cond),
            CondInput::Map(entries) => CondNode::Cond(self.arrow(entries, eb)?),
            CondInput::List(items) => return self.prepare_list(items, eb, parent),
            other @ (CondInput::Value(_) | CondInput::Query(_)) => {
                return Err(DbalError::invalid_format(format!(
                    "A {} cannot be used as a condition.",
                    other.type_name()
                )));
            }
        };
        Ok(vec![self.finish(node, eb)?])
    }

    fn prepare_list(
        &self,
        mut items: Vec<CondInput>,
        eb: &ExpressionBuilder,
        parent: Option<Junction>,
    ) -> DbalResult<Vec<CondNode>> {
        let Some(name) = items.first().and_then(CondInput::as_name).map(str::to_string) else {
            if items.len() == 3 && matches!(items[0], CondInput::Expr(_)) {
                return Ok(vec![self.finish(self.positional(items)?.into(), eb)?]);
            }
            return Err(DbalError::invalid_format(format!(
                "A condition list must start with a condition name, got {}.",
                items.first().map_or("nothing", CondInput::type_name)
            )));
        };

        if let Some(kind) = Junction::parse(&name) {
            items.remove(0);
            return self.prepare_composite(kind, items, eb, parent);
        }

        let cond = match name.trim().to_ascii_lowercase().as_str() {
            "compare" => {
                let [_, map] = take_args::<2>("compare", items)?;
                match map {
                    CondInput::Map(entries) => self.arrow(entries, eb)?,
                    other => {
                        return Err(DbalError::invalid_argument_type(
                            "compare",
                            "map",
                            other.type_name(),
                        ));
                    }
                }
            }
            "val" => {
                let [_, column, op, value] = take_args::<4>("val", items)?;
                Condition::simple(
                    column.into_column("column")?,
                    parse_operator(op)?,
                    value.into_operand("value", eb)?,
                )?
            }
            "col" => {
                let [_, left, op, right] = take_args::<4>("col", items)?;
                Condition::column_simple(
                    left.into_text("columnLeft")?,
                    parse_operator(op)?,
                    right.into_text("columnRight")?,
                )?
            }
            n @ ("in" | "not in" | "notin") => {
                let negated = n != "in";
                let [_, column, values] = take_args::<3>(n, items)?;
                Condition::in_list(
                    column.into_column("column")?,
                    values.into_operand("values", eb)?,
                    negated,
                )?
            }
            n @ ("between" | "not between" | "notbetween") => {
                let negated = n != "between";
                let [_, column, min, max] = take_args::<4>(n, items)?;
                Condition::between(
                    column.into_column("column")?,
                    min.into_operand("minValue", eb)?,
                    max.into_operand("maxValue", eb)?,
                    negated,
                )?
            }
            n @ ("exists" | "not exists" | "notexists") => {
                let negated = n != "exists";
                let [_, query] = take_args::<2>(n, items)?;
                Condition::exists(query.into_query("query")?, negated)
            }
            "not" => {
                let [_, inner] = take_args::<2>("not", items)?;
                Condition::not(self.cond(inner, Vec::new(), eb)?)
            }
            "string" => {
                let [_, sql] = take_args::<2>("string", items)?;
                Condition::string(sql.into_text("sql")?)
            }
            "raw" => {
                let [_, sql] = take_args::<2>("raw", items)?;
                Condition::raw(sql.into_text("sql")?)
            }
            "params" => {
                let [_, inner, params] = take_args::<3>("params", items)?;
                let params = match params {
                    CondInput::List(values) => values
                        .into_iter()
                        .map(|v| v.into_value("params"))
                        .collect::<DbalResult<Vec<_>>>()?,
                    single => vec![single.into_value("params")?],
                };
                Condition::params(self.cond(inner, Vec::new(), eb)?, params)
            }
            _ if items.len() == 3 && is_operator(&items[1]) => self.positional(items)?,
            _ => {
                return Err(DbalError::invalid_format(format!(
                    "Unknown condition name \"{name}\"."
                )));
            }
        };
        Ok(vec![self.finish(cond.into(), eb)?])
    }

    fn prepare_composite(
        &self,
        kind: Junction,
        items: Vec<CondInput>,
        eb: &ExpressionBuilder,
        parent: Option<Junction>,
    ) -> DbalResult<Vec<CondNode>> {
        if items.is_empty() {
            return Err(DbalError::invalid_format(format!(
                "Condition \"{}\" requires at least one operand.",
                kind.keyword().to_ascii_lowercase()
            )));
        }
        let mut nodes = Vec::with_capacity(items.len());
        for item in items {
            nodes.extend(self.prepare(item, eb, Some(kind))?);
        }
        if parent == Some(kind) {
            return Ok(nodes);
        }
        Ok(vec![CondNode::Cond(Condition::Composite(
            CompositeCondition::new(kind, nodes),
        ))])
    }

    /// `[column, op, value]`
    fn positional(&self, items: Vec<CondInput>) -> DbalResult<Condition> {
        let [column, op, value] = take_args::<3>("positional", items)?;
        let operator = parse_operator(op)?;
        let value = match value {
            CondInput::Expr(expr) => Operand::Expr(expr),
            CondInput::Query(query) => Operand::Expr(query.to_expression()?),
            CondInput::List(values) => Operand::List(
                values
                    .into_iter()
                    .map(|v| v.into_value("value"))
                    .collect::<DbalResult<Vec<_>>>()?,
            ),
            other => Operand::Value(other.into_value("value")?),
        };
        Condition::simple(column.into_column("column")?, operator, value)
    }

    fn arrow(&self, entries: Vec<(String, CondInput)>, eb: &ExpressionBuilder) -> DbalResult<Condition> {
        let items = entries
            .into_iter()
            .map(|(key, value)| Ok((key, value.into_operand("value", eb)?)))
            .collect::<DbalResult<Vec<_>>>()?;
        Condition::arrow(items)
    }
}

fn single(mut nodes: Vec<CondNode>) -> DbalResult<CondNode> {
    match nodes.len() {
        1 => Ok(nodes.remove(0)),
        n => Err(DbalError::internal(format!(
            "expected one normalized condition, got {n}"
        ))),
    }
}

fn take_args<const N: usize>(name: &str, items: Vec<CondInput>) -> DbalResult<[CondInput; N]> {
    let given = items.len();
    items.try_into().map_err(|_| {
        DbalError::invalid_format(format!(
            "Condition \"{name}\" expects {N} elements, {given} given."
        ))
    })
}

fn is_operator(input: &CondInput) -> bool {
    input.as_name().and_then(Operator::parse).is_some()
}

fn parse_operator(input: CondInput) -> DbalResult<Operator> {
    let op = input.into_text("operator")?;
    Operator::parse(&op)
        .ok_or_else(|| DbalError::invalid_format(format!("Unsupported operator \"{op}\".")))
}
