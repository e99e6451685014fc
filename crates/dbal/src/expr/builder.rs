//! Primitive expression factory bound to a dialect.

use std::fmt;
use std::sync::Arc;

use crate::condition::{Column, Operand, Operator};
use crate::error::{DbalError, DbalResult};
use crate::expr::{CompositeExpression, Expression, count_placeholders, replace_placeholders};
use crate::ident::Dialect;
use crate::value::Value;

/// Produces primitive [`Expression`]s.
///
/// Identifiers go through the dialect's quoting; values always become `?` placeholders.
#[derive(Clone)]
pub struct ExpressionBuilder {
    dialect: Arc<dyn Dialect>,
}

impl fmt::Debug for ExpressionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionBuilder")
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl ExpressionBuilder {
    pub fn new(dialect: impl Dialect + 'static) -> Self {
        Self {
            dialect: Arc::new(dialect),
        }
    }

    pub fn from_arc(dialect: Arc<dyn Dialect>) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    // ==================== Identifier hooks ====================

    pub fn wrap(&self, name: &str) -> String {
        self.dialect.wrap(name)
    }

    pub fn wrap_single(&self, name: &str) -> String {
        self.dialect.wrap_single(name)
    }

    pub fn wrap_sql(&self, sql: &str) -> String {
        self.dialect.wrap_sql(sql)
    }

    /// Quoted `database.table` name.
    pub fn table_name(&self, table: &str, database: Option<&str>) -> String {
        match database {
            Some(db) => format!("{}.{}", self.wrap_single(db), self.wrap_single(table)),
            None => self.wrap(table),
        }
    }

    // ==================== Comparisons ====================

    /// `column <op> value`. IN / NOT IN are routed to [`ExpressionBuilder::in_`].
    pub fn comparison(
        &self,
        column: impl Into<Column>,
        operator: Operator,
        value: impl Into<Operand>,
    ) -> DbalResult<Expression> {
        let column = column.into();
        let value = value.into();
        match operator {
            Operator::In => return self.in_(column, value),
            Operator::NotIn => return self.not_in(column, value),
            _ => {}
        }
        let (lhs, mut params) = self.column_sql(&column);
        let (rhs, rhs_params) = self.operand_sql(&value)?;
        params.extend(rhs_params);
        Ok(Expression::new(
            format!("{lhs} {} {rhs}", operator.as_str()),
            params,
        ))
    }

    pub fn eq(&self, column: impl Into<Column>, value: impl Into<Operand>) -> DbalResult<Expression> {
        self.comparison(column, Operator::Eq, value)
    }

    pub fn neq(&self, column: impl Into<Column>, value: impl Into<Operand>) -> DbalResult<Expression> {
        self.comparison(column, Operator::Neq, value)
    }

    pub fn gt(&self, column: impl Into<Column>, value: impl Into<Operand>) -> DbalResult<Expression> {
        self.comparison(column, Operator::Gt, value)
    }

    pub fn gte(&self, column: impl Into<Column>, value: impl Into<Operand>) -> DbalResult<Expression> {
        self.comparison(column, Operator::Gte, value)
    }

    pub fn lt(&self, column: impl Into<Column>, value: impl Into<Operand>) -> DbalResult<Expression> {
        self.comparison(column, Operator::Lt, value)
    }

    pub fn lte(&self, column: impl Into<Column>, value: impl Into<Operand>) -> DbalResult<Expression> {
        self.comparison(column, Operator::Lte, value)
    }

    /// `a <op> b` between two columns. No parameters.
    pub fn comparison_columns(&self, left: &str, operator: Operator, right: &str) -> Expression {
        Expression::raw(format!(
            "{} {} {}",
            self.wrap(left),
            operator.as_str(),
            self.wrap(right)
        ))
    }

    pub fn eq_columns(&self, left: &str, right: &str) -> Expression {
        self.comparison_columns(left, Operator::Eq, right)
    }

    pub fn neq_columns(&self, left: &str, right: &str) -> Expression {
        self.comparison_columns(left, Operator::Neq, right)
    }

    pub fn gt_columns(&self, left: &str, right: &str) -> Expression {
        self.comparison_columns(left, Operator::Gt, right)
    }

    pub fn gte_columns(&self, left: &str, right: &str) -> Expression {
        self.comparison_columns(left, Operator::Gte, right)
    }

    pub fn lt_columns(&self, left: &str, right: &str) -> Expression {
        self.comparison_columns(left, Operator::Lt, right)
    }

    pub fn lte_columns(&self, left: &str, right: &str) -> Expression {
        self.comparison_columns(left, Operator::Lte, right)
    }

    // ==================== IN / BETWEEN / NULL / LIKE ====================

    /// `column IN (?,?)`, or `column IN (subquery)` for an expression operand.
    pub fn in_(&self, column: impl Into<Column>, values: impl Into<Operand>) -> DbalResult<Expression> {
        self.in_impl(column.into(), values.into(), false)
    }

    pub fn not_in(
        &self,
        column: impl Into<Column>,
        values: impl Into<Operand>,
    ) -> DbalResult<Expression> {
        self.in_impl(column.into(), values.into(), true)
    }

    fn in_impl(&self, column: Column, values: Operand, not: bool) -> DbalResult<Expression> {
        let values = match values {
            Operand::Value(v) => Operand::List(vec![v]),
            other => other,
        };
        if values.is_empty_list() {
            return Err(DbalError::invalid_format(
                "For the \"in/not in\" condition, an empty array of elements is not allowed.",
            ));
        }
        let (lhs, mut params) = self.column_sql(&column);
        let (rhs, rhs_params) = self.operand_sql(&values)?;
        params.extend(rhs_params);
        let operator = if not { Operator::NotIn } else { Operator::In };
        Ok(Expression::new(
            format!("{lhs} {} {rhs}", operator.as_str()),
            params,
        ))
    }

    /// `column BETWEEN ? AND ?`
    pub fn between(
        &self,
        column: impl Into<Column>,
        min: impl Into<Operand>,
        max: impl Into<Operand>,
    ) -> DbalResult<Expression> {
        self.between_impl(column.into(), min.into(), max.into(), false)
    }

    pub fn not_between(
        &self,
        column: impl Into<Column>,
        min: impl Into<Operand>,
        max: impl Into<Operand>,
    ) -> DbalResult<Expression> {
        self.between_impl(column.into(), min.into(), max.into(), true)
    }

    fn between_impl(
        &self,
        column: Column,
        min: Operand,
        max: Operand,
        not: bool,
    ) -> DbalResult<Expression> {
        if matches!(min, Operand::List(_)) || matches!(max, Operand::List(_)) {
            return Err(DbalError::invalid_format(
                "BETWEEN bounds must be single values",
            ));
        }
        let (lhs, mut params) = self.column_sql(&column);
        let (low, low_params) = self.operand_sql(&min)?;
        let (high, high_params) = self.operand_sql(&max)?;
        params.extend(low_params);
        params.extend(high_params);
        let keyword = if not { "NOT BETWEEN" } else { "BETWEEN" };
        Ok(Expression::new(
            format!("{lhs} {keyword} {low} AND {high}"),
            params,
        ))
    }

    /// `column IS NULL`, or `(expr) IS NULL`.
    pub fn is_null(&self, column: impl Into<Column>) -> Expression {
        self.null_check(column.into(), "IS NULL")
    }

    pub fn is_not_null(&self, column: impl Into<Column>) -> Expression {
        self.null_check(column.into(), "IS NOT NULL")
    }

    fn null_check(&self, column: Column, keyword: &str) -> Expression {
        let (lhs, params) = self.column_sql(&column);
        Expression::new(format!("{lhs} {keyword}"), params)
    }

    /// `column LIKE ?`, with an optional bound `ESCAPE ?`.
    pub fn like(&self, column: impl Into<Column>, pattern: &str, escape: Option<&str>) -> Expression {
        self.like_impl(column.into(), pattern, escape, "LIKE")
    }

    pub fn not_like(
        &self,
        column: impl Into<Column>,
        pattern: &str,
        escape: Option<&str>,
    ) -> Expression {
        self.like_impl(column.into(), pattern, escape, "NOT LIKE")
    }

    fn like_impl(
        &self,
        column: Column,
        pattern: &str,
        escape: Option<&str>,
        keyword: &str,
    ) -> Expression {
        let (lhs, mut params) = self.column_sql(&column);
        params.push(Value::from(pattern));
        let mut sql = format!("{lhs} {keyword} ?");
        if let Some(escape) = escape {
            sql.push_str(" ESCAPE ?");
            params.push(Value::from(escape));
        }
        Expression::new(sql, params)
    }

    // ==================== EXISTS / NOT ====================

    /// `EXISTS (subquery)`
    pub fn exists(&self, query: &Expression) -> Expression {
        Expression::new(format!("EXISTS ({})", query.sql()), query.params().to_vec())
    }

    pub fn not_exists(&self, query: &Expression) -> Expression {
        Expression::new(
            format!("NOT EXISTS ({})", query.sql()),
            query.params().to_vec(),
        )
    }

    /// `NOT column` for a name, `NOT (expr)` for an expression.
    pub fn not(&self, target: impl Into<Column>) -> Expression {
        match target.into() {
            Column::Name(name) => Expression::raw(format!("NOT {}", self.wrap(&name))),
            Column::Expr(expr) => expr.parenthesized().prefixed("NOT "),
        }
    }

    // ==================== Raw / composite ====================

    /// Pass-through SQL, optionally expanding identifier markers.
    pub fn raw(&self, sql: &str, params: Vec<Value>, wrap: bool) -> Expression {
        let sql = if wrap {
            self.wrap_sql(sql)
        } else {
            sql.to_string()
        };
        Expression::new(sql, params)
    }

    /// Substitute each `?` with the next operand: a placeholder for a value, `(sql)` for an
    /// expression.
    pub fn format_expr(&self, sql: &str, operands: Vec<Operand>, wrap: bool) -> DbalResult<Expression> {
        if count_placeholders(sql) != operands.len() {
            return Err(DbalError::invalid_argument(
                "Characters \"?\" must match the number of params elements.",
            ));
        }
        let mut params = Vec::new();
        let mut pieces = Vec::with_capacity(operands.len());
        for operand in &operands {
            let (piece, piece_params) = self.operand_sql(operand)?;
            pieces.push(piece);
            params.extend(piece_params);
        }
        let mut pieces = pieces.into_iter();
        let sql = replace_placeholders(sql, |_| pieces.next().unwrap_or_default());
        Ok(self.raw(&sql, params, wrap))
    }

    pub fn and(&self, parts: impl IntoIterator<Item = Expression>) -> CompositeExpression {
        CompositeExpression::and(parts)
    }

    pub fn or(&self, parts: impl IntoIterator<Item = Expression>) -> CompositeExpression {
        CompositeExpression::or(parts)
    }

    /// A single operand as an expression: `?` for a value, `(?,?)` for a list, the
    /// expression itself otherwise.
    pub fn value(&self, value: impl Into<Operand>) -> DbalResult<Expression> {
        match value.into() {
            Operand::Expr(expr) => Ok(expr),
            operand => {
                let (sql, params) = self.operand_sql(&operand)?;
                Ok(Expression::new(sql, params))
            }
        }
    }

    // ==================== Internals ====================

    pub(crate) fn column_sql(&self, column: &Column) -> (String, Vec<Value>) {
        match column {
            Column::Name(name) => (self.wrap(name), Vec::new()),
            Column::Expr(expr) => (format!("({})", expr.sql()), expr.params().to_vec()),
        }
    }

    pub(crate) fn operand_sql(&self, operand: &Operand) -> DbalResult<(String, Vec<Value>)> {
        match operand {
            Operand::Value(v) => Ok(("?".to_string(), vec![v.clone()])),
            Operand::Expr(expr) => Ok((format!("({})", expr.sql()), expr.params().to_vec())),
            Operand::List(values) if values.is_empty() => Err(DbalError::invalid_format(
                "An empty list of values is not allowed.",
            )),
            Operand::List(values) => Ok((
                format!("({})", vec!["?"; values.len()].join(",")),
                values.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{PlainDialect, PostgresDialect};

    fn pg() -> ExpressionBuilder {
        ExpressionBuilder::new(PostgresDialect)
    }

    #[test]
    fn eq_binds_value() {
        let expr = pg().eq("u.id", 5).unwrap();
        assert_eq!(expr.sql(), r#""u"."id" = ?"#);
        assert_eq!(expr.params(), &[Value::Int(5)]);
    }

    #[test]
    fn comparison_against_subquery() {
        let sub = Expression::new("SELECT max(id) FROM t WHERE x = ?", vec![Value::Int(1)]);
        let expr = ExpressionBuilder::new(PlainDialect)
            .gt("id", sub)
            .unwrap();
        assert_eq!(expr.sql(), "id > (SELECT max(id) FROM t WHERE x = ?)");
        assert_eq!(expr.params().len(), 1);
    }

    #[test]
    fn in_list_and_subquery() {
        let eb = ExpressionBuilder::new(PlainDialect);
        let expr = eb.in_("x", vec![1, 2]).unwrap();
        assert_eq!(expr.sql(), "x IN (?,?)");
        let expr = eb.not_in("x", Expression::raw("SELECT id FROM t")).unwrap();
        assert_eq!(expr.sql(), "x NOT IN (SELECT id FROM t)");
    }

    #[test]
    fn in_rejects_empty_list() {
        let err = pg().in_("x", Vec::<i64>::new()).unwrap_err();
        assert!(err.is_invalid_format());
        let err = pg().not_in("x", Vec::<i64>::new()).unwrap_err();
        assert!(err.is_invalid_format());
    }

    #[test]
    fn in_operator_routes_through_comparison() {
        let expr = ExpressionBuilder::new(PlainDialect)
            .comparison("x", Operator::In, vec!["a", "b"])
            .unwrap();
        assert_eq!(expr.sql(), "x IN (?,?)");
    }

    #[test]
    fn between_and_not_between() {
        let eb = ExpressionBuilder::new(PlainDialect);
        let expr = eb.between("age", 18, 65).unwrap();
        assert_eq!(expr.sql(), "age BETWEEN ? AND ?");
        assert_eq!(expr.params(), &[Value::Int(18), Value::Int(65)]);
        assert_eq!(
            eb.not_between("age", 1, 2).unwrap().sql(),
            "age NOT BETWEEN ? AND ?"
        );
    }

    #[test]
    fn is_null_on_expression_is_parenthesized() {
        let eb = ExpressionBuilder::new(PlainDialect);
        assert_eq!(eb.is_null("a").sql(), "a IS NULL");
        let expr = eb.is_not_null(Expression::new("COALESCE(a, ?)", vec![Value::Int(0)]));
        assert_eq!(expr.sql(), "(COALESCE(a, ?)) IS NOT NULL");
        assert_eq!(expr.params().len(), 1);
    }

    #[test]
    fn like_binds_escape() {
        let expr = pg().like("name", "a!%%", Some("!"));
        assert_eq!(expr.sql(), r#""name" LIKE ? ESCAPE ?"#);
        assert_eq!(expr.params(), &[Value::from("a!%%"), Value::from("!")]);
        assert_eq!(pg().not_like("name", "x%", None).sql(), r#""name" NOT LIKE ?"#);
    }

    #[test]
    fn exists_and_not() {
        let eb = ExpressionBuilder::new(PlainDialect);
        let sub = Expression::new("SELECT 1 FROM t WHERE a = ?", vec![Value::Int(1)]);
        assert_eq!(eb.exists(&sub).sql(), "EXISTS (SELECT 1 FROM t WHERE a = ?)");
        assert_eq!(eb.not_exists(&sub).params().len(), 1);
        assert_eq!(pg().not("active").sql(), r#"NOT "active""#);
        assert_eq!(eb.not(Expression::raw("a = b")).sql(), "NOT (a = b)");
    }

    #[test]
    fn raw_wraps_markers_on_request() {
        let eb = pg();
        assert_eq!(eb.raw("[[id]] > 1", vec![], true).sql(), r#""id" > 1"#);
        assert_eq!(eb.raw("[[id]] > 1", vec![], false).sql(), "[[id]] > 1");
    }

    #[test]
    fn format_expr_substitutes_operands() {
        let eb = ExpressionBuilder::new(PlainDialect);
        let expr = eb
            .format_expr(
                "a = ? AND b IN ?",
                vec![Operand::from(1), Operand::Expr(Expression::raw("SELECT id FROM t"))],
                false,
            )
            .unwrap();
        assert_eq!(expr.sql(), "a = ? AND b IN (SELECT id FROM t)");
        assert_eq!(expr.params(), &[Value::Int(1)]);
    }

    #[test]
    fn format_expr_checks_placeholder_count() {
        let err = pg().format_expr("a = ?", vec![], false).unwrap_err();
        assert!(matches!(err, DbalError::InvalidArgument(_)));
    }

    #[test]
    fn table_name_with_database() {
        assert_eq!(pg().table_name("users", Some("app")), r#""app"."users""#);
        assert_eq!(pg().table_name("users", None), r#""users""#);
    }
}
