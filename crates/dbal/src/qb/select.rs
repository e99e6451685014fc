//! SELECT statement builder.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::client::{Command, Connection, ValueRow};
use crate::composer::SqlComposer;
use crate::cond_builder::CondInput;
use crate::condition::{Column, CondNode};
use crate::error::{DbalError, DbalResult};
use crate::expr::{Expression, ExpressionBuilder, Junction};
use crate::qb::traits::BuildCache;
use crate::qb::where_clause::ConditionSlot;
use crate::qb::{Join, JoinType, OnClause, QueryContext, QueryKind, SqlStatement, Table, WhereClause};
use crate::value::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
enum SelectItem {
    /// Column name, wrapped at build time.
    Column { name: String, alias: Option<String> },
    /// Ready-made SQL.
    Raw(Expression),
    /// Expression rendered as `(expr) AS alias`.
    Aliased { expr: Expression, alias: String },
    /// Subquery rendered as `(query) AS alias`.
    Query { query: Box<SelectQuery>, alias: String },
}

fn select_alias_re() -> &'static Regex {
    static SELECT_ALIAS_RE: OnceLock<Regex> = OnceLock::new();
    SELECT_ALIAS_RE
        .get_or_init(|| Regex::new(r"(?i)\s+as\s+").expect("invalid built-in select alias regex"))
}

/// SELECT statement builder.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    ctx: Arc<QueryContext>,
    distinct: bool,
    select: Vec<SelectItem>,
    from: Vec<Table>,
    joins: Vec<Join>,
    /// Joins attached under a reference, keyed by that reference.
    ref_joins: BTreeMap<String, Vec<Join>>,
    where_: ConditionSlot,
    group_by: Vec<Expression>,
    having: ConditionSlot,
    order_by: Vec<Expression>,
    limit: Option<u64>,
    offset: Option<u64>,
    params: Vec<Value>,
    separator: String,
    emulate_execution: bool,
    built: BuildCache,
    build_error: Option<DbalError>,
}

impl SelectQuery {
    pub(crate) fn new(ctx: Arc<QueryContext>) -> Self {
        let separator = ctx.config().separator.clone();
        Self {
            ctx,
            distinct: false,
            select: Vec::new(),
            from: Vec::new(),
            joins: Vec::new(),
            ref_joins: BTreeMap::new(),
            where_: ConditionSlot::default(),
            group_by: Vec::new(),
            having: ConditionSlot::default(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            params: Vec::new(),
            separator,
            emulate_execution: false,
            built: BuildCache::default(),
            build_error: None,
        }
    }

    /// Apply a mutation: invalidate the cache and record the first failure.
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

    pub fn context(&self) -> &Arc<QueryContext> {
        &self.ctx
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn is_emulated(&self) -> bool {
        self.emulate_execution
    }

    /// Whether a rendering is cached.
    pub fn is_built(&self) -> bool {
        self.built.is_built()
    }

    // ==================== SELECT list ====================

    /// Replace the select list with plain columns. `t.*` and `*` are allowed.
    pub fn select<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutate(|q| {
            q.select.clear();
            q.push_columns(columns);
            Ok(())
        })
    }

    pub fn add_select<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutate(|q| {
            q.push_columns(columns);
            Ok(())
        })
    }

    /// Append `column AS alias`.
    pub fn select_as(self, column: impl Into<String>, alias: impl Into<String>) -> Self {
        self.mutate(|q| {
            q.select.push(SelectItem::Column {
                name: column.into(),
                alias: Some(alias.into()),
            });
            Ok(())
        })
    }

    /// Append `(expr) AS alias`.
    pub fn add_select_expr(self, expr: impl Into<Expression>, alias: impl Into<String>) -> Self {
        self.mutate(|q| {
            q.select.push(SelectItem::Aliased {
                expr: expr.into(),
                alias: alias.into(),
            });
            Ok(())
        })
    }

    /// Append `(subquery) AS alias`.
    pub fn add_select_query(self, query: SelectQuery, alias: impl Into<String>) -> Self {
        self.mutate(|q| {
            q.select.push(SelectItem::Query {
                query: Box::new(query),
                alias: alias.into(),
            });
            Ok(())
        })
    }

    /// Replace the select list with raw SQL. `wrap` expands identifier markers.
    pub fn select_raw(self, sql: &str, params: Vec<Value>, wrap: bool) -> Self {
        self.mutate(|q| {
            q.select = vec![SelectItem::Raw(q.ctx.expr().raw(sql, params, wrap))];
            Ok(())
        })
    }

    pub fn add_select_raw(self, sql: &str, params: Vec<Value>, wrap: bool) -> Self {
        self.mutate(|q| {
            q.select
                .push(SelectItem::Raw(q.ctx.expr().raw(sql, params, wrap)));
            Ok(())
        })
    }

    /// Replace the select list from `"a, b AS c"`.
    pub fn select_string(self, columns: &str) -> Self {
        self.mutate(|q| {
            q.select = parse_select_string(columns);
            Ok(())
        })
    }

    pub fn add_select_string(self, columns: &str) -> Self {
        self.mutate(|q| {
            q.select.extend(parse_select_string(columns));
            Ok(())
        })
    }

    pub fn distinct(self, value: bool) -> Self {
        if self.distinct == value {
            return self;
        }
        self.mutate(|q| {
            q.distinct = value;
            Ok(())
        })
    }

    fn push_columns<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select
            .extend(columns.into_iter().map(|name| SelectItem::Column {
                name: name.into(),
                alias: None,
            }));
    }

    // ==================== Aggregates ====================

    /// Replace the select list with `COUNT(column)`. `"*"` or `""` count rows.
    pub fn select_count(self, column: impl Into<Column>, distinct: bool) -> Self {
        self.mutate(|q| {
            q.select.clear();
            q.push_count(column.into(), distinct);
            Ok(())
        })
    }

    pub fn add_select_count(self, column: impl Into<Column>, distinct: bool) -> Self {
        self.mutate(|q| {
            q.push_count(column.into(), distinct);
            Ok(())
        })
    }

    /// Replace the select list with `COUNT(DISTINCT a, b)`.
    pub fn select_count_distinct<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mutate(|q| {
            q.select.clear();
            q.push_count_distinct(columns)
        })
    }

    pub fn add_select_count_distinct<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mutate(|q| q.push_count_distinct(columns))
    }

    pub fn select_sum(self, column: impl Into<Column>, distinct: bool) -> Self {
        self.replace_aggregate("SUM", column.into(), distinct)
    }

    pub fn add_select_sum(self, column: impl Into<Column>, distinct: bool) -> Self {
        self.append_aggregate("SUM", column.into(), distinct)
    }

    pub fn select_avg(self, column: impl Into<Column>, distinct: bool) -> Self {
        self.replace_aggregate("AVG", column.into(), distinct)
    }

    pub fn add_select_avg(self, column: impl Into<Column>, distinct: bool) -> Self {
        self.append_aggregate("AVG", column.into(), distinct)
    }

    pub fn select_min(self, column: impl Into<Column>, distinct: bool) -> Self {
        self.replace_aggregate("MIN", column.into(), distinct)
    }

    pub fn add_select_min(self, column: impl Into<Column>, distinct: bool) -> Self {
        self.append_aggregate("MIN", column.into(), distinct)
    }

    pub fn select_max(self, column: impl Into<Column>, distinct: bool) -> Self {
        self.replace_aggregate("MAX", column.into(), distinct)
    }

    pub fn add_select_max(self, column: impl Into<Column>, distinct: bool) -> Self {
        self.append_aggregate("MAX", column.into(), distinct)
    }

    fn replace_aggregate(self, func: &str, column: Column, distinct: bool) -> Self {
        self.mutate(|q| {
            q.select.clear();
            q.push_aggregate(func, column, distinct);
            Ok(())
        })
    }

    fn append_aggregate(self, func: &str, column: Column, distinct: bool) -> Self {
        self.mutate(|q| {
            q.push_aggregate(func, column, distinct);
            Ok(())
        })
    }

    fn push_count(&mut self, column: Column, distinct: bool) {
        match &column {
            Column::Name(name) if name.is_empty() || name == "*" => {
                self.select.push(SelectItem::Raw(Expression::raw("COUNT(*)")));
            }
            _ => self.push_aggregate("COUNT", column, distinct),
        }
    }

    /// `FUNC([DISTINCT ]column)`. A column name is wrapped; an expression is inlined with its
    /// parameters.
    fn push_aggregate(&mut self, func: &str, column: Column, distinct: bool) {
        let distinct = if distinct { "DISTINCT " } else { "" };
        let expr = match column {
            Column::Name(name) => Expression::raw(format!(
                "{func}({distinct}{})",
                self.ctx.expr().wrap(&name)
            )),
            Column::Expr(expr) => {
                let (sql, params) = expr.into_parts();
                Expression::new(format!("{func}({distinct}{sql})"), params)
            }
        };
        self.select.push(SelectItem::Raw(expr));
    }

    fn push_count_distinct<I, S>(&mut self, columns: I) -> DbalResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns = columns
            .into_iter()
            .map(|c| self.ctx.expr().wrap(c.as_ref().trim()))
            .collect::<Vec<_>>();
        if columns.is_empty() {
            return Err(DbalError::invalid_argument(
                "COUNT(DISTINCT ...) requires at least one column.",
            ));
        }
        self.select.push(SelectItem::Raw(Expression::raw(format!(
            "COUNT(DISTINCT {})",
            columns.join(", ")
        ))));
        Ok(())
    }

    // ==================== FROM / JOIN ====================

    /// Add a FROM table. Expressions and subqueries need an alias (see [`Table::alias`]).
    pub fn from(self, table: impl Into<Table>) -> Self {
        let table = table.into();
        self.mutate(|q| {
            table.ensure_alias("From")?;
            q.from.push(table);
            Ok(())
        })
    }

    /// Add `table alias` to FROM.
    pub fn from_as(self, table: impl Into<Table>, alias: impl Into<String>) -> Self {
        self.from(table.into().alias(alias))
    }

    /// Add a join configured by `f`.
    pub fn join(self, kind: JoinType, table: impl Into<Table>, f: impl FnOnce(Join) -> Join) -> Self {
        let join = f(Join::new(Arc::clone(&self.ctx), kind, table.into()));
        self.mutate(|q| {
            q.joins.push(join);
            Ok(())
        })
    }

    /// Add a join nested under `reference`: the alias (or name) of a FROM table or of
    /// another join. It renders right after that table or join.
    pub fn join_ref(
        self,
        kind: JoinType,
        table: impl Into<Table>,
        reference: impl Into<String>,
        f: impl FnOnce(Join) -> Join,
    ) -> Self {
        let join = f(Join::new(Arc::clone(&self.ctx), kind, table.into()));
        self.mutate(|q| {
            q.ref_joins.entry(reference.into()).or_default().push(join);
            Ok(())
        })
    }

    pub fn inner_join(self, table: impl Into<Table>, on: impl Into<CondInput>) -> Self {
        self.join(JoinType::Inner, table, |j| j.on(on))
    }

    pub fn left_join(self, table: impl Into<Table>, on: impl Into<CondInput>) -> Self {
        self.join(JoinType::Left, table, |j| j.on(on))
    }

    pub fn right_join(self, table: impl Into<Table>, on: impl Into<CondInput>) -> Self {
        self.join(JoinType::Right, table, |j| j.on(on))
    }

    pub fn full_join(self, table: impl Into<Table>, on: impl Into<CondInput>) -> Self {
        self.join(JoinType::Full, table, |j| j.on(on))
    }

    pub fn cross_join(self, table: impl Into<Table>) -> Self {
        self.join(JoinType::Cross, table, |j| j)
    }

    // ==================== GROUP BY / HAVING / ORDER BY ====================

    pub fn group_by<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mutate(|q| {
            q.group_by = columns
                .into_iter()
                .map(|c| Expression::raw(q.ctx.expr().wrap(c.as_ref())))
                .collect();
            Ok(())
        })
    }

    pub fn add_group_by(self, column: &str) -> Self {
        self.mutate(|q| {
            let column = Expression::raw(q.ctx.expr().wrap(column));
            q.group_by.push(column);
            Ok(())
        })
    }

    pub fn having(self, input: impl Into<CondInput>) -> Self {
        self.push_having(None, input.into())
    }

    pub fn and_having(self, input: impl Into<CondInput>) -> Self {
        self.push_having(Some(Junction::And), input.into())
    }

    pub fn or_having(self, input: impl Into<CondInput>) -> Self {
        self.push_having(Some(Junction::Or), input.into())
    }

    fn push_having(self, junction: Option<Junction>, input: CondInput) -> Self {
        self.mutate(|q| {
            let ctx = Arc::clone(&q.ctx);
            q.having.apply(&ctx, junction, input, Vec::new())
        })
    }

    pub fn order_by(self, column: &str, order: Order) -> Self {
        self.mutate(|q| {
            let sql = format!("{} {}", q.ctx.expr().wrap(column), order.keyword());
            q.order_by.push(Expression::raw(sql));
            Ok(())
        })
    }

    /// Append a raw ORDER BY item; identifier markers are expanded.
    pub fn order_by_raw(self, sql: &str, params: Vec<Value>) -> Self {
        self.mutate(|q| {
            let expr = q.ctx.expr().raw(sql, params, true);
            q.order_by.push(expr);
            Ok(())
        })
    }

    pub fn clear_order_by(self) -> Self {
        self.mutate(|q| {
            q.order_by.clear();
            Ok(())
        })
    }

    // ==================== LIMIT / OFFSET ====================

    pub fn set_limit(self, limit: Option<u64>) -> Self {
        if self.limit == limit {
            return self;
        }
        self.mutate(|q| {
            q.limit = limit;
            Ok(())
        })
    }

    pub fn set_offset(self, offset: Option<u64>) -> Self {
        if self.offset == offset {
            return self;
        }
        self.mutate(|q| {
            q.offset = offset;
            Ok(())
        })
    }

    pub fn limit(self, limit: u64) -> Self {
        self.set_limit(Some(limit))
    }

    pub fn offset(self, offset: u64) -> Self {
        self.set_offset(Some(offset))
    }

    /// Alias for [`limit`](Self::limit).
    pub fn take(self, count: u64) -> Self {
        self.limit(count)
    }

    /// Alias for [`offset`](Self::offset).
    pub fn skip(self, count: u64) -> Self {
        self.offset(count)
    }

    // ==================== Misc ====================

    /// `AND id = ?`.
    pub fn by_id(self, id: impl Into<Value>) -> Self {
        self.and_where_value_eq("id", id.into())
    }

    /// Not implemented; records [`DbalError::NotSupported`].
    pub fn union(self, _query: SelectQuery) -> Self {
        self.mutate(|_| Err(DbalError::not_supported("UNION is not supported.")))
    }

    /// Append a positional parameter after all clause parameters.
    pub fn add_param(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.mutate(|q| {
            q.params.push(value);
            Ok(())
        })
    }

    pub fn add_params<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        self.mutate(|q| {
            q.params.extend(values.into_iter().map(Into::into));
            Ok(())
        })
    }

    /// Apply `f` only when `condition` holds.
    pub fn when(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        if condition { f(self) } else { self }
    }

    /// Clause separator for this statement.
    pub fn separator(self, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        if self.separator == separator {
            return self;
        }
        self.mutate(|q| {
            q.separator = separator;
            Ok(())
        })
    }

    /// Render normally but return empty results without touching the connection.
    pub fn emulate_execution(mut self, value: bool) -> Self {
        self.emulate_execution = value;
        self
    }

    // ==================== Build ====================

    fn build(&self) -> DbalResult<Expression> {
        if let Some(err) = &self.build_error {
            return Err(err.clone());
        }
        let mut joins_where = Vec::new();
        let mut composer = SqlComposer::new(self.separator.as_str());

        let select = self.build_select()?;
        composer.add_with_prefix(if self.distinct { "SELECT DISTINCT " } else { "SELECT " }, select);
        composer.add_opt(self.build_from(&mut joins_where)?);
        composer.add_opt_with_prefix("WHERE ", self.where_.build(&self.ctx, joins_where)?);
        if !self.group_by.is_empty() {
            let mut group = SqlComposer::new(", ");
            self.group_by.iter().cloned().for_each(|item| group.add(item));
            composer.add_opt(group.compose(Some("GROUP BY ")));
        }
        composer.add_opt_with_prefix("HAVING ", self.having.build(&self.ctx, Vec::new())?);
        if !self.order_by.is_empty() {
            let mut order = SqlComposer::new(", ");
            self.order_by.iter().cloned().for_each(|item| order.add(item));
            composer.add_opt(order.compose(Some("ORDER BY ")));
        }
        if let Some(limit) = self.limit {
            composer.add(format!("LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            composer.add(format!("OFFSET {offset}"));
        }
        composer.add_params(self.params.iter().cloned());

        composer.compose_required(None)
    }

    fn build_select(&self) -> DbalResult<Expression> {
        if self.select.is_empty() {
            if self.from.is_empty() {
                return Err(DbalError::invalid_argument(
                    "You must add at least one From element.",
                ));
            }
            return Ok(Expression::raw("*"));
        }
        let eb = self.ctx.expr();
        let mut composer = SqlComposer::new(", ");
        for item in &self.select {
            match item {
                SelectItem::Column { name, alias } => {
                    let quoted = if name == "*" { name.clone() } else { eb.wrap(name) };
                    match alias {
                        Some(alias) if alias != name => {
                            composer.add(format!("{quoted} AS {}", eb.wrap(alias)));
                        }
                        _ => composer.add(quoted),
                    }
                }
                SelectItem::Raw(expr) => composer.add(expr.clone()),
                SelectItem::Aliased { expr, alias } => composer.add(aliased(expr.clone(), alias, eb)),
                SelectItem::Query { query, alias } => {
                    composer.add(aliased(query.to_expression()?, alias, eb));
                }
            }
        }
        composer.compose_required(None)
    }

    /// FROM list plus joins. Nested joins render right after the table or join they hang
    /// under; their WHERE fragments are collected into `joins_where`.
    fn build_from(&self, joins_where: &mut Vec<CondNode>) -> DbalResult<Option<Expression>> {
        let eb = self.ctx.expr();
        let mut walk = RefWalk::default();

        let mut tables = SqlComposer::new(", ");
        for table in &self.from {
            let rendered = table.render(eb)?;
            if self.ref_joins.is_empty() {
                tables.add(rendered);
                continue;
            }
            let mut chain = SqlComposer::new(" ");
            chain.add(rendered);
            self.walk_ref(table.reference(), &mut chain, joins_where, &mut walk)?;
            tables.add(chain.compose_required(None)?);
        }

        let mut composer = SqlComposer::new(self.separator.as_str());
        composer.add_opt(tables.compose(Some("FROM ")));
        self.build_joins(&self.joins, &mut composer, joins_where, &mut walk)?;

        if let Some(reference) = self.ref_joins.keys().find(|r| !walk.expanded.contains(*r)) {
            return Err(DbalError::UnknownReference {
                reference: reference.clone(),
                known: walk.known,
            });
        }
        Ok(composer.compose(None))
    }

    fn build_joins(
        &self,
        joins: &[Join],
        composer: &mut SqlComposer,
        joins_where: &mut Vec<CondNode>,
        walk: &mut RefWalk,
    ) -> DbalResult<()> {
        for join in joins {
            let (expr, where_) = join.build()?;
            composer.add(expr);
            joins_where.extend(where_);
            if !self.ref_joins.is_empty() {
                self.walk_ref(join.reference(), composer, joins_where, walk)?;
            }
        }
        Ok(())
    }

    fn walk_ref(
        &self,
        reference: String,
        composer: &mut SqlComposer,
        joins_where: &mut Vec<CondNode>,
        walk: &mut RefWalk,
    ) -> DbalResult<()> {
        if !walk.known.contains(&reference) {
            walk.known.push(reference.clone());
        }
        if !walk.expanded.insert(reference.clone()) {
            return Ok(());
        }
        if let Some(nested) = self.ref_joins.get(&reference) {
            self.build_joins(nested, composer, joins_where, walk)?;
        }
        Ok(())
    }

    // ==================== Execution ====================

    async fn rows<C: Connection>(&self, conn: &C) -> DbalResult<Vec<C::Row>> {
        let command = Command::query(self.to_expression()?);
        if self.emulate_execution {
            return Ok(Vec::new());
        }
        command.execute_query(conn).await
    }

    /// Copy without DISTINCT / ORDER BY / OFFSET and with the given LIMIT.
    fn clean_clone(&self, limit: Option<u64>) -> Self {
        self.clone()
            .distinct(false)
            .clear_order_by()
            .set_offset(None)
            .set_limit(limit)
    }

    /// All rows.
    pub async fn get_all<C: Connection>(&self, conn: &C) -> DbalResult<Vec<C::Row>> {
        self.rows(conn).await
    }

    /// First row, fetched with `LIMIT 1`.
    pub async fn get_first<C: Connection>(&self, conn: &C) -> DbalResult<Option<C::Row>> {
        let rows = self.clone().set_limit(Some(1)).rows(conn).await?;
        Ok(rows.into_iter().next())
    }

    /// The only row, fetched with `LIMIT 2`. More than one row fails with
    /// [`DbalError::MoreRowsReceived`].
    pub async fn get_one<C: Connection>(&self, conn: &C) -> DbalResult<Option<C::Row>> {
        let rows = self.clone().set_limit(Some(2)).rows(conn).await?;
        if rows.len() > 1 {
            #[cfg(feature = "tracing")]
            tracing::warn!(target: "dbal.sql", rows = rows.len(), "one row expected");
            return Err(DbalError::MoreRowsReceived);
        }
        Ok(rows.into_iter().next())
    }

    /// First column of the first row. `column` replaces the select list when given.
    pub async fn get_value<C: Connection>(
        &self,
        conn: &C,
        column: Option<&str>,
    ) -> DbalResult<Option<Value>> {
        let query = match column {
            Some(column) => self.clone().select([column]),
            None => self.clone(),
        };
        query.set_limit(Some(1)).first_value(conn).await
    }

    /// First column of every row.
    pub async fn get_column<C: Connection>(
        &self,
        conn: &C,
        column: Option<&str>,
    ) -> DbalResult<Vec<Value>> {
        let query = match column {
            Some(column) => self.clone().select([column]),
            None if self.select.is_empty() => {
                return Err(DbalError::invalid_argument(
                    "The column argument cannot be empty if there are no select elements.",
                ));
            }
            None => self.clone(),
        };
        query
            .rows(conn)
            .await?
            .iter()
            .map(|row| row.value(0))
            .collect()
    }

    pub async fn exists<C: Connection>(&self, conn: &C) -> DbalResult<bool> {
        let rows = self
            .clean_clone(Some(1))
            .select_raw("1", Vec::new(), false)
            .rows(conn)
            .await?;
        Ok(!rows.is_empty())
    }

    pub async fn doesnt_exist<C: Connection>(&self, conn: &C) -> DbalResult<bool> {
        Ok(!self.exists(conn).await?)
    }

    /// `COUNT(*)` over the statement's rows.
    pub async fn get_count<C: Connection>(&self, conn: &C) -> DbalResult<i64> {
        self.get_aggregate_count(conn, "*", false).await
    }

    pub async fn get_aggregate_count<C: Connection>(
        &self,
        conn: &C,
        column: impl Into<Column>,
        distinct: bool,
    ) -> DbalResult<i64> {
        let value = self
            .clean_clone(None)
            .select_count(column, distinct)
            .first_value(conn)
            .await?;
        count_from(value)
    }

    pub async fn get_aggregate_count_distinct<C, I, S>(&self, conn: &C, columns: I) -> DbalResult<i64>
    where
        C: Connection,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let value = self
            .clean_clone(None)
            .select_count_distinct(columns)
            .first_value(conn)
            .await?;
        count_from(value)
    }

    pub async fn get_aggregate_sum<C: Connection>(
        &self,
        conn: &C,
        column: impl Into<Column>,
        distinct: bool,
    ) -> DbalResult<Option<Value>> {
        self.clean_clone(None)
            .select_sum(column, distinct)
            .first_value(conn)
            .await
    }

    pub async fn get_aggregate_avg<C: Connection>(
        &self,
        conn: &C,
        column: impl Into<Column>,
        distinct: bool,
    ) -> DbalResult<Option<Value>> {
        self.clean_clone(None)
            .select_avg(column, distinct)
            .first_value(conn)
            .await
    }

    pub async fn get_aggregate_min<C: Connection>(
        &self,
        conn: &C,
        column: impl Into<Column>,
        distinct: bool,
    ) -> DbalResult<Option<Value>> {
        self.clean_clone(None)
            .select_min(column, distinct)
            .first_value(conn)
            .await
    }

    pub async fn get_aggregate_max<C: Connection>(
        &self,
        conn: &C,
        column: impl Into<Column>,
        distinct: bool,
    ) -> DbalResult<Option<Value>> {
        self.clean_clone(None)
            .select_max(column, distinct)
            .first_value(conn)
            .await
    }

    /// First column of the first row; NULL maps to `None`.
    async fn first_value<C: Connection>(&self, conn: &C) -> DbalResult<Option<Value>> {
        let rows = self.rows(conn).await?;
        match rows.first() {
            Some(row) => match row.value(0)? {
                Value::Null => Ok(None),
                value => Ok(Some(value)),
            },
            None => Ok(None),
        }
    }
}

/// References seen during the join walk, in order, and those whose nested joins were emitted.
#[derive(Debug, Default)]
struct RefWalk {
    known: Vec<String>,
    expanded: BTreeSet<String>,
}

fn aliased(expr: Expression, alias: &str, eb: &ExpressionBuilder) -> Expression {
    let alias = eb.wrap_single(alias);
    if expr.sql() == alias {
        return expr;
    }
    let (sql, params) = expr.into_parts();
    Expression::new(format!("({sql}) AS {alias}"), params)
}

fn parse_select_string(columns: &str) -> Vec<SelectItem> {
    columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|column| {
            let mut segments = select_alias_re().splitn(column, 2);
            let name = segments.next().unwrap_or(column).trim().to_string();
            let alias = segments.next().map(|alias| alias.trim().to_string());
            SelectItem::Column { name, alias }
        })
        .collect()
}

fn count_from(value: Option<Value>) -> DbalResult<i64> {
    match value {
        None => Ok(0),
        Some(value) => value.as_i64().ok_or_else(|| {
            DbalError::decode(
                "COUNT",
                format!("expected an integer, got {}", value.type_name()),
            )
        }),
    }
}

impl SqlStatement for SelectQuery {
    fn kind(&self) -> QueryKind {
        QueryKind::Select
    }

    fn error(&self) -> Option<&DbalError> {
        self.build_error.as_ref()
    }

    fn to_expression(&self) -> DbalResult<Expression> {
        self.built.get_or_build(|| self.build()).cloned()
    }
}

impl WhereClause for SelectQuery {
    fn push_where(self, junction: Option<Junction>, input: CondInput, params: Vec<Value>) -> Self {
        self.mutate(|q| {
            let ctx = Arc::clone(&q.ctx);
            q.where_.apply(&ctx, junction, input, params)
        })
    }
}
