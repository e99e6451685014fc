use super::*;
use crate::error::DbalError;
use crate::expr::Expression;
use crate::ident::{MySqlDialect, PostgresDialect};
use crate::{cond, cond_map};

fn qb() -> QueryBuilder {
    QueryBuilder::new(PostgresDialect)
}

#[test]
fn select_with_where_order_and_paging() {
    let q = qb()
        .select(["id", "name"])
        .from("users")
        .where_(cond_map! { "status" => "active" })
        .and_where_value("age", ">=", 18)
        .order_by("name", Order::Asc)
        .limit(20)
        .offset(40);

    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT "id", "name" FROM "users" WHERE ("status" = ?) AND ("age" >= ?) ORDER BY "name" ASC LIMIT 20 OFFSET 40"#
    );
    assert_eq!(q.params().unwrap(), vec![Value::from("active"), Value::Int(18)]);
}

#[test]
fn empty_select_list_means_star() {
    let q = qb().from("users");
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "users""#);
}

#[test]
fn select_without_from_or_columns_fails() {
    let err = qb().select(Vec::<String>::new()).to_sql().unwrap_err();
    assert_eq!(
        err,
        DbalError::invalid_argument("You must add at least one From element.")
    );
}

#[test]
fn select_without_from_is_allowed_with_columns() {
    assert_eq!(qb().select(["1"]).to_sql().unwrap(), "SELECT 1");
}

#[test]
fn distinct_and_mysql_quoting() {
    let q = QueryBuilder::new(MySqlDialect)
        .select(["u.email"])
        .distinct(true)
        .from("users");
    assert_eq!(q.to_sql().unwrap(), "SELECT DISTINCT `u`.`email` FROM `users`");
}

#[test]
fn select_string_parses_aliases() {
    let q = qb()
        .from("users")
        .select_string("id, name AS n, u.email as mail");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT "id", "name" AS "n", "u"."email" AS "mail" FROM "users""#
    );
}

#[test]
fn select_expression_and_subquery_items() {
    let orders = qb()
        .from("orders")
        .select_count("*", false)
        .where_column_eq("orders.user_id", "u.id");
    let q = qb()
        .select(["u.id"])
        .add_select_expr(Expression::new("? + 1", vec![Value::Int(41)]), "answer")
        .add_select_query(orders, "order_count")
        .from(Table::new("users").alias("u"));

    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT "u"."id", (? + 1) AS "answer", (SELECT COUNT(*) FROM "orders" WHERE "orders"."user_id" = "u"."id") AS "order_count" FROM "users" "u""#
    );
    assert_eq!(q.params().unwrap(), vec![Value::Int(41)]);
}

#[test]
fn aggregates() {
    let q = qb().from("orders");
    assert_eq!(
        q.clone().select_count("", false).to_sql().unwrap(),
        r#"SELECT COUNT(*) FROM "orders""#
    );
    assert_eq!(
        q.clone().select_sum("amount", true).to_sql().unwrap(),
        r#"SELECT SUM(DISTINCT "amount") FROM "orders""#
    );
    assert_eq!(
        q.clone()
            .select_min("amount", false)
            .add_select_max("amount", false)
            .to_sql()
            .unwrap(),
        r#"SELECT MIN("amount"), MAX("amount") FROM "orders""#
    );
    assert_eq!(
        q.select_count_distinct(["user_id", "status"]).to_sql().unwrap(),
        r#"SELECT COUNT(DISTINCT "user_id", "status") FROM "orders""#
    );
}

#[test]
fn aggregate_over_expression_keeps_params() {
    let q = qb()
        .from("orders")
        .select_avg(Expression::new("amount * ?", vec![Value::Float(1.2)]), false);
    assert_eq!(q.to_sql().unwrap(), r#"SELECT AVG(amount * ?) FROM "orders""#);
    assert_eq!(q.params().unwrap(), vec![Value::Float(1.2)]);
}

#[test]
fn count_distinct_requires_columns() {
    let err = qb()
        .from("orders")
        .select_count_distinct(Vec::<&str>::new())
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, DbalError::InvalidArgument(_)));
}

#[test]
fn joins_render_in_order() {
    let q = qb()
        .select(["u.id", "o.total"])
        .from(Table::new("users").alias("u"))
        .inner_join(Table::new("orders").alias("o"), cond!["col", "o.user_id", "=", "u.id"])
        .left_join("profiles", "profiles.user_id = u.id")
        .cross_join("regions");

    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT "u"."id", "o"."total" FROM "users" "u" INNER JOIN "orders" "o" ON "o"."user_id" = "u"."id" LEFT JOIN "profiles" ON profiles.user_id = u.id CROSS JOIN "regions""#
    );
}

#[test]
fn join_where_is_merged_into_statement_where() {
    let q = qb()
        .from(Table::new("users").alias("u"))
        .where_value_eq("u.active", true)
        .join(JoinType::Inner, Table::new("orders").alias("o"), |j| {
            j.on_column_eq("o.user_id", "u.id")
                .and_on_value("o.total", ">", 100)
                .where_value_eq("o.status", "paid")
        });

    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" "u" INNER JOIN "orders" "o" ON ("o"."user_id" = "u"."id") AND ("o"."total" > ?) WHERE ("u"."active" = ?) AND ("o"."status" = ?)"#
    );
    assert_eq!(
        q.params().unwrap(),
        vec![Value::Int(100), Value::Bool(true), Value::from("paid")]
    );
}

#[test]
fn nested_joins_follow_their_reference() {
    let q = qb()
        .from(Table::new("users").alias("u"))
        .join_ref(JoinType::Left, Table::new("profiles").alias("p"), "u", |j| {
            j.on_column_eq("p.user_id", "u.id")
        })
        .inner_join(Table::new("orders").alias("o"), "o.user_id = u.id")
        .join_ref(JoinType::Left, Table::new("items").alias("i"), "o", |j| {
            j.on("i.order_id = o.id")
        });

    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" "u" LEFT JOIN "profiles" "p" ON "p"."user_id" = "u"."id" INNER JOIN "orders" "o" ON o.user_id = u.id LEFT JOIN "items" "i" ON i.order_id = o.id"#
    );
}

#[test]
fn joins_can_nest_under_nested_joins() {
    let q = qb()
        .from(Table::new("a"))
        .join_ref(JoinType::Inner, "b", "a", |j| j.on("b.a_id = a.id"))
        .join_ref(JoinType::Inner, "c", "b", |j| j.on("c.b_id = b.id"));
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "a" INNER JOIN "b" ON b.a_id = a.id INNER JOIN "c" ON c.b_id = b.id"#
    );
}

#[test]
fn unknown_join_reference_fails() {
    let err = qb()
        .from(Table::new("users").alias("u"))
        .join_ref(JoinType::Left, "profiles", "x", |j| j.on("1 = 1"))
        .to_sql()
        .unwrap_err();

    assert!(err.is_unknown_reference());
    assert_eq!(
        err,
        DbalError::UnknownReference {
            reference: "x".into(),
            known: vec!["u".into()],
        }
    );
    assert_eq!(
        err.to_string(),
        "The given reference \"x\" is not part of any FROM or JOIN clause table. The currently registered references are: u."
    );
}

#[test]
fn derived_tables_need_an_alias() {
    let q = qb().from(Expression::raw("SELECT 1"));
    let err = q.to_sql().unwrap_err();
    assert_eq!(
        err,
        DbalError::invalid_argument("Adding an Expression to From requires an alias.")
    );
    assert_eq!(q.error(), Some(&err));

    let err = qb()
        .from("users")
        .inner_join(qb().from("orders"), "1 = 1")
        .to_sql()
        .unwrap_err();
    assert_eq!(
        err,
        DbalError::invalid_argument("Adding a Query to Join requires an alias.")
    );
}

#[test]
fn subquery_in_from_keeps_params() {
    let paid = qb().from("orders").where_value_eq("status", "paid");
    let q = qb()
        .from(Table::query(paid).alias("p"))
        .where_value("p.total", ">", 10);

    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM (SELECT * FROM "orders" WHERE "status" = ?) "p" WHERE "p"."total" > ?"#
    );
    assert_eq!(q.params().unwrap(), vec![Value::from("paid"), Value::Int(10)]);
}

#[test]
fn where_helpers() {
    let base = qb().from("users");
    let sql = |q: SelectQuery| q.to_sql().unwrap();

    assert_eq!(
        sql(base.clone().where_value_in("id", [1, 2, 3])),
        r#"SELECT * FROM "users" WHERE "id" IN (?,?,?)"#
    );
    assert_eq!(
        sql(base.clone().where_value_not_in("id", [4])),
        r#"SELECT * FROM "users" WHERE "id" NOT IN (?)"#
    );
    assert_eq!(
        sql(base.clone().where_null("deleted_at")),
        r#"SELECT * FROM "users" WHERE "deleted_at" IS NULL"#
    );
    assert_eq!(
        sql(base.clone().where_not_null("deleted_at")),
        r#"SELECT * FROM "users" WHERE "deleted_at" IS NOT NULL"#
    );
    assert_eq!(
        sql(base.clone().where_value_between("age", 18, 65)),
        r#"SELECT * FROM "users" WHERE "age" BETWEEN ? AND ?"#
    );
    assert_eq!(
        sql(base.where_column("a", "<", "b")),
        r#"SELECT * FROM "users" WHERE "a" < "b""#
    );
}

#[test]
fn exists_subquery() {
    let orders = qb()
        .from("orders")
        .where_column_eq("orders.user_id", "users.id")
        .and_where_value_eq("orders.status", "open");
    let q = qb().from("users").where_not_exists(orders);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" WHERE NOT EXISTS (SELECT * FROM "orders" WHERE ("orders"."user_id" = "users"."id") AND ("orders"."status" = ?))"#
    );
    assert_eq!(q.params().unwrap(), vec![Value::from("open")]);
}

#[test]
fn mixed_and_or_chain() {
    let q = qb()
        .from("t")
        .where_value_eq("a", 1)
        .or_where_value_eq("b", 2)
        .and_where_value_eq("c", 3);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "t" WHERE (("a" = ?) OR ("b" = ?)) AND ("c" = ?)"#
    );
    assert_eq!(q.params().unwrap(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[test]
fn and_where_flattens_into_existing_group() {
    let q = qb()
        .from("t")
        .where_("a = 1")
        .and_where("b = 2")
        .and_where(cond!["and", "c = 3", "d = 4"]);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "t" WHERE (a = 1) AND (b = 2) AND (c = 3) AND (d = 4)"#
    );
}

#[test]
fn empty_where_input() {
    let q = qb().from("t").where_("a = 1").and_where("").or_where("   ");
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "t" WHERE a = 1"#);

    let q = q.where_("");
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "t""#);

    let q = qb().from("t").and_where("a = 1");
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "t" WHERE a = 1"#);
}

#[test]
fn explicit_params_follow_condition_params() {
    let q = qb()
        .from("t")
        .where_params("a > ? AND b < ?", [1, 2])
        .and_where_value_eq("c", 3)
        .add_param(4);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "t" WHERE (a > ? AND b < ?) AND ("c" = ?)"#
    );
    assert_eq!(
        q.params().unwrap(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
    );
}

#[test]
fn group_by_and_having() {
    let q = qb()
        .select(["user_id"])
        .add_select_count("*", false)
        .from("orders")
        .group_by(["user_id"])
        .having("COUNT(*) > ?")
        .and_having(cond!["val", "user_id", "<>", 0])
        .order_by_raw("COUNT(*) DESC", Vec::new());

    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT "user_id", COUNT(*) FROM "orders" GROUP BY "user_id" HAVING (COUNT(*) > ?) AND ("user_id" <> ?) ORDER BY COUNT(*) DESC"#
    );
}

#[test]
fn by_id_and_when() {
    let q = qb()
        .from("users")
        .by_id(7)
        .when(false, |q| q.limit(1))
        .when(true, |q| q.order_by("id", Order::Desc));
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" WHERE "id" = ? ORDER BY "id" DESC"#
    );
    assert_eq!(q.limit_value(), None);
}

#[test]
fn take_and_skip_alias_limit_and_offset() {
    let q = qb().from("t").take(5).skip(10);
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "t" LIMIT 5 OFFSET 10"#);
}

#[test]
fn union_is_not_supported() {
    let err = qb()
        .from("a")
        .union(qb().from("b"))
        .to_sql()
        .unwrap_err();
    assert!(err.is_not_supported());
}

#[test]
fn first_error_wins() {
    let q = qb()
        .from("t")
        .where_(cond!["in", "id", Vec::<i32>::new()])
        .union(qb().from("b"));
    let err = q.to_sql().unwrap_err();
    assert!(err.is_invalid_format());
    assert!(q.params().is_err());
}

#[test]
fn render_is_cached_until_mutation() {
    let q = qb().from("t").where_value_eq("a", 1);
    assert!(!q.is_built());
    let first = q.to_expression().unwrap();
    assert!(q.is_built());
    assert_eq!(q.to_expression().unwrap(), first);

    let q = q.and_where_value_eq("b", 2);
    assert!(!q.is_built());
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "t" WHERE ("a" = ?) AND ("b" = ?)"#
    );
}

#[test]
fn clones_are_independent() {
    let base = qb().from("t").where_value_eq("a", 1);
    base.to_sql().unwrap();
    let narrowed = base.clone().and_where_value_eq("b", 2);
    assert_eq!(base.to_sql().unwrap(), r#"SELECT * FROM "t" WHERE "a" = ?"#);
    assert_ne!(base.to_sql().unwrap(), narrowed.to_sql().unwrap());
}

#[test]
fn realtime_building_renders_the_same_sql() {
    let build = |qb: QueryBuilder| {
        qb.from("t")
            .where_value_eq("a", 1)
            .or_where(cond!["and", cond_map! { "b" => 2 }, "c > 3"])
            .and_where_value_in("d", [4, 5])
            .to_expression()
            .unwrap()
    };
    let deferred = build(qb());
    let realtime = build(QueryBuilder::with_config(
        PostgresDialect,
        DbalConfig::new().realtime_cond_building(true),
    ));
    assert_eq!(deferred, realtime);
}

#[test]
fn separator_comes_from_config() {
    let qb = QueryBuilder::with_config(PostgresDialect, DbalConfig::new().separator("\n"));
    let q = qb.select(["id"]).from("users").where_value_eq("id", 1).limit(1);
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT \"id\"\nFROM \"users\"\nWHERE \"id\" = ?\nLIMIT 1"
    );
    assert_eq!(
        q.separator(" ").to_sql().unwrap(),
        r#"SELECT "id" FROM "users" WHERE "id" = ? LIMIT 1"#
    );
}

#[test]
fn debug_sql_inlines_params() {
    let q = qb().from("users").where_value_eq("name", "O'Brien");
    assert_eq!(
        q.debug_sql().unwrap(),
        r#"SELECT * FROM "users" WHERE "name" = 'O''Brien'"#
    );
}

// ==================== UPDATE ====================

#[test]
fn update_sets_columns_in_order() {
    let q = qb()
        .update("users")
        .set("name", "bob")
        .set("age", 5)
        .set("name", "alice")
        .where_value_eq("id", 1);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"UPDATE "users" SET "name" = ?, "age" = ? WHERE "id" = ?"#
    );
    assert_eq!(
        q.params().unwrap(),
        vec![Value::from("alice"), Value::Int(5), Value::Int(1)]
    );
    assert_eq!(q.kind(), QueryKind::Update);
}

#[test]
fn update_expressions_and_raw_sql() {
    let q = qb()
        .update("counters")
        .set_expr("hits", Expression::raw("hits + 1"))
        .set_raw("score", "[[score]] * ?", vec![Value::Int(2)], true)
        .set("touched_at", Value::Null)
        .where_("id = 3");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"UPDATE "counters" SET "hits" = hits + 1, "score" = "score" * ?, "touched_at" = ? WHERE id = 3"#
    );
    assert_eq!(q.params().unwrap(), vec![Value::Int(2), Value::Null]);
}

#[test]
fn update_quotes_qualified_set_columns() {
    let q = qb()
        .update(Table::new("users").alias("u"))
        .set("u.status", "done")
        .where_("u.id = 1");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"UPDATE "users" "u" SET "u"."status" = ? WHERE u.id = 1"#
    );
}

#[test]
fn update_requires_set() {
    let err = qb().update("users").where_("id = 1").to_sql().unwrap_err();
    assert!(matches!(err, DbalError::InvalidArgument(_)));
}

// ==================== DELETE ====================

#[test]
fn delete_renders_where() {
    let q = qb()
        .delete("sessions")
        .where_value("expires_at", "<", "2026-01-01")
        .or_where_null("user_id");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"DELETE FROM "sessions" WHERE ("expires_at" < ?) OR ("user_id" IS NULL)"#
    );
    assert_eq!(qb().delete("t").to_sql().unwrap(), r#"DELETE FROM "t""#);
}

// ==================== INSERT ====================

#[test]
fn insert_multiple_rows() {
    let q = qb()
        .insert("points")
        .columns(["x", "y"])
        .values([1, 2])
        .values([3, 4]);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"INSERT INTO "points" ("x", "y") VALUES (?, ?), (?, ?)"#
    );
    assert_eq!(
        q.params().unwrap(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
    );
    assert_eq!(q.row_count(), 2);
}

#[test]
fn insert_single_row_with_set() {
    let q = qb()
        .insert("users")
        .set("name", "ann")
        .set("created_at", Expression::raw("now()"))
        .set("name", "bea");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"INSERT INTO "users" ("name", "created_at") VALUES (?, now())"#
    );
    assert_eq!(q.params().unwrap(), vec![Value::from("bea")]);
}

#[test]
fn insert_set_fills_declared_columns() {
    let q = qb().insert("t").columns(["x", "y"]).set("x", 1);
    assert_eq!(q.to_sql().unwrap(), r#"INSERT INTO "t" ("x", "y") VALUES (?, ?)"#);
    assert_eq!(q.params().unwrap(), vec![Value::Int(1), Value::Null]);

    let q = qb().insert("t").columns(["x", "y"]).set("z", 3).set("y", 2);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"INSERT INTO "t" ("x", "y", "z") VALUES (?, ?, ?)"#
    );
    assert_eq!(
        q.params().unwrap(),
        vec![Value::Null, Value::Int(2), Value::Int(3)]
    );
}

#[test]
fn insert_set_overrides_values_row() {
    let q = qb().insert("t").columns(["x", "y"]).values([1, 2]).set("y", 5);
    assert_eq!(q.params().unwrap(), vec![Value::Int(1), Value::Int(5)]);
}

#[test]
fn insert_row_length_must_match_columns() {
    let err = qb()
        .insert("points")
        .columns(["x", "y"])
        .values([1])
        .to_sql()
        .unwrap_err();
    assert_eq!(
        err,
        DbalError::invalid_argument("INSERT row has 1 values but 2 columns are listed.")
    );
    assert!(qb().insert("points").to_sql().is_err());
}
