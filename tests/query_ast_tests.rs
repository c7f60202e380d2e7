use plansmith::errors::SynthesisError;
use plansmith::models::{
    Aggregate, AggregateFunction, ColumnRef, Dialect, FilterOp, FilterPredicate, GroupBySpec, JoinEdge, JoinType,
    OrderSpec, QueryPlan, SortDirection, SortPreference, SubqueryFilter, SubqueryOperator, TableSelection,
    WindowFunction, WindowFunctionKind,
};
use plansmith::query_ast::{PlanCache, SynthesisDefaults, synthesize, synthesize_with_defaults};
use sqlparser::dialect::{MsSqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

fn scenario_a() -> QueryPlan {
    let mut b = TableSelection::new("B").with_alias("b");
    b.include_only_for_join = true;
    QueryPlan {
        selections: vec![
            TableSelection::new("A")
                .with_alias("a")
                .project("Name")
                .filter_column("Status")
                .with_filter(FilterPredicate::new("A", "Status", FilterOp::Eq, "Active")),
            b,
        ],
        join_edges: vec![JoinEdge::new(("A", "BID"), ("B", "ID"), JoinType::Left)],
        order_by: vec![OrderSpec::new("A", "Name", SortDirection::Asc)],
        limit: Some(10),
        ..Default::default()
    }
}

fn users_with(filter: FilterPredicate) -> QueryPlan {
    QueryPlan {
        selections: vec![TableSelection::new("Users").project("Name").with_filter(filter)],
        ..Default::default()
    }
}

#[test]
fn scenario_a_tsql_clause_order() {
    let sql = synthesize(&scenario_a(), Dialect::Tsql).unwrap().sql;
    assert_eq!(
        sql,
        "SELECT TOP 10 [a].[Name] FROM [A] AS [a] LEFT JOIN [B] AS [b] ON [a].[BID] = [b].[ID] \
         WHERE [a].[Status] = 'Active' ORDER BY [a].[Name] ASC"
    );
    let statements = Parser::parse_sql(&MsSqlDialect {}, &sql).unwrap();
    assert_eq!(statements.len(), 1);
}

#[test]
fn scenario_a_sqlite_uses_limit() {
    let sql = synthesize(&scenario_a(), Dialect::Sqlite).unwrap().sql;
    assert!(sql.starts_with("SELECT \"a\".\"Name\" FROM \"A\" AS \"a\" LEFT JOIN \"B\" AS \"b\""));
    assert!(sql.ends_with("ORDER BY \"a\".\"Name\" ASC LIMIT 10"));
    assert_eq!(Parser::parse_sql(&SQLiteDialect {}, &sql).unwrap().len(), 1);
}

#[test]
fn synthesis_is_deterministic() {
    let plan = scenario_a();
    for dialect in [Dialect::Tsql, Dialect::Sqlite, Dialect::Postgres, Dialect::Mysql] {
        let first = synthesize(&plan, dialect).unwrap();
        let second = synthesize(&plan, dialect).unwrap();
        assert_eq!(first.sql, second.sql);
        assert_eq!(first.ast, second.ast);
    }
}

#[test]
fn reserved_names_are_always_quoted() {
    let plan = QueryPlan {
        selections: vec![TableSelection::new("Order").project("Index")],
        order_by: vec![OrderSpec::new("Order", "Index", SortDirection::Desc)],
        ..Default::default()
    };
    let tsql = synthesize(&plan, Dialect::Tsql).unwrap().sql;
    assert_eq!(tsql, "SELECT [Order].[Index] FROM [Order] ORDER BY [Order].[Index] DESC");
    let mysql = synthesize(&plan, Dialect::Mysql).unwrap().sql;
    assert_eq!(mysql, "SELECT `Order`.`Index` FROM `Order` ORDER BY `Order`.`Index` DESC");
}

#[test]
fn injected_text_stays_a_literal() {
    let plan = users_with(FilterPredicate::new("Users", "Name", FilterOp::Eq, "'; DROP TABLE x; --"));
    let sql = synthesize(&plan, Dialect::Tsql).unwrap().sql;
    assert!(sql.ends_with("WHERE [Users].[Name] = '''; DROP TABLE x; --'"), "{sql}");
    let statements = Parser::parse_sql(&MsSqlDialect {}, &sql).unwrap();
    assert_eq!(statements.len(), 1);
}

#[test]
fn dotted_text_is_compared_as_a_string() {
    let plan = QueryPlan {
        selections: vec![TableSelection::new("T")
            .project("Name")
            .with_filter(FilterPredicate::new("T", "Name", FilterOp::Eq, "T.Name"))],
        ..Default::default()
    };
    let sql = synthesize(&plan, Dialect::Tsql).unwrap().sql;
    assert_eq!(sql, "SELECT [T].[Name] FROM [T] WHERE [T].[Name] = 'T.Name'");
}

#[test]
fn iso_timestamp_with_t_separator_is_plain_text() {
    let plan = users_with(FilterPredicate::new("Users", "Created", FilterOp::Ge, "2025-10-31T14:30:00"));
    let sql = synthesize(&plan, Dialect::Tsql).unwrap().sql;
    assert!(sql.ends_with("[Users].[Created] >= '2025-10-31T14:30:00'"), "{sql}");
}

const REVENUE: &str = "COALESCE(invoice_items.UnitPrice, 0) * COALESCE(invoice_items.Quantity, 0)";

fn customer_revenue(column: &str) -> QueryPlan {
    QueryPlan {
        selections: vec![
            TableSelection::new("customers").with_alias("c").project("Name"),
            TableSelection::new("invoice_items").with_alias("ii"),
        ],
        join_edges: vec![JoinEdge::new(("customers", "ID"), ("invoice_items", "CustomerID"), JoinType::Inner)],
        group_by: Some(GroupBySpec {
            group_by_columns: vec![ColumnRef::new("customers", "Name")],
            aggregates: vec![Aggregate {
                function: AggregateFunction::Sum,
                table: "invoice_items".into(),
                column: Some(column.into()),
                alias: "total_revenue".into(),
            }],
            having_filters: Vec::new(),
        }),
        ..Default::default()
    }
}

#[test]
fn computed_aggregate_uses_aliases() {
    let sql = synthesize(&customer_revenue(REVENUE), Dialect::Tsql).unwrap().sql;
    assert_eq!(
        sql,
        "SELECT [c].[Name], SUM(COALESCE([ii].[UnitPrice], 0) * COALESCE([ii].[Quantity], 0)) AS [total_revenue] \
         FROM [customers] AS [c] INNER JOIN [invoice_items] AS [ii] ON [c].[ID] = [ii].[CustomerID] \
         GROUP BY [c].[Name]"
    );
    assert!(!sql.contains("[ii].[COALESCE"));
    assert_eq!(Parser::parse_sql(&MsSqlDialect {}, &sql).unwrap().len(), 1);

    let pg = synthesize(&customer_revenue(REVENUE), Dialect::Postgres).unwrap().sql;
    assert!(pg.contains("SUM(COALESCE(\"ii\".\"UnitPrice\", 0) * COALESCE(\"ii\".\"Quantity\", 0))"), "{pg}");
    assert_eq!(Parser::parse_sql(&PostgreSqlDialect {}, &pg).unwrap().len(), 1);
}

#[test]
fn computed_filter_column() {
    let mut plan = customer_revenue("Quantity");
    plan.global_filters.push(FilterPredicate::new("invoice_items", "UnitPrice * Quantity", FilterOp::Gt, 100));
    let sql = synthesize(&plan, Dialect::Sqlite).unwrap().sql;
    assert!(sql.contains("WHERE \"ii\".\"UnitPrice\" * \"ii\".\"Quantity\" > 100"), "{sql}");
    assert_eq!(Parser::parse_sql(&SQLiteDialect {}, &sql).unwrap().len(), 1);
}

#[test]
fn computed_columns_are_validated() {
    let plan = customer_revenue("ISNULL(UnitPrice, 0)");
    assert!(synthesize(&plan, Dialect::Tsql).unwrap().sql.contains("SUM(ISNULL([ii].[UnitPrice], 0))"));
    let err = synthesize(&plan, Dialect::Postgres).unwrap_err();
    assert!(matches!(err, SynthesisError::Unsupported { dialect: Dialect::Postgres, .. }));

    for text in ["(SELECT MAX(ID) FROM users)", "UnitPrice * 2; DROP TABLE x", "UnitPrice + (SELECT 1)"] {
        let err = synthesize(&customer_revenue(text), Dialect::Tsql).unwrap_err();
        assert!(matches!(err, SynthesisError::Malformed(_)), "{text}");
    }
}

#[test]
fn quoted_function_call_is_unwrapped() {
    for value in ["'DATEADD(DAY, -60, GETDATE())'", "DATEADD(DAY, -60, GETDATE())"] {
        let plan = users_with(FilterPredicate::new("Users", "Created", FilterOp::Ge, value));
        let sql = synthesize(&plan, Dialect::Tsql).unwrap().sql;
        assert!(sql.ends_with("WHERE [Users].[Created] >= DATEADD(DAY, -60, GETDATE())"), "{sql}");
    }
}

#[test]
fn function_call_is_unsupported_on_postgres() {
    let plan = users_with(FilterPredicate::new("Users", "Created", FilterOp::Ge, "'NOW()'"));
    let err = synthesize(&plan, Dialect::Postgres).unwrap_err();
    assert!(matches!(err, SynthesisError::Unsupported { dialect: Dialect::Postgres, .. }));
}

#[test]
fn date_literals_follow_the_dialect() {
    let plan = users_with(FilterPredicate::new("Users", "Created", FilterOp::Ge, "2024-01-31"));
    let tsql = synthesize(&plan, Dialect::Tsql).unwrap().sql;
    assert!(tsql.ends_with("[Users].[Created] >= CAST('2024-01-31' AS DATE)"), "{tsql}");
    let sqlite = synthesize(&plan, Dialect::Sqlite).unwrap().sql;
    assert!(sqlite.ends_with("\"Users\".\"Created\" >= '2024-01-31'"), "{sqlite}");

    let untyped = SynthesisDefaults { typed_date_literals: false, ..Default::default() };
    let plain = synthesize_with_defaults(&plan, Dialect::Tsql, &untyped).unwrap().sql;
    assert!(plain.ends_with("[Users].[Created] >= '2024-01-31'"), "{plain}");
}

#[test]
fn between_and_in_lists() {
    let mut plan = users_with(FilterPredicate::new("Users", "Age", FilterOp::Between, vec![18i64, 65]));
    plan.global_filters.push(FilterPredicate::new("Users", "Role", FilterOp::NotIn, vec!["admin", "bot"]));
    plan.global_filters.push(FilterPredicate::new("Users", "Name", FilterOp::StartsWith, "Jo"));
    let sql = synthesize(&plan, Dialect::Sqlite).unwrap().sql;
    assert!(sql.ends_with(
        "WHERE \"Users\".\"Age\" BETWEEN 18 AND 65 AND \"Users\".\"Role\" NOT IN ('admin', 'bot') \
         AND \"Users\".\"Name\" LIKE 'Jo%'"
    ));
}

#[test]
fn having_uses_the_aggregate_and_order_uses_the_alias() {
    let plan = QueryPlan {
        selections: vec![TableSelection::new("Users").project("Status")],
        group_by: Some(GroupBySpec {
            group_by_columns: vec![ColumnRef::new("Users", "Status")],
            aggregates: vec![Aggregate {
                function: AggregateFunction::Count,
                table: "Users".into(),
                column: None,
                alias: "n".into(),
            }],
            having_filters: vec![FilterPredicate::new("Users", "n", FilterOp::Gt, 5)],
        }),
        order_by: vec![OrderSpec::new("Users", "n", SortDirection::Desc)],
        ..Default::default()
    };
    let sql = synthesize(&plan, Dialect::Tsql).unwrap().sql;
    assert_eq!(
        sql,
        "SELECT [Users].[Status], COUNT(*) AS [n] FROM [Users] GROUP BY [Users].[Status] \
         HAVING COUNT(*) > 5 ORDER BY [n] DESC"
    );
}

#[test]
fn window_function_renders_over_clause() {
    let plan = QueryPlan {
        selections: vec![TableSelection::new("Users").project("Name")],
        window_functions: vec![WindowFunction {
            function: WindowFunctionKind::RowNumber,
            partition_by: vec![ColumnRef::new("Users", "Status")],
            order_by: vec![OrderSpec::new("Users", "Name", SortDirection::Asc)],
            alias: "rn".into(),
            table: None,
            column: None,
        }],
        ..Default::default()
    };
    let sql = synthesize(&plan, Dialect::Tsql).unwrap().sql;
    assert_eq!(
        sql,
        "SELECT [Users].[Name], ROW_NUMBER() OVER (PARTITION BY [Users].[Status] ORDER BY [Users].[Name] ASC) AS [rn] \
         FROM [Users]"
    );
}

#[test]
fn subquery_filter_renders_nested_select() {
    let plan = QueryPlan {
        selections: vec![TableSelection::new("Users").with_alias("u").project("Name")],
        subquery_filters: vec![SubqueryFilter {
            outer_table: "Users".into(),
            outer_column: "ID".into(),
            operator: SubqueryOperator::In,
            subquery_table: "Orders".into(),
            subquery_column: "UserID".into(),
            subquery_filters: vec![FilterPredicate::new("Orders", "Total", FilterOp::Gt, 100)],
        }],
        ..Default::default()
    };
    let sql = synthesize(&plan, Dialect::Sqlite).unwrap().sql;
    assert_eq!(
        sql,
        "SELECT \"u\".\"Name\" FROM \"Users\" AS \"u\" WHERE \"u\".\"ID\" IN \
         (SELECT \"Orders\".\"UserID\" FROM \"Orders\" WHERE \"Orders\".\"Total\" > 100)"
    );
    assert_eq!(Parser::parse_sql(&SQLiteDialect {}, &sql).unwrap().len(), 1);
}

#[test]
fn defaults_fill_order_and_limit() {
    let plan = QueryPlan { selections: vec![TableSelection::new("Users").project("Name")], ..Default::default() };
    let defaults = SynthesisDefaults { sort: SortPreference::Descending, limit: Some(50), ..Default::default() };
    let sql = synthesize_with_defaults(&plan, Dialect::Sqlite, &defaults).unwrap().sql;
    assert_eq!(sql, "SELECT \"Users\".\"Name\" FROM \"Users\" ORDER BY \"Users\".\"Name\" DESC LIMIT 50");
}

#[test]
fn full_join_is_unsupported_on_mysql() {
    let mut plan = scenario_a();
    plan.join_edges[0].join_type = JoinType::Full;
    assert!(synthesize(&plan, Dialect::Tsql).unwrap().sql.contains("FULL JOIN [B] AS [b]"));
    let err = synthesize(&plan, Dialect::Mysql).unwrap_err();
    assert!(matches!(err, SynthesisError::Unsupported { dialect: Dialect::Mysql, .. }));
}

#[test]
fn plan_cache_counts_hits_and_misses() {
    let cache = PlanCache::new();
    let plan = scenario_a();
    let defaults = SynthesisDefaults::default();
    let first = cache.get_or_synthesize(&plan, Dialect::Tsql, &defaults).unwrap();
    let second = cache.get_or_synthesize(&plan, Dialect::Tsql, &defaults).unwrap();
    cache.get_or_synthesize(&plan, Dialect::Sqlite, &defaults).unwrap();
    assert_eq!(first, second);
    assert_eq!((cache.hits(), cache.misses(), cache.len()), (1, 2, 2));
}
