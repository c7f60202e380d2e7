use plansmith::errors::PlanError;
use plansmith::models::{Decision, Dialect, FilterOp, FilterValue, PlannerTier, Schema};
use plansmith::{CompilerConfig, compile_plan, normalize_plan};
use serde_json::json;

fn schema() -> Schema {
    Schema::from_table_list(
        r#"[
            {"table_name": "tb_Orders", "columns": [
                {"name": "ID", "data_type": "int", "is_primary_key": true},
                {"name": "CustomerID", "data_type": "int"},
                {"name": "Total", "data_type": "decimal"},
                {"name": "Created", "data_type": "datetime"}
            ], "foreign_keys": [{"column": "CustomerID", "referenced_table": "tb_Customers", "referenced_column": "ID"}]},
            {"table_name": "tb_Customers", "columns": [
                {"name": "ID", "data_type": "int", "is_primary_key": true},
                {"name": "Name", "data_type": "nvarchar"}
            ]}
        ]"#,
    )
    .unwrap()
}

#[test]
fn standard_plan_compiles_end_to_end() {
    let raw = json!({
        "decision": "proceed",
        "selections": [
            {"table": "tb_Orders", "alias": "o", "confidence": 0.9, "columns": [
                {"column": "Total", "role": "projection"},
                {"column": "Created", "role": "filter"}
            ], "filters": [
                {"table": "tb_Orders", "column": "Created", "op": ">=", "value": "'DATEADD(DAY, -30, GETDATE())'"}
            ]},
            {"table": "tb_Customers", "alias": "c", "columns": [{"column": "Name", "role": "projection"}]}
        ],
        "join_edges": [
            {"from_table": "tb_Orders", "from_column": "CustomerID", "to_table": "tb_Customers", "to_column": "ID", "join_type": "inner"}
        ],
        "order_by": [{"table": "tb_Orders", "column": "Total", "direction": "DESC"}],
        "limit": 20,
        "window_functions": null
    });
    let plan = normalize_plan(&raw, PlannerTier::Standard).unwrap();
    assert_eq!(plan.selections[0].filters[0].operator, FilterOp::Ge);

    let out = compile_plan(&plan, &schema(), &CompilerConfig::default()).unwrap();
    assert!(out.outcome.issues.is_empty(), "{:?}", out.outcome.messages());
    assert_eq!(out.query.dialect, Dialect::Tsql);
    assert_eq!(
        out.query.sql,
        "SELECT TOP 20 [o].[Total], [c].[Name] FROM [tb_Orders] AS [o] \
         INNER JOIN [tb_Customers] AS [c] ON [o].[CustomerID] = [c].[ID] \
         WHERE [o].[Created] >= DATEADD(DAY, -30, GETDATE()) ORDER BY [o].[Total] DESC"
    );
}

#[test]
fn minimal_tier_cannot_clarify() {
    let raw = json!({"decision": "clarify", "selections": []});
    assert_eq!(
        normalize_plan(&raw, PlannerTier::Minimal),
        Err(PlanError::TierViolation { field: "decision: clarify", tier: "minimal" })
    );
    let plan = normalize_plan(&raw, PlannerTier::Standard).unwrap();
    assert_eq!(plan.decision, Decision::Clarify);
}

#[test]
fn subquery_filters_need_the_full_tier() {
    let raw = json!({
        "selections": [{"table": "tb_Customers"}],
        "subquery_filters": [{
            "outer_table": "tb_Customers", "outer_column": "ID", "op": "not_in",
            "subquery_table": "tb_Orders", "subquery_column": "CustomerID"
        }]
    });
    assert!(matches!(normalize_plan(&raw, PlannerTier::Minimal), Err(PlanError::TierViolation { .. })));
    let plan = normalize_plan(&raw, PlannerTier::Full).unwrap();
    assert_eq!(plan.subquery_filters.len(), 1);
}

#[test]
fn value_shapes_are_typed() {
    let raw = json!({
        "selections": [{"table": "tb_Orders"}],
        "global_filters": [
            {"table": "tb_Orders", "column": "CustomerID", "operator": "in", "value": [1, 2, 3]},
            {"table": "tb_Orders", "column": "Total", "operator": "is_not_null"},
            {"table": "tb_Orders", "column": "Total", "operator": ">", "value": 10.5}
        ]
    });
    let plan = normalize_plan(&raw, PlannerTier::Full).unwrap();
    let f = &plan.global_filters;
    assert_eq!(f[0].value, FilterValue::List(vec![1.into(), 2.into(), 3.into()]));
    assert_eq!(f[1].operator, FilterOp::NotNull);
    assert_eq!(f[1].value, FilterValue::Null);
    assert_eq!(f[2].value, FilterValue::Float(10.5));
}
