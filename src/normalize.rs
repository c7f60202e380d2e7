//! Boundary normaliser: accepts planner JSON in any of the three tier
//! shapes and returns the one canonical [`QueryPlan`].

use serde_json::{Map, Value, json};

use crate::errors::PlanError;
use crate::models::enums::{Decision, FilterOp, PlannerTier};
use crate::models::structs::{FilterPredicate, FilterValue, QueryPlan};

const DEFAULTED_FIELDS: &[&str] = &[
    "decision",
    "selections",
    "join_edges",
    "global_filters",
    "order_by",
    "window_functions",
    "subquery_filters",
];

pub fn normalize_plan(value: &Value, tier: PlannerTier) -> Result<QueryPlan, PlanError> {
    let Value::Object(raw) = value else {
        return Err(PlanError::Malformed("plan must be a JSON object".into()));
    };
    let mut obj: Map<String, Value> = raw.clone();

    for key in DEFAULTED_FIELDS {
        if obj.get(*key).is_some_and(Value::is_null) {
            obj.remove(*key);
        }
    }
    // Older planners emit group_by as a bare list of columns.
    if let Some(Value::Array(columns)) = obj.get("group_by") {
        let spec = json!({ "group_by_columns": columns.clone() });
        obj.insert("group_by".into(), spec);
    }

    let mut plan: QueryPlan = serde_json::from_value(Value::Object(obj))?;
    check_tier(&plan, tier)?;
    check_predicates(&plan)?;

    let mut kept: Vec<usize> = Vec::new();
    for (i, sel) in plan.selections.iter().enumerate() {
        if kept.iter().any(|k| plan.selections[*k].is_table(&sel.table)) {
            log::warn!("dropping duplicate selection of table {}", sel.table);
        } else {
            kept.push(i);
        }
    }
    if kept.len() != plan.selections.len() {
        let mut idx = 0;
        plan.selections.retain(|_| {
            let keep = kept.contains(&idx);
            idx += 1;
            keep
        });
    }

    log::debug!(
        "normalized {} plan: {} selection(s), {} join edge(s)",
        tier.name(),
        plan.selections.len(),
        plan.join_edges.len()
    );
    Ok(plan)
}

fn check_tier(plan: &QueryPlan, tier: PlannerTier) -> Result<(), PlanError> {
    let violation = |field: &'static str| PlanError::TierViolation { field, tier: tier.name() };
    if tier == PlannerTier::Full {
        return Ok(());
    }
    if !plan.window_functions.is_empty() {
        return Err(violation("window_functions"));
    }
    if !plan.subquery_filters.is_empty() {
        return Err(violation("subquery_filters"));
    }
    if tier == PlannerTier::Minimal && plan.decision == Decision::Clarify {
        return Err(violation("decision: clarify"));
    }
    Ok(())
}

fn check_predicates(plan: &QueryPlan) -> Result<(), PlanError> {
    let all = plan
        .predicates()
        .chain(plan.subquery_filters.iter().flat_map(|s| s.subquery_filters.iter()));
    for p in all {
        check_predicate(p)?;
    }
    Ok(())
}

fn check_predicate(p: &FilterPredicate) -> Result<(), PlanError> {
    match (&p.operator, &p.value) {
        (FilterOp::Between, FilterValue::List(items)) if items.len() == 2 => Ok(()),
        (FilterOp::Between, v) => Err(PlanError::Malformed(format!(
            "between filter on {}.{} needs exactly two values, got {}",
            p.table, p.column, v
        ))),
        (op, FilterValue::List(_)) if !op.takes_list() => Err(PlanError::Malformed(format!(
            "filter on {}.{} takes a single value",
            p.table, p.column
        ))),
        _ => Ok(()),
    }
}
