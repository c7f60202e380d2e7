//! Advisory checks: tables referenced but never selected, and selected tables
//! the join graph does not reach. Neither is repaired here; choosing a join
//! path needs information this layer does not have.

use super::issue::AuditIssue;
use crate::models::structs::QueryPlan;

pub fn unbound_table_references(plan: &QueryPlan) -> Vec<AuditIssue> {
    let mut found: Vec<(String, Vec<&'static str>)> = Vec::new();
    for r in plan.table_references() {
        if plan.selection(&r.table).is_some() {
            continue;
        }
        match found.iter_mut().find(|(t, _)| t.eq_ignore_ascii_case(&r.table)) {
            Some((_, locations)) => {
                if !locations.contains(&r.location) {
                    locations.push(r.location);
                }
            }
            None => found.push((r.table, vec![r.location])),
        }
    }
    found
        .into_iter()
        .map(|(table, locations)| AuditIssue::UnboundTableReference { table, locations })
        .collect()
}

/// With two or more selections, every selection must be reachable from the
/// first one over join edges taken in either direction.
pub fn table_connectivity(plan: &QueryPlan) -> Vec<AuditIssue> {
    let tables: Vec<&str> = plan.selections.iter().map(|s| s.table.as_str()).collect();
    if tables.len() < 2 {
        return Vec::new();
    }
    if plan.join_edges.is_empty() {
        return vec![AuditIssue::NoJoinEdges { tables: tables.iter().map(|t| t.to_string()).collect() }];
    }

    let mut reached: Vec<&str> = vec![tables[0]];
    let mut frontier: Vec<&str> = vec![tables[0]];
    while let Some(current) = frontier.pop() {
        for edge in &plan.join_edges {
            let next = if edge.from_table.eq_ignore_ascii_case(current) {
                edge.to_table.as_str()
            } else if edge.to_table.eq_ignore_ascii_case(current) {
                edge.from_table.as_str()
            } else {
                continue;
            };
            if !reached.iter().any(|r| r.eq_ignore_ascii_case(next)) {
                reached.push(next);
                frontier.push(next);
            }
        }
    }

    tables
        .iter()
        .filter(|t| !reached.iter().any(|r| r.eq_ignore_ascii_case(t)))
        .map(|t| AuditIssue::UnreachableTable { table: t.to_string() })
        .collect()
}
