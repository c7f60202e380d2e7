//! The two mechanical repairs: GROUP BY completeness and orphaned filter
//! columns.

use super::issue::AuditIssue;
use crate::models::enums::ColumnRole;
use crate::models::structs::QueryPlan;

/// With at least one aggregate, appends every non-aggregated projection
/// column missing from `group_by_columns`. Join-only selections are skipped.
pub fn fix_group_by_completeness(plan: &mut QueryPlan) -> Vec<AuditIssue> {
    if !plan.has_aggregates() {
        return Vec::new();
    }
    let projected = plan.projected_columns();
    let Some(group_by) = plan.group_by.as_mut() else {
        return Vec::new();
    };
    let mut issues = Vec::new();
    for col in projected {
        if group_by.group_by_columns.iter().any(|g| g.matches(&col.table, &col.column)) {
            continue;
        }
        log::info!("auto-adding {} to GROUP BY", col);
        issues.push(AuditIssue::GroupByColumnAdded { table: col.table.clone(), column: col.column.clone() });
        group_by.group_by_columns.push(col);
    }
    issues
}

/// A filter-role column is justified when some clause uses it. Unjustified
/// ones are renamed to the closest unclaimed predicate column on the same
/// table (bounded edit distance), or removed. Both outcomes are reported.
pub fn fix_orphan_filter_columns(plan: &mut QueryPlan) -> Vec<AuditIssue> {
    let mut issues = Vec::new();
    for idx in 0..plan.selections.len() {
        let table = plan.selections[idx].table.clone();
        let orphans: Vec<String> = plan.selections[idx]
            .columns
            .iter()
            .filter(|c| c.role == ColumnRole::Filter && !is_justified(plan, &table, &c.column))
            .map(|c| c.column.clone())
            .collect();

        for orphan in orphans {
            let claimed: Vec<String> = plan.selections[idx].columns.iter().map(|c| c.column.clone()).collect();
            let candidates: Vec<String> = plan
                .predicates()
                .filter(|p| p.table.eq_ignore_ascii_case(&table))
                .map(|p| p.column.clone())
                .filter(|c| !claimed.iter().any(|k| k.eq_ignore_ascii_case(c)))
                .collect();
            let best = closest(&orphan, &candidates);

            let sel = &mut plan.selections[idx];
            match best {
                Some(target) => {
                    log::info!("reattaching orphan filter column {}.{} to {}", table, orphan, target);
                    if let Some(col) = sel.columns.iter_mut().find(|c| c.column == orphan) {
                        col.column = target.clone();
                    }
                    issues.push(AuditIssue::OrphanFilterReattached {
                        table: table.clone(),
                        column: orphan,
                        predicate_column: target,
                    });
                }
                None => {
                    log::info!("dropping orphan filter column {}.{}", table, orphan);
                    sel.columns.retain(|c| !(c.column == orphan && c.role == ColumnRole::Filter));
                    issues.push(AuditIssue::OrphanFilterDropped { table: table.clone(), column: orphan });
                }
            }
        }
    }
    issues
}

fn is_justified(plan: &QueryPlan, table: &str, column: &str) -> bool {
    if plan.column_in_predicates(table, column) {
        return true;
    }
    let in_join = plan.join_edges.iter().any(|e| {
        (e.from_table.eq_ignore_ascii_case(table) && e.from_column.eq_ignore_ascii_case(column))
            || (e.to_table.eq_ignore_ascii_case(table) && e.to_column.eq_ignore_ascii_case(column))
    });
    let in_group = plan.group_by.as_ref().is_some_and(|g| {
        g.group_by_columns.iter().any(|c| c.matches(table, column))
            || g.aggregates.iter().any(|a| {
                a.table.eq_ignore_ascii_case(table) && a.column.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(column))
            })
    });
    let in_order = plan.order_by.iter().any(|o| o.table.eq_ignore_ascii_case(table) && o.column.eq_ignore_ascii_case(column));
    let in_window = plan.window_functions.iter().any(|w| {
        w.partition_by.iter().any(|p| p.matches(table, column))
            || w.order_by.iter().any(|o| o.table.eq_ignore_ascii_case(table) && o.column.eq_ignore_ascii_case(column))
    });
    let in_subquery = plan.subquery_filters.iter().any(|s| {
        (s.subquery_table.eq_ignore_ascii_case(table) && s.subquery_column.eq_ignore_ascii_case(column))
            || s.subquery_filters.iter().any(|f| f.targets(table, column))
    });
    in_join || in_group || in_order || in_window || in_subquery
}

fn closest(orphan: &str, candidates: &[String]) -> Option<String> {
    let needle: Vec<char> = orphan.to_lowercase().chars().collect();
    let max = (needle.len() / 3).max(1);
    candidates
        .iter()
        .filter_map(|c| bounded_levenshtein(&c.to_lowercase(), &needle, max).map(|d| (d, c)))
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c.clone())
}

/// Edit distance, or `None` once it is certain to exceed `max`.
fn bounded_levenshtein(value: &str, needle: &[char], max: usize) -> Option<usize> {
    let n = needle.len();
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];
    for (i, c) in value.chars().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for j in 1..=n {
            let cost = usize::from(c != needle[j - 1]);
            let d = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            curr[j] = d;
            row_min = row_min.min(d);
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    (prev[n] <= max).then_some(prev[n])
}
