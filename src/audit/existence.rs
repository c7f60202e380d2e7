//! Table/column existence checks against the schema snapshot.

use std::collections::BTreeSet;

use super::issue::AuditIssue;
use crate::models::schema::Schema;
use crate::models::structs::QueryPlan;
use crate::query_ast::expression::{ColumnExpression, is_expression};

struct Collector<'s> {
    schema: &'s Schema,
    issues: Vec<AuditIssue>,
    unknown_tables: BTreeSet<String>,
}

impl<'s> Collector<'s> {
    fn table_known(&mut self, table: &str, location: &'static str) -> bool {
        if self.schema.has_table(table) {
            return true;
        }
        if self.unknown_tables.insert(table.to_ascii_lowercase()) {
            self.issues.push(AuditIssue::UnknownTable { table: table.to_string(), location });
        }
        false
    }

    /// Reports a missing column without touching the plan.
    fn check(&mut self, table: &str, column: &str, location: &'static str) {
        if self.table_known(table, location) && !self.schema.has_column(table, column) {
            self.issues.push(AuditIssue::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
                location,
                removed: false,
            });
        }
    }

    /// Like [`check`](Self::check), but a computed column is checked through
    /// every column it reads.
    fn check_slot(&mut self, table: &str, column: &str, location: &'static str) {
        if !is_expression(column) {
            return self.check(table, column, location);
        }
        // Unparseable expressions are rejected before this pass.
        if let Ok(expr) = ColumnExpression::parse(column, table) {
            for r in expr.columns() {
                self.check(&r.table, &r.column, location);
            }
        }
    }
}

/// Removes unknown columns from selections and reports every other unknown
/// table or column reference. Aliases of aggregates and window functions are
/// accepted where an output column may be named.
pub fn check_tables_and_columns(plan: &mut QueryPlan, schema: &Schema) -> Vec<AuditIssue> {
    let mut c = Collector { schema, issues: Vec::new(), unknown_tables: BTreeSet::new() };

    for sel in &mut plan.selections {
        if !c.table_known(&sel.table, "selections") {
            continue;
        }
        let table = sel.table.clone();
        sel.columns.retain(|col| {
            if schema.has_column(&table, &col.column) {
                return true;
            }
            log::warn!("removing unknown column {}.{} from selection", table, col.column);
            c.issues.push(AuditIssue::UnknownColumn {
                table: table.clone(),
                column: col.column.clone(),
                location: "selections",
                removed: true,
            });
            false
        });
    }

    let output_aliases: Vec<String> = plan
        .group_by
        .iter()
        .flat_map(|g| g.aggregates.iter().map(|a| a.alias.to_ascii_lowercase()))
        .chain(plan.window_functions.iter().map(|w| w.alias.to_ascii_lowercase()))
        .collect();
    let is_alias = |column: &str| output_aliases.contains(&column.to_ascii_lowercase());

    for sel in &plan.selections {
        for f in &sel.filters {
            c.check_slot(&f.table, &f.column, "table filters");
        }
    }
    for f in &plan.global_filters {
        c.check_slot(&f.table, &f.column, "global_filters");
    }
    if let Some(g) = &plan.group_by {
        for col in &g.group_by_columns {
            c.check(&col.table, &col.column, "group_by");
        }
        for a in &g.aggregates {
            match a.column.as_deref() {
                Some(col) if col != "*" => c.check_slot(&a.table, col, "aggregates"),
                _ => {
                    c.table_known(&a.table, "aggregates");
                }
            }
        }
        for h in &g.having_filters {
            if is_alias(&h.column) {
                c.table_known(&h.table, "having_filters");
            } else {
                c.check_slot(&h.table, &h.column, "having_filters");
            }
        }
    }
    for o in &plan.order_by {
        if is_alias(&o.column) {
            c.table_known(&o.table, "order_by");
        } else {
            c.check(&o.table, &o.column, "order_by");
        }
    }
    for w in &plan.window_functions {
        match (&w.table, &w.column) {
            (Some(t), Some(col)) => c.check(t, col, "window_functions"),
            (Some(t), None) => {
                c.table_known(t, "window_functions");
            }
            _ => {}
        }
        for p in &w.partition_by {
            c.check(&p.table, &p.column, "window_functions");
        }
        for o in &w.order_by {
            c.check(&o.table, &o.column, "window_functions");
        }
    }
    for sq in &plan.subquery_filters {
        c.check(&sq.outer_table, &sq.outer_column, "subquery_filters");
        c.check(&sq.subquery_table, &sq.subquery_column, "subquery_filters");
        for f in &sq.subquery_filters {
            c.check_slot(&f.table, &f.column, "subquery_filters");
        }
    }
    c.issues
}

/// Drops join edges whose endpoints do not exist in the schema.
pub fn check_join_edges(plan: &mut QueryPlan, schema: &Schema) -> Vec<AuditIssue> {
    let mut issues = Vec::new();
    plan.join_edges.retain(|edge| {
        let missing = [(&edge.from_table, &edge.from_column), (&edge.to_table, &edge.to_column)]
            .into_iter()
            .find(|(t, col)| !schema.has_column(t, col));
        match missing {
            None => true,
            Some((table, column)) => {
                log::warn!("dropping join edge {}: {}.{} not in schema", edge, table, column);
                issues.push(AuditIssue::InvalidJoinEdge {
                    edge: edge.to_string(),
                    table: table.clone(),
                    column: column.clone(),
                });
                false
            }
        }
    });
    issues
}
