//! Plan auditor: validates a plan against a schema snapshot, applies the
//! mechanical repairs, and reports everything else as data.
//!
//! Only malformed input is an error. Data-quality findings come back as
//! [`AuditIssue`]s on the outcome, and the returned plan is a new value.

pub mod existence;
pub mod issue;
pub mod references;
pub mod repair;

pub use issue::{AuditIssue, Severity};

use crate::errors::{AuditError, SchemaValidationError};
use crate::models::enums::{Decision, FilterOp};
use crate::models::schema::Schema;
use crate::models::structs::{FilterPredicate, FilterValue, QueryPlan};
use crate::query_ast::expression::{ColumnExpression, is_expression};

#[derive(Clone, Debug, PartialEq)]
pub struct AuditOutcome {
    pub plan: QueryPlan,
    pub issues: Vec<AuditIssue>,
    /// The input schema restricted to the tables the plan selects.
    pub pruned_schema: Schema,
}

impl AuditOutcome {
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }

    /// True when at least one finding makes the plan unrunnable.
    pub fn is_flagged(&self) -> bool {
        self.issues.iter().any(|i| i.severity() == Severity::Fatal)
    }

    pub fn issues_with(&self, severity: Severity) -> impl Iterator<Item = &AuditIssue> {
        self.issues.iter().filter(move |i| i.severity() == severity)
    }

    /// Raises the first fatal finding, for callers that want a hard failure.
    pub fn into_validated(self) -> Result<(QueryPlan, Schema), SchemaValidationError> {
        if let Some(err) = self.issues.iter().find_map(AuditIssue::as_schema_error) {
            return Err(err);
        }
        Ok((self.plan, self.pruned_schema))
    }
}

pub fn audit(plan: &QueryPlan, schema: &Schema) -> Result<AuditOutcome, AuditError> {
    if plan.decision == Decision::Terminate {
        log::debug!("plan decision is terminate, skipping audit");
        return Ok(AuditOutcome { plan: plan.clone(), issues: Vec::new(), pruned_schema: prune(plan, schema) });
    }
    check_well_formed(plan)?;

    let mut audited = plan.clone();
    let mut issues = existence::check_tables_and_columns(&mut audited, schema);
    issues.extend(existence::check_join_edges(&mut audited, schema));
    issues.extend(references::unbound_table_references(&audited));
    issues.extend(references::table_connectivity(&audited));
    issues.extend(repair::fix_orphan_filter_columns(&mut audited));
    issues.extend(repair::fix_group_by_completeness(&mut audited));

    for issue in &issues {
        match issue.severity() {
            Severity::Fatal => log::warn!("audit: {}", issue),
            Severity::Advisory => log::info!("audit: {}", issue),
            Severity::Repaired => log::debug!("audit: {}", issue),
        }
    }
    let pruned_schema = prune(&audited, schema);
    log::debug!(
        "audit finished with {} issue(s); schema pruned from {} to {} table(s)",
        issues.len(),
        schema.len(),
        pruned_schema.len()
    );
    Ok(AuditOutcome { plan: audited, issues, pruned_schema })
}

fn prune(plan: &QueryPlan, schema: &Schema) -> Schema {
    schema.restricted_to(plan.selections.iter().map(|s| s.table.as_str()))
}

fn check_well_formed(plan: &QueryPlan) -> Result<(), AuditError> {
    let all = plan
        .predicates()
        .chain(plan.subquery_filters.iter().flat_map(|s| s.subquery_filters.iter()));
    for p in all {
        check_predicate(p)?;
        check_computed(&p.table, &p.column)?;
    }
    for a in plan.group_by.iter().flat_map(|g| g.aggregates.iter()) {
        if let Some(column) = a.column.as_deref().filter(|c| *c != "*") {
            check_computed(&a.table, column)?;
        }
    }
    Ok(())
}

fn check_computed(table: &str, column: &str) -> Result<(), AuditError> {
    if is_expression(column) {
        ColumnExpression::parse(column, table)
            .map_err(|e| AuditError::Malformed(format!("computed column '{column}' on {table}: {e}")))?;
    }
    Ok(())
}

fn check_predicate(p: &FilterPredicate) -> Result<(), AuditError> {
    if p.operator == FilterOp::Between && !matches!(&p.value, FilterValue::List(items) if items.len() == 2) {
        return Err(AuditError::Malformed(format!(
            "between filter on {}.{} needs exactly two values, got {}",
            p.table, p.column, p.value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::{ColumnSchema, TableSchema};
    use crate::models::structs::TableSelection;

    fn schema() -> Schema {
        Schema::new()
            .with_table("Users", TableSchema::with_columns(vec![ColumnSchema::new("ID", "int"), ColumnSchema::new("Age", "int")]))
            .with_table("Unused", TableSchema::default())
    }

    #[test]
    fn terminate_passes_through() {
        let plan = QueryPlan {
            decision: Decision::Terminate,
            selections: vec![TableSelection::new("Nope")],
            ..Default::default()
        };
        let outcome = audit(&plan, &schema()).unwrap();
        assert!(outcome.issues.is_empty());
        assert_eq!(outcome.plan, plan);
    }

    #[test]
    fn between_arity_is_malformed() {
        let plan = QueryPlan {
            selections: vec![TableSelection::new("Users")
                .project("ID")
                .with_filter(FilterPredicate::new("Users", "Age", FilterOp::Between, vec![18i64]))],
            ..Default::default()
        };
        assert!(matches!(audit(&plan, &schema()), Err(AuditError::Malformed(_))));
    }

    #[test]
    fn unknown_table_flags_the_plan() {
        let plan = QueryPlan { selections: vec![TableSelection::new("Nope").project("X")], ..Default::default() };
        let outcome = audit(&plan, &schema()).unwrap();
        assert!(outcome.is_flagged());
        assert_eq!(outcome.into_validated().unwrap_err(), SchemaValidationError::UnknownTable("Nope".into()));
    }

    #[test]
    fn schema_is_pruned_to_selections() {
        let plan = QueryPlan { selections: vec![TableSelection::new("users").project("ID")], ..Default::default() };
        let outcome = audit(&plan, &schema()).unwrap();
        assert!(outcome.issues.is_empty());
        assert_eq!(outcome.pruned_schema.table_names().collect::<Vec<_>>(), vec!["Users"]);
    }
}
