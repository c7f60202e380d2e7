pub mod audit;
pub mod config;
pub mod debug_snapshot;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod patch;
pub mod query_ast;

pub use audit::{AuditIssue, AuditOutcome, Severity, audit};
pub use config::CompilerConfig;
pub use errors::{
    AuditError, CompileError, PatchValidationError, PlanError, SchemaValidationError, SynthesisError,
};
pub use normalize::normalize_plan;
pub use patch::{PatchOperation, PatchSession, apply_patch, modification_options};
pub use query_ast::{CompiledQuery, PlanCache, SynthesisDefaults, synthesize, synthesize_with_defaults};

use debug_snapshot::DebugSnapshot;
use models::schema::Schema;
use models::structs::QueryPlan;

/// Result of a full audit-then-synthesize pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    pub outcome: AuditOutcome,
    pub query: CompiledQuery,
}

/// Audits `plan` against `schema` and synthesizes SQL for the repaired plan.
///
/// A plan with a fatal finding stops before synthesis and reports that
/// finding. When `config.debug_dir` is set a snapshot is written either way.
pub fn compile_plan(plan: &QueryPlan, schema: &Schema, config: &CompilerConfig) -> Result<Compilation, CompileError> {
    let outcome = audit(plan, schema)?;
    if outcome.is_flagged() {
        snapshot(config, &outcome, None);
        if let Some(err) = outcome.issues.iter().find_map(AuditIssue::as_schema_error) {
            return Err(err.into());
        }
    }
    let query = synthesize_with_defaults(&outcome.plan, config.dialect, &config.synthesis_defaults())?;
    snapshot(config, &outcome, Some(&query.sql));
    log::info!(
        "compiled plan over {} table(s) with {} audit issue(s)",
        outcome.plan.selections.len(),
        outcome.issues.len()
    );
    Ok(Compilation { outcome, query })
}

fn snapshot(config: &CompilerConfig, outcome: &AuditOutcome, sql: Option<&str>) {
    if let Some(dir) = &config.debug_dir {
        // Failures are already logged by the writer.
        let _ = DebugSnapshot { plan: &outcome.plan, sql, issues: &outcome.issues }.write(dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{Dialect, JoinType};
    use crate::models::schema::{ColumnSchema, TableSchema};
    use crate::models::structs::{JoinEdge, TableSelection};

    fn schema() -> Schema {
        Schema::new()
            .with_table(
                "Users",
                TableSchema::with_columns(vec![
                    ColumnSchema::new("ID", "int").primary_key(),
                    ColumnSchema::new("Name", "nvarchar"),
                    ColumnSchema::new("CompanyID", "int"),
                ]),
            )
            .with_table(
                "Companies",
                TableSchema::with_columns(vec![
                    ColumnSchema::new("ID", "int").primary_key(),
                    ColumnSchema::new("Title", "nvarchar"),
                ]),
            )
    }

    #[test]
    fn compiles_a_clean_plan() {
        let plan = QueryPlan {
            selections: vec![
                TableSelection::new("Users").with_alias("u").project("Name"),
                TableSelection::new("Companies").with_alias("c").project("Title"),
            ],
            join_edges: vec![JoinEdge::new(("Users", "CompanyID"), ("Companies", "ID"), JoinType::Inner)],
            ..Default::default()
        };
        let config = CompilerConfig { dialect: Dialect::Sqlite, default_limit: Some(5), ..Default::default() };
        let out = compile_plan(&plan, &schema(), &config).unwrap();
        assert!(out.outcome.issues.is_empty());
        assert_eq!(out.query.dialect, Dialect::Sqlite);
        assert!(out.query.sql.contains("INNER JOIN"));
        assert!(out.query.sql.ends_with("LIMIT 5"));
    }

    #[test]
    fn flagged_plan_stops_before_synthesis() {
        let plan = QueryPlan {
            selections: vec![TableSelection::new("Ghost").project("Name")],
            ..Default::default()
        };
        let err = compile_plan(&plan, &schema(), &CompilerConfig::default()).unwrap_err();
        assert_eq!(err, CompileError::Schema(SchemaValidationError::UnknownTable("Ghost".into())));
    }

    #[test]
    fn writes_snapshot_when_debug_dir_is_set() {
        let tmp = tempfile::tempdir().unwrap();
        let config = CompilerConfig { debug_dir: Some(tmp.path().to_path_buf()), ..Default::default() };
        let plan = QueryPlan { selections: vec![TableSelection::new("Users").project("Name")], ..Default::default() };
        compile_plan(&plan, &schema(), &config).unwrap();
        let written: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(written.len(), 1);
    }
}
