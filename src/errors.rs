use crate::models::enums::Dialect;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SchemaValidationError {
    #[error("table '{0}' does not exist in schema")] UnknownTable(String),
    #[error("column '{column}' does not exist in table '{table}'")] UnknownColumn { table: String, column: String },
}

/// Malformed planner output rejected at the boundary.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("malformed plan: {0}")] Malformed(String),
    #[error("'{field}' is not available in the {tier} planner tier")] TierViolation { field: &'static str, tier: &'static str },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    #[error("malformed plan: {0}")] Malformed(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("unsupported construct for {dialect}: {construct}")] Unsupported { construct: String, dialect: Dialect },
    #[error("invalid join edge {from_table}.{from_column} -> {to_table}.{to_column}: {reason}")]
    InvalidJoin { from_table: String, from_column: String, to_table: String, to_column: String, reason: &'static str },
    #[error("malformed plan: {0}")] Malformed(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PatchValidationError {
    #[error(transparent)] Schema(#[from] SchemaValidationError),
    #[error("table '{0}' is not part of the executed plan")] TableNotInPlan(String),
    #[error("column '{column}' is not selected from table '{table}'")] ColumnNotSelected { table: String, column: String },
    #[error("invalid limit {0}: must be a positive integer")] InvalidLimit(u64),
    #[error("unknown patch operation '{0}' (supported: add_column, remove_column, modify_order_by, modify_limit)")] UnknownOperation(String),
    #[error("malformed patch operation: {0}")] Malformed(String),
}

/// Errors surfaced by the end-to-end `compile_plan` entry point.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)] Plan(#[from] PlanError),
    #[error(transparent)] Audit(#[from] AuditError),
    #[error(transparent)] Schema(#[from] SchemaValidationError),
    #[error(transparent)] Synthesis(#[from] SynthesisError),
}

impl From<serde_json::Error> for PlanError { fn from(e: serde_json::Error) -> Self { PlanError::Malformed(e.to_string()) } }
impl From<serde_json::Error> for PatchValidationError { fn from(e: serde_json::Error) -> Self { PatchValidationError::Malformed(e.to_string()) } }
