use std::fmt;

use serde::Serialize;

use crate::errors::SchemaValidationError;

/// How the auditor dealt with a finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fixed mechanically; the returned plan no longer has the problem.
    Repaired,
    /// Reported only; the plan is left as the planner wrote it.
    Advisory,
    /// The plan cannot run against this schema.
    Fatal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditIssue {
    UnknownTable { table: String, location: &'static str },
    UnknownColumn { table: String, column: String, location: &'static str, removed: bool },
    InvalidJoinEdge { edge: String, table: String, column: String },
    UnboundTableReference { table: String, locations: Vec<&'static str> },
    NoJoinEdges { tables: Vec<String> },
    UnreachableTable { table: String },
    GroupByColumnAdded { table: String, column: String },
    OrphanFilterReattached { table: String, column: String, predicate_column: String },
    OrphanFilterDropped { table: String, column: String },
}

impl AuditIssue {
    pub fn severity(&self) -> Severity {
        match self {
            AuditIssue::UnknownTable { .. } => Severity::Fatal,
            AuditIssue::UnknownColumn { removed: false, .. } => Severity::Fatal,
            AuditIssue::UnboundTableReference { .. }
            | AuditIssue::NoJoinEdges { .. }
            | AuditIssue::UnreachableTable { .. } => Severity::Advisory,
            _ => Severity::Repaired,
        }
    }

    /// The schema error a fatal finding corresponds to.
    pub fn as_schema_error(&self) -> Option<SchemaValidationError> {
        match self {
            AuditIssue::UnknownTable { table, .. } => Some(SchemaValidationError::UnknownTable(table.clone())),
            AuditIssue::UnknownColumn { table, column, removed: false, .. } => {
                Some(SchemaValidationError::UnknownColumn { table: table.clone(), column: column.clone() })
            }
            _ => None,
        }
    }
}

impl fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditIssue::UnknownTable { table, location } => {
                write!(f, "Table '{table}' referenced in {location} does not exist in the schema.")
            }
            AuditIssue::UnknownColumn { table, column, location, removed } => {
                write!(f, "Column '{column}' does not exist in table '{table}' ({location}).")?;
                if *removed {
                    f.write_str(" Removed from the selection.")?;
                }
                Ok(())
            }
            AuditIssue::InvalidJoinEdge { edge, table, column } => write!(
                f,
                "JOIN column '{column}' does not exist in table '{table}'; dropped join edge {edge}."
            ),
            AuditIssue::UnboundTableReference { table, locations } => write!(
                f,
                "Table '{table}' is referenced in {} but not included in selections.",
                locations.join(", ")
            ),
            AuditIssue::NoJoinEdges { tables } => write!(
                f,
                "Multiple tables selected ({}) but no join edges defined; they would be combined with a CROSS JOIN.",
                tables.join(", ")
            ),
            AuditIssue::UnreachableTable { table } => write!(
                f,
                "Table '{table}' has no join edges connecting it to the other selected tables; it would be CROSS JOINed."
            ),
            AuditIssue::GroupByColumnAdded { table, column } => {
                write!(f, "Auto-added {table}.{column} to GROUP BY.")
            }
            AuditIssue::OrphanFilterReattached { table, column, predicate_column } => write!(
                f,
                "Filter column {table}.{column} had no matching predicate; reattached to {table}.{predicate_column}."
            ),
            AuditIssue::OrphanFilterDropped { table, column } => {
                write!(f, "Filter column {table}.{column} had no matching predicate; removed.")
            }
        }
    }
}
