//! Patch engine: narrow, schema-validated edits to an executed plan.
//!
//! A patch never touches the baseline. It returns a fresh plan that goes
//! straight to synthesis without another planner round-trip.

pub mod options;

pub use options::{ModificationOptions, display_name, modification_options};

use serde::{Deserialize, Serialize};

use crate::audit::repair::fix_group_by_completeness;
use crate::errors::PatchValidationError;
use crate::models::enums::ColumnRole;
use crate::models::schema::Schema;
use crate::models::structs::{OrderSpec, QueryPlan, SelectedColumn, TableSelection};

const OPERATIONS: &[&str] = &["add_column", "remove_column", "modify_order_by", "modify_limit"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation")]
pub enum PatchOperation {
    #[serde(rename = "add_column")]
    AddProjectionColumn { table: String, column: String },
    #[serde(rename = "remove_column")]
    RemoveProjectionColumn { table: String, column: String },
    #[serde(rename = "modify_order_by")]
    ReplaceOrderBy { order_by: Vec<OrderSpec> },
    #[serde(rename = "modify_limit")]
    ReplaceLimit { limit: Option<u64> },
}

impl PatchOperation {
    /// Parses the UI's JSON form, telling unknown operations apart from
    /// malformed known ones.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, PatchValidationError> {
        let name = value
            .get("operation")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PatchValidationError::Malformed("missing 'operation' field".into()))?;
        if !OPERATIONS.contains(&name) {
            return Err(PatchValidationError::UnknownOperation(name.to_string()));
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatchOperation::AddProjectionColumn { .. } => "add_column",
            PatchOperation::RemoveProjectionColumn { .. } => "remove_column",
            PatchOperation::ReplaceOrderBy { .. } => "modify_order_by",
            PatchOperation::ReplaceLimit { .. } => "modify_limit",
        }
    }
}

pub fn apply_patch(baseline: &QueryPlan, op: &PatchOperation, schema: &Schema) -> Result<QueryPlan, PatchValidationError> {
    let mut plan = baseline.clone();
    match op {
        PatchOperation::AddProjectionColumn { table, column } => add_column(&mut plan, table, column, schema)?,
        PatchOperation::RemoveProjectionColumn { table, column } => remove_column(&mut plan, table, column)?,
        PatchOperation::ReplaceOrderBy { order_by } => {
            for spec in order_by {
                let is_alias = plan.group_by.iter().flat_map(|g| g.aggregates.iter()).any(|a| a.alias.eq_ignore_ascii_case(&spec.column))
                    || plan.window_functions.iter().any(|w| w.alias.eq_ignore_ascii_case(&spec.column));
                if !is_alias {
                    schema.require_column(&spec.table, &spec.column)?;
                }
            }
            log::info!("patch: ORDER BY replaced with {} item(s)", order_by.len());
            plan.order_by = order_by.clone();
        }
        PatchOperation::ReplaceLimit { limit } => {
            if *limit == Some(0) {
                return Err(PatchValidationError::InvalidLimit(0));
            }
            log::info!("patch: LIMIT set to {:?}", limit);
            plan.limit = *limit;
        }
    }
    Ok(plan)
}

fn add_column(plan: &mut QueryPlan, table: &str, column: &str, schema: &Schema) -> Result<(), PatchValidationError> {
    let col_schema = schema.require_column(table, column)?;
    let canonical_column = col_schema.name.clone();
    let projected = || {
        let mut c = SelectedColumn::new(canonical_column.clone(), ColumnRole::Projection);
        c.value_type = Some(col_schema.value_type().to_string());
        c
    };

    match plan.selection_mut(table) {
        Some(sel) => {
            // A join-only selection keeps its flag; only the requested column is pinned into the output.
            let join_only = sel.include_only_for_join;
            match sel.columns.iter_mut().find(|c| c.column.eq_ignore_ascii_case(column)) {
                Some(existing) if existing.role == ColumnRole::Filter => {
                    log::info!("patch: promoting {}.{} from filter to projection", sel.table, existing.column);
                    existing.role = ColumnRole::Projection;
                    existing.pinned = join_only;
                }
                Some(existing) if join_only && !existing.pinned => {
                    log::info!("patch: pinning {}.{} of join-only table into projection", sel.table, existing.column);
                    existing.pinned = true;
                }
                Some(existing) => {
                    log::warn!("patch: {}.{} is already projected", sel.table, existing.column);
                }
                None => {
                    log::info!("patch: adding {}.{} to projection", sel.table, canonical_column);
                    let mut c = projected();
                    c.pinned = join_only;
                    sel.columns.push(c);
                }
            }
        }
        None => {
            let joined = plan.join_edges.iter().any(|e| e.touches(table));
            if !joined {
                return Err(PatchValidationError::TableNotInPlan(table.to_string()));
            }
            let canonical_table = schema.table(table).map(|(name, _)| name).unwrap_or(table).to_string();
            log::info!("patch: adding selection for joined table {} with {}", canonical_table, canonical_column);
            let mut sel = TableSelection::new(canonical_table);
            sel.columns.push(projected());
            plan.selections.push(sel);
        }
    }
    fix_group_by_completeness(plan);
    Ok(())
}

fn remove_column(plan: &mut QueryPlan, table: &str, column: &str) -> Result<(), PatchValidationError> {
    let still_filtered = plan.column_in_predicates(table, column);
    let join_key = plan.join_edges.iter().any(|e| {
        (e.from_table.eq_ignore_ascii_case(table) && e.from_column.eq_ignore_ascii_case(column))
            || (e.to_table.eq_ignore_ascii_case(table) && e.to_column.eq_ignore_ascii_case(column))
    });
    let sel = plan
        .selection_mut(table)
        .ok_or_else(|| PatchValidationError::TableNotInPlan(table.to_string()))?;
    let join_only = sel.include_only_for_join;
    let idx = sel
        .columns
        .iter()
        .position(|c| c.role == ColumnRole::Projection && (!join_only || c.pinned) && c.column.eq_ignore_ascii_case(column))
        .ok_or_else(|| PatchValidationError::ColumnNotSelected { table: table.to_string(), column: column.to_string() })?;

    if still_filtered {
        log::info!("patch: {}.{} is still filtered on, downgrading to filter role", table, column);
        sel.columns[idx].role = ColumnRole::Filter;
        sel.columns[idx].pinned = false;
    } else if join_only && join_key {
        log::info!("patch: unpinning join key {}.{}", table, column);
        sel.columns[idx].pinned = false;
    } else {
        log::info!("patch: removing {}.{} from projection", table, column);
        sel.columns.remove(idx);
    }
    if let Some(g) = plan.group_by.as_mut() {
        g.group_by_columns.retain(|c| !c.matches(table, column));
    }
    Ok(())
}

/// An executed baseline plus the ordered patches applied on top of it.
#[derive(Clone, Debug)]
pub struct PatchSession {
    baseline: QueryPlan,
    current: QueryPlan,
    patch_history: Vec<PatchOperation>,
}

impl PatchSession {
    pub fn new(executed: QueryPlan) -> Self {
        Self { current: executed.clone(), baseline: executed, patch_history: Vec::new() }
    }

    /// Applies `op` to the current plan. On failure the session is unchanged.
    pub fn apply(&mut self, op: PatchOperation, schema: &Schema) -> Result<&QueryPlan, PatchValidationError> {
        self.current = apply_patch(&self.current, &op, schema)?;
        self.patch_history.push(op);
        Ok(&self.current)
    }

    pub fn baseline(&self) -> &QueryPlan { &self.baseline }

    pub fn current(&self) -> &QueryPlan { &self.current }

    pub fn patch_history(&self) -> &[PatchOperation] { &self.patch_history }

    /// Accepts the current plan as the new executed baseline.
    pub fn commit(&mut self) {
        self.baseline = self.current.clone();
    }
}
