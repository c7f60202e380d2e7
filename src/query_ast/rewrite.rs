//! Two-tier ORDER BY / LIMIT resolution: what the plan says wins, the
//! caller's defaults fill in, and with neither no clause is emitted.

use serde::{Deserialize, Serialize};

use crate::models::enums::{SortDirection, SortPreference};
use crate::models::structs::{OrderSpec, QueryPlan};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesisDefaults {
    #[serde(default)]
    pub sort: SortPreference,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default = "typed_dates_on")]
    pub typed_date_literals: bool,
}

fn typed_dates_on() -> bool { true }

impl Default for SynthesisDefaults {
    fn default() -> Self {
        Self { sort: SortPreference::Default, limit: None, typed_date_literals: true }
    }
}

/// The plan's ORDER BY, or the default sort applied to the first projected column.
pub fn effective_order(plan: &QueryPlan, defaults: &SynthesisDefaults) -> Vec<OrderSpec> {
    if !plan.order_by.is_empty() {
        return plan.order_by.clone();
    }
    let direction = match defaults.sort {
        SortPreference::Default => return Vec::new(),
        SortPreference::Ascending => SortDirection::Asc,
        SortPreference::Descending => SortDirection::Desc,
    };
    plan.projected_columns()
        .into_iter()
        .next()
        .map(|c| vec![OrderSpec::new(c.table, c.column, direction)])
        .unwrap_or_default()
}

/// A zero limit in either tier means "no limit".
pub fn effective_limit(plan: &QueryPlan, defaults: &SynthesisDefaults) -> Option<u64> {
    plan.limit.filter(|l| *l > 0).or(defaults.limit.filter(|l| *l > 0))
}
