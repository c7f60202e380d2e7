//! The query-plan IR. Every component takes a plan by reference and returns a
//! new value; nothing here is mutated in place once handed over.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::enums::{
    AggregateFunction, ColumnRole, Decision, FilterOp, JoinType, SortDirection, SubqueryOperator,
    WindowFunctionKind,
};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryPlan {
    #[serde(default)]
    pub decision: Decision,
    #[serde(default)]
    pub selections: Vec<TableSelection>,
    #[serde(default)]
    pub join_edges: Vec<JoinEdge>,
    #[serde(default)]
    pub global_filters: Vec<FilterPredicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<GroupBySpec>,
    #[serde(default)]
    pub order_by: Vec<OrderSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default)]
    pub window_functions: Vec<WindowFunction>,
    #[serde(default)]
    pub subquery_filters: Vec<SubqueryFilter>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TableSelection {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub columns: Vec<SelectedColumn>,
    #[serde(default)]
    pub filters: Vec<FilterPredicate>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub include_only_for_join: bool,
}

fn full_confidence() -> f64 { 1.0 }

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SelectedColumn {
    pub column: String,
    pub role: ColumnRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    /// Projected even though its selection is join-only.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pinned: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JoinEdge {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    #[serde(default)]
    pub join_type: JoinType,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FilterPredicate {
    pub table: String,
    pub column: String,
    #[serde(alias = "op")]
    pub operator: FilterOp,
    #[serde(default)]
    pub value: FilterValue,
}

/// Scalar or list filter operand as it arrives from the planner.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<FilterValue>),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupBySpec {
    #[serde(default)]
    pub group_by_columns: Vec<ColumnRef>,
    #[serde(default)]
    pub aggregates: Vec<Aggregate>,
    #[serde(default)]
    pub having_filters: Vec<FilterPredicate>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub alias: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OrderSpec {
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WindowFunction {
    pub function: WindowFunctionKind,
    #[serde(default)]
    pub partition_by: Vec<ColumnRef>,
    #[serde(default)]
    pub order_by: Vec<OrderSpec>,
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SubqueryFilter {
    pub outer_table: String,
    pub outer_column: String,
    #[serde(default, alias = "op")]
    pub operator: SubqueryOperator,
    pub subquery_table: String,
    pub subquery_column: String,
    #[serde(default)]
    pub subquery_filters: Vec<FilterPredicate>,
}

/// A table named somewhere in the plan, with the clause that names it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableReference {
    pub table: String,
    pub location: &'static str,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self { table: table.into(), column: column.into() }
    }

    pub fn matches(&self, table: &str, column: &str) -> bool {
        self.table.eq_ignore_ascii_case(table) && self.column.eq_ignore_ascii_case(column)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

impl TableSelection {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            confidence: 1.0,
            columns: Vec::new(),
            filters: Vec::new(),
            include_only_for_join: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn project(mut self, column: impl Into<String>) -> Self {
        self.columns.push(SelectedColumn::new(column, ColumnRole::Projection));
        self
    }

    pub fn filter_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(SelectedColumn::new(column, ColumnRole::Filter));
        self
    }

    pub fn with_filter(mut self, filter: FilterPredicate) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn is_table(&self, table: &str) -> bool { self.table.eq_ignore_ascii_case(table) }

    /// Name used to qualify this table's columns in generated SQL.
    pub fn qualifier(&self) -> &str { self.alias.as_deref().unwrap_or(&self.table) }

    pub fn column(&self, column: &str) -> Option<&SelectedColumn> {
        self.columns.iter().find(|c| c.column.eq_ignore_ascii_case(column))
    }

    pub fn projections(&self) -> impl Iterator<Item = &SelectedColumn> {
        self.columns.iter().filter(|c| c.role == ColumnRole::Projection)
    }
}

impl SelectedColumn {
    pub fn new(column: impl Into<String>, role: ColumnRole) -> Self {
        Self { column: column.into(), role, table: None, value_type: None, pinned: false }
    }
}

impl JoinEdge {
    pub fn new(from: (&str, &str), to: (&str, &str), join_type: JoinType) -> Self {
        Self {
            from_table: from.0.to_string(),
            from_column: from.1.to_string(),
            to_table: to.0.to_string(),
            to_column: to.1.to_string(),
            join_type,
        }
    }

    pub fn touches(&self, table: &str) -> bool {
        self.from_table.eq_ignore_ascii_case(table) || self.to_table.eq_ignore_ascii_case(table)
    }
}

impl fmt::Display for JoinEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} -> {}.{}", self.from_table, self.from_column, self.to_table, self.to_column)
    }
}

impl FilterPredicate {
    pub fn new(table: impl Into<String>, column: impl Into<String>, operator: FilterOp, value: impl Into<FilterValue>) -> Self {
        Self { table: table.into(), column: column.into(), operator, value: value.into() }
    }

    pub fn targets(&self, table: &str, column: &str) -> bool {
        self.table.eq_ignore_ascii_case(table) && self.column.eq_ignore_ascii_case(column)
    }
}

impl From<&str> for FilterValue { fn from(v: &str) -> Self { FilterValue::Text(v.to_string()) } }
impl From<String> for FilterValue { fn from(v: String) -> Self { FilterValue::Text(v) } }
impl From<i64> for FilterValue { fn from(v: i64) -> Self { FilterValue::Integer(v) } }
impl From<i32> for FilterValue { fn from(v: i32) -> Self { FilterValue::Integer(v.into()) } }
impl From<f64> for FilterValue { fn from(v: f64) -> Self { FilterValue::Float(v) } }
impl From<bool> for FilterValue { fn from(v: bool) -> Self { FilterValue::Bool(v) } }
impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self { FilterValue::List(v.into_iter().map(Into::into).collect()) }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Null => f.write_str("null"),
            FilterValue::Bool(b) => write!(f, "{b}"),
            FilterValue::Integer(i) => write!(f, "{i}"),
            FilterValue::Float(x) => write!(f, "{x}"),
            FilterValue::Text(s) => write!(f, "{s:?}"),
            FilterValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl OrderSpec {
    pub fn new(table: impl Into<String>, column: impl Into<String>, direction: SortDirection) -> Self {
        Self { table: table.into(), column: column.into(), direction }
    }
}

impl QueryPlan {
    pub fn selection(&self, table: &str) -> Option<&TableSelection> {
        self.selections.iter().find(|s| s.is_table(table))
    }

    pub fn selection_mut(&mut self, table: &str) -> Option<&mut TableSelection> {
        self.selections.iter_mut().find(|s| s.is_table(table))
    }

    pub fn has_aggregates(&self) -> bool {
        self.group_by.as_ref().is_some_and(|g| !g.aggregates.is_empty())
    }

    pub fn having_filters(&self) -> &[FilterPredicate] {
        self.group_by.as_ref().map(|g| g.having_filters.as_slice()).unwrap_or(&[])
    }

    /// Table-scoped, global and HAVING predicates, in that order.
    pub fn predicates(&self) -> impl Iterator<Item = &FilterPredicate> {
        self.selections
            .iter()
            .flat_map(|s| s.filters.iter())
            .chain(self.global_filters.iter())
            .chain(self.having_filters().iter())
    }

    /// True when `(table, column)` is the target of any predicate, including
    /// the outer side of a subquery filter.
    pub fn column_in_predicates(&self, table: &str, column: &str) -> bool {
        self.predicates().any(|p| p.targets(table, column))
            || self
                .subquery_filters
                .iter()
                .any(|s| s.outer_table.eq_ignore_ascii_case(table) && s.outer_column.eq_ignore_ascii_case(column))
    }

    /// Projection columns in declared order. Join-only selections contribute
    /// their pinned columns only.
    pub fn projected_columns(&self) -> Vec<ColumnRef> {
        self.selections
            .iter()
            .flat_map(|s| {
                s.projections()
                    .filter(move |c| !s.include_only_for_join || c.pinned)
                    .map(move |c| ColumnRef::new(s.table.clone(), c.column.clone()))
            })
            .collect()
    }

    /// Every table named by joins, filters, grouping, ordering, windows and
    /// subqueries, in plan order. Selections themselves are not included.
    pub fn table_references(&self) -> Vec<TableReference> {
        let mut refs = Vec::new();
        let mut push = |table: &str, location: &'static str| {
            refs.push(TableReference { table: table.to_string(), location });
        };
        for edge in &self.join_edges {
            push(&edge.from_table, "join_edges");
            push(&edge.to_table, "join_edges");
        }
        for sel in &self.selections {
            for f in &sel.filters {
                push(&f.table, "table filters");
            }
            for c in &sel.columns {
                if let Some(t) = &c.table {
                    push(t, "selection columns");
                }
            }
        }
        for f in &self.global_filters {
            push(&f.table, "global_filters");
        }
        if let Some(g) = &self.group_by {
            for c in &g.group_by_columns {
                push(&c.table, "group_by");
            }
            for a in &g.aggregates {
                push(&a.table, "aggregates");
            }
            for h in &g.having_filters {
                push(&h.table, "having_filters");
            }
        }
        for o in &self.order_by {
            push(&o.table, "order_by");
        }
        for w in &self.window_functions {
            if let Some(t) = &w.table {
                push(t, "window_functions");
            }
            for p in &w.partition_by {
                push(&p.table, "window_functions");
            }
            for o in &w.order_by {
                push(&o.table, "window_functions");
            }
        }
        for s in &self.subquery_filters {
            push(&s.outer_table, "subquery_filters");
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_value_deserializes_untagged() {
        let v: Vec<FilterValue> = serde_json::from_str(r#"[null, true, 3, 2.5, "x", [1, "y"]]"#).unwrap();
        assert_eq!(
            v,
            vec![
                FilterValue::Null,
                FilterValue::Bool(true),
                FilterValue::Integer(3),
                FilterValue::Float(2.5),
                FilterValue::Text("x".into()),
                FilterValue::List(vec![FilterValue::Integer(1), FilterValue::Text("y".into())]),
            ]
        );
    }

    #[test]
    fn predicate_accepts_op_alias() {
        let p: FilterPredicate = serde_json::from_str(r#"{"table": "t", "column": "c", "op": "is_not_null"}"#).unwrap();
        assert_eq!(p.operator, FilterOp::NotNull);
        assert_eq!(p.value, FilterValue::Null);
    }

    #[test]
    fn table_references_skip_selections() {
        let plan = QueryPlan {
            selections: vec![TableSelection::new("A")],
            order_by: vec![OrderSpec::new("B", "X", SortDirection::Desc)],
            ..Default::default()
        };
        let refs = plan.table_references();
        assert_eq!(refs, vec![TableReference { table: "B".into(), location: "order_by" }]);
    }

    #[test]
    fn subquery_outer_column_counts_as_predicate() {
        let plan = QueryPlan {
            selections: vec![TableSelection::new("U").filter_column("CompanyID")],
            subquery_filters: vec![SubqueryFilter {
                outer_table: "U".into(),
                outer_column: "CompanyID".into(),
                operator: SubqueryOperator::In,
                subquery_table: "C".into(),
                subquery_column: "ID".into(),
                subquery_filters: vec![],
            }],
            ..Default::default()
        };
        assert!(plan.column_in_predicates("u", "companyid"));
        assert!(!plan.column_in_predicates("u", "Name"));
    }
}
