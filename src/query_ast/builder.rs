//! Lowers a [`QueryPlan`] into a [`SelectAst`], one clause at a time and in
//! a fixed order. Dialect concerns stay in the emitter; this layer only
//! decides structure and literal kinds.

use super::ast::{CompareOp, Expr, Join, JoinKind, SelectAst, SelectItem, SortItem, TableRef};
use super::expression::{ColumnExpression, is_expression};
use super::literal::{TextLiteral, classify_text};
use super::rewrite::{SynthesisDefaults, effective_limit, effective_order};
use crate::errors::SynthesisError;
use crate::models::enums::{FilterOp, JoinType, SubqueryOperator};
use crate::models::structs::{
    Aggregate, ColumnRef, FilterPredicate, FilterValue, JoinEdge, OrderSpec, QueryPlan, SubqueryFilter,
};

pub fn build_select(plan: &QueryPlan, defaults: &SynthesisDefaults) -> Result<SelectAst, SynthesisError> {
    AstBuilder { plan, defaults }.build()
}

/// Inner subquery table and the qualifier it is known by; it shadows any
/// outer binding of the same name.
type Scope<'s> = Option<(&'s str, &'s str)>;

struct AstBuilder<'a> {
    plan: &'a QueryPlan,
    defaults: &'a SynthesisDefaults,
}

impl<'a> AstBuilder<'a> {
    fn build(&self) -> Result<SelectAst, SynthesisError> {
        let first = self
            .plan
            .selections
            .first()
            .ok_or_else(|| SynthesisError::Malformed("plan has no table selections".into()))?;

        let projection = self.projection()?;
        let from = self.table_ref(&first.table);
        let joins = self.joins(&first.table)?;

        let mut conditions = Vec::new();
        for sel in &self.plan.selections {
            for f in &sel.filters {
                conditions.push(self.predicate(self.column_or_expression(&f.table, &f.column, None)?, f)?);
            }
        }
        for f in &self.plan.global_filters {
            conditions.push(self.predicate(self.column_or_expression(&f.table, &f.column, None)?, f)?);
        }
        for (i, sq) in self.plan.subquery_filters.iter().enumerate() {
            conditions.push(self.subquery(i, sq)?);
        }

        let group_by = self
            .plan
            .group_by
            .iter()
            .flat_map(|g| g.group_by_columns.iter())
            .map(|c| self.column(&c.table, &c.column, None))
            .collect();

        let having = if self.plan.has_aggregates() {
            let mut parts = Vec::new();
            for h in self.plan.having_filters() {
                let target = match self.aggregate_named(&h.column) {
                    Some(a) => self.aggregate(a)?,
                    None => self.column_or_expression(&h.table, &h.column, None)?,
                };
                parts.push(self.predicate(target, h)?);
            }
            Expr::conjunction(parts)
        } else {
            None
        };

        let order_by = effective_order(self.plan, self.defaults)
            .iter()
            .map(|o| SortItem { expr: self.order_expr(o), direction: o.direction })
            .collect();

        Ok(SelectAst {
            projection,
            from,
            joins,
            selection: Expr::conjunction(conditions),
            group_by,
            having,
            order_by,
            limit: effective_limit(self.plan, self.defaults),
        })
    }

    fn projection(&self) -> Result<Vec<SelectItem>, SynthesisError> {
        let mut projected = self.plan.projected_columns();
        let mut items: Vec<SelectItem> = projected
            .iter()
            .map(|c| SelectItem::Expr { expr: self.column(&c.table, &c.column, None), alias: None })
            .collect();
        if let Some(g) = &self.plan.group_by {
            for c in &g.group_by_columns {
                if !projected.iter().any(|p| p.matches(&c.table, &c.column)) {
                    items.push(SelectItem::Expr { expr: self.column(&c.table, &c.column, None), alias: None });
                    projected.push(c.clone());
                }
            }
            for a in &g.aggregates {
                items.push(SelectItem::Expr { expr: self.aggregate(a)?, alias: Some(a.alias.clone()) });
            }
        }
        for w in &self.plan.window_functions {
            let expr = Expr::Window {
                function: w.function,
                partition_by: w.partition_by.iter().map(|c| self.column(&c.table, &c.column, None)).collect(),
                order_by: w
                    .order_by
                    .iter()
                    .map(|o| SortItem { expr: self.column(&o.table, &o.column, None), direction: o.direction })
                    .collect(),
            };
            items.push(SelectItem::Expr { expr, alias: Some(w.alias.clone()) });
        }
        if items.is_empty() {
            items.push(SelectItem::Wildcard);
        }
        Ok(items)
    }

    fn joins(&self, from_table: &str) -> Result<Vec<Join>, SynthesisError> {
        fn is_bound(bound: &[&str], t: &str) -> bool {
            bound.iter().any(|b| b.eq_ignore_ascii_case(t))
        }
        let mut bound: Vec<&str> = vec![from_table];
        let mut joins: Vec<Join> = Vec::new();

        for edge in &self.plan.join_edges {
            if edge.from_table.eq_ignore_ascii_case(&edge.to_table) {
                return Err(invalid_join(edge, "self-join edges are not supported"));
            }
            let on = Expr::compare(
                self.column(&edge.from_table, &edge.from_column, None),
                CompareOp::Eq,
                self.column(&edge.to_table, &edge.to_column, None),
            );
            match (is_bound(&bound, &edge.from_table), is_bound(&bound, &edge.to_table)) {
                (true, false) => {
                    joins.push(Join {
                        kind: join_kind(edge.join_type, false),
                        table: self.table_ref(&edge.to_table),
                        on: Some(on),
                    });
                    bound.push(&edge.to_table);
                }
                (false, true) => {
                    joins.push(Join {
                        kind: join_kind(edge.join_type, true),
                        table: self.table_ref(&edge.from_table),
                        on: Some(on),
                    });
                    bound.push(&edge.from_table);
                }
                (true, true) => {
                    // Additional key column for a pair that is already joined.
                    let existing = joins.iter_mut().rev().find(|j| {
                        j.kind != JoinKind::Cross
                            && (j.table.name.eq_ignore_ascii_case(&edge.from_table)
                                || j.table.name.eq_ignore_ascii_case(&edge.to_table))
                    });
                    let Some(join) = existing else {
                        return Err(invalid_join(edge, "both tables are already bound"));
                    };
                    join.on = Some(match join.on.take() {
                        Some(Expr::And(mut parts)) => {
                            parts.push(on);
                            Expr::And(parts)
                        }
                        Some(prev) => Expr::And(vec![prev, on]),
                        None => on,
                    });
                }
                (false, false) => {
                    return Err(invalid_join(edge, "neither table is bound by FROM or an earlier join"));
                }
            }
        }

        for sel in self.plan.selections.iter().skip(1) {
            if !is_bound(&bound, &sel.table) {
                log::debug!("table '{}' has no join edge, emitting CROSS JOIN", sel.table);
                joins.push(Join { kind: JoinKind::Cross, table: self.table_ref(&sel.table), on: None });
                bound.push(&sel.table);
            }
        }
        Ok(joins)
    }

    fn subquery(&self, index: usize, sq: &SubqueryFilter) -> Result<Expr, SynthesisError> {
        // The inner table gets its own alias when the outer query binds the same name.
        let alias = self.plan.selection(&sq.subquery_table).map(|_| format!("sq{}", index + 1));
        let qualifier = alias.clone().unwrap_or_else(|| sq.subquery_table.clone());
        let scope: Scope<'_> = Some((sq.subquery_table.as_str(), qualifier.as_str()));

        let sub_col = Expr::column(qualifier.clone(), sq.subquery_column.clone());
        let outer_col = self.column(&sq.outer_table, &sq.outer_column, None);
        let mut conditions = Vec::new();
        if sq.operator == SubqueryOperator::Exists {
            conditions.push(Expr::compare(sub_col.clone(), CompareOp::Eq, outer_col.clone()));
        }
        for f in &sq.subquery_filters {
            conditions.push(self.predicate(self.column_or_expression(&f.table, &f.column, scope)?, f)?);
        }
        let select = SelectAst {
            projection: vec![SelectItem::Expr { expr: sub_col, alias: None }],
            from: TableRef { name: sq.subquery_table.clone(), alias },
            joins: Vec::new(),
            selection: Expr::conjunction(conditions),
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
        };
        Ok(match sq.operator {
            SubqueryOperator::In => Expr::InSubquery { expr: Box::new(outer_col), subquery: Box::new(select), negated: false },
            SubqueryOperator::NotIn => Expr::InSubquery { expr: Box::new(outer_col), subquery: Box::new(select), negated: true },
            SubqueryOperator::Exists => Expr::Exists(Box::new(select)),
        })
    }

    fn predicate(&self, target: Expr, f: &FilterPredicate) -> Result<Expr, SynthesisError> {
        let target = Box::new(target);
        Ok(match f.operator {
            FilterOp::Eq | FilterOp::Ne | FilterOp::Lt | FilterOp::Le | FilterOp::Gt | FilterOp::Ge => {
                let op = compare_op(f.operator);
                match &f.value {
                    FilterValue::Null if op == CompareOp::Eq => Expr::IsNull { expr: target, negated: false },
                    FilterValue::Null if op == CompareOp::NotEq => Expr::IsNull { expr: target, negated: true },
                    FilterValue::Null => return Err(malformed(f, "cannot order-compare with null")),
                    FilterValue::List(_) => return Err(malformed(f, "comparison needs a single value")),
                    v => Expr::Compare { left: target, op, right: Box::new(self.value(v, f)?) },
                }
            }
            FilterOp::Between => match &f.value {
                FilterValue::List(items) if items.len() == 2 => Expr::Between {
                    expr: target,
                    low: Box::new(self.value(&items[0], f)?),
                    high: Box::new(self.value(&items[1], f)?),
                },
                _ => return Err(malformed(f, "between needs exactly two values")),
            },
            FilterOp::In | FilterOp::NotIn => {
                let items: &[FilterValue] = match &f.value {
                    FilterValue::List(items) => items,
                    FilterValue::Null => &[],
                    v => std::slice::from_ref(v),
                };
                if items.is_empty() {
                    return Err(malformed(f, "IN list is empty"));
                }
                let list = items.iter().map(|v| self.value(v, f)).collect::<Result<Vec<_>, _>>()?;
                Expr::InList { expr: target, list, negated: f.operator == FilterOp::NotIn }
            }
            FilterOp::Like | FilterOp::ILike => Expr::Like {
                expr: target,
                pattern: Box::new(self.value(&f.value, f)?),
                case_insensitive: f.operator == FilterOp::ILike,
            },
            FilterOp::StartsWith | FilterOp::EndsWith => {
                let text = match &f.value {
                    FilterValue::Text(s) => s.clone(),
                    FilterValue::Integer(i) => i.to_string(),
                    FilterValue::Float(x) => x.to_string(),
                    _ => return Err(malformed(f, "prefix/suffix match needs a text value")),
                };
                let pattern = if f.operator == FilterOp::StartsWith { format!("{text}%") } else { format!("%{text}") };
                Expr::Like { expr: target, pattern: Box::new(Expr::Text(pattern)), case_insensitive: false }
            }
            FilterOp::IsNull => Expr::IsNull { expr: target, negated: false },
            FilterOp::NotNull => Expr::IsNull { expr: target, negated: true },
        })
    }

    fn value(&self, v: &FilterValue, f: &FilterPredicate) -> Result<Expr, SynthesisError> {
        Ok(match v {
            FilterValue::Null => Expr::Null,
            FilterValue::Bool(b) => Expr::Boolean(*b),
            FilterValue::Integer(i) => Expr::Integer(*i),
            FilterValue::Float(x) if x.is_finite() => Expr::Float(*x),
            FilterValue::Float(_) => return Err(malformed(f, "non-finite number")),
            FilterValue::List(_) => return Err(malformed(f, "nested list value")),
            FilterValue::Text(s) => match classify_text(s) {
                TextLiteral::FunctionCall(call) => {
                    log::debug!("unwrapping function literal {} in filter on {}.{}", call, f.table, f.column);
                    Expr::Raw(call)
                }
                TextLiteral::Date(d) if self.defaults.typed_date_literals => Expr::Date(d),
                TextLiteral::DateTime(ts) if self.defaults.typed_date_literals => Expr::DateTime(ts),
                _ => Expr::Text(s.clone()),
            },
        })
    }

    fn order_expr(&self, o: &OrderSpec) -> Expr {
        let is_output_alias = self.aggregate_named(&o.column).is_some()
            || self.plan.window_functions.iter().any(|w| w.alias.eq_ignore_ascii_case(&o.column));
        if is_output_alias {
            Expr::Identifier(o.column.clone())
        } else {
            self.column(&o.table, &o.column, None)
        }
    }

    fn aggregate(&self, a: &Aggregate) -> Result<Expr, SynthesisError> {
        let arg = match a.column.as_deref() {
            Some(c) if c != "*" => Some(Box::new(self.column_or_expression(&a.table, c, None)?)),
            _ => None,
        };
        Ok(Expr::Aggregate { function: a.function, arg })
    }

    fn aggregate_named(&self, alias: &str) -> Option<&'a Aggregate> {
        self.plan
            .group_by
            .as_ref()?
            .aggregates
            .iter()
            .find(|a| a.alias.eq_ignore_ascii_case(alias))
    }

    /// A plain column, or a computed column with its table parts swapped for
    /// the qualifiers they are bound under.
    fn column_or_expression(&self, table: &str, column: &str, scope: Scope<'_>) -> Result<Expr, SynthesisError> {
        if !is_expression(column) {
            return Ok(self.column(table, column, scope));
        }
        let parsed = ColumnExpression::parse(column, table)
            .map_err(|e| SynthesisError::Malformed(format!("computed column on {table}: {e}")))?;
        Ok(Expr::Computed(parsed.qualified(|t| self.qualifier(t, scope))))
    }

    fn column(&self, table: &str, column: &str, scope: Scope<'_>) -> Expr {
        Expr::column(self.qualifier(table, scope), column)
    }

    fn qualifier(&self, table: &str, scope: Scope<'_>) -> String {
        if let Some((inner, q)) = scope
            && inner.eq_ignore_ascii_case(table)
        {
            return q.to_string();
        }
        match self.plan.selection(table) {
            Some(sel) => sel.qualifier().to_string(),
            None => table.to_string(),
        }
    }

    fn table_ref(&self, table: &str) -> TableRef {
        match self.plan.selection(table) {
            Some(sel) => TableRef { name: sel.table.clone(), alias: sel.alias.clone() },
            None => TableRef { name: table.to_string(), alias: None },
        }
    }
}

/// An edge whose `from` side is the newly joined table reads right-to-left,
/// so LEFT and RIGHT swap to keep the preserved side.
fn join_kind(join_type: JoinType, reversed: bool) -> JoinKind {
    match (join_type, reversed) {
        (JoinType::Inner, _) => JoinKind::Inner,
        (JoinType::Full, _) => JoinKind::Full,
        (JoinType::Left, false) | (JoinType::Right, true) => JoinKind::Left,
        (JoinType::Right, false) | (JoinType::Left, true) => JoinKind::Right,
    }
}

fn compare_op(op: FilterOp) -> CompareOp {
    match op {
        FilterOp::Ne => CompareOp::NotEq,
        FilterOp::Lt => CompareOp::Lt,
        FilterOp::Le => CompareOp::LtEq,
        FilterOp::Gt => CompareOp::Gt,
        FilterOp::Ge => CompareOp::GtEq,
        _ => CompareOp::Eq,
    }
}

fn invalid_join(edge: &JoinEdge, reason: &'static str) -> SynthesisError {
    SynthesisError::InvalidJoin {
        from_table: edge.from_table.clone(),
        from_column: edge.from_column.clone(),
        to_table: edge.to_table.clone(),
        to_column: edge.to_column.clone(),
        reason,
    }
}

fn malformed(f: &FilterPredicate, what: &str) -> SynthesisError {
    SynthesisError::Malformed(format!("filter on {}: {what}", ColumnRef::new(f.table.clone(), f.column.clone())))
}
