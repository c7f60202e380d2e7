use super::ast::{Expr, Join, JoinKind, SelectAst, SelectItem, SortItem, TableRef};
use crate::errors::SynthesisError;
use crate::models::enums::{AggregateFunction, Dialect, SortDirection};

pub mod dialect;
use dialect::{SqlDialect, get_dialect};

pub fn emit_sql(ast: &SelectAst, dialect: Dialect) -> Result<String, SynthesisError> {
    let mut emitter = Emitter { dialect: get_dialect(dialect) };
    emitter.emit(ast)
}

struct Emitter {
    dialect: Box<dyn SqlDialect>,
}

impl Emitter {
    fn emit(&mut self, select: &SelectAst) -> Result<String, SynthesisError> {
        let proj_sql = select
            .projection
            .iter()
            .map(|item| self.emit_select_item(item))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let top = select.limit.and_then(|l| self.dialect.emit_top(l));
        let mut sql = match top {
            Some(top) => format!("SELECT {} {} FROM {}", top, proj_sql, self.emit_table(&select.from)),
            None => format!("SELECT {} FROM {}", proj_sql, self.emit_table(&select.from)),
        };
        for join in &select.joins {
            sql.push(' ');
            sql.push_str(&self.emit_join(join)?);
        }
        if let Some(selection) = &select.selection {
            sql.push_str(&format!(" WHERE {}", self.emit_expr(selection)?));
        }
        if !select.group_by.is_empty() {
            let grp = select
                .group_by
                .iter()
                .map(|g| self.emit_expr(g))
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            sql.push_str(&format!(" GROUP BY {}", grp));
        }
        if let Some(h) = &select.having {
            sql.push_str(&format!(" HAVING {}", self.emit_expr(h)?));
        }
        if !select.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.emit_sort_items(&select.order_by)?));
        }
        if let Some(l) = select.limit {
            sql.push_str(&self.dialect.emit_limit(l));
        }
        Ok(sql)
    }

    fn emit_select_item(&mut self, item: &SelectItem) -> Result<String, SynthesisError> {
        Ok(match item {
            SelectItem::Wildcard => "*".into(),
            SelectItem::Expr { expr, alias: None } => self.emit_expr(expr)?,
            SelectItem::Expr { expr, alias: Some(alias) } => {
                format!("{} AS {}", self.emit_expr(expr)?, self.quote_ident(alias))
            }
        })
    }

    fn emit_table(&self, table: &TableRef) -> String {
        match &table.alias {
            Some(a) => format!("{} AS {}", self.quote_ident(&table.name), self.quote_ident(a)),
            None => self.quote_ident(&table.name),
        }
    }

    fn emit_join(&mut self, join: &Join) -> Result<String, SynthesisError> {
        if join.kind == JoinKind::Full && !self.dialect.supports_full_join() {
            return Err(self.unsupported(format!("FULL JOIN on table '{}'", join.table.name)));
        }
        let mut s = format!("{} {}", self.dialect.emit_join_kind(join.kind), self.emit_table(&join.table));
        match (&join.on, join.kind) {
            (Some(on), JoinKind::Cross) => {
                return Err(SynthesisError::Malformed(format!(
                    "CROSS JOIN on '{}' cannot carry a condition ({on:?})",
                    join.table.name
                )));
            }
            (Some(on), _) => s.push_str(&format!(" ON {}", self.emit_expr(on)?)),
            (None, JoinKind::Cross) => {}
            (None, _) => {
                return Err(SynthesisError::Malformed(format!("join on '{}' has no condition", join.table.name)));
            }
        }
        Ok(s)
    }

    fn emit_sort_items(&mut self, items: &[SortItem]) -> Result<String, SynthesisError> {
        Ok(items
            .iter()
            .map(|s| {
                Ok(format!(
                    "{} {}",
                    self.emit_expr(&s.expr)?,
                    match s.direction {
                        SortDirection::Asc => "ASC",
                        SortDirection::Desc => "DESC",
                    }
                ))
            })
            .collect::<Result<Vec<_>, SynthesisError>>()?
            .join(", "))
    }

    fn emit_list(&mut self, exprs: &[Expr]) -> Result<String, SynthesisError> {
        Ok(exprs
            .iter()
            .map(|e| self.emit_expr(e))
            .collect::<Result<Vec<_>, _>>()?
            .join(", "))
    }

    fn emit_expr(&mut self, expr: &Expr) -> Result<String, SynthesisError> {
        Ok(match expr {
            Expr::Column { qualifier, name } => {
                format!("{}.{}", self.quote_ident(qualifier), self.quote_ident(name))
            }
            Expr::Identifier(name) => self.quote_ident(name),
            Expr::Text(s) => self.dialect.quote_string(s),
            Expr::Integer(i) => i.to_string(),
            Expr::Float(f) => f.to_string(),
            Expr::Boolean(b) => self.dialect.emit_boolean(*b),
            Expr::Null => self.dialect.emit_null(),
            Expr::Date(d) => self.dialect.emit_date(*d),
            Expr::DateTime(ts) => self.dialect.emit_datetime(*ts),
            Expr::Raw(r) => {
                if !self.dialect.supports_raw_expressions() {
                    return Err(self.unsupported(format!("function expression {r}")));
                }
                r.clone()
            }
            Expr::Computed(e) => {
                if !e.is_portable() && !self.dialect.supports_raw_expressions() {
                    return Err(self.unsupported(format!("computed column {}", e.render(|t, c| format!("{t}.{c}")))));
                }
                e.render(|t, c| format!("{}.{}", self.quote_ident(t), self.quote_ident(c)))
            }
            Expr::Aggregate { function, arg } => {
                let arg_sql = match arg {
                    Some(a) => self.emit_expr(a)?,
                    None => "*".to_string(),
                };
                if *function == AggregateFunction::CountDistinct {
                    format!("{}(DISTINCT {})", function.sql_name(), arg_sql)
                } else {
                    format!("{}({})", function.sql_name(), arg_sql)
                }
            }
            Expr::Window { function, partition_by, order_by } => {
                if order_by.is_empty() && self.dialect.requires_window_order() {
                    return Err(self.unsupported(format!("{}() without ORDER BY", function.sql_name())));
                }
                let mut s = format!("{}() OVER (", function.sql_name());
                if !partition_by.is_empty() {
                    s.push_str("PARTITION BY ");
                    s.push_str(&self.emit_list(partition_by)?);
                }
                if !order_by.is_empty() {
                    if !partition_by.is_empty() {
                        s.push(' ');
                    }
                    s.push_str("ORDER BY ");
                    s.push_str(&self.emit_sort_items(order_by)?);
                }
                s.push(')');
                s
            }
            Expr::Compare { left, op, right } => {
                format!("{} {} {}", self.emit_expr(left)?, op.as_sql(), self.emit_expr(right)?)
            }
            Expr::Between { expr, low, high } => format!(
                "{} BETWEEN {} AND {}",
                self.emit_expr(expr)?,
                self.emit_expr(low)?,
                self.emit_expr(high)?
            ),
            Expr::InList { expr, list, negated } => {
                let items = self.emit_list(list)?;
                if *negated {
                    format!("{} NOT IN ({})", self.emit_expr(expr)?, items)
                } else {
                    format!("{} IN ({})", self.emit_expr(expr)?, items)
                }
            }
            Expr::InSubquery { expr, subquery, negated } => {
                let inner = self.emit(subquery)?;
                if *negated {
                    format!("{} NOT IN ({})", self.emit_expr(expr)?, inner)
                } else {
                    format!("{} IN ({})", self.emit_expr(expr)?, inner)
                }
            }
            Expr::Exists(subquery) => format!("EXISTS ({})", self.emit(subquery)?),
            Expr::Like { expr, pattern, case_insensitive } => {
                let lhs = self.emit_expr(expr)?;
                let rhs = self.emit_expr(pattern)?;
                if *case_insensitive {
                    self.dialect.emit_ilike(&lhs, &rhs)
                } else {
                    format!("{} LIKE {}", lhs, rhs)
                }
            }
            Expr::IsNull { expr, negated } => {
                if *negated {
                    format!("{} IS NOT NULL", self.emit_expr(expr)?)
                } else {
                    format!("{} IS NULL", self.emit_expr(expr)?)
                }
            }
            Expr::And(parts) => parts
                .iter()
                .map(|p| self.emit_expr(p))
                .collect::<Result<Vec<_>, _>>()?
                .join(" AND "),
        })
    }

    fn unsupported(&self, construct: String) -> SynthesisError {
        SynthesisError::Unsupported { construct, dialect: self.dialect.dialect() }
    }

    fn quote_ident(&self, ident: &str) -> String {
        self.dialect.quote_ident(ident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_ast::ast::CompareOp;

    fn base() -> SelectAst {
        SelectAst {
            projection: vec![SelectItem::Expr { expr: Expr::column("u", "Name"), alias: None }],
            from: TableRef { name: "Users".into(), alias: Some("u".into()) },
            joins: vec![],
            selection: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: None,
        }
    }

    #[test]
    fn top_goes_after_select_on_tsql() {
        let mut ast = base();
        ast.limit = Some(5);
        assert_eq!(emit_sql(&ast, Dialect::Tsql).unwrap(), "SELECT TOP 5 [u].[Name] FROM [Users] AS [u]");
        assert_eq!(emit_sql(&ast, Dialect::Sqlite).unwrap(), "SELECT \"u\".\"Name\" FROM \"Users\" AS \"u\" LIMIT 5");
    }

    #[test]
    fn raw_expression_rejected_on_postgres() {
        let mut ast = base();
        ast.selection = Some(Expr::compare(Expr::column("u", "Created"), CompareOp::Gt, Expr::Raw("GETDATE()".into())));
        assert!(emit_sql(&ast, Dialect::Tsql).unwrap().ends_with("WHERE [u].[Created] > GETDATE()"));
        let err = emit_sql(&ast, Dialect::Postgres).unwrap_err();
        assert!(matches!(err, SynthesisError::Unsupported { dialect: Dialect::Postgres, .. }));
    }

    #[test]
    fn full_join_rejected_on_mysql() {
        let mut ast = base();
        ast.joins.push(Join {
            kind: JoinKind::Full,
            table: TableRef { name: "Orders".into(), alias: None },
            on: Some(Expr::compare(Expr::column("u", "ID"), CompareOp::Eq, Expr::column("Orders", "UserID"))),
        });
        assert!(emit_sql(&ast, Dialect::Tsql).unwrap().contains("FULL JOIN [Orders] ON [u].[ID] = [Orders].[UserID]"));
        assert!(emit_sql(&ast, Dialect::Mysql).is_err());
    }

    #[test]
    fn ilike_lowers_both_sides_outside_postgres() {
        let mut ast = base();
        ast.selection = Some(Expr::Like {
            expr: Box::new(Expr::column("u", "Name")),
            pattern: Box::new(Expr::Text("%ann%".into())),
            case_insensitive: true,
        });
        assert!(emit_sql(&ast, Dialect::Tsql).unwrap().ends_with("WHERE LOWER([u].[Name]) LIKE LOWER('%ann%')"));
        assert!(emit_sql(&ast, Dialect::Postgres).unwrap().ends_with("WHERE \"u\".\"Name\" ILIKE '%ann%'"));
    }

    #[test]
    fn window_without_order_is_unsupported_on_tsql() {
        let mut ast = base();
        ast.projection.push(SelectItem::Expr {
            expr: Expr::Window {
                function: crate::models::enums::WindowFunctionKind::RowNumber,
                partition_by: vec![],
                order_by: vec![],
            },
            alias: Some("rn".into()),
        });
        assert!(emit_sql(&ast, Dialect::Tsql).is_err());
        assert!(emit_sql(&ast, Dialect::Sqlite).unwrap().contains("ROW_NUMBER() OVER () AS \"rn\""));
    }
}
