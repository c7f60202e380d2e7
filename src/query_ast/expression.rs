//! Computed columns such as
//! `COALESCE(invoice_items.UnitPrice, 0) * COALESCE(invoice_items.Quantity, 0)`
//! in an aggregate or filter `column` slot.
//!
//! Only column references, numeric and string literals, arithmetic, CAST
//! and an allow-list of scalar functions are accepted. Anything else is
//! rejected at parse time, so a computed column can never smuggle a
//! subquery or a second statement into the output.

use sqlparser::ast::{
    BinaryOperator, Expr as SqlExpr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, Ident, UnaryOperator,
    Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use crate::models::structs::ColumnRef;

/// Functions every target dialect spells the same way.
const PORTABLE_FUNCTIONS: &[&str] = &["COALESCE", "NULLIF", "ABS", "ROUND", "FLOOR", "UPPER", "LOWER", "TRIM"];
const DIALECT_FUNCTIONS: &[&str] = &["ISNULL", "IFNULL", "LEN", "LENGTH", "CEILING", "CEIL", "SUBSTRING"];

/// True when a `column` slot holds something other than a bare column name.
pub fn is_expression(column: &str) -> bool {
    column.contains(['(', ')', '*', '+', '-', '/', '%', '|'])
}

/// A parsed computed column. Column references are kept as two-part
/// `table.column` identifiers; unqualified ones belong to the owning table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnExpression {
    tree: SqlExpr,
    portable: bool,
}

impl ColumnExpression {
    pub fn parse(text: &str, owner: &str) -> Result<Self, String> {
        let dialect = GenericDialect {};
        let mut parser = Parser::new(&dialect).try_with_sql(text).map_err(|e| e.to_string())?;
        let mut tree = parser.parse_expr().map_err(|e| e.to_string())?;
        let next = parser.peek_token().token;
        if next != Token::EOF {
            return Err(format!("unexpected '{next}' after expression"));
        }
        let mut portable = true;
        check(&tree, &mut portable)?;
        rewrite_columns(&mut tree, &mut |table: Option<&str>, column: &str| {
            let table = table.map_or_else(|| owner.to_string(), str::to_string);
            (table, column.to_string())
        });
        Ok(Self { tree, portable })
    }

    /// Every `(table, column)` the expression reads, in source order.
    pub fn columns(&self) -> Vec<ColumnRef> {
        let mut refs = Vec::new();
        let mut tree = self.tree.clone();
        rewrite_columns(&mut tree, &mut |table: Option<&str>, column: &str| {
            let table = table.unwrap_or_default().to_string();
            refs.push(ColumnRef::new(table.clone(), column.to_string()));
            (table, column.to_string())
        });
        refs
    }

    /// Uses only functions with the same spelling on every dialect.
    pub fn is_portable(&self) -> bool { self.portable }

    /// Replaces each table part with whatever `qualify` maps it to.
    pub fn qualified(&self, qualify: impl Fn(&str) -> String) -> Self {
        let mut tree = self.tree.clone();
        rewrite_columns(&mut tree, &mut |table: Option<&str>, column: &str| (qualify(table.unwrap_or_default()), column.to_string()));
        Self { tree, portable: self.portable }
    }

    /// Renders the expression with `column` producing the already-quoted
    /// text of each column reference.
    pub fn render(&self, column: impl Fn(&str, &str) -> String) -> String {
        let mut tree = self.tree.clone();
        replace_columns(&mut tree, &|table: &str, name: &str| SqlExpr::Identifier(Ident::new(column(table, name))));
        tree.to_string()
    }
}

fn check(expr: &SqlExpr, portable: &mut bool) -> Result<(), String> {
    match expr {
        SqlExpr::Identifier(_) => Ok(()),
        SqlExpr::CompoundIdentifier(parts) if parts.len() == 2 => Ok(()),
        SqlExpr::CompoundIdentifier(parts) => Err(format!("column reference needs table.column, got {}", parts.len())),
        SqlExpr::Value(Value::Number(..) | Value::SingleQuotedString(_) | Value::Null) => Ok(()),
        SqlExpr::Nested(inner) => check(inner, portable),
        SqlExpr::UnaryOp { op: UnaryOperator::Minus | UnaryOperator::Plus, expr } => check(expr, portable),
        SqlExpr::BinaryOp { left, op, right } => {
            if !matches!(
                op,
                BinaryOperator::Plus
                    | BinaryOperator::Minus
                    | BinaryOperator::Multiply
                    | BinaryOperator::Divide
                    | BinaryOperator::Modulo
                    | BinaryOperator::StringConcat
            ) {
                return Err(format!("operator {op} is not allowed in a computed column"));
            }
            check(left, portable)?;
            check(right, portable)
        }
        SqlExpr::Cast { expr, .. } => check(expr, portable),
        SqlExpr::Function(f) => {
            let name = f.name.to_string().to_ascii_uppercase();
            if DIALECT_FUNCTIONS.contains(&name.as_str()) {
                *portable = false;
            } else if !PORTABLE_FUNCTIONS.contains(&name.as_str()) {
                return Err(format!("function {name} is not allowed in a computed column"));
            }
            if f.over.is_some() || f.filter.is_some() {
                return Err(format!("{name} cannot carry OVER or FILTER here"));
            }
            for arg in arguments(f)? {
                check(arg, portable)?;
            }
            Ok(())
        }
        other => Err(format!("'{other}' is not allowed in a computed column")),
    }
}

fn arguments(f: &Function) -> Result<Vec<&SqlExpr>, String> {
    let list = match &f.args {
        FunctionArguments::None => return Ok(Vec::new()),
        FunctionArguments::List(list) if list.duplicate_treatment.is_none() && list.clauses.is_empty() => list,
        _ => return Err(format!("unsupported argument list for {}", f.name)),
    };
    list.args
        .iter()
        .map(|arg| match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => Ok(e),
            _ => Err(format!("unsupported argument in {}", f.name)),
        })
        .collect()
}

fn arguments_mut(f: &mut Function) -> Vec<&mut SqlExpr> {
    match &mut f.args {
        FunctionArguments::List(list) => list
            .args
            .iter_mut()
            .filter_map(|arg| match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => Some(e),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Normalizes every column reference to `table.column`, with the table part
/// produced by `map` from the current one (`None` when unqualified).
fn rewrite_columns(expr: &mut SqlExpr, map: &mut dyn FnMut(Option<&str>, &str) -> (String, String)) {
    match expr {
        SqlExpr::Identifier(column) => {
            let (table, column) = map(None, &column.value);
            *expr = SqlExpr::CompoundIdentifier(vec![Ident::new(table), Ident::new(column)]);
        }
        SqlExpr::CompoundIdentifier(parts) if parts.len() == 2 => {
            let (table, column) = map(Some(&parts[0].value), &parts[1].value);
            *parts = vec![Ident::new(table), Ident::new(column)];
        }
        SqlExpr::Nested(inner) | SqlExpr::UnaryOp { expr: inner, .. } | SqlExpr::Cast { expr: inner, .. } => {
            rewrite_columns(inner, map)
        }
        SqlExpr::BinaryOp { left, right, .. } => {
            rewrite_columns(left, map);
            rewrite_columns(right, map);
        }
        SqlExpr::Function(f) => {
            for arg in arguments_mut(f) {
                rewrite_columns(arg, map);
            }
        }
        _ => {}
    }
}

fn replace_columns(expr: &mut SqlExpr, column: &dyn Fn(&str, &str) -> SqlExpr) {
    match expr {
        SqlExpr::CompoundIdentifier(parts) if parts.len() == 2 => {
            *expr = column(&parts[0].value, &parts[1].value);
        }
        SqlExpr::Nested(inner) | SqlExpr::UnaryOp { expr: inner, .. } | SqlExpr::Cast { expr: inner, .. } => {
            replace_columns(inner, column)
        }
        SqlExpr::BinaryOp { left, right, .. } => {
            replace_columns(left, column);
            replace_columns(right, column);
        }
        SqlExpr::Function(f) => {
            for arg in arguments_mut(f) {
                replace_columns(arg, column);
            }
        }
        _ => {}
    }
}
