//! Typed SELECT tree built from a plan and rendered by the emitter. Literal
//! values live in the tree as data; nothing caller-supplied is spliced into
//! SQL text until a dialect quotes it.

use chrono::{NaiveDate, NaiveDateTime};

use super::expression::ColumnExpression;

use crate::models::enums::{AggregateFunction, SortDirection, WindowFunctionKind};

#[derive(Debug, Clone, PartialEq)]
pub struct SelectAst {
    pub projection: Vec<SelectItem>,
    pub from: TableRef,
    pub joins: Vec<Join>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<SortItem>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Expr { expr: Expr, alias: Option<String> },
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind { Inner, Left, Right, Full, Cross }

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    /// Absent only for `Cross`.
    pub on: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortItem {
    pub expr: Expr,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp { Eq, NotEq, Lt, LtEq, Gt, GtEq }

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column { qualifier: String, name: String },
    /// Bare output alias (aggregate or window), used by ORDER BY.
    Identifier(String),
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// A function-call expression that passed the literal detector.
    Raw(String),
    /// Arithmetic over columns with qualifiers already resolved.
    Computed(ColumnExpression),
    Aggregate { function: AggregateFunction, arg: Option<Box<Expr>> },
    Window { function: WindowFunctionKind, partition_by: Vec<Expr>, order_by: Vec<SortItem> },
    Compare { left: Box<Expr>, op: CompareOp, right: Box<Expr> },
    Between { expr: Box<Expr>, low: Box<Expr>, high: Box<Expr> },
    InList { expr: Box<Expr>, list: Vec<Expr>, negated: bool },
    InSubquery { expr: Box<Expr>, subquery: Box<SelectAst>, negated: bool },
    Exists(Box<SelectAst>),
    Like { expr: Box<Expr>, pattern: Box<Expr>, case_insensitive: bool },
    IsNull { expr: Box<Expr>, negated: bool },
    And(Vec<Expr>),
}

impl Expr {
    pub fn column(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column { qualifier: qualifier.into(), name: name.into() }
    }

    pub fn compare(left: Expr, op: CompareOp, right: Expr) -> Self {
        Expr::Compare { left: Box::new(left), op, right: Box::new(right) }
    }

    /// Folds a list of conditions into one, `None` when empty.
    pub fn conjunction(mut parts: Vec<Expr>) -> Option<Expr> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Expr::And(parts)),
        }
    }
}
