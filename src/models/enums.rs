use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target SQL variant. `Tsql` and `Sqlite` are fully mapped; `Postgres` and
/// `Mysql` reject constructs they have no mapping for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Tsql,
    Sqlite,
    Postgres,
    Mysql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Tsql => "tsql",
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
        })
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tsql" | "mssql" | "sqlserver" | "sql server" => Ok(Dialect::Tsql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            other => Err(format!("unknown dialect '{other}' (expected tsql, sqlite, postgres or mysql)")),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    #[default]
    Proceed,
    Clarify,
    Terminate,
}

/// Why a column is attached to a selection. `Filter` columns never reach the
/// SELECT list.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Projection,
    Filter,
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=", alias = "<>")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "between")]
    Between,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "ilike")]
    ILike,
    #[serde(rename = "starts_with")]
    StartsWith,
    #[serde(rename = "ends_with")]
    EndsWith,
    #[serde(rename = "is_null")]
    IsNull,
    #[serde(rename = "not_null", alias = "is_not_null")]
    NotNull,
}

impl FilterOp {
    pub fn takes_list(self) -> bool {
        matches!(self, FilterOp::Between | FilterOp::In | FilterOp::NotIn)
    }

    pub fn ignores_value(self) -> bool {
        matches!(self, FilterOp::IsNull | FilterOp::NotNull)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateFunction {
    #[serde(alias = "count")]
    Count,
    #[serde(alias = "count_distinct")]
    CountDistinct,
    #[serde(alias = "sum")]
    Sum,
    #[serde(alias = "avg")]
    Avg,
    #[serde(alias = "min")]
    Min,
    #[serde(alias = "max")]
    Max,
}

impl AggregateFunction {
    pub fn sql_name(self) -> &'static str {
        match self {
            AggregateFunction::Count | AggregateFunction::CountDistinct => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowFunctionKind {
    #[serde(alias = "row_number")]
    RowNumber,
    #[serde(alias = "rank")]
    Rank,
    #[serde(alias = "dense_rank")]
    DenseRank,
    #[serde(alias = "percent_rank")]
    PercentRank,
    #[serde(alias = "cume_dist")]
    CumeDist,
}

impl WindowFunctionKind {
    pub fn sql_name(self) -> &'static str {
        match self {
            WindowFunctionKind::RowNumber => "ROW_NUMBER",
            WindowFunctionKind::Rank => "RANK",
            WindowFunctionKind::DenseRank => "DENSE_RANK",
            WindowFunctionKind::PercentRank => "PERCENT_RANK",
            WindowFunctionKind::CumeDist => "CUME_DIST",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "asc")]
    Asc,
    #[serde(alias = "desc")]
    Desc,
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubqueryOperator {
    #[default]
    In,
    NotIn,
    Exists,
}

/// Planner output shape. Opaque to audit and synthesis; only the boundary
/// normaliser looks at it.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlannerTier {
    Minimal,
    Standard,
    #[default]
    Full,
}

impl PlannerTier {
    pub fn name(self) -> &'static str {
        match self {
            PlannerTier::Minimal => "minimal",
            PlannerTier::Standard => "standard",
            PlannerTier::Full => "full",
        }
    }
}

impl FromStr for PlannerTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(PlannerTier::Minimal),
            "standard" => Ok(PlannerTier::Standard),
            "full" | "advanced" => Ok(PlannerTier::Full),
            other => Err(format!("unknown planner tier '{other}'")),
        }
    }
}

/// Caller-side sort default, used only when the plan itself has no ORDER BY.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortPreference {
    #[default]
    Default,
    Ascending,
    Descending,
}

impl FromStr for SortPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "" | "none" => Ok(SortPreference::Default),
            "ascending" | "asc" => Ok(SortPreference::Ascending),
            "descending" | "desc" => Ok(SortPreference::Descending),
            other => Err(format!("unknown sort preference '{other}'")),
        }
    }
}
