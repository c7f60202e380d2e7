//! Modification surface for an editing UI: what each selected table offers,
//! what is currently selected, and what can be sorted on.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::enums::{ColumnRole, SortDirection};
use crate::models::schema::Schema;
use crate::models::structs::{OrderSpec, QueryPlan};

static TRAILING_ACRONYM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z])([A-Z]+)$").expect("valid trailing acronym pattern"));

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ColumnOption {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub selected: bool,
    pub role: Option<ColumnRole>,
    pub is_primary_key: bool,
    pub is_nullable: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TableOptions {
    pub table: String,
    pub alias: Option<String>,
    pub columns: Vec<ColumnOption>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SortableColumn {
    pub table: String,
    pub column: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub display_name: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ModificationOptions {
    pub tables: Vec<TableOptions>,
    pub current_order_by: Vec<OrderSpec>,
    pub current_limit: Option<u64>,
    pub sortable_columns: Vec<SortableColumn>,
}

pub fn modification_options(plan: &QueryPlan, schema: &Schema) -> ModificationOptions {
    let mut tables = Vec::new();
    let mut sortable_columns = Vec::new();

    for sel in &plan.selections {
        let Some((_, table_schema)) = schema.table(&sel.table) else {
            log::warn!("no schema for selected table {}, offering no columns", sel.table);
            tables.push(TableOptions { table: sel.table.clone(), alias: sel.alias.clone(), columns: Vec::new() });
            continue;
        };
        let mut columns = Vec::with_capacity(table_schema.columns.len());
        for col in &table_schema.columns {
            let in_plan = sel.column(&col.name);
            let friendly = display_name(&col.name);
            sortable_columns.push(SortableColumn {
                table: sel.table.clone(),
                column: col.name.clone(),
                data_type: col.data_type.clone(),
                display_name: format!("{}.{}", sel.table, friendly),
            });
            columns.push(ColumnOption {
                name: col.name.clone(),
                display_name: friendly,
                data_type: col.data_type.clone(),
                selected: in_plan.is_some(),
                role: in_plan.map(|c| c.role),
                is_primary_key: col.is_primary_key,
                is_nullable: col.is_nullable,
            });
        }
        tables.push(TableOptions { table: sel.table.clone(), alias: sel.alias.clone(), columns });
    }

    log::info!("modification options: {} table(s), {} sortable column(s)", tables.len(), sortable_columns.len());
    ModificationOptions {
        tables,
        current_order_by: plan.order_by.clone(),
        current_limit: plan.limit,
        sortable_columns,
    }
}

/// Friendly column label: `SW_Edition` -> `SW Edition`, `UpdatedBy` ->
/// `Updated By`, `CompanyID` -> `Company ID`.
pub fn display_name(column: &str) -> String {
    if column.contains('_') {
        return column
            .split('_')
            .filter(|p| !p.is_empty())
            .map(|p| if is_acronym(p) { p.to_string() } else { title_case(p) })
            .collect::<Vec<_>>()
            .join(" ");
    }
    let chars: Vec<char> = column.chars().collect();
    let mut spaced = String::with_capacity(column.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        let starts_word = i > 0 && c.is_ascii_uppercase() && chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
        if starts_word && chars[i - 1] != ' ' {
            spaced.push(' ');
        }
        spaced.push(*c);
    }
    TRAILING_ACRONYM.replace(&spaced, "$1 $2").into_owned()
}

fn is_acronym(part: &str) -> bool {
    part.chars().any(|c| c.is_alphabetic()) && !part.chars().any(|c| c.is_lowercase())
}

fn title_case(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut prev_alpha = false;
    for c in part.chars() {
        if c.is_alphabetic() && !prev_alpha {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

impl fmt::Display for ModificationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Modification Options ===")?;
        writeln!(f, "Available Columns:")?;
        for t in &self.tables {
            match &t.alias {
                Some(a) => writeln!(f, "  {} ({}):", t.table, a)?,
                None => writeln!(f, "  {}:", t.table)?,
            }
            for c in &t.columns {
                let mark = if c.selected { "x" } else { " " };
                let role = match c.role {
                    Some(ColumnRole::Projection) => " [projection]",
                    Some(ColumnRole::Filter) => " [filter]",
                    None => "",
                };
                let pk = if c.is_primary_key { " (PK)" } else { "" };
                writeln!(f, "    [{}] {} ({}){}{}", mark, c.name, c.data_type, role, pk)?;
            }
        }
        if self.current_order_by.is_empty() {
            writeln!(f, "Current ORDER BY: None")?;
        } else {
            writeln!(f, "Current ORDER BY:")?;
            for o in &self.current_order_by {
                let dir = match o.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                writeln!(f, "  {}.{} {}", o.table, o.column, dir)?;
            }
        }
        match self.current_limit {
            Some(l) => write!(f, "Current LIMIT: {}", l),
            None => write!(f, "Current LIMIT: None"),
        }
    }
}
