//! Read-only schema snapshot supplied by the caller. Lookups are
//! case-insensitive; the schema's own spelling is the canonical one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::SchemaValidationError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ColumnSchema {
    #[serde(alias = "column_name")]
    pub name: String,
    #[serde(rename = "type", alias = "data_type", default)]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
}

fn default_nullable() -> bool { true }

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self { name: name.into(), data_type: data_type.into(), is_nullable: true, is_primary_key: false }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    /// Coarse value kind of the declared SQL type, as carried on
    /// [`SelectedColumn::value_type`](super::structs::SelectedColumn).
    pub fn value_type(&self) -> &'static str {
        let t = self.data_type.to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| t.contains(n));
        if has(&["int", "serial"]) {
            "integer"
        } else if has(&["float", "double", "decimal", "numeric", "real", "money"]) {
            "number"
        } else if has(&["bool", "bit"]) {
            "boolean"
        } else if has(&["datetime", "timestamp"]) {
            "datetime"
        } else if has(&["date"]) {
            "date"
        } else if has(&["char", "text"]) {
            "string"
        } else {
            "unknown"
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ForeignKey {
    #[serde(alias = "column_name")]
    pub column: String,
    #[serde(alias = "referenced_table_name")]
    pub referenced_table: String,
    #[serde(alias = "referenced_column_name")]
    pub referenced_column: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TableSchema {
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn with_columns(columns: Vec<ColumnSchema>) -> Self {
        Self { columns, foreign_keys: Vec::new() }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Mapping from table name to its columns and foreign keys.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Schema {
    tables: BTreeMap<String, TableSchema>,
}

impl Schema {
    pub fn new() -> Self { Self::default() }

    pub fn with_table(mut self, name: impl Into<String>, table: TableSchema) -> Self {
        self.insert(name, table);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, table: TableSchema) {
        self.tables.insert(name.into(), table);
    }

    /// Accepts the list form used by introspection (`[{table_name, columns}]`).
    pub fn from_table_list(json: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Entry {
            table_name: String,
            #[serde(flatten)]
            table: TableSchema,
        }
        let entries: Vec<Entry> = serde_json::from_str(json)?;
        Ok(Self { tables: entries.into_iter().map(|e| (e.table_name, e.table)).collect() })
    }

    pub fn len(&self) -> usize { self.tables.len() }

    pub fn is_empty(&self) -> bool { self.tables.is_empty() }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Returns the canonical table name with its definition.
    pub fn table(&self, name: &str) -> Option<(&str, &TableSchema)> {
        if let Some((k, v)) = self.tables.get_key_value(name) {
            return Some((k.as_str(), v));
        }
        self.tables
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn has_table(&self, name: &str) -> bool { self.table(name).is_some() }

    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnSchema> {
        self.table(table).and_then(|(_, t)| t.column(column))
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool { self.column(table, column).is_some() }

    pub fn require_column(&self, table: &str, column: &str) -> Result<&ColumnSchema, SchemaValidationError> {
        let (_, t) = self.table(table).ok_or_else(|| SchemaValidationError::UnknownTable(table.to_string()))?;
        t.column(column).ok_or_else(|| SchemaValidationError::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
    }

    /// Subset of the schema restricted to the given tables (unknown names are skipped).
    pub fn restricted_to<'a>(&self, tables: impl IntoIterator<Item = &'a str>) -> Schema {
        let mut out = Schema::new();
        for name in tables {
            if let Some((canonical, t)) = self.table(name) {
                out.tables.entry(canonical.to_string()).or_insert_with(|| t.clone());
            }
        }
        out
    }
}
