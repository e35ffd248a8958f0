use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};

/// Built-in table for the stock enrollment template. Text fields map to
/// spreadsheet columns; checkbox fields (session slots, credit/audit) map
/// to the sentinel label their driving column is compared against.
const DEFAULT_TABLE: &[(&str, &str)] = &[
    ("name", "Full name"),
    ("duke_id", "Duke Unique ID#"),
    ("class_number", " Class Number #"),
    ("schedule", "Course Schedule"),
    ("email", "Duke e-mail address"),
    ("fall_1", "Fall-1"),
    ("fall_2", "Fall-2"),
    ("spring_1", "Spring-1"),
    ("spring_2", "Spring-2"),
    ("date", "Timestamp"),
    ("date_2", "Timestamp"),
    ("date_sign", "Timestamp"),
    ("credit", "Credit"),
    ("audit", "Audit"),
];

/// Immutable table from PDF field identifier to spreadsheet column name.
/// Built once at startup and never mutated; lookups that miss return
/// `None` rather than failing.
#[derive(Debug, Clone)]
pub struct FieldMap {
    table: BTreeMap<String, String>,
}

impl Default for FieldMap {
    fn default() -> Self {
        FieldMap::from_pairs(DEFAULT_TABLE.iter().copied())
    }
}

impl FieldMap {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let table = pairs
            .into_iter()
            .map(|(field, column)| (field.to_string(), column.to_string()))
            .collect();
        FieldMap { table }
    }

    /// Load a replacement table from a JSON object file
    /// (`{"field_id": "Column name"}`), for template revisions whose
    /// identifiers differ from the built-in table.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let table: BTreeMap<String, String> =
            serde_json::from_reader(file).map_err(|e| Error::Mapping {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(FieldMap { table })
    }

    /// Resolve a field identifier to its spreadsheet column (or sentinel
    /// label). `None` means the template field carries no data.
    pub fn resolve(&self, field_id: &str) -> Option<&str> {
        self.table.get(field_id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
