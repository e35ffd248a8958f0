use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One spreadsheet record, keyed by the exact header strings of the sheet.
/// Header whitespace is preserved as-is; some templates map columns whose
/// names carry incidental leading spaces (e.g. " Class Number #").
pub type Row = BTreeMap<String, Cell>;

/// A scalar spreadsheet value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    /// Render the cell the way it is written into a form field.
    ///
    /// Integral numbers drop the trailing `.0` so an ID column read from
    /// xlsx as `3614.0` comes back as `3614`.
    pub fn stringify(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Cell::Empty => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Text(s) => s.is_empty(),
            Cell::Number(_) => false,
            Cell::Empty => true,
        }
    }
}
