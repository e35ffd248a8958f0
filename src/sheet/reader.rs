use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;

use crate::error::{Error, Result};

use super::row::{Cell, Row};

/// Read a tabular file into rows, dispatching on the file extension.
///
/// The first row supplies the column headers; header names are kept
/// exactly as written, including incidental whitespace. Blank cells are
/// omitted from the row map so "column present" means "has a value".
pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => read_xlsx_rows(path),
        "csv" => read_csv_rows(path),
        other => Err(Error::UnsupportedSheet(other.to_string())),
    }
}

/// Read the first worksheet of a workbook into rows.
pub fn read_xlsx_rows(path: &Path) -> Result<Vec<Row>> {
    let mut workbook = open_workbook_auto(path)?;
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::UnsupportedSheet("workbook has no sheets".to_string()))?;
    let range = workbook.worksheet_range(&name)?;

    let mut data_rows = range.rows();
    let headers: Vec<String> = match data_rows.next() {
        Some(header_row) => header_row.iter().map(header_string).collect(),
        None => return Ok(vec![]),
    };

    let mut rows = Vec::new();
    for data_row in data_rows {
        let mut row = Row::new();
        for (index, data) in data_row.iter().enumerate() {
            let Some(header) = headers.get(index) else {
                continue;
            };
            let cell = convert(data);
            if !cell.is_empty() {
                row.insert(header.clone(), cell);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Read a CSV file into rows. Handles a BOM on the first header.
pub fn read_csv_rows(path: &Path) -> Result<Vec<Row>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        for (index, value) in record.iter().enumerate() {
            let Some(header) = headers.get(index) else {
                continue;
            };
            if !value.is_empty() {
                row.insert(header.clone(), Cell::Text(value.to_string()));
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

fn convert(data: &Data) -> Cell {
    match data {
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Cell::Text(naive.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Cell::Empty,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

fn header_string(data: &Data) -> String {
    match data {
        // keep header text verbatim, spaces included
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}
