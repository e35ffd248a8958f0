use std::path::Path;

use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, Workbook};

use crate::error::Result;

use super::{RowOutcome, RowStatus};

const HEADERS: &[&str] = &["Row", "Student", "Status", "Output", "Fields", "Notes"];
const TIMES_NEW_ROMAN: &str = "Times New Roman";

/// Write the per-row outcome summary of a batch as a workbook.
pub fn write_report(outcomes: &[RowOutcome], run_date: NaiveDate, dest: &Path) -> Result<()> {
    let header_format = Format::new()
        .set_background_color(Color::Orange)
        .set_bold()
        .set_font_name(TIMES_NEW_ROMAN);
    let item_format = Format::new().set_font_name(TIMES_NEW_ROMAN);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(format!("Outcomes {run_date}"))?;

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(outcomes.len() + 1);
    rows.push(HEADERS.iter().map(|header| header.to_string()).collect());
    for outcome in outcomes {
        rows.push(outcome_row(outcome));
    }

    for (index, item) in rows.iter().enumerate() {
        let format = if index.eq(&0) {
            &header_format
        } else {
            &item_format
        };
        worksheet.write_row_with_format(index as u32, 0, item.to_vec(), format)?;
    }
    worksheet.autofit();
    workbook.save(dest)?;
    Ok(())
}

fn outcome_row(outcome: &RowOutcome) -> Vec<String> {
    match &outcome.status {
        RowStatus::Generated {
            file,
            filled,
            checked,
            notes,
        } => vec![
            outcome.row.to_string(),
            outcome.label.clone(),
            "generated".to_string(),
            file.display().to_string(),
            format!("{} filled, {} checked", filled, checked),
            notes.join("; "),
        ],
        RowStatus::Skipped { reason } => vec![
            outcome.row.to_string(),
            outcome.label.clone(),
            "skipped".to_string(),
            String::new(),
            String::new(),
            reason.clone(),
        ],
    }
}
