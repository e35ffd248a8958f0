mod report;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::approval;
use crate::error::{Error, Result};
use crate::mapping::symbol;
use crate::populate::{FillReport, Populator};
use crate::sheet::Row;

pub use report::write_report;

/// How output files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingScheme {
    /// `<Full name>.pdf`
    FullName,
    /// `<Duke Unique ID#>_<Full name>.pdf` (name part optional)
    UniqueId,
}

impl NamingScheme {
    /// The output stem for one row, before sanitization. `None` when the
    /// row lacks the columns the scheme needs.
    fn stem(&self, row: &Row) -> Option<String> {
        let name = row
            .get(symbol::FULL_NAME_COLUMN)
            .map(|cell| cell.stringify())
            .filter(|name| !name.is_empty());
        match self {
            NamingScheme::FullName => name,
            NamingScheme::UniqueId => {
                let id = row
                    .get(symbol::UNIQUE_ID_COLUMN)
                    .map(|cell| cell.stringify())
                    .filter(|id| !id.is_empty())?;
                Some(match name {
                    Some(name) => format!("{id}_{name}"),
                    None => id,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum RowStatus {
    Generated {
        file: PathBuf,
        filled: usize,
        checked: usize,
        notes: Vec<String>,
    },
    Skipped {
        reason: String,
    },
}

/// Outcome of one input row, reported at the end of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    /// 1-based sheet row number (header row is 1).
    pub row: usize,
    pub label: String,
    pub status: RowStatus,
}

/// Drives one batch: rows are processed strictly sequentially, each output
/// fully written before the next row begins. Row-scoped failures are
/// recorded and the batch continues; template and filesystem failures
/// abort the run.
pub struct BatchRunner {
    populator: Populator,
    out_dir: PathBuf,
    approvals: Option<PathBuf>,
    naming: NamingScheme,
}

impl BatchRunner {
    pub fn new(
        populator: Populator,
        out_dir: impl Into<PathBuf>,
        approvals: Option<PathBuf>,
        naming: NamingScheme,
    ) -> BatchRunner {
        BatchRunner {
            populator,
            out_dir: out_dir.into(),
            approvals,
            naming,
        }
    }

    pub fn run(&self, template: &Path, rows: &[Row]) -> Result<Vec<RowOutcome>> {
        fs::create_dir_all(&self.out_dir)?;
        let mut outcomes = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let sheet_row = index + 2;
            let label = row
                .get(symbol::FULL_NAME_COLUMN)
                .map(|cell| cell.stringify())
                .unwrap_or_else(|| format!("row {sheet_row}"));

            let Some(stem) = self.naming.stem(row) else {
                let reason = "row has no value for the output-naming column".to_string();
                tracing::warn!(row = sheet_row, reason = %reason, "skipping row");
                outcomes.push(RowOutcome {
                    row: sheet_row,
                    label,
                    status: RowStatus::Skipped { reason },
                });
                continue;
            };
            let stem = approval::sanitize_file_name(&stem);
            let out = self.out_dir.join(format!("{stem}.pdf"));
            let approval = self
                .approvals
                .as_deref()
                .and_then(|dir| approval::find_for(dir, &stem));

            match self
                .populator
                .populate(template, row, approval.as_deref(), &out)
            {
                Ok(report) => {
                    tracing::info!(row = sheet_row, student = %label, file = %out.display(), "generated");
                    outcomes.push(RowOutcome {
                        row: sheet_row,
                        label,
                        status: generated(out, report),
                    });
                }
                // the whole run is hopeless without a template or a
                // writable output directory
                Err(error @ Error::TemplateNotFound(_)) => return Err(error),
                Err(Error::Io(error)) => return Err(Error::Io(error)),
                Err(error) => {
                    tracing::warn!(row = sheet_row, student = %label, %error, "row failed");
                    outcomes.push(RowOutcome {
                        row: sheet_row,
                        label,
                        status: RowStatus::Skipped {
                            reason: error.to_string(),
                        },
                    });
                }
            }
        }
        Ok(outcomes)
    }
}

fn generated(file: PathBuf, report: FillReport) -> RowStatus {
    RowStatus::Generated {
        file,
        filled: report.filled,
        checked: report.checked,
        notes: report.notes,
    }
}
