use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use registrar::{
    read_rows, write_report, zip_dir, BatchRunner, FieldMap, NamingScheme, Populator, RowStatus,
};

/// Fill a PDF enrollment form template from spreadsheet rows, one output
/// PDF per row, with optional approval pages and zip bundling.
#[derive(Parser)]
#[command(name = "registrar", version)]
struct Args {
    /// Enrollment spreadsheet (.xlsx or .csv), first row = column headers
    sheet: PathBuf,
    /// PDF form template
    template: PathBuf,
    /// Directory for the generated PDFs
    #[arg(long, default_value = "results")]
    out_dir: PathBuf,
    /// JSON field-mapping file overriding the built-in table
    #[arg(long)]
    mapping: Option<PathBuf>,
    /// Directory of per-enrollee approval pages (pdf or screenshot)
    #[arg(long)]
    approvals: Option<PathBuf>,
    /// Bundle the output directory into this zip archive
    #[arg(long)]
    archive: Option<PathBuf>,
    /// Write the per-row outcome summary workbook here
    #[arg(long)]
    report: Option<PathBuf>,
    /// Output file naming scheme
    #[arg(long, value_enum, default_value_t = NameBy::FullName)]
    name_by: NameBy,
}

#[derive(Clone, Copy, ValueEnum)]
enum NameBy {
    FullName,
    UniqueId,
}

impl From<NameBy> for NamingScheme {
    fn from(value: NameBy) -> Self {
        match value {
            NameBy::FullName => NamingScheme::FullName,
            NameBy::UniqueId => NamingScheme::UniqueId,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let run_date = chrono::Local::now().date_naive();

    let map = match &args.mapping {
        Some(path) => FieldMap::from_json_file(path)
            .with_context(|| format!("load mapping {}", path.display()))?,
        None => FieldMap::default(),
    };

    let rows = read_rows(&args.sheet)
        .with_context(|| format!("read spreadsheet {}", args.sheet.display()))?;
    tracing::info!(rows = rows.len(), sheet = %args.sheet.display(), "loaded spreadsheet");

    let runner = BatchRunner::new(
        Populator::new(map),
        args.out_dir.clone(),
        args.approvals.clone(),
        args.name_by.into(),
    );
    let outcomes = runner.run(&args.template, &rows)?;

    let generated = outcomes
        .iter()
        .filter(|o| matches!(o.status, RowStatus::Generated { .. }))
        .count();
    tracing::info!(
        generated,
        skipped = outcomes.len() - generated,
        "batch finished"
    );

    if let Some(report) = &args.report {
        write_report(&outcomes, run_date, report)
            .with_context(|| format!("write report {}", report.display()))?;
    }
    if let Some(archive) = &args.archive {
        zip_dir(&args.out_dir, archive)
            .with_context(|| format!("write archive {}", archive.display()))?;
    }
    Ok(())
}
