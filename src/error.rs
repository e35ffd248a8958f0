use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the library. Only template and filesystem failures
/// are meant to abort a whole batch; everything else is row-scoped.
#[derive(Debug, Error)]
pub enum Error {
    #[error("template not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("spreadsheet error: {0}")]
    Sheet(#[from] calamine::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported spreadsheet format: {0}")]
    UnsupportedSheet(String),

    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("report error: {0}")]
    Report(#[from] rust_xlsxwriter::XlsxError),

    #[error("mapping file {path}: {message}")]
    Mapping { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for all library operations.
pub type Result<T> = std::result::Result<T, Error>;
