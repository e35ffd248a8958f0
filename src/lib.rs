mod approval;
mod batch;
mod bundle;
mod error;
mod mapping;
mod populate;
mod sheet;

pub use approval::{convert_image, find_for, sanitize_file_name};
pub use batch::{write_report, BatchRunner, NamingScheme, RowOutcome, RowStatus};
pub use bundle::zip_dir;
pub use error::{Error, Result};
pub use mapping::{symbol, FieldMap};
pub use populate::{FillReport, Populator};
pub use sheet::{read_rows, Cell, Row};
