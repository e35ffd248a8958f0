mod reader;
mod row;

pub use reader::{read_csv_rows, read_rows, read_xlsx_rows};
pub use row::{Cell, Row};
