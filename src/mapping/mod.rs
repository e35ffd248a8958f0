pub mod symbol;
mod table;

pub use table::FieldMap;
