mod appearance;
mod decoder;
mod populator;

pub use populator::{FillReport, Populator};
