//! Input and output for CMC evaluation.
//!
//! - **CSV** — similarity-matrix loading and curve export, via the `csv`
//!   feature (enabled by default)
//! - **JSON** — curve reports with summary statistics

#[cfg(feature = "csv")]
pub mod csv;

pub mod report;

#[cfg(feature = "csv")]
pub use crate::csv::{parse_similarity_matrix, read_similarity_matrix, write_curve_csv, CsvMatrixOptions};
pub use report::{curve_to_json, CurveReport};
