use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop the analysis. None of these are recovered from;
/// they travel up to `main` and end the run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to read {path}: {source}")]
    DataAccess {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed record: {0}")]
    Malformed(#[from] csv::Error),

    #[error("Column `{0}` not found in input table")]
    MissingColumn(String),

    #[error("Input table has no rows")]
    EmptyTable,

    #[error("Row {row}: cannot interpret `{value}` as a date")]
    InvalidDate { row: usize, value: String },

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to render {figure}: {message}")]
    Render { figure: String, message: String },
}

pub type Result<T> = core::result::Result<T, AnalysisError>;
