use std::path::PathBuf;
use thiserror::Error;

use crate::models::DataIssue;

/// All errors produced by the cohort KPI crates.
#[derive(Error, Debug)]
pub enum CohortError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A granularity name is not one of daily/weekly/monthly/quarterly/yearly.
    #[error("Unknown granularity: {0}")]
    UnknownGranularity(String),

    /// An aggregation function name is not one of mean/sum/count/min/max.
    #[error("Unknown aggregation function: {0}")]
    UnknownAggregation(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The input path given to the loader does not exist.
    #[error("Input path not found: {0}")]
    InputPathNotFound(PathBuf),

    /// No JSON / JSONL input files were found under the given directory.
    #[error("No input files found in {0}")]
    NoInputFiles(PathBuf),

    /// A row failed a data-quality check while the strict policy was active.
    #[error("Data error: {0}")]
    Data(DataIssue),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CohortError {
    /// `true` for errors caused by the caller's configuration rather than the data.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CohortError::UnknownGranularity(_)
                | CohortError::UnknownAggregation(_)
                | CohortError::Config(_)
        )
    }
}

/// Convenience alias used throughout the cohort crates.
pub type Result<T> = std::result::Result<T, CohortError>;
