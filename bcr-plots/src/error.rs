/// Error types for plot ingestion
use thiserror::Error;

/// Main error type for reading plot source files
#[derive(Error, Debug)]
pub enum PlotError {
    /// Failed to parse CSV data
    #[error("Failed to parse CSV: {0}")]
    CsvParse(#[from] csv::Error),

    /// The source has no header row to name its columns
    #[error("Plot CSV has no header row")]
    MissingHeaders,
}

/// Type alias for Results using PlotError
pub type Result<T> = std::result::Result<T, PlotError>;
