/// Error types for the plot store
use thiserror::Error;

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be opened or its schema could not be applied
    #[error("Failed to open store at {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A statement failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A proximity query ran before the spatial index was prepared
    #[error("Spatial index {0} is missing; prepare it before running proximity queries")]
    SpatialIndexMissing(&'static str),

    /// A document cannot be written as given
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Failed to encode or decode plot attributes
    #[error("Failed to encode plot attributes: {0}")]
    Attributes(#[from] serde_json::Error),

    /// An aggregate returned a value of an unexpected shape
    #[error("Unexpected aggregate value: {0}")]
    UnexpectedValue(String),
}

/// Type alias for Results using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
