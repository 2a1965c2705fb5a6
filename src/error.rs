//! Error types for scratch-query.

/// Result type for scratch-query operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while querying or printing a collection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection string could not be parsed or the server did not answer.
    #[error("unable to connect to mongodb: {0}")]
    Connection(String),

    /// A find, count or aggregate call failed, or returned a malformed row.
    #[error("query failed: {0}")]
    Query(String),

    /// Invalid configuration value or file.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A dump file line could not be read or decoded.
    #[error("dump line {line}: {message}")]
    Dump { line: usize, message: String },

    /// Building a table frame failed.
    #[error("frame error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn query(err: mongodb::error::Error) -> Self {
        Error::Query(err.to_string())
    }
}
