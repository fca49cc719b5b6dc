//! Error types for pgmap

use thiserror::Error;

/// Result type alias for pgmap operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for mapping and upsert operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// The record type cannot receive rows (empty or inconsistent descriptor)
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The query failed to execute
    #[error("Query error: {0}")]
    Query(#[source] tokio_postgres::Error),

    /// A column value could not be decoded
    #[error("Scan error on column '{column}': {message}")]
    Scan { column: String, message: String },

    /// The decoded row could not be reshaped into the record
    #[error("Projection error: {0}")]
    Projection(String),

    /// No field of the record resolves to the required column tag
    #[error("Tag lookup error: {record} has no field tagged '{tag}'")]
    TagLookup {
        record: &'static str,
        tag: &'static str,
    },

    /// The store rejected a write statement
    #[error("Execution error: {0}")]
    Execution(#[source] tokio_postgres::Error),

    /// Invalid caller input (identifiers and similar)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or malformed connection configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl OrmError {
    /// Create a scan error for a specific column
    pub fn scan(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Scan {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an invalid target error
    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::InvalidTarget(message.into())
    }

    /// Create a projection error
    pub fn projection(message: impl Into<String>) -> Self {
        Self::Projection(message.into())
    }

    /// Create a tag lookup error
    pub fn tag_lookup(record: &'static str, tag: &'static str) -> Self {
        Self::TagLookup { record, tag }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a tag lookup error
    pub fn is_tag_lookup(&self) -> bool {
        matches!(self, Self::TagLookup { .. })
    }

    /// Check if this is an invalid target error
    pub fn is_invalid_target(&self) -> bool {
        matches!(self, Self::InvalidTarget(_))
    }

    /// Check if this is a scan error
    pub fn is_scan(&self) -> bool {
        matches!(self, Self::Scan { .. })
    }

    /// Check if this is a projection error
    pub fn is_projection(&self) -> bool {
        matches!(self, Self::Projection(_))
    }

    /// The driver error behind a query or execution failure, if any.
    pub fn db_error(&self) -> Option<&tokio_postgres::error::DbError> {
        match self {
            Self::Query(err) | Self::Execution(err) => err.as_db_error(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Projection(err.to_string())
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
