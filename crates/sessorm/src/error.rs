//! Error types for sessorm

use std::time::Duration;
use thiserror::Error;

/// Result type alias for sessorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Boxed error raised by an injected driver.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for statement building, caching and execution
#[derive(Debug, Error)]
pub enum OrmError {
    /// A template's `?` count does not match its bound values
    #[error("placeholder mismatch in `{spec}`: {placeholders} placeholder(s), {values} value(s)")]
    PlaceholderMismatch {
        spec: String,
        placeholders: usize,
        values: usize,
    },

    /// UPDATE without any assignment
    #[error("update statement has an empty SET clause")]
    EmptySet,

    /// ORDER BY entry that is not `ident [ASC|DESC]`
    #[error("invalid ORDER BY entry: {0}")]
    InvalidOrder(String),

    /// IN / NOT IN with an empty value list
    #[error("{0} requires at least one value")]
    EmptyValueList(&'static str),

    /// INSERT without any row
    #[error("insert statement has no rows")]
    EmptyInsert,

    /// Identity cache key could not be derived
    #[error("cache key error: {0}")]
    CacheKey(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transaction state error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Error passed through from the driver
    #[error("Driver error: {0}")]
    Driver(#[source] DriverError),

    /// Statement exceeded the caller-supplied deadline
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a cache key error
    pub fn cache_key(message: impl Into<String>) -> Self {
        Self::CacheKey(message.into())
    }

    /// Wrap a driver error
    pub fn driver<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Driver(Box::new(err))
    }

    /// Check if this error was raised while building a statement
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::PlaceholderMismatch { .. }
                | Self::EmptySet
                | Self::InvalidOrder(_)
                | Self::EmptyValueList(_)
                | Self::EmptyInsert
        )
    }

    /// Check if this is a cache key error
    pub fn is_cache_key_error(&self) -> bool {
        matches!(self, Self::CacheKey(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this error came from the driver
    pub fn is_driver_error(&self) -> bool {
        matches!(self, Self::Driver(_))
    }

    pub(crate) fn placeholder_mismatch(spec: &str, placeholders: usize, values: usize) -> Self {
        Self::PlaceholderMismatch {
            spec: spec.to_string(),
            placeholders,
            values,
        }
    }
}

impl Clone for OrmError {
    // Driver errors are not `Clone`; an errored expression may be built more than once.
    fn clone(&self) -> Self {
        match self {
            Self::PlaceholderMismatch {
                spec,
                placeholders,
                values,
            } => Self::PlaceholderMismatch {
                spec: spec.clone(),
                placeholders: *placeholders,
                values: *values,
            },
            Self::EmptySet => Self::EmptySet,
            Self::InvalidOrder(s) => Self::InvalidOrder(s.clone()),
            Self::EmptyValueList(s) => Self::EmptyValueList(*s),
            Self::EmptyInsert => Self::EmptyInsert,
            Self::CacheKey(s) => Self::CacheKey(s.clone()),
            Self::NotFound(s) => Self::NotFound(s.clone()),
            Self::Decode { column, message } => Self::Decode {
                column: column.clone(),
                message: message.clone(),
            },
            Self::Validation(s) => Self::Validation(s.clone()),
            Self::Transaction(s) => Self::Transaction(s.clone()),
            Self::Driver(e) => Self::Other(e.to_string()),
            Self::Timeout(d) => Self::Timeout(*d),
            Self::Other(s) => Self::Other(s.clone()),
        }
    }
}
