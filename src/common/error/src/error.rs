//! Core error types for Basket.

use thiserror::Error;

/// Result type alias using `BasketError`.
pub type BasketResult<T> = std::result::Result<T, BasketError>;

/// Core error type for Basket operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BasketError {
    /// Two relations disagree on shape where they must not (union inputs,
    /// join/group key types).
    #[error("SchemaMismatch: {0}")]
    SchemaMismatch(String),

    /// Column not found in a relation's schema.
    #[error("ColumnNotFound: {0}")]
    ColumnNotFound(String),

    /// Type mismatch or invalid type operation.
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Analysis execution error.
    #[error("ExecutionError: {0}")]
    ExecutionError(String),

    /// Storage layer error (loader or materializer).
    #[error("StorageError: {0}")]
    StorageError(String),

    /// Invalid parameter provided.
    #[error("InvalidParameter: {0}")]
    InvalidParameter(String),

    /// IO error.
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),

    /// Arrow error.
    #[error("ArrowError: {0}")]
    ArrowError(#[from] arrow_schema::ArrowError),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl BasketError {
    /// Create a new `SchemaMismatch`.
    pub fn schema_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    /// Create a new `ColumnNotFound`.
    pub fn column_not_found<S: Into<String>>(msg: S) -> Self {
        Self::ColumnNotFound(msg.into())
    }

    /// Create a new `TypeError`.
    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a new `ExecutionError`.
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::ExecutionError(msg.into())
    }

    /// Create a new `StorageError`.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::StorageError(msg.into())
    }

    /// Create a new `InvalidParameter` error.
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a resource exhausted error (using `ExecutionError`).
    pub fn resource_exhausted<S: Into<String>>(msg: S) -> Self {
        Self::ExecutionError(format!("ResourceExhausted: {}", msg.into()))
    }
}

/// Ensure a condition holds, returning the named error variant if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::BasketError::ExecutionError($msg.to_string()));
        }
    };
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::BasketError::$variant(format!($($msg)*)));
        }
    };
}
