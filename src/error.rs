//! Unified error hierarchy for leanrs
//!
//! The analytics engine itself is total and never fails; errors only arise at the
//! boundaries (input validation, storage, export). Configuration failures go
//! through `anyhow` in the config layer.

use thiserror::Error;

/// Top-level error type for all leanrs operations
#[derive(Debug, Error)]
pub enum LeanRsError {
    /// Rejected user input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Errors from the JSON document store
#[derive(Debug, Error)]
pub enum StorageError {
    /// Document has never been written
    #[error("No saved document for key: {key}")]
    NotFound { key: String },

    /// Document exists but cannot be decoded
    #[error("Corrupted document {key}: {reason}")]
    Corrupted { key: String, reason: String },

    /// Value could not be encoded
    #[error("Failed to serialize {key}: {reason}")]
    Serialization { key: String, reason: String },

    /// Underlying filesystem error
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// Unsupported format
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// Serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// CSV writer failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Writing the output failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for leanrs operations
pub type Result<T> = std::result::Result<T, LeanRsError>;

impl LeanRsError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LeanRsError::Validation(_) => ErrorSeverity::Warning,
            LeanRsError::Storage(StorageError::NotFound { .. }) => ErrorSeverity::Info,
            LeanRsError::Storage(StorageError::Corrupted { .. }) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            LeanRsError::Validation(reason) => format!("Please check your input: {}", reason),
            LeanRsError::Storage(StorageError::NotFound { .. }) => {
                "No tracker data yet. Run `leanrs init` to get started.".to_string()
            }
            LeanRsError::Storage(StorageError::Corrupted { key, .. }) => {
                format!(
                    "Saved data for {} could not be read. Run `leanrs reset` to start over.",
                    key
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}
