//! Error types for procontext

use std::path::PathBuf;
use thiserror::Error;

use crate::source::HostError;

/// Main error type for procontext
#[derive(Debug, Error)]
pub enum ProContextError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(String),

    /// Host object model error
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    /// The export was cancelled cooperatively
    #[error("Operation was cancelled")]
    Cancelled,

    /// No project is open in the host
    #[error("No project is currently open")]
    NoProject,

    /// Another export holds the export lock
    #[error("Another export is already in progress")]
    ExportInProgress,

    /// Prior snapshot output could not be removed
    #[error("Failed to clear previous snapshot output: {0}")]
    Cleanup(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No exported bundle could be located
    #[error("No export bundle found under {0}")]
    BundleNotFound(PathBuf),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProContextError>,
    },
}

impl ProContextError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProContextError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error (or the error it wraps) is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            ProContextError::Cancelled => true,
            ProContextError::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Result type alias for procontext
pub type Result<T> = std::result::Result<T, ProContextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProContextError::NoProject.to_string(),
            "No project is currently open"
        );
        assert_eq!(
            ProContextError::ExportInProgress.to_string(),
            "Another export is already in progress"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = ProContextError::Config("bad sample_row_count".to_string());
        let err = err.with_context("Failed to load config");
        assert!(err.to_string().contains("Failed to load config"));
    }

    #[test]
    fn test_cancelled_through_context() {
        let err = ProContextError::Cancelled.with_context("collecting maps");
        assert!(err.is_cancelled());
        assert!(!ProContextError::NoProject.is_cancelled());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ProContextError = io_err.into();
        assert!(matches!(err, ProContextError::Io(_)));
    }
}
