//! Error types for ingestion runs
//!
//! Per-collection failures are recorded in the report and never surface
//! here; an [`IngestError`] ends the run.

use std::path::PathBuf;
use thiserror::Error;

use super::config::ConfigError;
use crate::emitter::EmissionError;
use crate::source::SourceError;

/// Errors that abort an ingestion run
#[derive(Error, Debug)]
pub enum IngestError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server or database level client failure
    #[error("Database error: {0}")]
    Source(#[from] SourceError),

    /// Record emission failed
    #[error("Emission error: {0}")]
    Emission(#[from] EmissionError),

    /// Sink could not take the records
    #[error("Sink error: {0}")]
    Sink(String),

    /// IO error with path context
    #[error("IO error with {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A collection task panicked or was aborted
    #[error("Collection task failed: {0}")]
    Task(String),

    /// Run cancelled
    #[error("Ingestion cancelled")]
    Cancelled,
}

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if a later run could succeed without changes
    pub fn is_recoverable(&self) -> bool {
        match self {
            IngestError::Source(err) => err.is_transient(),
            IngestError::Io { .. } => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            IngestError::Config(err) => {
                format!("{err}\n\nHint: Check the recipe file and its source config.")
            }
            IngestError::Source(SourceError::Tls(msg)) => {
                format!(
                    "TLS configuration error: {msg}\n\nHint: certificate_file_path must point to a PEM file holding the certificate and its private key."
                )
            }
            IngestError::Source(err) if err.is_transient() => {
                format!("{err}\n\nHint: Check that connect_uri is reachable and retry.")
            }
            IngestError::Emission(EmissionError::EmptyTypeSet { path }) => {
                format!(
                    "Internal error: field '{path}' was emitted without a type. Please report this."
                )
            }
            IngestError::Cancelled => "Ingestion cancelled by user.".to_string(),
            _ => self.to_string(),
        }
    }
}
