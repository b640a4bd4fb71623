//! Error types for schema inference

use thiserror::Error;

/// Errors that can occur while classifying or merging document values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// The value has no representation in the emitted metadata
    #[error("Unsupported value: {representation}")]
    UnsupportedValue { representation: String },
}

impl InferenceError {
    /// Create an unsupported-value error naming the value's runtime representation
    pub fn unsupported(representation: impl Into<String>) -> Self {
        InferenceError::UnsupportedValue {
            representation: representation.into(),
        }
    }
}
