//! Schema inference engine for schemaless documents
//!
//! This module derives a field-level schema from sampled RavenDB documents.
//!
//! ## Features
//!
//! - **Classification** - Map every value to one type tag (string, integer, datetime, ...)
//! - **Shape merging** - Fold documents into one field tree with type unions
//! - **Nullability tracking** - Explicit nulls and absent fields both mark a field nullable
//! - **Order independence** - The same documents give the same schema in any order
//!
//! ## Example
//!
//! ```rust,ignore
//! use ravendb_ingest::inference::{InferenceConfig, SchemaInferrer, document_from_json};
//!
//! let docs = vec![
//!     document_from_json(serde_json::json!({"Name": "toy1", "Price": 12.5})).unwrap(),
//!     document_from_json(serde_json::json!({"Name": "toy2", "Price": "n/a"})).unwrap(),
//! ];
//!
//! let schema = SchemaInferrer::infer("Products", &docs, &InferenceConfig::default());
//! println!("{}", serde_json::to_string_pretty(&schema)?);
//! ```

mod classify;
mod config;
mod error;
mod formats;
mod inferrer;
mod merge;
mod types;

pub use classify::{classify, classify_with};
pub use config::{InferenceConfig, InferenceConfigBuilder, METADATA_FIELD};
pub use error::InferenceError;
pub use formats::{Format, detect_format, is_datetime};
pub use inferrer::{InferenceStats, SchemaInferrer};
pub use types::{CollectionSchema, FieldShape, RawDocument, RawValue, TypeTag, document_from_json};
