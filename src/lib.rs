//! RavenDB ingestion source - catalog metadata with sampling-based schema inference
//!
//! Provides:
//! - Schema inference over schemaless documents (type unions, optional fields, nesting)
//! - Document sampling (head or seeded reservoir)
//! - Database clients (RavenDB REST API, in-memory)
//! - Metadata records for a downstream catalog
//! - Ingestion runs driven by YAML/TOML recipes

pub mod emitter;
pub mod inference;
pub mod ingest;
pub mod sampling;
pub mod source;

// Re-export commonly used types
pub use inference::{
    CollectionSchema, FieldShape, InferenceConfig, InferenceError, RawDocument, RawValue,
    SchemaInferrer, TypeTag, classify,
};
pub use sampling::{SampleLimit, Sampler, SamplingError, SamplingPolicy};
pub use source::{
    CollectionInfo, DatabaseClient, DocumentCursor, IndexMetadata, InMemoryDatabase,
    InMemoryServer, ServerClient, SourceError,
};
#[cfg(feature = "http-client")]
pub use source::{ConnectionSettings, RavenDbServer};

pub use emitter::{
    CollectionMetadata, DatasetRecord, EmissionError, LogicalType, MetadataEmitter,
    MetadataRecord, SchemaField, WorkUnit,
};
pub use ingest::{
    AllowDenyPattern, IngestError, IngestionReport, RavenDbConfig, RavenDbSource, Recipe,
    RecordSink,
};
