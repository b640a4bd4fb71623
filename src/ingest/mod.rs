//! Ingestion orchestration
//!
//! Drives one run over a RavenDB server:
//!
//! 1. List databases, drop those the database pattern rejects
//! 2. Emit a platform instance record per database with its statistics
//! 3. List collections, drop `@hilo` and those the collection pattern rejects
//! 4. Sample and infer every remaining collection in parallel
//! 5. Emit one dataset record per collection, in collection name order
//!
//! A collection that cannot be sampled is logged, recorded in the report and
//! skipped; the other collections are unaffected. Emission errors and
//! cancellation end the run.

pub mod config;
mod error;
mod report;
pub mod sink;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::emitter::{CollectionMetadata, MetadataEmitter, MetadataRecord, WorkUnit};
use crate::inference::{CollectionSchema, InferenceConfig, InferenceStats, SchemaInferrer};
use crate::sampling::{SampleLimit, Sampler, SamplingError};
use crate::source::{CollectionInfo, DatabaseClient, ServerClient};

pub use config::{
    AllowDenyPattern, ConfigError, PatternFilter, RavenDbConfig, Recipe, SinkSpec, SourceSpec,
};
pub use error::{IngestError, IngestResult};
pub use report::{IngestionReport, ReportEntry};
pub use sink::{ConsoleSink, FileSink, MemorySink, RecordSink};

/// Collections that never describe user data
pub const DENIED_COLLECTIONS: &[&str] = &["@hilo"];

/// Result of one collection task
struct CollectionOutcome {
    info: CollectionInfo,
    result: Result<Option<(CollectionSchema, InferenceStats)>, SamplingError>,
}

/// RavenDB ingestion source
pub struct RavenDbSource {
    config: RavenDbConfig,
    server: Arc<dyn ServerClient>,
    cancel: CancellationToken,
}

impl RavenDbSource {
    /// Create a source over any server client
    pub fn new(config: RavenDbConfig, server: Arc<dyn ServerClient>) -> IngestResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            server,
            cancel: CancellationToken::new(),
        })
    }

    /// Create a source talking to the server named by `connect_uri`
    #[cfg(feature = "http-client")]
    pub fn connect(config: RavenDbConfig) -> IngestResult<Self> {
        config.validate()?;
        let server = crate::source::RavenDbServer::connect(&config.connection_settings())?;
        Self::new(config, Arc::new(server))
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RavenDbConfig {
        &self.config
    }

    /// Run the ingestion, handing every work unit to `sink`
    pub async fn run(&self, sink: &mut dyn RecordSink) -> IngestResult<IngestionReport> {
        let start = Instant::now();
        let mut report = IngestionReport::new();
        let database_filter = self.config.database_pattern.compile()?;
        let collection_filter = self.config.collection_pattern.compile()?;
        let emitter = self.config.emitter();

        info!(
            run_id = %report.run_id,
            uri = %self.config.connect_uri,
            policy = %self.config.sampling_policy,
            sampling_size = self.config.schema_sampling_size,
            "Starting RavenDB ingestion"
        );

        let mut databases = self.server.list_databases().await?;
        databases.sort();
        debug!(count = databases.len(), "Found databases");

        for database in databases {
            if self.cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }
            if !database_filter.allowed(&database) {
                debug!(database = %database, "Dropping database");
                report.report_dropped(database);
                continue;
            }

            let span = info_span!("database", name = %database);
            self.ingest_database(&database, &collection_filter, &emitter, sink, &mut report)
                .instrument(span)
                .await?;
        }

        sink.close().await?;
        report.finish();
        info!(
            run_id = %report.run_id,
            duration_ms = start.elapsed().as_millis() as u64,
            attempted = report.collections_attempted,
            succeeded = report.collections_succeeded,
            work_units = report.work_units,
            "Ingestion finished"
        );
        Ok(report)
    }

    /// Run the ingestion and keep the work units in memory
    pub async fn collect(&self) -> IngestResult<(Vec<WorkUnit>, IngestionReport)> {
        let mut sink = MemorySink::new();
        let report = self.run(&mut sink).await?;
        Ok((sink.units(), report))
    }

    async fn ingest_database(
        &self,
        database: &str,
        collection_filter: &PatternFilter,
        emitter: &MetadataEmitter,
        sink: &mut dyn RecordSink,
        report: &mut IngestionReport,
    ) -> IngestResult<()> {
        let client = match self.server.database(database) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Failed to open database");
                report.report_failure(database, e.to_string());
                return Ok(());
            }
        };

        // the database is catalogued even when it has no collections
        let stats = match client.database_statistics().await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Failed to read database statistics");
                report.report_failure(database, e.to_string());
                return Ok(());
            }
        };
        let external_url = self.server.external_url();
        let record = emitter.emit_platform_instance(database, &stats, external_url.as_deref())?;
        self.write(sink, report, emitter.platform_instance_work_unit_id(database), record)
            .await?;

        let collections = match client.list_collections().await {
            Ok(collections) => collections,
            Err(e) => {
                error!(error = %e, "Failed to list collections");
                report.report_failure(database, e.to_string());
                return Ok(());
            }
        };
        debug!(count = collections.len(), "Found collections");

        let mut selected = Vec::new();
        for info in collections {
            if DENIED_COLLECTIONS.contains(&info.name.as_str()) {
                continue;
            }
            if !collection_filter.allowed(&info.name) {
                debug!(collection = %info.name, "Dropping collection");
                report.report_dropped(format!("{}.{}", database, info.name));
                continue;
            }
            selected.push(info);
        }

        let mut outcomes = self.process_collections(&client, selected).await?;
        if self.cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        outcomes.sort_by(|a, b| a.info.name.cmp(&b.info.name));

        for outcome in outcomes {
            report.collections_attempted += 1;
            let metadata = CollectionMetadata::new(database, &outcome.info.name)
                .with_document_count(outcome.info.document_count);
            let dataset_name = metadata.dataset_name();

            let record = match outcome.result {
                Ok(Some((schema, inference))) => {
                    if inference.values_rejected > 0 {
                        report.values_rejected += inference.values_rejected;
                        report.report_warning(
                            &dataset_name,
                            format!(
                                "Rejected {} unsupported values at {}",
                                inference.values_rejected,
                                inference
                                    .rejected_paths
                                    .iter()
                                    .cloned()
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            ),
                        );
                    }
                    emitter.emit(&schema, &metadata, &stats.indexes)?
                }
                Ok(None) => emitter.emit_without_schema(&metadata, &stats.indexes)?,
                Err(SamplingError::Cancelled(_)) => return Err(IngestError::Cancelled),
                Err(e) => {
                    error!(collection = %outcome.info.name, error = %e, "Skipping collection");
                    report.report_failure(&dataset_name, e.to_string());
                    continue;
                }
            };

            if let Some(dataset) = record.as_dataset().filter(|d| d.is_downsampled()) {
                let fields = dataset
                    .properties
                    .custom_properties
                    .get(crate::emitter::PROP_TOTAL_FIELDS)
                    .cloned()
                    .unwrap_or_default();
                warn!(
                    collection = %outcome.info.name,
                    fields = %fields,
                    max = self.config.max_schema_size,
                    "Downsampled collection schema"
                );
                report.report_warning(
                    &dataset.urn,
                    format!(
                        "Downsampling the collection schema of '{}' because it has {} fields. Threshold is {}",
                        outcome.info.name, fields, self.config.max_schema_size
                    ),
                );
            }

            report.collections_succeeded += 1;
            self.write(sink, report, dataset_name, record).await?;
        }

        report.databases_scanned += 1;
        Ok(())
    }

    /// Sample and infer collections in parallel, bounded by the semaphore
    async fn process_collections(
        &self,
        client: &Arc<dyn DatabaseClient>,
        collections: Vec<CollectionInfo>,
    ) -> IngestResult<Vec<CollectionOutcome>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_collections));
        let mut tasks = JoinSet::new();

        for info in collections {
            let task = CollectionTask {
                client: Arc::clone(client),
                sampler: self.config.sampler(),
                limit: self.config.sample_limit(),
                inference: self.config.inference_config(),
                enabled: self.config.enable_schema_inference,
                cancel: self.cancel.clone(),
            };
            let semaphore = Arc::clone(&semaphore);
            let span = info_span!("collection", name = %info.name);

            tasks.spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await;
                    let result = task.run(&info).await;
                    CollectionOutcome { info, result }
                }
                .instrument(span),
            );
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined.map_err(|e| IngestError::Task(e.to_string()))?);
        }
        Ok(outcomes)
    }

    async fn write(
        &self,
        sink: &mut dyn RecordSink,
        report: &mut IngestionReport,
        id: String,
        record: MetadataRecord,
    ) -> IngestResult<()> {
        sink.write(WorkUnit::new(id, record)).await?;
        report.report_work_unit();
        Ok(())
    }
}

/// Everything one collection task owns
struct CollectionTask {
    client: Arc<dyn DatabaseClient>,
    sampler: Sampler,
    limit: SampleLimit,
    inference: InferenceConfig,
    enabled: bool,
    cancel: CancellationToken,
}

impl CollectionTask {
    async fn run(
        &self,
        info: &CollectionInfo,
    ) -> Result<Option<(CollectionSchema, InferenceStats)>, SamplingError> {
        if !self.enabled {
            return Ok(None);
        }

        let documents = self
            .sampler
            .sample(self.client.as_ref(), &info.name, self.limit, &self.cancel)
            .await?;

        let mut inferrer = SchemaInferrer::with_config(&info.name, self.inference.clone());
        inferrer.add_documents(&documents);
        let stats = inferrer.stats();
        let schema = inferrer.finalize().with_total_observed(info.document_count);

        debug!(
            sampled = documents.len(),
            fields = stats.fields_discovered,
            "Inferred collection schema"
        );
        Ok(Some((schema, stats)))
    }
}
