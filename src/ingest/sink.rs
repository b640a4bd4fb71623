//! Record sinks
//!
//! - FileSink: pretty JSON array of work units written on close
//! - ConsoleSink: the same array printed to stdout
//! - MemorySink: work units kept in memory

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::config::SinkSpec;
use super::error::IngestError;
use crate::emitter::WorkUnit;

/// Receives the work units of a run
#[async_trait]
pub trait RecordSink: Send {
    async fn write(&mut self, unit: WorkUnit) -> Result<(), IngestError>;

    /// Flush buffered records; called once after the last write
    async fn close(&mut self) -> Result<(), IngestError> {
        Ok(())
    }
}

/// Build the sink a recipe names
pub fn from_spec(spec: &SinkSpec) -> Box<dyn RecordSink> {
    match spec {
        SinkSpec::File { filename } => Box::new(FileSink::new(filename.clone())),
        SinkSpec::Console => Box::new(ConsoleSink::default()),
    }
}

pub struct FileSink {
    path: PathBuf,
    buffer: Vec<WorkUnit>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            buffer: Vec::new(),
        }
    }
}

#[async_trait]
impl RecordSink for FileSink {
    async fn write(&mut self, unit: WorkUnit) -> Result<(), IngestError> {
        self.buffer.push(unit);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), IngestError> {
        let json = serde_json::to_string_pretty(&self.buffer)
            .map_err(|e| IngestError::Sink(format!("Failed to serialize records: {}", e)))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IngestError::io(parent, e))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| IngestError::io(&self.path, e))?;
        tracing::info!(
            path = %self.path.display(),
            records = self.buffer.len(),
            "Wrote records"
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct ConsoleSink {
    buffer: Vec<WorkUnit>,
}

#[async_trait]
impl RecordSink for ConsoleSink {
    async fn write(&mut self, unit: WorkUnit) -> Result<(), IngestError> {
        self.buffer.push(unit);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), IngestError> {
        let json = serde_json::to_string_pretty(&self.buffer)
            .map_err(|e| IngestError::Sink(format!("Failed to serialize records: {}", e)))?;
        println!("{}", json);
        Ok(())
    }
}

/// Collects work units; clones share the same storage
#[derive(Clone, Default)]
pub struct MemorySink {
    units: Arc<Mutex<Vec<WorkUnit>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> Vec<WorkUnit> {
        self.units
            .lock()
            .map(|units| units.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn write(&mut self, unit: WorkUnit) -> Result<(), IngestError> {
        self.units
            .lock()
            .map_err(|_| IngestError::Sink("memory sink lock poisoned".to_string()))?
            .push(unit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::*;
    use crate::emitter::{MetadataRecord, PlatformInstanceRecord};

    fn unit(id: &str) -> WorkUnit {
        WorkUnit::new(
            id,
            MetadataRecord::PlatformInstance(PlatformInstanceRecord {
                urn: format!("urn:{}", id),
                name: id.to_string(),
                external_url: None,
                custom_properties: BTreeMap::new(),
            }),
        )
    }

    #[tokio::test]
    async fn test_file_sink_writes_json_array() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out").join("records.json");

        let mut sink = FileSink::new(&path);
        sink.write(unit("a")).await.unwrap();
        sink.write(unit("b")).await.unwrap();
        sink.close().await.unwrap();

        let written: Vec<WorkUnit> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, vec![unit("a"), unit("b")]);
    }

    #[tokio::test]
    async fn test_memory_sink_shares_storage() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.write(unit("a")).await.unwrap();
        assert_eq!(sink.units().len(), 1);
    }
}
