//! `infer` command: offline schema inference over exported documents

use std::path::PathBuf;

use anyhow::Context;
use ravendb_ingest::emitter::{CollectionMetadata, MetadataEmitter};
use ravendb_ingest::inference::{InferenceConfig, RawDocument, SchemaInferrer, document_from_json};
use ravendb_ingest::sampling::{SampleLimit, Sampler, SamplingPolicy};
use ravendb_ingest::source::InMemoryDatabase;
use tokio_util::sync::CancellationToken;

use crate::output;

/// Arguments for the `infer` command
pub struct InferArgs {
    pub file: PathBuf,
    pub collection: String,
    pub database: String,
    pub sampling_size: usize,
    pub policy: SamplingPolicy,
    pub seed: Option<u64>,
    pub max_depth: usize,
    pub remove_metadata: bool,
    pub env: String,
    pub output: Option<PathBuf>,
}

/// Handle the `infer` command
pub async fn handle_infer(args: &InferArgs) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let documents = parse_documents(&content)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;
    let total = documents.len() as u64;

    eprintln!("Inferring schema of '{}'...", args.collection);
    eprintln!("  Documents in file: {}", total);
    eprintln!("  Sampling: {} ({})", args.policy, sample_label(args.sampling_size));

    let database = InMemoryDatabase::new(&args.database).with_collection(&args.collection, documents);
    let sample = Sampler::new(args.policy)
        .with_seed(args.seed)
        .sample(
            &database,
            &args.collection,
            SampleLimit::from_config(args.sampling_size),
            &CancellationToken::new(),
        )
        .await?;

    let config = InferenceConfig::builder()
        .max_depth(args.max_depth)
        .remove_metadata(args.remove_metadata)
        .build();
    let mut inferrer = SchemaInferrer::with_config(&args.collection, config);
    inferrer.add_documents(&sample);
    let stats = inferrer.stats();
    let schema = inferrer.finalize().with_total_observed(total);

    let metadata =
        CollectionMetadata::new(&args.database, &args.collection).with_document_count(total);
    let record = MetadataEmitter::new(args.env.clone()).emit(&schema, &metadata, &[])?;

    eprintln!();
    eprintln!("Inference complete:");
    eprintln!("  Documents sampled: {}", stats.documents_processed);
    eprintln!("  Fields discovered: {}", stats.fields_discovered);
    eprintln!("  Max depth: {}", stats.max_depth);
    if stats.values_rejected > 0 {
        eprintln!("  Rejected values: {}", stats.values_rejected);
    }
    if let Some(dataset) = record.as_dataset() {
        eprintln!();
        eprint!("{}", output::format_fields(dataset.fields()));
    }

    let json = serde_json::to_string_pretty(&record)?;
    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!();
            eprintln!("Record written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn sample_label(size: usize) -> String {
    if size == 0 {
        "all documents".to_string()
    } else {
        format!("up to {} documents", size)
    }
}

/// Parse a JSON array of documents, or one document per line
fn parse_documents(content: &str) -> anyhow::Result<Vec<RawDocument>> {
    let trimmed = content.trim_start();
    let values: Vec<serde_json::Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
            })
            .collect::<anyhow::Result<_>>()?
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            document_from_json(value)
                .with_context(|| format!("document {} is not a JSON object", i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array_and_lines() {
        let array = parse_documents(r#"[{"a": 1}, {"b": "x"}]"#).unwrap();
        assert_eq!(array.len(), 2);

        let lines = parse_documents("{\"a\": 1}\n\n{\"b\": \"x\"}\n").unwrap();
        assert_eq!(lines, array);
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(parse_documents("[1, 2]").is_err());
        assert!(parse_documents("{\"a\": 1}\nnot json").is_err());
    }
}
