//! Schema inference engine

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::{InferenceConfig, METADATA_FIELD};
use super::merge::MergeContext;
use super::types::{CollectionSchema, FieldShape, RawDocument, TypeTag};

/// Statistics from schema inference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceStats {
    /// Total documents folded into the schema
    pub documents_processed: usize,
    /// Total fields discovered, nested ones included
    pub fields_discovered: usize,
    /// Maximum nesting depth encountered
    pub max_depth: usize,
    /// Values rejected by the classifier
    pub values_rejected: usize,
    /// Paths where at least one value was rejected
    pub rejected_paths: BTreeSet<String>,
    /// Observed type tags per field path
    pub type_distribution: BTreeMap<String, BTreeSet<TypeTag>>,
}

/// Schema inference engine
///
/// Folds sampled documents of one collection into a single root
/// [`FieldShape`]. Documents are processed in the order supplied; the
/// resulting schema is the same for every order.
pub struct SchemaInferrer {
    config: InferenceConfig,
    collection: String,
    root: FieldShape,
    record_count: usize,
    max_depth_seen: usize,
    values_rejected: usize,
    rejected_paths: BTreeSet<String>,
}

impl SchemaInferrer {
    /// Create a new schema inferrer with default configuration
    pub fn new(collection: impl Into<String>) -> Self {
        Self::with_config(collection, InferenceConfig::default())
    }

    /// Create a new schema inferrer with custom configuration
    pub fn with_config(collection: impl Into<String>, config: InferenceConfig) -> Self {
        Self {
            config,
            collection: collection.into(),
            root: FieldShape::empty(""),
            record_count: 0,
            max_depth_seen: 0,
            values_rejected: 0,
            rejected_paths: BTreeSet::new(),
        }
    }

    /// Infer the schema of a collection from its sampled documents
    pub fn infer(
        collection: impl Into<String>,
        documents: &[RawDocument],
        config: &InferenceConfig,
    ) -> CollectionSchema {
        let mut inferrer = Self::with_config(collection, config.clone());
        inferrer.add_documents(documents);
        inferrer.finalize()
    }

    /// Fold one document into the schema
    pub fn add_document(&mut self, document: &RawDocument) {
        let skip = self.config.remove_metadata.then_some(METADATA_FIELD);

        let mut rejected = Vec::new();
        let mut ctx = MergeContext::new(
            self.config.max_depth,
            self.config.detect_datetimes,
            &mut rejected,
        );
        self.root.merge_document(document, skip, &mut ctx);
        self.max_depth_seen = self.max_depth_seen.max(ctx.max_depth_seen);
        self.record_count += 1;

        for (path, err) in rejected {
            warn!(
                collection = %self.collection,
                path = %path,
                error = %err,
                "Rejected value during schema inference"
            );
            self.values_rejected += 1;
            self.rejected_paths.insert(path);
        }
    }

    /// Fold a batch of documents in order
    pub fn add_documents(&mut self, documents: &[RawDocument]) {
        for document in documents {
            self.add_document(document);
        }
    }

    /// Finish inference and hand out the schema
    pub fn finalize(self) -> CollectionSchema {
        debug!(
            collection = %self.collection,
            documents = self.record_count,
            fields = self.root.field_count(),
            "Schema inference finished"
        );

        CollectionSchema {
            collection: self.collection,
            root: self.root,
            sample_size: self.record_count,
            total_observed: None,
        }
    }

    /// Get current inference statistics
    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            documents_processed: self.record_count,
            fields_discovered: self.root.field_count(),
            max_depth: self.max_depth_seen,
            values_rejected: self.values_rejected,
            rejected_paths: self.rejected_paths.clone(),
            type_distribution: collect_types(&self.root, ""),
        }
    }

    /// Get the number of documents processed
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

fn collect_types(shape: &FieldShape, prefix: &str) -> BTreeMap<String, BTreeSet<TypeTag>> {
    let mut out = BTreeMap::new();
    for (key, child) in &shape.children {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        out.insert(path.clone(), child.type_set.clone());
        out.extend(collect_types(child, &path));
        if let Some(element) = &child.element_shape {
            let element_path = format!("{}[]", path);
            out.insert(element_path.clone(), element.type_set.clone());
            out.extend(collect_types(element, &element_path));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::inference::types::{RawValue, TypeTag, document_from_json};

    fn doc(value: serde_json::Value) -> RawDocument {
        document_from_json(value).unwrap()
    }

    #[test]
    fn test_infer_simple_collection() {
        let docs = vec![
            doc(json!({"Name": "Alice", "Age": 30})),
            doc(json!({"Name": "Bob", "Age": 25})),
        ];
        let schema = SchemaInferrer::infer("People", &docs, &InferenceConfig::default());

        assert_eq!(schema.collection, "People");
        assert_eq!(schema.sample_size, 2);
        assert_eq!(
            schema.field("Name").unwrap().type_set,
            BTreeSet::from([TypeTag::String])
        );
        assert_eq!(
            schema.field("Age").unwrap().type_set,
            BTreeSet::from([TypeTag::Integer])
        );
        assert!(!schema.field("Age").unwrap().nullable);
    }

    #[test]
    fn test_metadata_removed_by_default() {
        let docs = vec![doc(json!({
            "Name": "toy",
            "@metadata": {"@collection": "Products", "Raven-Python-Type": "Products"}
        }))];

        let schema = SchemaInferrer::infer("Products", &docs, &InferenceConfig::default());
        assert!(schema.field("@metadata").is_none());

        let keep = InferenceConfig::builder().remove_metadata(false).build();
        let schema = SchemaInferrer::infer("Products", &docs, &keep);
        assert!(schema.field("@metadata.@collection").is_some());
    }

    #[test]
    fn test_max_depth_stops_descending() {
        let docs = vec![doc(json!({"a": {"b": {"c": {"d": 1}}}}))];
        let config = InferenceConfig::builder().max_depth(2).build();

        let schema = SchemaInferrer::infer("Deep", &docs, &config);
        let b = schema.field("a.b").unwrap();
        assert!(b.type_set.contains(&TypeTag::Object));
        assert!(b.children.is_empty());
    }

    #[test]
    fn test_stats_track_rejections() {
        let mut document = doc(json!({"Name": "x"}));
        document.insert("Score".to_string(), RawValue::Float(f64::NAN));

        let mut inferrer = SchemaInferrer::new("Scores");
        inferrer.add_document(&document);

        let stats = inferrer.stats();
        assert_eq!(stats.documents_processed, 1);
        assert_eq!(stats.values_rejected, 1);
        assert!(stats.rejected_paths.contains("Score"));
        assert_eq!(stats.fields_discovered, 1);

        let schema = inferrer.finalize();
        assert!(schema.field("Score").is_none());
    }

    #[test]
    fn test_stats_max_depth() {
        let mut inferrer = SchemaInferrer::new("Nested");
        inferrer.add_document(&doc(json!({"a": {"b": [1]}})));
        assert_eq!(inferrer.stats().max_depth, 3);
    }

    #[test]
    fn test_stats_type_distribution() {
        let mut inferrer = SchemaInferrer::new("Orders");
        inferrer.add_document(&doc(json!({"Total": 1, "Lines": [{"Sku": "a"}]})));
        inferrer.add_document(&doc(json!({"Total": 1.5})));

        let types = inferrer.stats().type_distribution;
        assert_eq!(
            types["Total"],
            BTreeSet::from([TypeTag::Integer, TypeTag::Float])
        );
        assert_eq!(types["Lines[]"], BTreeSet::from([TypeTag::Object]));
        assert_eq!(types["Lines[].Sku"], BTreeSet::from([TypeTag::String]));
    }

    #[test]
    fn test_empty_collection() {
        let schema = SchemaInferrer::infer("Empty", &[], &InferenceConfig::default());
        assert_eq!(schema.sample_size, 0);
        assert!(schema.root.children.is_empty());
    }
}
