//! Metadata emission
//!
//! Turns an inferred [`CollectionSchema`] plus collection and index metadata
//! into catalog records. Nested objects flatten into dot-delimited paths;
//! objects inside arrays contribute their fields under the array's path.

mod records;
pub mod urn;

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::inference::{CollectionSchema, FieldShape, TypeTag};
use crate::source::{DatabaseStatistics, IndexMetadata};

pub use records::{
    DatasetProperties, DatasetRecord, LogicalType, MetadataRecord, PROP_DOWNSAMPLED,
    PROP_TOTAL_FIELDS, PlatformInstanceRecord, PlatformInstanceRef, SchemaField, SchemaMetadata,
    WorkUnit,
};

/// Emission errors
#[derive(Error, Debug)]
pub enum EmissionError {
    /// A field was recorded without any observed type
    #[error("Field '{path}' has no observed types")]
    EmptyTypeSet { path: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Identity of the collection a schema belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMetadata {
    pub database: String,
    pub collection: String,
    pub document_count: Option<u64>,
}

impl CollectionMetadata {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            document_count: None,
        }
    }

    pub fn with_document_count(mut self, count: u64) -> Self {
        self.document_count = Some(count);
        self
    }

    pub fn dataset_name(&self) -> String {
        urn::dataset_name(&self.database, &self.collection)
    }
}

/// Builds catalog records
#[derive(Debug, Clone)]
pub struct MetadataEmitter {
    platform: String,
    env: String,
    max_schema_size: Option<usize>,
}

impl Default for MetadataEmitter {
    fn default() -> Self {
        Self::new("PROD")
    }
}

impl MetadataEmitter {
    pub fn new(env: impl Into<String>) -> Self {
        Self {
            platform: urn::PLATFORM.to_string(),
            env: env.into(),
            max_schema_size: None,
        }
    }

    /// Keep at most `size` fields, preferring the most frequent ones
    pub fn with_max_schema_size(mut self, size: Option<usize>) -> Self {
        self.max_schema_size = size;
        self
    }

    /// Emit the dataset record of a collection with its inferred schema
    pub fn emit(
        &self,
        schema: &CollectionSchema,
        collection: &CollectionMetadata,
        indexes: &[IndexMetadata],
    ) -> Result<MetadataRecord, EmissionError> {
        let mut record = self.dataset_record(collection, indexes)?;
        let props = &mut record.properties.custom_properties;
        props.insert("sampleSize".to_string(), schema.sample_size.to_string());

        let mut fields = flatten(&schema.root)?;
        let total_fields = fields.len();
        if let Some(max) = self.max_schema_size.filter(|max| total_fields > *max) {
            fields.sort_by(|a, b| {
                b.count
                    .cmp(&a.count)
                    .then_with(|| a.field_path.cmp(&b.field_path))
            });
            fields.truncate(max);
            fields.sort_by(|a, b| a.field_path.cmp(&b.field_path));
            props.insert(PROP_DOWNSAMPLED.to_string(), "True".to_string());
            props.insert(PROP_TOTAL_FIELDS.to_string(), total_fields.to_string());
        }

        record.schema = Some(SchemaMetadata {
            schema_name: collection.database.clone(),
            platform: urn::data_platform_urn(&self.platform),
            dataset: record.urn.clone(),
            version: 0,
            hash: fingerprint(&fields)?,
            fields,
        });
        Ok(MetadataRecord::Dataset(record))
    }

    /// Emit the dataset record of a collection without a schema
    pub fn emit_without_schema(
        &self,
        collection: &CollectionMetadata,
        indexes: &[IndexMetadata],
    ) -> Result<MetadataRecord, EmissionError> {
        Ok(MetadataRecord::Dataset(
            self.dataset_record(collection, indexes)?,
        ))
    }

    /// Emit the record describing a whole database
    pub fn emit_platform_instance(
        &self,
        database: &str,
        stats: &DatabaseStatistics,
        external_url: Option<&str>,
    ) -> Result<MetadataRecord, EmissionError> {
        let mut props = BTreeMap::new();
        props.insert(
            "nodeTag".to_string(),
            stats.node_tag.clone().unwrap_or_default(),
        );
        props.insert(
            "indexes".to_string(),
            serde_json::to_string(&stats.indexes)?,
        );
        props.insert(
            "sizeOnDisk".to_string(),
            stats.size_on_disk_bytes.to_string(),
        );
        props.insert(
            "tempBuffersSizeOnDisk".to_string(),
            stats.temp_buffers_size_on_disk_bytes.to_string(),
        );
        props.insert(
            "databaseChangeVector".to_string(),
            stats.database_change_vector.clone().unwrap_or_default(),
        );
        props.insert(
            "lastCollectionIndexingTime".to_string(),
            DatabaseStatistics::latest_indexing_time(&stats.indexes).unwrap_or_default(),
        );
        props.insert(
            "lastDocEtag".to_string(),
            stats.last_doc_etag.map(|e| e.to_string()).unwrap_or_default(),
        );
        props.insert(
            "lastDatabaseEtag".to_string(),
            stats
                .last_database_etag
                .map(|e| e.to_string())
                .unwrap_or_default(),
        );
        props.insert(
            "countOfDocuments".to_string(),
            stats.count_of_documents.to_string(),
        );

        Ok(MetadataRecord::PlatformInstance(PlatformInstanceRecord {
            urn: urn::platform_instance_urn(&self.platform, database),
            name: database.to_string(),
            external_url: external_url.map(str::to_string),
            custom_properties: props,
        }))
    }

    /// Work unit id of a database record
    pub fn platform_instance_work_unit_id(&self, database: &str) -> String {
        format!("{}.{}.dataPlatformInstanceProperties", self.platform, database)
    }

    fn dataset_record(
        &self,
        collection: &CollectionMetadata,
        indexes: &[IndexMetadata],
    ) -> Result<DatasetRecord, EmissionError> {
        let name = collection.dataset_name();
        let own: Vec<&IndexMetadata> = indexes
            .iter()
            .filter(|index| index.covers(&collection.collection))
            .collect();

        let mut props = BTreeMap::new();
        props.insert("indexes".to_string(), serde_json::to_string(&own)?);
        props.insert(
            "lastCollectionIndexingTime".to_string(),
            DatabaseStatistics::latest_indexing_time(own.iter().copied()).unwrap_or_default(),
        );
        if let Some(count) = collection.document_count {
            props.insert("totalDocuments".to_string(), count.to_string());
        }

        Ok(DatasetRecord {
            urn: urn::dataset_urn(&self.platform, &name, &self.env),
            platform_instance: PlatformInstanceRef {
                platform: urn::data_platform_urn(&self.platform),
                instance: urn::platform_instance_urn(&self.platform, &collection.database),
            },
            properties: DatasetProperties {
                qualified_name: name,
                custom_properties: props,
            },
            schema: None,
        })
    }
}

/// Field data accumulated under one emitted path
#[derive(Default)]
struct FlatField {
    type_set: BTreeSet<TypeTag>,
    nullable: bool,
    count: u64,
    /// Element type sets of nested arrays, outermost first
    element_levels: Vec<BTreeSet<TypeTag>>,
}

/// Flatten a root shape into fields sorted by path
fn flatten(root: &FieldShape) -> Result<Vec<SchemaField>, EmissionError> {
    let mut flat = BTreeMap::new();
    collect(root, "", &mut flat);

    flat.into_iter()
        .map(|(path, field)| {
            let field_type = logical_type(&field.type_set)
                .ok_or_else(|| EmissionError::EmptyTypeSet { path: path.clone() })?;
            Ok(SchemaField {
                native_data_type: native_name(&field_type, &field.element_levels),
                field_path: path,
                field_type,
                nullable: field.nullable,
                count: field.count,
            })
        })
        .collect()
}

fn collect(shape: &FieldShape, prefix: &str, out: &mut BTreeMap<String, FlatField>) {
    for (name, child) in &shape.children {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        // an object field and an array of objects can land on the same path
        let entry = out.entry(path.clone()).or_default();
        entry.type_set.extend(child.type_set.iter().copied());
        entry.nullable |= child.nullable;
        entry.count += child.count as u64;

        let mut depth = 0;
        let mut element = child.element_shape.as_deref();
        while let Some(shape) = element {
            if entry.element_levels.len() <= depth {
                entry.element_levels.push(BTreeSet::new());
            }
            entry.element_levels[depth].extend(shape.type_set.iter().copied());
            depth += 1;
            element = shape.element_shape.as_deref();
        }

        collect(child, &path, out);
        let mut element = child.element_shape.as_deref();
        while let Some(shape) = element {
            collect(shape, &path, out);
            element = shape.element_shape.as_deref();
        }
    }
}

/// `array<element>` for arrays with observed elements, the plain native name otherwise
fn native_name(field_type: &LogicalType, element_levels: &[BTreeSet<TypeTag>]) -> String {
    match field_type {
        LogicalType::Scalar(TypeTag::Array) => {
            array_name(element_levels).unwrap_or_else(|| field_type.native_name())
        }
        _ => field_type.native_name(),
    }
}

fn array_name(levels: &[BTreeSet<TypeTag>]) -> Option<String> {
    let (first, rest) = levels.split_first()?;
    let element = logical_type(first)?;
    let element_name = match element {
        LogicalType::Scalar(TypeTag::Array) => {
            array_name(rest).unwrap_or_else(|| element.native_name())
        }
        _ => element.to_string(),
    };
    Some(format!("array<{}>", element_name))
}

fn logical_type(type_set: &BTreeSet<TypeTag>) -> Option<LogicalType> {
    let non_null: Vec<TypeTag> = type_set
        .iter()
        .copied()
        .filter(|t| *t != TypeTag::Null)
        .collect();
    match non_null.as_slice() {
        [] if type_set.is_empty() => None,
        [] => Some(LogicalType::Scalar(TypeTag::Null)),
        [single] => Some(LogicalType::Scalar(*single)),
        _ => Some(LogicalType::Union(type_set.iter().copied().collect())),
    }
}

fn fingerprint(fields: &[SchemaField]) -> Result<String, EmissionError> {
    let bytes = serde_json::to_vec(fields)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}
