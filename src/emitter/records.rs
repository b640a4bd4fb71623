//! Metadata record types handed to the sink

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::inference::TypeTag;

/// Custom property set when the schema was cut to `max_schema_size`
pub const PROP_DOWNSAMPLED: &str = "schema.downsampled";
/// Custom property holding the field count before downsampling
pub const PROP_TOTAL_FIELDS: &str = "schema.totalFields";

/// Logical type of an emitted field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogicalType {
    /// Exactly one non-null type was observed (or only nulls)
    Scalar(TypeTag),
    /// Every observed tag, null included, in canonical order
    Union(Vec<TypeTag>),
}

impl LogicalType {
    /// Catalog type class
    pub fn type_class(&self) -> &'static str {
        match self {
            LogicalType::Union(_) => "UnionType",
            LogicalType::Scalar(tag) => match tag {
                TypeTag::Null => "NullType",
                TypeTag::Boolean => "BooleanType",
                TypeTag::Integer | TypeTag::Float => "NumberType",
                TypeTag::Datetime => "TimeType",
                TypeTag::String => "StringType",
                TypeTag::Array => "ArrayType",
                TypeTag::Object => "RecordType",
                TypeTag::Binary => "BytesType",
            },
        }
    }

    /// Native type name: the tag itself, or `mixed` for unions
    pub fn native_name(&self) -> String {
        match self {
            LogicalType::Scalar(tag) => tag.name().to_string(),
            LogicalType::Union(_) => "mixed".to_string(),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Scalar(tag) => write!(f, "{}", tag),
            LogicalType::Union(tags) => {
                let names: Vec<&str> = tags.iter().map(|t| t.name()).collect();
                write!(f, "union<{}>", names.join(","))
            }
        }
    }
}

/// One flattened field of a collection schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub field_path: String,
    pub native_data_type: String,
    pub field_type: LogicalType,
    pub nullable: bool,
    /// Sampled documents the field was present in
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    pub schema_name: String,
    pub platform: String,
    pub dataset: String,
    pub version: u32,
    /// SHA-256 over the emitted fields
    pub hash: String,
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetProperties {
    pub qualified_name: String,
    pub custom_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInstanceRef {
    pub platform: String,
    pub instance: String,
}

/// Catalog entry for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRecord {
    pub urn: String,
    pub platform_instance: PlatformInstanceRef,
    pub properties: DatasetProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaMetadata>,
}

impl DatasetRecord {
    pub fn is_downsampled(&self) -> bool {
        self.properties.custom_properties.contains_key(PROP_DOWNSAMPLED)
    }

    pub fn fields(&self) -> &[SchemaField] {
        self.schema.as_ref().map_or(&[], |s| s.fields.as_slice())
    }

    pub fn field(&self, path: &str) -> Option<&SchemaField> {
        self.fields().iter().find(|f| f.field_path == path)
    }
}

/// Catalog entry for one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInstanceRecord {
    pub urn: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    pub custom_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "recordType", rename_all = "camelCase")]
pub enum MetadataRecord {
    Dataset(DatasetRecord),
    PlatformInstance(PlatformInstanceRecord),
}

impl MetadataRecord {
    pub fn urn(&self) -> &str {
        match self {
            MetadataRecord::Dataset(d) => &d.urn,
            MetadataRecord::PlatformInstance(p) => &p.urn,
        }
    }

    pub fn as_dataset(&self) -> Option<&DatasetRecord> {
        match self {
            MetadataRecord::Dataset(d) => Some(d),
            MetadataRecord::PlatformInstance(_) => None,
        }
    }
}

/// A record with the id the pipeline tracks it by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnit {
    pub id: String,
    pub record: MetadataRecord,
}

impl WorkUnit {
    pub fn new(id: impl Into<String>, record: MetadataRecord) -> Self {
        Self {
            id: id.into(),
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_type_names() {
        let single = LogicalType::Scalar(TypeTag::Integer);
        assert_eq!(single.type_class(), "NumberType");
        assert_eq!(single.native_name(), "integer");

        let union = LogicalType::Union(vec![TypeTag::Null, TypeTag::String]);
        assert_eq!(union.type_class(), "UnionType");
        assert_eq!(union.native_name(), "mixed");
        assert_eq!(union.to_string(), "union<null,string>");
    }

    #[test]
    fn test_record_tagged_serialization() {
        let record = MetadataRecord::PlatformInstance(PlatformInstanceRecord {
            urn: "urn:x".into(),
            name: "shop".into(),
            external_url: None,
            custom_properties: BTreeMap::new(),
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["recordType"], "platformInstance");
        assert!(json.get("externalUrl").is_none());
    }
}
