//! Document values and inferred shapes

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A single document as read from the database
pub type RawDocument = BTreeMap<String, RawValue>;

/// A document value
///
/// Closed union over everything a RavenDB document can hold. Conversion from
/// `serde_json::Value` happens once at the client boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<RawValue>),
    Mapping(BTreeMap<String, RawValue>),
    /// Opaque payload (attachments, counters, time series blobs)
    Binary(Vec<u8>),
}

impl RawValue {
    /// Name of the runtime representation, used in error messages
    pub fn representation(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "bool",
            RawValue::Integer(_) => "i64",
            RawValue::Float(_) => "f64",
            RawValue::String(_) => "string",
            RawValue::Sequence(_) => "sequence",
            RawValue::Mapping(_) => "mapping",
            RawValue::Binary(_) => "binary",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawValue::Null,
            serde_json::Value::Bool(b) => RawValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RawValue::Integer(i)
                } else {
                    // u64 above i64::MAX and non-integral numbers
                    RawValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => RawValue::String(s),
            serde_json::Value::Array(items) => {
                RawValue::Sequence(items.into_iter().map(RawValue::from).collect())
            }
            serde_json::Value::Object(map) => RawValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, RawValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Convert a JSON object into a document; anything else yields `None`
pub fn document_from_json(value: serde_json::Value) -> Option<RawDocument> {
    match RawValue::from(value) {
        RawValue::Mapping(map) => Some(map),
        _ => None,
    }
}

/// Primitive type tag of a classified value
///
/// Variants are declared in canonical emission order, so the derived `Ord`
/// is the order union types are listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Null,
    Boolean,
    Integer,
    Float,
    Datetime,
    String,
    Array,
    Object,
    Binary,
}

impl TypeTag {
    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::Datetime => "datetime",
            TypeTag::String => "string",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
            TypeTag::Binary => "binary",
        }
    }

    /// All tags in canonical order
    pub fn all() -> [TypeTag; 9] {
        [
            TypeTag::Null,
            TypeTag::Boolean,
            TypeTag::Integer,
            TypeTag::Float,
            TypeTag::Datetime,
            TypeTag::String,
            TypeTag::Array,
            TypeTag::Object,
            TypeTag::Binary,
        ]
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for TypeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeTag::all()
            .into_iter()
            .find(|tag| tag.name() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown type tag: {}", s))
    }
}

/// Inferred shape of one field across a sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldShape {
    /// Field name (empty for the root and for array elements)
    pub name: String,
    /// Every type tag observed for this field
    pub type_set: BTreeSet<TypeTag>,
    /// Observed as null, or absent from at least one sampled parent object
    pub nullable: bool,
    /// Child fields, populated when `object` is in `type_set`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, FieldShape>,
    /// Merged shape of all array elements, present when `array` is in `type_set`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_shape: Option<Box<FieldShape>>,
    /// Observations where the field was present (explicit nulls included)
    pub count: usize,
    /// Observations where the value was a mapping
    pub object_count: usize,
}

impl FieldShape {
    /// Create an empty shape with no observations
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_set: BTreeSet::new(),
            nullable: false,
            children: BTreeMap::new(),
            element_shape: None,
            count: 0,
            object_count: 0,
        }
    }

    /// Whether the shape has any observed type
    pub fn is_observed(&self) -> bool {
        !self.type_set.is_empty()
    }

    /// Type tags without `null`
    pub fn non_null_types(&self) -> impl Iterator<Item = TypeTag> + '_ {
        self.type_set
            .iter()
            .copied()
            .filter(|tag| *tag != TypeTag::Null)
    }

    /// Look up a nested child by dot-delimited path
    pub fn child(&self, path: &str) -> Option<&FieldShape> {
        path.split('.')
            .try_fold(self, |shape, segment| shape.children.get(segment))
    }

    /// Number of fields in the subtree below this shape
    pub fn field_count(&self) -> usize {
        let nested: usize = self
            .children
            .values()
            .map(|child| 1 + child.field_count())
            .sum();
        nested
            + self
                .element_shape
                .as_ref()
                .map(|element| element.field_count())
                .unwrap_or(0)
    }
}

/// Inferred schema of one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Collection name
    pub collection: String,
    /// Root shape; its children are the top-level document fields
    pub root: FieldShape,
    /// Number of documents merged
    pub sample_size: usize,
    /// Number of documents in the collection, if the database reported it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_observed: Option<u64>,
}

impl CollectionSchema {
    /// Create an empty schema for a collection
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            root: FieldShape::empty(""),
            sample_size: 0,
            total_observed: None,
        }
    }

    /// Record the collection size reported by the database
    pub fn with_total_observed(mut self, total: u64) -> Self {
        self.total_observed = Some(total);
        self
    }

    /// Top-level field shape by name or dot-delimited path
    pub fn field(&self, path: &str) -> Option<&FieldShape> {
        self.root.child(path)
    }

    /// Total number of fields, nested ones included
    pub fn field_count(&self) -> usize {
        self.root.field_count()
    }
}
