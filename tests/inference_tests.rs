//! Schema inference tests

use std::collections::BTreeSet;

use ravendb_ingest::emitter::{CollectionMetadata, LogicalType, MetadataEmitter};
use ravendb_ingest::inference::{
    CollectionSchema, InferenceConfig, RawDocument, RawValue, SchemaInferrer, TypeTag, classify,
    document_from_json,
};
use serde_json::json;

fn docs(values: Vec<serde_json::Value>) -> Vec<RawDocument> {
    values
        .into_iter()
        .map(|v| document_from_json(v).unwrap())
        .collect()
}

fn infer(collection: &str, documents: &[RawDocument]) -> CollectionSchema {
    SchemaInferrer::infer(collection, documents, &InferenceConfig::default())
}

fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            out.push(tail);
        }
    }
    out
}

mod scenario_tests {
    use super::*;

    #[test]
    fn test_conflicting_price_types() {
        let documents = docs(vec![
            json!({"Name": "toy1", "Price": 12.5}),
            json!({"Name": "toy2", "Price": "n/a"}),
        ]);
        let schema = infer("Products", &documents);

        let price = schema.field("Price").unwrap();
        assert_eq!(
            price.type_set,
            BTreeSet::from([TypeTag::Float, TypeTag::String])
        );
        assert!(!price.nullable);
    }

    #[test]
    fn test_missing_field_is_nullable() {
        let documents = docs(vec![
            json!({"Id": 1, "Shipping": true}),
            json!({"Id": 2}),
            json!({"Id": 3, "Shipping": false}),
        ]);
        let schema = infer("Orders", &documents);

        let shipping = schema.field("Shipping").unwrap();
        assert!(shipping.nullable);
        assert_eq!(shipping.type_set, BTreeSet::from([TypeTag::Boolean]));
        assert_eq!(shipping.count, 2);
        assert!(!schema.field("Id").unwrap().nullable);
    }

    #[test]
    fn test_object_then_null() {
        let documents = docs(vec![
            json!({"Address": {"City": "X"}}),
            json!({"Address": null}),
        ]);
        let schema = infer("Customers", &documents);

        let address = schema.field("Address").unwrap();
        assert_eq!(
            address.type_set,
            BTreeSet::from([TypeTag::Null, TypeTag::Object])
        );
        assert!(address.nullable);
        assert!(schema.field("Address.City").is_some());
        assert_eq!(
            schema.field("Address.City").unwrap().type_set,
            BTreeSet::from([TypeTag::String])
        );
    }

    #[test]
    fn test_empty_collection() {
        let schema = infer("Empty", &[]);
        assert!(schema.root.children.is_empty());
        assert_eq!(schema.sample_size, 0);

        let record = MetadataEmitter::default()
            .emit(&schema, &CollectionMetadata::new("shop", "Empty"), &[])
            .unwrap();
        assert!(record.as_dataset().unwrap().fields().is_empty());
    }
}

mod property_tests {
    use super::*;

    fn mixed_documents() -> Vec<RawDocument> {
        docs(vec![
            json!({"a": 1, "b": {"x": "s"}, "tags": ["t"]}),
            json!({"a": "one", "b": null}),
            json!({"b": {"y": 2.5}, "tags": [1, {"k": true}], "when": "2024-01-15"}),
            json!({"a": null, "tags": [], "nested": {"deep": {"deeper": [null]}}}),
        ])
    }

    #[test]
    fn test_merge_is_order_independent() {
        let documents = mixed_documents();
        let expected = infer("Mixed", &documents);

        for order in permutations(&documents) {
            assert_eq!(infer("Mixed", &order), expected);
        }
    }

    #[test]
    fn test_merge_grouping_does_not_matter() {
        let documents = mixed_documents();
        let expected = infer("Mixed", &documents);

        for split in 0..=documents.len() {
            let (left, right) = documents.split_at(split);
            let mut inferrer = SchemaInferrer::new("Mixed");
            inferrer.add_documents(left);
            inferrer.add_documents(right);
            assert_eq!(inferrer.finalize(), expected);
        }
    }

    #[test]
    fn test_duplicate_documents_keep_types_and_nullability() {
        let documents = mixed_documents();
        let once = infer("Mixed", &documents);

        let mut doubled = documents.clone();
        doubled.extend(documents.iter().cloned());
        let twice = infer("Mixed", &doubled);

        for path in ["a", "b", "b.x", "b.y", "tags", "when", "nested.deep"] {
            let a = once.field(path).unwrap();
            let b = twice.field(path).unwrap();
            assert_eq!(a.type_set, b.type_set, "{path}");
            assert_eq!(a.nullable, b.nullable, "{path}");
        }
    }

    #[test]
    fn test_observed_fields_have_types() {
        let schema = infer("Mixed", &mixed_documents());
        let record = MetadataEmitter::default()
            .emit(&schema, &CollectionMetadata::new("shop", "Mixed"), &[])
            .unwrap();
        for field in record.as_dataset().unwrap().fields() {
            match &field.field_type {
                LogicalType::Union(tags) => assert!(tags.len() > 1, "{}", field.field_path),
                LogicalType::Scalar(_) => {}
            }
        }
    }

    #[test]
    fn test_classifier_is_total_over_finite_values() {
        let values = vec![
            RawValue::Null,
            RawValue::Bool(false),
            RawValue::Integer(i64::MIN),
            RawValue::Float(-0.0),
            RawValue::String(String::new()),
            RawValue::String("9999-99-99".into()),
            RawValue::Sequence(vec![RawValue::Null]),
            RawValue::Mapping(Default::default()),
            RawValue::Binary(vec![]),
        ];
        for value in &values {
            assert!(classify(value).is_ok(), "{value:?}");
        }
        assert_eq!(
            classify(&RawValue::String("9999-99-99".into())).unwrap(),
            TypeTag::String
        );
    }

    #[test]
    fn test_large_unsigned_becomes_float() {
        let documents = docs(vec![json!({"big": u64::MAX})]);
        let schema = infer("Numbers", &documents);
        assert_eq!(
            schema.field("big").unwrap().type_set,
            BTreeSet::from([TypeTag::Float])
        );
    }
}
