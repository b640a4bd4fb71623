//! Shape merging
//!
//! Folds one observed value into an existing [`FieldShape`]. Every attribute
//! a merge touches is a set union, a boolean OR or a sum, so the resulting
//! shape does not depend on the order values are folded in:
//!
//! - `type_set` collects every classified tag (explicit nulls add `null`)
//! - `nullable` is set by explicit nulls and by absence from a parent object
//! - `children` grows with every new key; a key first seen after its parent
//!   was already observed as a mapping starts out nullable
//! - `element_shape` accumulates every element of every array

use std::collections::BTreeMap;

use super::classify::classify_with;
use super::error::InferenceError;
use super::types::{FieldShape, RawDocument, RawValue, TypeTag};

/// Per-merge settings and the sink for rejected values
pub(crate) struct MergeContext<'a> {
    pub max_depth: usize,
    pub detect_datetimes: bool,
    pub max_depth_seen: usize,
    pub rejected: &'a mut Vec<(String, InferenceError)>,
}

impl<'a> MergeContext<'a> {
    pub fn new(
        max_depth: usize,
        detect_datetimes: bool,
        rejected: &'a mut Vec<(String, InferenceError)>,
    ) -> Self {
        Self {
            max_depth,
            detect_datetimes,
            max_depth_seen: 0,
            rejected,
        }
    }
}

impl FieldShape {
    /// Create a shape from its first observed value
    pub fn from_value(name: impl Into<String>, value: &RawValue) -> Result<Self, InferenceError> {
        let mut rejected = Vec::new();
        let mut ctx = MergeContext::new(usize::MAX, true, &mut rejected);
        let mut shape = FieldShape::empty(name);
        let path = shape.name.clone();
        shape.merge_at(Some(value), &path, 0, &mut ctx);
        match rejected.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(shape),
        }
    }

    /// Merge one observation of this field
    ///
    /// `None` means the field was absent from the enclosing object. Values
    /// that cannot be classified are rejected without touching the shape and
    /// the error is returned; the rest of a nested value is still merged.
    pub fn merge_value(&mut self, incoming: Option<&RawValue>) -> Result<(), InferenceError> {
        let mut rejected = Vec::new();
        let mut ctx = MergeContext::new(usize::MAX, true, &mut rejected);
        let path = self.name.clone();
        self.merge_at(incoming, &path, 0, &mut ctx);
        match rejected.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }

    /// Returns `false` when the value itself was rejected; the shape is
    /// then left as it was and the caller decides what absence means.
    pub(crate) fn merge_at(
        &mut self,
        incoming: Option<&RawValue>,
        path: &str,
        depth: usize,
        ctx: &mut MergeContext<'_>,
    ) -> bool {
        let Some(value) = incoming else {
            self.nullable = true;
            return true;
        };

        let tag = match classify_with(value, ctx.detect_datetimes) {
            Ok(tag) => tag,
            Err(err) => {
                ctx.rejected.push((path.to_string(), err));
                return false;
            }
        };

        ctx.max_depth_seen = ctx.max_depth_seen.max(depth);
        self.count += 1;
        self.type_set.insert(tag);

        match value {
            RawValue::Null => self.nullable = true,
            RawValue::Mapping(map) => self.merge_entries(map, None, path, depth, ctx),
            RawValue::Sequence(items) => {
                if depth >= ctx.max_depth || items.is_empty() {
                    return true;
                }

                let element_path = format!("{}[]", path);
                let element = self
                    .element_shape
                    .get_or_insert_with(|| Box::new(FieldShape::empty("")));
                // rejected elements are skipped, not counted as missing
                for item in items {
                    element.merge_at(Some(item), &element_path, depth + 1, ctx);
                }
                if !element.is_observed() {
                    self.element_shape = None;
                }
            }
            _ => {}
        }

        true
    }
}

impl FieldShape {
    /// Fold a whole document into a root shape, skipping `skip` at the top level
    pub(crate) fn merge_document(
        &mut self,
        document: &RawDocument,
        skip: Option<&str>,
        ctx: &mut MergeContext<'_>,
    ) {
        self.count += 1;
        self.type_set.insert(TypeTag::Object);
        self.merge_entries(document, skip, "", 0, ctx);
    }

    fn merge_entries(
        &mut self,
        map: &BTreeMap<String, RawValue>,
        skip: Option<&str>,
        path: &str,
        depth: usize,
        ctx: &mut MergeContext<'_>,
    ) {
        let seen_as_object_before = self.object_count > 0;
        self.object_count += 1;
        if depth >= ctx.max_depth {
            return;
        }

        for (key, child_value) in map {
            if skip == Some(key.as_str()) {
                continue;
            }
            let child_path = join_path(path, key);
            let child = self.children.entry(key.clone()).or_insert_with(|| {
                let mut fresh = FieldShape::empty(key.clone());
                fresh.nullable = seen_as_object_before;
                fresh
            });
            let accepted = child.merge_at(Some(child_value), &child_path, depth + 1, ctx);
            // a rejected value counts as an absent field
            if !child.is_observed() {
                self.children.remove(key);
            } else if !accepted {
                child.nullable = true;
            }
        }

        for (key, child) in self.children.iter_mut() {
            if !map.contains_key(key) {
                child.nullable = true;
            }
        }
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;

    fn value(json: serde_json::Value) -> RawValue {
        RawValue::from(json)
    }

    fn tags(list: &[TypeTag]) -> BTreeSet<TypeTag> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_fresh_shape() {
        let shape = FieldShape::from_value("Price", &value(json!(12.5))).unwrap();
        assert_eq!(shape.type_set, tags(&[TypeTag::Float]));
        assert!(!shape.nullable);
        assert_eq!(shape.count, 1);
    }

    #[test]
    fn test_conflicting_types_union() {
        let mut shape = FieldShape::from_value("Price", &value(json!(12.5))).unwrap();
        shape.merge_value(Some(&value(json!("n/a")))).unwrap();
        assert_eq!(shape.type_set, tags(&[TypeTag::Float, TypeTag::String]));
        assert!(!shape.nullable);
    }

    #[test]
    fn test_absent_marks_nullable_only() {
        let mut shape = FieldShape::from_value("Shipping", &value(json!(true))).unwrap();
        shape.merge_value(None).unwrap();
        assert!(shape.nullable);
        assert_eq!(shape.type_set, tags(&[TypeTag::Boolean]));
        assert_eq!(shape.count, 1);
    }

    #[test]
    fn test_first_seen_null_seeds_type_set() {
        let mut shape = FieldShape::from_value("Nickname", &RawValue::Null).unwrap();
        assert_eq!(shape.type_set, tags(&[TypeTag::Null]));
        assert!(shape.nullable);

        shape.merge_value(Some(&value(json!("Bobby")))).unwrap();
        assert_eq!(shape.type_set, tags(&[TypeTag::Null, TypeTag::String]));
        assert!(shape.nullable);
    }

    #[test]
    fn test_nested_children() {
        let mut shape =
            FieldShape::from_value("Address", &value(json!({"City": "X", "Zip": "1"}))).unwrap();
        shape
            .merge_value(Some(&value(json!({"City": "Y", "Street": "Main"}))))
            .unwrap();

        assert!(!shape.children["City"].nullable);
        assert!(shape.children["Zip"].nullable);
        assert!(shape.children["Street"].nullable);
        assert_eq!(shape.object_count, 2);
    }

    #[test]
    fn test_new_key_nullable_regardless_of_order() {
        let a = value(json!({"x": 1}));
        let b = value(json!({}));

        let mut ab = FieldShape::from_value("o", &a).unwrap();
        ab.merge_value(Some(&b)).unwrap();
        let mut ba = FieldShape::from_value("o", &b).unwrap();
        ba.merge_value(Some(&a)).unwrap();

        assert_eq!(ab, ba);
        assert!(ab.children["x"].nullable);
    }

    #[test]
    fn test_array_elements_union() {
        let shape = FieldShape::from_value("Tags", &value(json!(["a", 1, null]))).unwrap();
        let element = shape.element_shape.as_ref().unwrap();
        assert_eq!(
            element.type_set,
            tags(&[TypeTag::Null, TypeTag::Integer, TypeTag::String])
        );
        assert!(element.nullable);
        assert_eq!(element.count, 3);
    }

    #[test]
    fn test_array_of_objects() {
        let shape = FieldShape::from_value(
            "Lines",
            &value(json!([{"Sku": "a", "Qty": 1}, {"Sku": "b"}])),
        )
        .unwrap();
        let element = shape.element_shape.as_ref().unwrap();
        assert_eq!(element.type_set, tags(&[TypeTag::Object]));
        assert!(!element.children["Sku"].nullable);
        assert!(element.children["Qty"].nullable);
    }

    #[test]
    fn test_empty_array_has_no_element_shape() {
        let shape = FieldShape::from_value("Tags", &value(json!([]))).unwrap();
        assert_eq!(shape.type_set, tags(&[TypeTag::Array]));
        assert!(shape.element_shape.is_none());
    }

    #[test]
    fn test_rejected_value_leaves_shape_untouched() {
        let mut shape = FieldShape::from_value("Score", &RawValue::Float(1.0)).unwrap();
        let before = shape.clone();
        let err = shape.merge_value(Some(&RawValue::Float(f64::NAN))).unwrap_err();
        assert!(matches!(err, InferenceError::UnsupportedValue { .. }));
        assert_eq!(shape, before);
    }

    #[test]
    fn test_idempotent_type_union() {
        let doc = value(json!({"a": [1, "x"], "b": {"c": null}}));
        let mut once = FieldShape::from_value("", &doc).unwrap();
        let snapshot = once.clone();
        once.merge_value(Some(&doc)).unwrap();

        assert_eq!(once.type_set, snapshot.type_set);
        assert_eq!(once.nullable, snapshot.nullable);
        assert!(once.children["b"].children["c"].nullable);
        assert_eq!(
            once.children["a"].element_shape.as_ref().unwrap().type_set,
            snapshot.children["a"].element_shape.as_ref().unwrap().type_set
        );
    }
}
