//! Value type classification

use super::error::InferenceError;
use super::formats::is_datetime;
use super::types::{RawValue, TypeTag};

/// Classify a value into exactly one type tag
///
/// Date and date-time strings classify as `datetime`. Non-finite floats are
/// the only values without a representation and fail with
/// [`InferenceError::UnsupportedValue`].
pub fn classify(value: &RawValue) -> Result<TypeTag, InferenceError> {
    classify_with(value, true)
}

/// Classify a value, optionally treating datetime strings as plain strings
pub fn classify_with(value: &RawValue, detect_datetimes: bool) -> Result<TypeTag, InferenceError> {
    let tag = match value {
        RawValue::Null => TypeTag::Null,
        RawValue::Bool(_) => TypeTag::Boolean,
        RawValue::Integer(_) => TypeTag::Integer,
        RawValue::Float(f) if !f.is_finite() => {
            return Err(InferenceError::unsupported(format!(
                "{} {}",
                value.representation(),
                f
            )));
        }
        RawValue::Float(_) => TypeTag::Float,
        RawValue::String(s) if detect_datetimes && is_datetime(s) => TypeTag::Datetime,
        RawValue::String(_) => TypeTag::String,
        RawValue::Sequence(_) => TypeTag::Array,
        RawValue::Mapping(_) => TypeTag::Object,
        RawValue::Binary(_) => TypeTag::Binary,
    };
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_classify_scalars() {
        assert_eq!(classify(&RawValue::Null).unwrap(), TypeTag::Null);
        assert_eq!(classify(&RawValue::Bool(true)).unwrap(), TypeTag::Boolean);
        assert_eq!(classify(&RawValue::Integer(-4)).unwrap(), TypeTag::Integer);
        assert_eq!(classify(&RawValue::Float(12.5)).unwrap(), TypeTag::Float);
        assert_eq!(
            classify(&RawValue::String("toy1".into())).unwrap(),
            TypeTag::String
        );
        assert_eq!(
            classify(&RawValue::Binary(vec![0xde, 0xad])).unwrap(),
            TypeTag::Binary
        );
    }

    #[test]
    fn test_classify_datetime_strings() {
        let date = RawValue::String("2024-01-15".into());
        let stamp = RawValue::String("2024-01-15T10:30:00.0000000Z".into());
        assert_eq!(classify(&date).unwrap(), TypeTag::Datetime);
        assert_eq!(classify(&stamp).unwrap(), TypeTag::Datetime);
        assert_eq!(classify_with(&stamp, false).unwrap(), TypeTag::String);
    }

    #[test]
    fn test_classify_containers() {
        assert_eq!(
            classify(&RawValue::Sequence(vec![])).unwrap(),
            TypeTag::Array
        );
        assert_eq!(
            classify(&RawValue::Mapping(BTreeMap::new())).unwrap(),
            TypeTag::Object
        );
    }

    #[test]
    fn test_classify_non_finite_float() {
        let err = classify(&RawValue::Float(f64::NAN)).unwrap_err();
        assert!(err.to_string().contains("f64 NaN"));
        assert!(classify(&RawValue::Float(f64::INFINITY)).is_err());
    }
}
