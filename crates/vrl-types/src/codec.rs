use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::record::Record;

/// Deterministic codec between [`Record`]s and ledger payloads.
///
/// Payloads are compact UTF-8 JSON objects with keys sorted at every nesting
/// level, so equal records always encode to identical bytes (and therefore
/// identical payload digests).
pub struct RecordCodec;

impl RecordCodec {
    /// Encode a record as a canonical JSON payload.
    pub fn encode(record: &Record) -> Vec<u8> {
        canonicalize(record.to_json()).to_string().into_bytes()
    }

    /// Decode a payload into a record.
    ///
    /// Non-UTF-8, non-JSON, truncated, and non-object payloads are rejected
    /// without side effects.
    pub fn decode(payload: &[u8]) -> Result<Record, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        let text = std::str::from_utf8(payload).map_err(|e| DecodeError::Utf8(e.to_string()))?;
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
        match value {
            Value::Object(object) => Ok(Record::from_object(object)),
            other => Err(DecodeError::NotAnObject(json_kind(&other))),
        }
    }
}

/// Rebuild every object with its keys in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<(String, Value)> = object.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn encoding_is_sorted_and_compact() {
        let record = Record::new()
            .with("vin", "V1")
            .with("vehicle_make", "Toyota")
            .with("specs", json!({"z": 1, "a": {"y": true, "b": null}}));
        let payload = RecordCodec::encode(&record);
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            r#"{"specs":{"a":{"b":null,"y":true},"z":1},"vehicle_make":"Toyota","vin":"V1"}"#
        );
    }

    #[test]
    fn tombstone_encodes_deleted_flag() {
        let payload = RecordCodec::encode(&Record::tombstone("vin", "V1"));
        assert_eq!(payload, br#"{"deleted":true,"vin":"V1"}"#.to_vec());
        assert!(RecordCodec::decode(&payload).unwrap().is_tombstone());
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        assert_eq!(RecordCodec::decode(b""), Err(DecodeError::Empty));
        assert!(matches!(RecordCodec::decode(&[0xff, 0xfe]), Err(DecodeError::Utf8(_))));
        assert!(matches!(RecordCodec::decode(b"{\"vin\": \"V1\""), Err(DecodeError::Json(_))));
        assert!(matches!(RecordCodec::decode(b"not json"), Err(DecodeError::Json(_))));
        assert_eq!(
            RecordCodec::decode(b"[1,2,3]"),
            Err(DecodeError::NotAnObject("array"))
        );
        assert_eq!(RecordCodec::decode(b"\"vin\""), Err(DecodeError::NotAnObject("string")));
    }

    #[test]
    fn equal_records_have_equal_payloads() {
        let a = Record::new().with("b", 2).with("a", 1);
        let b = Record::new().with("a", 1).with("b", 2);
        assert_eq!(RecordCodec::encode(&a), RecordCodec::encode(&b));
    }

    #[test]
    fn floats_survive_exactly() {
        for reading in [1.3652434853932423e300, 0.1, -2.5e-308, 123456.789] {
            let record = Record::new().with("odometer", reading);
            let decoded = RecordCodec::decode(&RecordCodec::encode(&record)).unwrap();
            assert_eq!(decoded.field("odometer").and_then(Value::as_f64), Some(reading));
            assert_eq!(decoded, record);
        }
    }

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            any::<f64>()
                .prop_filter("finite", |f| f.is_finite())
                .prop_map(Value::from),
            "[a-zA-Z0-9 _-]{0,12}".prop_map(Value::String),
        ]
    }

    fn json_value() -> impl Strategy<Value = Value> {
        scalar().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(fields in prop::collection::btree_map("[a-z_]{1,10}", json_value(), 0..8)) {
            let record = Record::from_fields(fields.into_iter().collect::<BTreeMap<_, _>>());
            let decoded = RecordCodec::decode(&RecordCodec::encode(&record)).unwrap();
            prop_assert_eq!(decoded, record);
        }
    }
}
