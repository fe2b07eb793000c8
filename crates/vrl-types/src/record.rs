use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the field that marks a record as deleted on the wire.
pub const DELETED_FIELD: &str = "deleted";

/// Deletion marker carried by a tombstone record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tombstone;

/// Decoded domain object extracted from a ledger entry's payload.
///
/// A string-keyed mapping of JSON values plus an explicit tombstone marker.
/// On the wire the marker is `"deleted": true`; any other value of
/// `deleted` is an ordinary field. Records are transient and never persisted
/// independently of the entry they were decoded from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
    tombstone: Option<Tombstone>,
}

impl Record {
    /// An empty record with no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a field map, lifting `"deleted": true` into the
    /// tombstone marker.
    pub fn from_fields(mut fields: BTreeMap<String, Value>) -> Self {
        let tombstone = match fields.get(DELETED_FIELD) {
            Some(Value::Bool(true)) => {
                fields.remove(DELETED_FIELD);
                Some(Tombstone)
            }
            _ => None,
        };
        Self { fields, tombstone }
    }

    /// Build a record from a JSON object.
    pub fn from_object(object: Map<String, Value>) -> Self {
        Self::from_fields(object.into_iter().collect())
    }

    /// The tombstone appended by a delete: `{key_field: key, deleted: true}`.
    pub fn tombstone(key_field: &str, key: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(key_field.to_string(), Value::String(key.to_string()));
        Self {
            fields,
            tombstone: Some(Tombstone),
        }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a field. Inserting `deleted = true` marks the record as a
    /// tombstone instead of storing a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if name == DELETED_FIELD && value == Value::Bool(true) {
            self.fields.remove(DELETED_FIELD);
            self.tombstone = Some(Tombstone);
        } else {
            self.fields.insert(name, value);
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// The string value of `key_field`, if present and a string.
    ///
    /// Only string values take part in key lookups.
    pub fn key_value(&self, key_field: &str) -> Option<&str> {
        self.fields.get(key_field).and_then(Value::as_str)
    }

    pub fn tombstone_marker(&self) -> Option<Tombstone> {
        self.tombstone
    }

    pub fn is_tombstone(&self) -> bool {
        self.tombstone.is_some()
    }

    /// Returns `true` if the record carries nothing worth writing.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.tombstone.is_none()
    }

    /// Flatten into the wire-level JSON object.
    pub fn to_object(&self) -> Map<String, Value> {
        let mut object: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if self.tombstone.is_some() {
            object.insert(DELETED_FIELD.to_string(), Value::Bool(true));
        }
        object
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_object())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_object().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(object) => Ok(Self::from_object(object)),
            other => Err(de::Error::custom(format!(
                "expected a JSON object for a record, found {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deleted_true_becomes_tombstone() {
        let record: Record = serde_json::from_value(json!({"vin": "V1", "deleted": true})).unwrap();
        assert!(record.is_tombstone());
        assert!(record.field(DELETED_FIELD).is_none());
        assert_eq!(record.to_json(), json!({"vin": "V1", "deleted": true}));
    }

    #[test]
    fn deleted_false_stays_a_field() {
        let record = Record::new().with("vin", "V1").with("deleted", false);
        assert!(!record.is_tombstone());
        assert_eq!(record.field(DELETED_FIELD), Some(&Value::Bool(false)));
    }

    #[test]
    fn tombstone_constructor() {
        let t = Record::tombstone("vin", "V1");
        assert_eq!(t.key_value("vin"), Some("V1"));
        assert_eq!(t.tombstone_marker(), Some(Tombstone));
        assert!(!t.is_empty());
    }

    #[test]
    fn key_value_ignores_non_strings() {
        let record = Record::new().with("vin", 42).with("plate", "ABC");
        assert_eq!(record.key_value("vin"), None);
        assert_eq!(record.key_value("plate"), Some("ABC"));
        assert_eq!(record.key_value("missing"), None);
    }

    #[test]
    fn empty_record() {
        assert!(Record::new().is_empty());
        assert!(!Record::new().with("vin", "V1").is_empty());
    }

    #[test]
    fn deserialize_rejects_non_objects() {
        assert!(serde_json::from_value::<Record>(json!([1, 2])).is_err());
    }
}
