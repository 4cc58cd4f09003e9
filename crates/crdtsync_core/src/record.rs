//! Records: the addressable unit inside a document.

use crate::error::{CoreError, CoreResult};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Name of the identifier field in a record's flat representation.
pub const ID_FIELD: &str = "id";

/// Field values of a record, keyed by field name. Never contains [`ID_FIELD`].
pub type Fields = Map<String, Value>;

/// Stable identifier of a record within one document.
///
/// Ids are assigned when a record is created and never mutated. A document
/// remembers removed ids, so an id is never reused either.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A record as seen by clients: an id plus its current field values.
///
/// Serializes as one flat JSON object, `{"id": "...", "title": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Record id.
    pub id: RecordId,
    /// Field values, excluding the id.
    pub fields: Fields,
}

impl Record {
    /// Creates a record.
    pub fn new(id: impl Into<RecordId>, mut fields: Fields) -> Self {
        fields.remove(ID_FIELD);
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Builds a record from a flat JSON object carrying a string `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRecord`] if the value is not an object or
    /// has no string id.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        serde_json::from_value(value).map_err(|e| CoreError::InvalidRecord(e.to_string()))
    }

    /// Returns the flat JSON form of the record.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert(ID_FIELD.to_string(), Value::String(self.id.0.clone()));
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.clone());
        }
        Value::Object(object)
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(ID_FIELD, &self.id)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Fields::deserialize(deserializer)?;
        let id = match fields.remove(ID_FIELD) {
            Some(Value::String(id)) => RecordId(id),
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "record id must be a string, got {other}"
                )))
            }
            None => return Err(de::Error::missing_field(ID_FIELD)),
        };
        Ok(Self { id, fields })
    }
}

/// Input for creating a record: the id is optional and assigned on insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Caller-chosen id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Initial field values.
    #[serde(flatten)]
    pub fields: Fields,
}

impl NewRecord {
    /// Creates input without an id.
    #[must_use]
    pub fn new(fields: Fields) -> Self {
        Self { id: None, fields }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Computes the fields of `update` that differ from `current`.
///
/// The id field is never part of the delta. A field counts as changed when
/// it is missing from `current` or its value is not deeply equal.
#[must_use]
pub fn diff_fields(current: &Fields, update: &Fields) -> Fields {
    update
        .iter()
        .filter(|(name, _)| name.as_str() != ID_FIELD)
        .filter(|(name, value)| current.get(name.as_str()) != Some(*value))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn record_flat_json_shape() {
        let record = Record::new("1", fields(json!({"title": "Buy milk", "done": false})));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"id": "1", "title": "Buy milk", "done": false}));
        assert_eq!(record.to_value(), value);

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn record_new_strips_id_field() {
        let record = Record::new("1", fields(json!({"id": "other", "title": "x"})));
        assert_eq!(record.id.as_str(), "1");
        assert!(record.get(ID_FIELD).is_none());
    }

    #[test]
    fn record_requires_string_id() {
        assert!(Record::from_value(json!({"title": "no id"})).is_err());
        assert!(Record::from_value(json!({"id": 7})).is_err());
        assert!(Record::from_value(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn new_record_accepts_missing_id() {
        let input: NewRecord = serde_json::from_value(json!({"title": "t"})).unwrap();
        assert!(input.id.is_none());
        assert_eq!(input.fields.get("title"), Some(&json!("t")));

        let input: NewRecord = serde_json::from_value(json!({"id": "9", "title": "t"})).unwrap();
        assert_eq!(input.id, Some(RecordId::from("9")));
        assert!(!input.fields.contains_key(ID_FIELD));
    }

    #[test]
    fn diff_skips_unchanged_and_id() {
        let current = fields(json!({"title": "Buy milk", "done": false, "tags": ["a"]}));
        let update = fields(json!({"id": "1", "title": "Buy milk", "done": true, "tags": ["a"]}));

        let delta = diff_fields(&current, &update);
        assert_eq!(delta, fields(json!({"done": true})));
    }

    #[test]
    fn diff_reports_new_fields() {
        let current = fields(json!({"title": "x"}));
        let update = fields(json!({"title": "x", "priority": 2}));
        assert_eq!(diff_fields(&current, &update), fields(json!({"priority": 2})));
    }

    #[test]
    fn diff_of_identical_is_empty() {
        let current = fields(json!({"title": "x", "nested": {"a": [1, 2]}}));
        assert!(diff_fields(&current, &current.clone()).is_empty());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }
}
