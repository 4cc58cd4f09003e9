//! Record list documents backed by automerge.

use crate::actor::ActorId;
use crate::error::{CoreError, CoreResult};
use crate::record::{Fields, Record, RecordId, ID_FIELD};
use automerge::transaction::{CommitOptions, Transactable};
use automerge::{Automerge, ChangeHash, ObjId, ObjType, Prop, ReadDoc, ScalarValue, ROOT};
use serde_json::{Map, Number, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const ENTITY_TYPE_KEY: &str = "entityType";
const LIST_KEY: &str = "list";
const RETIRED_KEY: &str = "retired";

/// Author of the skeleton change every replica starts from.
///
/// The skeleton is written by this actor at time zero, so replicas of one
/// entity type created independently share the same first change and merge
/// into one list.
const SKELETON_ACTOR: [u8; 16] = *b"crdtsync.init\0\0\0";

/// The full, mergeable state of one entity type.
///
/// Root layout:
///
/// ```text
/// { entityType: "todos", list: [ {id, ...fields}, ... ], retired: { id: true } }
/// ```
///
/// Every edit and every merge returns a new document and leaves the receiver
/// untouched. Removed ids are kept in `retired` so they are never reused.
#[derive(Debug, Clone)]
pub struct Document {
    entity_type: String,
    doc: Automerge,
    list: ObjId,
    retired: ObjId,
}

impl Document {
    /// Creates the empty document for an entity type.
    ///
    /// # Errors
    ///
    /// Fails only if automerge rejects the skeleton change.
    pub fn new(entity_type: impl Into<String>) -> CoreResult<Self> {
        let entity_type = entity_type.into();
        let mut doc = Automerge::new();
        doc.set_actor(automerge::ActorId::from(&SKELETON_ACTOR[..]));

        let mut tx = doc.transaction();
        tx.put(ROOT, ENTITY_TYPE_KEY, entity_type.as_str())?;
        let list = tx.put_object(ROOT, LIST_KEY, ObjType::List)?;
        let retired = tx.put_object(ROOT, RETIRED_KEY, ObjType::Map)?;
        tx.commit_with(CommitOptions::default().with_time(0));

        Ok(Self {
            entity_type,
            doc,
            list,
            retired,
        })
    }

    /// Loads a document saved with [`Document::save`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] if the bytes are not an automerge
    /// document with the record list layout.
    pub fn load(bytes: &[u8]) -> CoreResult<Self> {
        let doc = Automerge::load(bytes).map_err(|e| CoreError::Decode(e.to_string()))?;
        let entity_type = match read_value(&doc, &ROOT, ENTITY_TYPE_KEY.into()) {
            Some(Value::String(name)) => name,
            _ => return Err(CoreError::Decode("document has no entity type".into())),
        };
        let list = root_object(&doc, LIST_KEY, ObjType::List)?;
        let retired = root_object(&doc, RETIRED_KEY, ObjType::Map)?;
        Ok(Self {
            entity_type,
            doc,
            list,
            retired,
        })
    }

    /// Encodes the document with its full change history.
    #[must_use]
    pub fn save(&self) -> Vec<u8> {
        self.doc.save()
    }

    /// Returns the entity type.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the current heads, sorted.
    #[must_use]
    pub fn heads(&self) -> Vec<ChangeHash> {
        let mut heads = self.doc.get_heads();
        heads.sort();
        heads
    }

    /// Returns an opaque version derived from the heads. It only changes
    /// when an edit is recorded or a merge brings in new changes.
    #[must_use]
    pub fn version(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.heads().hash(&mut hasher);
        hasher.finish()
    }

    /// Returns the number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Returns true if there are no live records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns live records in list order.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        (0..self.doc.length(&self.list))
            .filter_map(|index| self.element(index))
            .filter_map(|element| self.read_record(&element))
            .collect()
    }

    /// Returns a live record.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        let (_, element) = self.position(id)?;
        self.read_record(&element)
    }

    /// Appends a record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateRecord`] if the id was ever used in
    /// this document, including by a removed record.
    pub fn insert(&self, actor: ActorId, record: &Record) -> CoreResult<Document> {
        if self.position(&record.id).is_some() || self.is_retired(&record.id) {
            return Err(CoreError::DuplicateRecord {
                entity_type: self.entity_type.clone(),
                id: record.id.to_string(),
            });
        }

        let index = self.doc.length(&self.list);
        let mut next = self.fork(actor);
        let mut tx = next.doc.transaction();
        let element = tx.insert_object(&self.list, index, ObjType::Map)?;
        tx.put(&element, ID_FIELD, record.id.as_str())?;
        for (name, value) in record.fields.iter().filter(|(name, _)| name.as_str() != ID_FIELD) {
            put_value(&mut tx, &element, name, value)?;
        }
        tx.commit();
        Ok(next)
    }

    /// Writes the given fields of a live record.
    ///
    /// Only the fields passed are written; every other field keeps its
    /// history untouched. An empty field set returns an identical document.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordNotFound`] if no live record has the id.
    pub fn update(&self, actor: ActorId, id: &RecordId, fields: &Fields) -> CoreResult<Document> {
        let (_, element) = self.position(id).ok_or_else(|| self.not_found(id))?;

        let changes: Vec<(&String, &Value)> = fields
            .iter()
            .filter(|(name, _)| name.as_str() != ID_FIELD)
            .collect();
        if changes.is_empty() {
            return Ok(self.clone());
        }

        let mut next = self.fork(actor);
        let mut tx = next.doc.transaction();
        for (name, value) in changes {
            put_value(&mut tx, &element, name, value)?;
        }
        tx.commit();
        Ok(next)
    }

    /// Removes a live record and retires its id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordNotFound`] if no live record has the id.
    pub fn remove(&self, actor: ActorId, id: &RecordId) -> CoreResult<Document> {
        let (index, _) = self.position(id).ok_or_else(|| self.not_found(id))?;

        let mut next = self.fork(actor);
        let mut tx = next.doc.transaction();
        tx.delete(&self.list, index)?;
        tx.put(&self.retired, id.as_str(), true)?;
        tx.commit();
        Ok(next)
    }

    /// Merges two replicas of the same entity type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityTypeMismatch`] if the entity types differ,
    /// or [`CoreError::Engine`] if automerge rejects the other history.
    pub fn merge(&self, other: &Document) -> CoreResult<Document> {
        if self.entity_type != other.entity_type {
            return Err(CoreError::EntityTypeMismatch {
                left: self.entity_type.clone(),
                right: other.entity_type.clone(),
            });
        }

        let mut merged = self.clone();
        let mut theirs = other.doc.clone();
        merged.doc.merge(&mut theirs)?;
        Ok(merged)
    }

    fn fork(&self, actor: ActorId) -> Document {
        let mut next = self.clone();
        next.doc.set_actor(actor.into());
        next
    }

    fn not_found(&self, id: &RecordId) -> CoreError {
        CoreError::RecordNotFound {
            entity_type: self.entity_type.clone(),
            id: id.to_string(),
        }
    }

    fn is_retired(&self, id: &RecordId) -> bool {
        matches!(self.doc.get(&self.retired, id.as_str()), Ok(Some(_)))
    }

    fn element(&self, index: usize) -> Option<ObjId> {
        match self.doc.get(&self.list, index).ok().flatten()? {
            (automerge::Value::Object(ObjType::Map), element) => Some(element),
            _ => None,
        }
    }

    fn position(&self, id: &RecordId) -> Option<(usize, ObjId)> {
        (0..self.doc.length(&self.list)).find_map(|index| {
            let element = self.element(index)?;
            match read_value(&self.doc, &element, ID_FIELD.into()) {
                Some(Value::String(found)) if found == id.as_str() => Some((index, element)),
                _ => None,
            }
        })
    }

    fn read_record(&self, element: &ObjId) -> Option<Record> {
        let id = match read_value(&self.doc, element, ID_FIELD.into())? {
            Value::String(id) => RecordId::from(id),
            _ => return None,
        };
        let fields = self
            .doc
            .keys(element)
            .filter(|name| name.as_str() != ID_FIELD)
            .filter_map(|name| {
                let value = read_value(&self.doc, element, name.as_str().into())?;
                Some((name, value))
            })
            .collect();
        Some(Record { id, fields })
    }
}

/// Documents are equal when they hold the same change history.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.entity_type == other.entity_type && self.heads() == other.heads()
    }
}

fn root_object(doc: &Automerge, key: &str, expected: ObjType) -> CoreResult<ObjId> {
    match doc.get(ROOT, key) {
        Ok(Some((automerge::Value::Object(kind), id))) if kind == expected => Ok(id),
        _ => Err(CoreError::Decode(format!("document has no {key} {expected:?}"))),
    }
}

fn read_value(doc: &Automerge, obj: &ObjId, prop: Prop) -> Option<Value> {
    match doc.get(obj, prop).ok().flatten()? {
        (automerge::Value::Scalar(scalar), _) => Some(scalar_to_json(&scalar)),
        (automerge::Value::Object(kind), child) => Some(object_to_json(doc, kind, &child)),
    }
}

fn object_to_json(doc: &Automerge, kind: ObjType, obj: &ObjId) -> Value {
    match kind {
        ObjType::List => Value::Array(
            (0..doc.length(obj))
                .filter_map(|index| read_value(doc, obj, index.into()))
                .collect(),
        ),
        ObjType::Text => Value::String(doc.text(obj).unwrap_or_default()),
        _ => Value::Object(
            doc.keys(obj)
                .filter_map(|key| {
                    let value = read_value(doc, obj, key.as_str().into())?;
                    Some((key, value))
                })
                .collect(),
        ),
    }
}

fn scalar_to_json(scalar: &ScalarValue) -> Value {
    match scalar {
        ScalarValue::Str(s) => Value::String(s.to_string()),
        ScalarValue::Int(n) | ScalarValue::Timestamp(n) => Value::from(*n),
        ScalarValue::Uint(n) => Value::from(*n),
        ScalarValue::F64(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        ScalarValue::Boolean(b) => Value::Bool(*b),
        _ => Value::Null,
    }
}

/// Converts a JSON leaf. Arrays and objects are written as automerge
/// objects by the callers and never reach here.
fn json_to_scalar(value: &Value) -> ScalarValue {
    match value {
        Value::Bool(b) => ScalarValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ScalarValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                ScalarValue::Uint(u)
            } else {
                ScalarValue::F64(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => ScalarValue::Str(s.as_str().into()),
        Value::Null | Value::Array(_) | Value::Object(_) => ScalarValue::Null,
    }
}

fn put_value<T: Transactable>(tx: &mut T, obj: &ObjId, key: &str, value: &Value) -> CoreResult<()> {
    match value {
        Value::Array(items) => {
            let list = tx.put_object(obj, key, ObjType::List)?;
            fill_list(tx, &list, items)
        }
        Value::Object(map) => {
            let inner = tx.put_object(obj, key, ObjType::Map)?;
            fill_map(tx, &inner, map)
        }
        leaf => Ok(tx.put(obj, key, json_to_scalar(leaf))?),
    }
}

fn fill_map<T: Transactable>(tx: &mut T, obj: &ObjId, map: &Map<String, Value>) -> CoreResult<()> {
    for (key, value) in map {
        put_value(tx, obj, key, value)?;
    }
    Ok(())
}

fn fill_list<T: Transactable>(tx: &mut T, obj: &ObjId, items: &[Value]) -> CoreResult<()> {
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::Array(inner) => {
                let list = tx.insert_object(obj, index, ObjType::List)?;
                fill_list(tx, &list, inner)?;
            }
            Value::Object(map) => {
                let child = tx.insert_object(obj, index, ObjType::Map)?;
                fill_map(tx, &child, map)?;
            }
            leaf => tx.insert(obj, index, json_to_scalar(leaf))?,
        }
    }
    Ok(())
}
