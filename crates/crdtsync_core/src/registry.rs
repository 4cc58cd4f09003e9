//! Entity type registry.

use crate::error::{CoreError, CoreResult};
use crate::record::{Fields, Record};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Name of the built-in todo list entity type.
pub const TODOS: &str = "todos";

/// Describes one entity type: how new records are validated and completed,
/// and what the main replica holds after a reset.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    name: String,
    required_fields: Vec<String>,
    defaults: Fields,
    seed: Vec<Record>,
}

impl EntityDescriptor {
    /// Creates a descriptor with no requirements, defaults or seed records.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_fields: Vec::new(),
            defaults: Fields::new(),
            seed: Vec::new(),
        }
    }

    /// Requires a non-empty value for `field` on create.
    #[must_use]
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required_fields.push(field.into());
        self
    }

    /// Fills `field` with `value` when a new record leaves it out.
    #[must_use]
    pub fn default_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(field.into(), value.into());
        self
    }

    /// Adds a record written to main on reset.
    #[must_use]
    pub fn seed(mut self, record: Record) -> Self {
        self.seed.push(record);
        self
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fields required on create.
    #[must_use]
    pub fn required_fields(&self) -> &[String] {
        &self.required_fields
    }

    /// Returns the seed records.
    #[must_use]
    pub fn seed_records(&self) -> &[Record] {
        &self.seed
    }

    /// Checks the fields of a new record.
    ///
    /// A required field must be present and not null, `false` or an empty
    /// string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingField`] for the first field that fails.
    pub fn validate_new(&self, fields: &Fields) -> CoreResult<()> {
        for field in &self.required_fields {
            let present = match fields.get(field) {
                None | Some(Value::Null) | Some(Value::Bool(false)) => false,
                Some(Value::String(s)) => !s.is_empty(),
                Some(_) => true,
            };
            if !present {
                return Err(CoreError::MissingField {
                    entity_type: self.name.clone(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns `fields` completed with this type's defaults.
    #[must_use]
    pub fn with_defaults(&self, mut fields: Fields) -> Fields {
        for (name, value) in &self.defaults {
            fields.entry(name.clone()).or_insert_with(|| value.clone());
        }
        fields
    }

    /// The built-in todo list: `title` and `description` required, `done`
    /// defaults to false, seeded with one open item.
    #[must_use]
    pub fn todos() -> Self {
        let seed = Record::new(
            "1",
            json_object(json!({
                "title": "Buy milk",
                "description": "Get 2L of milk",
                "done": false,
            })),
        );
        Self::new(TODOS)
            .require("title")
            .require("description")
            .default_value("done", false)
            .seed(seed)
    }
}

fn json_object(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Table of known entity types.
///
/// Adding an entity type is a registration; nothing in the session layer
/// branches on entity type names.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    descriptors: BTreeMap<String, EntityDescriptor>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in entity types.
    #[must_use]
    pub fn with_builtin() -> Self {
        Self::empty().with(EntityDescriptor::todos())
    }

    /// Registers a descriptor, replacing any previous one of the same name.
    #[must_use]
    pub fn with(mut self, descriptor: EntityDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Registers a descriptor, returning the one it replaced.
    pub fn register(&mut self, descriptor: EntityDescriptor) -> Option<EntityDescriptor> {
        self.descriptors
            .insert(descriptor.name.clone(), descriptor)
    }

    /// Looks up a descriptor.
    #[must_use]
    pub fn get(&self, entity_type: &str) -> Option<&EntityDescriptor> {
        self.descriptors.get(entity_type)
    }

    /// Returns true if the entity type is registered.
    #[must_use]
    pub fn contains(&self, entity_type: &str) -> bool {
        self.descriptors.contains_key(entity_type)
    }

    /// Iterates over descriptors sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.descriptors.values()
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.descriptors.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn todos_validation() {
        let todos = EntityDescriptor::todos();
        let ok = json_object(json!({"title": "t", "description": "d"}));
        assert!(todos.validate_new(&ok).is_ok());

        let missing = json_object(json!({"title": "t"}));
        match todos.validate_new(&missing) {
            Err(CoreError::MissingField { field, .. }) => assert_eq!(field, "description"),
            other => panic!("expected missing field, got {other:?}"),
        }

        let empty = json_object(json!({"title": "", "description": "d"}));
        assert!(todos.validate_new(&empty).is_err());
    }

    #[test]
    fn defaults_fill_missing_fields_only() {
        let todos = EntityDescriptor::todos();
        let filled = todos.with_defaults(json_object(json!({"title": "t"})));
        assert_eq!(filled.get("done"), Some(&json!(false)));

        let kept = todos.with_defaults(json_object(json!({"done": true})));
        assert_eq!(kept.get("done"), Some(&json!(true)));
    }

    #[test]
    fn builtin_registry_has_todos() {
        let registry = EntityRegistry::with_builtin();
        assert!(registry.contains(TODOS));
        assert_eq!(registry.names(), vec![TODOS.to_string()]);
        let seed = registry.get(TODOS).unwrap().seed_records();
        assert_eq!(seed.len(), 1);
        assert_eq!(seed[0].get("title"), Some(&json!("Buy milk")));
    }

    #[test]
    fn registration_replaces() {
        let mut registry = EntityRegistry::with_builtin();
        let previous = registry.register(EntityDescriptor::new(TODOS));
        assert!(previous.is_some());
        assert!(registry.get(TODOS).unwrap().required_fields().is_empty());

        let registry = registry.with(EntityDescriptor::new("notes").require("body"));
        assert_eq!(registry.iter().count(), 2);
    }
}
