//! Schema declarations.
//!
//! A schema is declared once per process group and lists the fields a record
//! may carry, their default values, and whether they are event-only.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::StateError;
use crate::Values;

/// One declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Value used when the field is not given at creation.
    pub default: Value,
    /// Event fields are delivered to observers but never stored.
    pub event: bool,
}

/// Schema of a replicated record.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    fields: BTreeMap<String, FieldSpec>,
}

impl Schema {
    /// Start a schema declaration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Declare a stored field with a default value.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, default: Value) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                default,
                event: false,
            },
        );
        self
    }

    /// Declare an event-only field.
    #[must_use]
    pub fn event_field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                default: Value::Null,
                event: true,
            },
        );
        self
    }

    /// Schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `field` is declared.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Whether `field` is declared as event-only.
    #[must_use]
    pub fn is_event(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|def| def.event)
    }

    /// Default values of every stored field.
    #[must_use]
    pub fn defaults(&self) -> Values {
        self.fields
            .iter()
            .filter(|(_, def)| !def.event)
            .map(|(name, def)| (name.clone(), def.default.clone()))
            .collect()
    }

    /// Reject values naming undeclared fields.
    pub fn validate(&self, values: &Values) -> Result<(), StateError> {
        match values.keys().find(|key| !self.has_field(key)) {
            Some(field) => Err(StateError::UnknownField {
                schema: self.name.clone(),
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Copy the stored (non-event) part of `values` into `target`.
    ///
    /// Returns whether any stored field was written.
    pub fn merge_stored(&self, target: &mut Values, values: &Values) -> bool {
        let mut changed = false;
        for (key, value) in values {
            if !self.is_event(key) {
                target.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new("source")
            .field("id", Value::Null)
            .field("active", json!(false))
            .event_field("frame")
    }

    #[test]
    fn test_defaults_skip_event_fields() {
        let defaults = schema().defaults();
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults["active"], json!(false));
        assert!(!defaults.contains_key("frame"));
    }

    #[test]
    fn test_validate_unknown_field() {
        let mut values = Values::new();
        values.insert("colour".into(), json!("red"));
        let err = schema().validate(&values).unwrap_err();
        assert_eq!(
            err,
            StateError::UnknownField {
                schema: "source".into(),
                field: "colour".into()
            }
        );
    }

    #[test]
    fn test_merge_stored_ignores_events() {
        let schema = schema();
        let mut target = schema.defaults();
        let mut frame_only = Values::new();
        frame_only.insert("frame".into(), json!([1]));
        assert!(!schema.merge_stored(&mut target, &frame_only));

        let mut active = Values::new();
        active.insert("active".into(), json!(true));
        assert!(schema.merge_stored(&mut target, &active));
        assert_eq!(target["active"], json!(true));
    }
}
