//! Item and item identifier types.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Field that carries the item identifier.
pub const ID_FIELD: &str = "id";

/// Identifier field used by document stores; accepted on input only.
pub const LEGACY_ID_FIELD: &str = "_id";

/// Unique identifier for an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an item ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, time-ordered identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An item payload that has been validated but may not have an identifier yet.
///
/// Produced from client input before it reaches a store.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    id: Option<ItemId>,
    fields: Map<String, Value>,
}

impl ItemDraft {
    /// Validates a JSON payload as an item.
    ///
    /// The payload must be an object. `id` (or `_id` when `id` is absent) is
    /// taken as the identifier; `null` and `""` count as not supplied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the payload is not an object or the
    /// identifier is not a string.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(Error::InvalidInput(format!(
                "item must be a JSON object, got {}",
                json_type_name(&value)
            )));
        };

        let id = fields.remove(ID_FIELD).filter(is_supplied);
        let legacy = fields.remove(LEGACY_ID_FIELD);
        let raw_id = id.or(legacy);

        let id = match raw_id {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(ItemId::new(s)),
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "item id must be a string, got {}",
                    json_type_name(&other)
                )));
            },
        };

        Ok(Self { id, fields })
    }

    /// Returns the supplied identifier, if any.
    #[must_use]
    pub const fn id(&self) -> Option<&ItemId> {
        self.id.as_ref()
    }

    /// Converts into an item, generating an identifier when none was supplied.
    #[must_use]
    pub fn into_item(self) -> Item {
        let id = self.id.unwrap_or_else(ItemId::generate);
        Item {
            id,
            fields: self.fields,
        }
    }
}

/// A stored item: an identifier plus arbitrary JSON fields.
///
/// Serializes as a flat JSON object with the identifier under `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Item {
    id: ItemId,
    fields: Map<String, Value>,
}

impl Item {
    /// Creates an item from an identifier and its non-identifier fields.
    ///
    /// Any `id`/`_id` key in `fields` is dropped in favour of `id`.
    #[must_use]
    pub fn new(id: ItemId, mut fields: Map<String, Value>) -> Self {
        fields.remove(ID_FIELD);
        fields.remove(LEGACY_ID_FIELD);
        Self { id, fields }
    }

    /// Builds the replacement state for an existing item.
    ///
    /// All fields come from `value`; the identifier is forced to `id`
    /// whatever the payload says.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `value` is not a JSON object.
    pub fn replacing(id: ItemId, value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self::new(id, fields)),
            other => Err(Error::InvalidInput(format!(
                "item must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Returns the item identifier.
    #[must_use]
    pub const fn id(&self) -> &ItemId {
        &self.id
    }

    /// Returns the item identifier as a string slice.
    #[must_use]
    pub fn id_str(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the fields other than the identifier.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns a single field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == ID_FIELD {
            return None;
        }
        self.fields.get(field)
    }

    /// Returns the item as a JSON object including `id`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl From<Item> for Value {
    fn from(item: Item) -> Self {
        let mut map = item.fields;
        map.insert(ID_FIELD.to_string(), Self::String(item.id.0));
        Self::Object(map)
    }
}

impl TryFrom<Value> for Item {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let draft = ItemDraft::from_value(value)?;
        let Some(id) = draft.id else {
            return Err(Error::InvalidInput(
                "stored item is missing its id".to_string(),
            ));
        };
        Ok(Self {
            id,
            fields: draft.fields,
        })
    }
}

/// `null` and `""` identifiers count as not supplied.
fn is_supplied(id: &Value) -> bool {
    match id {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

const fn json_type_name(value: &Value) -> &'static str {
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
    use super::*;
    use serde_json::json;

    #[test]
    fn test_draft_rejects_non_objects() {
        for value in [json!([1, 2]), json!("text"), json!(3), Value::Null] {
            let result = ItemDraft::from_value(value);
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }
    }

    #[test]
    fn test_draft_rejects_non_string_id() {
        let result = ItemDraft::from_value(json!({ "id": 42, "name": "a" }));
        assert!(matches!(result, Err(Error::InvalidInput(msg)) if msg.contains("number")));
    }

    #[test]
    fn test_draft_treats_empty_id_as_absent() {
        let draft = ItemDraft::from_value(json!({ "id": "", "name": "a" })).unwrap();
        assert!(draft.id().is_none());

        let draft = ItemDraft::from_value(json!({ "id": null })).unwrap();
        assert!(draft.id().is_none());
    }

    #[test]
    fn test_draft_accepts_legacy_id() {
        let draft = ItemDraft::from_value(json!({ "_id": "abc", "name": "a" })).unwrap();
        assert_eq!(draft.id(), Some(&ItemId::new("abc")));

        let item = draft.into_item();
        assert_eq!(item.to_value(), json!({ "id": "abc", "name": "a" }));
    }

    #[test]
    fn test_blank_id_falls_back_to_legacy_id() {
        for id in [json!(""), Value::Null] {
            let draft = ItemDraft::from_value(json!({ "id": id, "_id": "abc", "n": 1 })).unwrap();
            let item = draft.into_item();
            assert_eq!(item.to_value(), json!({ "id": "abc", "n": 1 }));
        }
    }

    #[test]
    fn test_id_wins_over_legacy_id() {
        let draft = ItemDraft::from_value(json!({ "id": "x", "_id": "y" })).unwrap();
        let item = draft.into_item();
        assert_eq!(item.id_str(), "x");
        assert!(item.fields().is_empty());
    }

    #[test]
    fn test_into_item_generates_id() {
        let a = ItemDraft::from_value(json!({ "name": "a" })).unwrap().into_item();
        let b = ItemDraft::from_value(json!({ "name": "b" })).unwrap().into_item();
        assert!(!a.id_str().is_empty());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.get("name"), Some(&json!("a")));
    }

    #[test]
    fn test_replacing_forces_id() {
        let item = Item::replacing(ItemId::new("keep"), json!({ "id": "other", "n": 1 })).unwrap();
        assert_eq!(item.id_str(), "keep");
        assert_eq!(item.to_value(), json!({ "id": "keep", "n": 1 }));

        let result = Item::replacing(ItemId::new("keep"), json!([1]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_item_serde_shape() {
        let item = Item::new(ItemId::new("1"), Map::new());
        let text = serde_json::to_string(&item).unwrap();
        assert_eq!(text, r#"{"id":"1"}"#);

        let parsed: Item = serde_json::from_str(r#"{"id":"7","name":"x"}"#).unwrap();
        assert_eq!(parsed.id_str(), "7");
        assert_eq!(parsed.get("name"), Some(&json!("x")));

        let missing: std::result::Result<Item, _> = serde_json::from_str(r#"{"name":"x"}"#);
        assert!(missing.is_err());
    }
}
