//! Property-based tests for item normalisation.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Supplied string identifiers are kept exactly
//! - Non-identifier fields pass through untouched
//! - Serialized items always carry exactly one `id` and never `_id`
//! - Replacement always keeps the path identifier

#![allow(clippy::expect_used, clippy::unwrap_used)]

use itemdb::models::{Item, ItemDraft, ItemId};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn field_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,12}".prop_filter("reserved", |k| k != "id")
}

fn field_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,24}".prop_map(Value::from),
        Just(Value::Null),
        prop::collection::vec(any::<i32>(), 0..4).prop_map(|v| json!(v)),
    ]
}

fn fields() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(field_name(), field_value(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    /// Property: a non-empty string id is kept verbatim.
    #[test]
    fn prop_supplied_id_is_kept(id in "[A-Za-z0-9_-]{1,64}", fields in fields()) {
        let mut payload = fields.clone();
        payload.insert("id".to_string(), Value::from(id.clone()));

        let item = ItemDraft::from_value(Value::Object(payload)).unwrap().into_item();
        prop_assert_eq!(item.id_str(), id.as_str());
        prop_assert_eq!(item.fields(), &fields);
    }

    /// Property: without an id one is generated and the fields are unchanged.
    #[test]
    fn prop_missing_id_is_generated(fields in fields()) {
        let item = ItemDraft::from_value(Value::Object(fields.clone())).unwrap().into_item();
        prop_assert!(!item.id_str().is_empty());
        prop_assert_eq!(item.fields(), &fields);
    }

    /// Property: the serialized form has `id` and no `_id`.
    #[test]
    fn prop_serialized_item_has_single_id(legacy in "[a-z0-9]{1,16}", fields in fields()) {
        let mut payload = fields;
        payload.insert("_id".to_string(), Value::from(legacy.clone()));

        let value = ItemDraft::from_value(Value::Object(payload)).unwrap().into_item().to_value();
        prop_assert_eq!(&value["id"], &Value::from(legacy));
        prop_assert!(value.get("_id").is_none());
    }

    /// Property: replacement ignores any id in the payload.
    #[test]
    fn prop_replacing_keeps_path_id(
        path_id in "[a-z0-9]{1,16}",
        body_id in "[a-z0-9]{1,16}",
        fields in fields(),
    ) {
        let mut payload = fields.clone();
        payload.insert("id".to_string(), Value::from(body_id));

        let item = Item::replacing(ItemId::new(path_id.clone()), Value::Object(payload)).unwrap();
        prop_assert_eq!(item.id_str(), path_id.as_str());
        prop_assert_eq!(item.fields(), &fields);
    }

    /// Property: numeric ids are always rejected.
    #[test]
    fn prop_numeric_id_is_invalid(id in any::<i64>()) {
        let result = ItemDraft::from_value(json!({ "id": id }));
        prop_assert!(matches!(result, Err(itemdb::Error::InvalidInput(_))));
    }

    /// Property: an item survives a JSON text round trip.
    #[test]
    fn prop_item_json_text_round_trip(id in "[a-z0-9]{1,16}", fields in fields()) {
        let item = Item::new(ItemId::new(id), fields);
        let text = serde_json::to_string(&item).unwrap();
        let parsed: Item = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(parsed, item);
    }
}
