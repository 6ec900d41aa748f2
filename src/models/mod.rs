//! Data models for itemdb.

mod item;

pub use item::{ID_FIELD, Item, ItemDraft, ItemId, LEGACY_ID_FIELD};
