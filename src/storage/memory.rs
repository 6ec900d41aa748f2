//! In-memory item store.
//!
//! Keeps items in insertion order behind a tokio `RwLock`. Nothing is
//! persisted between runs; used by tests and throwaway servers.

use crate::models::{Item, ItemId};
use crate::storage::ItemStore;
use crate::{Error, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-memory item store.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    items: RwLock<Vec<Item>>,
}

impl MemoryItemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Returns true if no items are stored.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Item>> {
        Ok(self.items.read().await.clone())
    }

    async fn find(&self, id: &ItemId) -> Result<Option<Item>> {
        let items = self.items.read().await;
        Ok(items.iter().find(|item| item.id() == id).cloned())
    }

    async fn insert(&self, item: &Item) -> Result<()> {
        let mut items = self.items.write().await;
        if items.iter().any(|existing| existing.id() == item.id()) {
            return Err(Error::DuplicateId(item.id_str().to_string()));
        }
        items.push(item.clone());
        Ok(())
    }

    async fn replace(&self, id: &ItemId, item: &Item) -> Result<bool> {
        let mut items = self.items.write().await;
        let Some(slot) = items.iter_mut().find(|existing| existing.id() == id) else {
            return Ok(false);
        };
        *slot = item.clone();
        Ok(true)
    }

    async fn remove_one(&self, id: &ItemId) -> Result<Option<Item>> {
        let mut items = self.items.write().await;
        let position = items.iter().position(|existing| existing.id() == id);
        Ok(position.map(|index| items.remove(index)))
    }

    async fn remove_all(&self) -> Result<u64> {
        let mut items = self.items.write().await;
        let count = items.len() as u64;
        items.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn item(id: &str, name: &str) -> Item {
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!(name));
        Item::new(ItemId::new(id), fields)
    }

    #[tokio::test]
    async fn test_insert_preserves_order() {
        let store = MemoryItemStore::new();
        store.insert(&item("b", "second")).await.unwrap();
        store.insert(&item("a", "first")).await.unwrap();

        let ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|i| i.id_str().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate() {
        let store = MemoryItemStore::new();
        store.insert(&item("a", "one")).await.unwrap();

        let result = store.insert(&item("a", "two")).await;
        assert!(matches!(result, Err(Error::DuplicateId(id)) if id == "a"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_replace_and_remove() {
        let store = MemoryItemStore::new();
        store.insert(&item("a", "one")).await.unwrap();

        assert!(store.replace(&ItemId::new("a"), &item("a", "uno")).await.unwrap());
        assert!(!store.replace(&ItemId::new("z"), &item("z", "x")).await.unwrap());

        let removed = store.remove_one(&ItemId::new("a")).await.unwrap().unwrap();
        assert_eq!(removed.get("name"), Some(&json!("uno")));
        assert!(store.remove_one(&ItemId::new("a")).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }
}
