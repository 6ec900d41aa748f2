//! Item store trait definition.

use crate::Result;
use crate::models::{Item, ItemId};
use async_trait::async_trait;

/// Trait for item storage backends.
///
/// A store is a narrow persistence port: it keeps items keyed by identifier
/// and performs no business validation. Every primitive completes or fails
/// as a whole, and backend handles are acquired per call and released on
/// every exit path.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Returns the backend name used in logs, metrics and errors.
    fn backend_name(&self) -> &'static str;

    /// Prepares the backing collection, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConnectionError`] if the backend is unreachable.
    async fn initialize(&self) -> Result<()>;

    /// Lists every stored item in store iteration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be accessed.
    async fn list_all(&self) -> Result<Vec<Item>>;

    /// Finds an item by identifier.
    ///
    /// The default scans [`list_all`](Self::list_all); keyed backends
    /// override it with a direct lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be accessed.
    async fn find(&self, id: &ItemId) -> Result<Option<Item>> {
        let items = self.list_all().await?;
        Ok(items.into_iter().find(|item| item.id() == id))
    }

    /// Inserts an item if no item with the same identifier exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateId`] if the identifier is taken, or
    /// another error if the storage cannot be accessed.
    async fn insert(&self, item: &Item) -> Result<()>;

    /// Replaces the stored item with identifier `id`.
    ///
    /// # Returns
    ///
    /// `true` if an item was replaced, `false` if none had that identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be accessed.
    async fn replace(&self, id: &ItemId, item: &Item) -> Result<bool>;

    /// Removes one item by identifier.
    ///
    /// # Returns
    ///
    /// The removed item, or `None` if no item had that identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be accessed.
    async fn remove_one(&self, id: &ItemId) -> Result<Option<Item>>;

    /// Removes every item.
    ///
    /// # Returns
    ///
    /// The number of items removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be accessed.
    async fn remove_all(&self) -> Result<u64>;
}
