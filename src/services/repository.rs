//! Item repository: the CRUD contract shared by every store.
//!
//! The repository validates payloads, assigns identifiers and turns store
//! outcomes into typed errors. Not-found and uniqueness are checked before
//! acting, and the store's insert-if-absent still catches a writer that slips
//! in between.

use crate::models::{Item, ItemDraft, ItemId};
use crate::observability::{OPERATION_DURATION_SECONDS, OPERATIONS_TOTAL, current_request_id};
use crate::storage::ItemStore;
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// CRUD operations over one item collection.
///
/// Generic over the store so tests can hold a concrete type; the server and
/// CLI use the default `dyn ItemStore`.
pub struct ItemRepository<S: ItemStore + ?Sized = dyn ItemStore> {
    store: Arc<S>,
}

impl<S: ItemStore> ItemRepository<S> {
    /// Creates a repository owning `store`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

impl<S: ItemStore + ?Sized> ItemRepository<S> {
    /// Creates a repository over a shared store.
    #[must_use]
    pub const fn from_arc(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Prepares the backing collection. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionError`] if the backend is unreachable.
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn initialize(&self) -> Result<()> {
        let start = Instant::now();
        let result = self.store.initialize().await;
        record("initialize", &result, start);

        if result.is_ok() {
            tracing::info!(backend = self.store.backend_name(), "Item store initialized");
        }
        result
    }

    /// Creates an item.
    ///
    /// A missing, `null` or empty identifier is replaced by a generated one.
    ///
    /// # Returns
    ///
    /// The stored item, including its identifier.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if `value` is not an object or its id is not a string
    /// - [`Error::DuplicateId`] if an item with the identifier exists
    #[instrument(skip(self, value), fields(backend = self.store.backend_name()))]
    pub async fn add_item(&self, value: Value) -> Result<Item> {
        let start = Instant::now();
        let result = self.add_item_inner(value).await;
        record("add_item", &result, start);

        if let Ok(item) = &result {
            tracing::info!(item_id = %item.id(), "Added item");
        }
        result
    }

    async fn add_item_inner(&self, value: Value) -> Result<Item> {
        let draft = ItemDraft::from_value(value)?;

        if let Some(id) = draft.id() {
            if self.store.find(id).await?.is_some() {
                return Err(Error::DuplicateId(id.to_string()));
            }
        }

        let item = draft.into_item();
        self.store.insert(&item).await?;
        Ok(item)
    }

    /// Returns every item in store order. An empty store yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn get_all(&self) -> Result<Vec<Item>> {
        let start = Instant::now();
        let result = self.store.list_all().await;
        record("get_all", &result, start);

        if let Ok(items) = &result {
            tracing::debug!(count = items.len(), "Listed items");
        }
        result
    }

    /// Returns the item with identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no item has that identifier.
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn get_by_id(&self, id: &str) -> Result<Item> {
        let start = Instant::now();
        let result = self
            .store
            .find(&ItemId::new(id))
            .await
            .and_then(|found| found.ok_or_else(|| Error::NotFound(id.to_string())));
        record("get_by_id", &result, start);
        result
    }

    /// Replaces every field of item `id` with the fields of `value`.
    ///
    /// The identifier is preserved; any `id` in `value` is ignored.
    ///
    /// # Returns
    ///
    /// The new stored state.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if `value` is not an object
    /// - [`Error::NotFound`] if no item has that identifier
    #[instrument(skip(self, value), fields(backend = self.store.backend_name()))]
    pub async fn update_by_id(&self, id: &str, value: Value) -> Result<Item> {
        let start = Instant::now();
        let result = self.update_by_id_inner(id, value).await;
        record("update_by_id", &result, start);

        if result.is_ok() {
            tracing::info!(item_id = id, "Updated item");
        }
        result
    }

    async fn update_by_id_inner(&self, id: &str, value: Value) -> Result<Item> {
        let item_id = ItemId::new(id);
        let item = Item::replacing(item_id.clone(), value)?;

        if self.store.find(&item_id).await?.is_none() {
            return Err(Error::NotFound(id.to_string()));
        }

        // Removed between the check and the write.
        if !self.store.replace(&item_id, &item).await? {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(item)
    }

    /// Deletes item `id`.
    ///
    /// # Returns
    ///
    /// The item as it was before removal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no item has that identifier.
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn delete_by_id(&self, id: &str) -> Result<Item> {
        let start = Instant::now();
        let result = self
            .store
            .remove_one(&ItemId::new(id))
            .await
            .and_then(|removed| removed.ok_or_else(|| Error::NotFound(id.to_string())));
        record("delete_by_id", &result, start);

        if result.is_ok() {
            tracing::info!(item_id = id, "Deleted item");
        }
        result
    }

    /// Deletes every item.
    ///
    /// # Returns
    ///
    /// The number of items removed; 0 for an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn delete_all(&self) -> Result<u64> {
        let start = Instant::now();
        let result = self.store.remove_all().await;
        record("delete_all", &result, start);

        if let Ok(removed) = &result {
            tracing::info!(removed, "Deleted all items");
        }
        result
    }
}

impl<S: ItemStore + ?Sized> Clone for ItemRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// Metric label for an operation outcome.
fn status_label<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(Error::InvalidInput(_)) => "invalid_input",
        Err(Error::DuplicateId(_)) => "duplicate_id",
        Err(Error::NotFound(_)) => "not_found",
        Err(Error::ConnectionError { .. }) => "connection_error",
        Err(_) => "error",
    }
}

fn record<T>(operation: &'static str, result: &Result<T>, start: Instant) {
    let status = status_label(result);

    metrics::counter!(
        OPERATIONS_TOTAL,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => operation)
    .record(start.elapsed().as_secs_f64());

    if let Err(e) = result {
        let request_id = current_request_id();
        match e {
            Error::ConnectionError { .. } | Error::OperationFailed { .. } => {
                tracing::error!(
                    operation,
                    request_id = request_id.as_deref(),
                    error = %e,
                    "Repository operation failed"
                );
            },
            _ => tracing::debug!(
                operation,
                request_id = request_id.as_deref(),
                error = %e,
                "Repository operation rejected"
            ),
        }
    }
}
