//! Flat-file item store.
//!
//! Keeps the whole collection in one JSON document:
//!
//! ```json
//! { "data": [ { "id": "...", "name": "..." } ] }
//! ```
//!
//! Every mutation rewrites the document in full. Writes go to a sibling
//! temporary file that is then renamed over the document, so readers never
//! observe a partial write.

use crate::models::{Item, ItemId};
use crate::storage::ItemStore;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// On-disk layout of the collection.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ItemDocument {
    data: Vec<Item>,
}

/// Flat-file item store.
pub struct FilesystemItemStore {
    /// Path to the JSON document.
    path: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FilesystemItemStore {
    /// Creates a store backed by the document at `path`.
    ///
    /// Nothing is touched on disk until [`ItemStore::initialize`] or the
    /// first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the default document path.
    ///
    /// Returns `<data dir>/itemdb/items.json`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.data_dir().join("itemdb").join("items.json"))
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document. A missing file reads as an empty collection.
    async fn read_items(&self) -> Result<Vec<Item>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::OperationFailed {
                    operation: "read_item_document".to_string(),
                    cause: format!("{}: {e}", self.path.display()),
                });
            },
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let document: ItemDocument =
            serde_json::from_str(&content).map_err(|e| Error::OperationFailed {
                operation: "parse_item_document".to_string(),
                cause: format!("{}: {e}", self.path.display()),
            })?;

        Ok(document.data)
    }

    /// Rewrites the whole document.
    async fn write_items(&self, items: Vec<Item>) -> Result<()> {
        let document = ItemDocument { data: items };
        let content = serde_json::to_vec(&document).map_err(|e| Error::OperationFailed {
            operation: "serialize_item_document".to_string(),
            cause: e.to_string(),
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .await
            .map_err(|e| Error::OperationFailed {
                operation: "write_item_document".to_string(),
                cause: format!("{}: {e}", tmp_path.display()),
            })?;

        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            // Best effort; the rename error is the one worth reporting.
            let _ = fs::remove_file(&tmp_path).await;
            return Err(Error::OperationFailed {
                operation: "replace_item_document".to_string(),
                cause: format!("{}: {e}", self.path.display()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ItemStore for FilesystemItemStore {
    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn initialize(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::ConnectionError {
                    backend: self.backend_name().to_string(),
                    cause: format!("{}: {e}", parent.display()),
                })?;
        }

        match fs::metadata(&self.path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Creating item document");
                self.write_items(Vec::new()).await
            },
            Err(e) => Err(Error::ConnectionError {
                backend: self.backend_name().to_string(),
                cause: format!("{}: {e}", self.path.display()),
            }),
        }
    }

    async fn list_all(&self) -> Result<Vec<Item>> {
        self.read_items().await
    }

    async fn insert(&self, item: &Item) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.read_items().await?;

        if items.iter().any(|existing| existing.id() == item.id()) {
            return Err(Error::DuplicateId(item.id_str().to_string()));
        }

        items.push(item.clone());
        self.write_items(items).await
    }

    async fn replace(&self, id: &ItemId, item: &Item) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.read_items().await?;

        let Some(slot) = items.iter_mut().find(|existing| existing.id() == id) else {
            return Ok(false);
        };
        *slot = item.clone();

        self.write_items(items).await?;
        Ok(true)
    }

    async fn remove_one(&self, id: &ItemId) -> Result<Option<Item>> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.read_items().await?;

        let Some(position) = items.iter().position(|existing| existing.id() == id) else {
            return Ok(None);
        };
        let removed = items.remove(position);

        self.write_items(items).await?;
        Ok(Some(removed))
    }

    async fn remove_all(&self) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let items = self.read_items().await?;
        let count = items.len() as u64;

        self.write_items(Vec::new()).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};
    use tempfile::TempDir;

    fn item(id: &str) -> Item {
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!(format!("item-{id}")));
        Item::new(ItemId::new(id), fields)
    }

    #[tokio::test]
    async fn test_initialize_creates_empty_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("items.json");
        let store = FilesystemItemStore::new(&path);

        store.initialize().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value, json!({ "data": [] }));
    }

    #[tokio::test]
    async fn test_initialize_keeps_existing_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, r#"{"data":[{"id":"1","name":"kept"}]}"#).unwrap();

        let store = FilesystemItemStore::new(&path);
        store.initialize().await.unwrap();

        let items = store.list_all().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get("name"), Some(&json!("kept")));
    }

    #[tokio::test]
    async fn test_missing_file_lists_empty() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemItemStore::new(dir.path().join("absent.json"));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_rewrite_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.json");
        let store = FilesystemItemStore::new(&path);
        store.initialize().await.unwrap();

        store.insert(&item("a")).await.unwrap();
        store.insert(&item("b")).await.unwrap();
        assert!(matches!(
            store.insert(&item("a")).await,
            Err(Error::DuplicateId(_))
        ));

        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["data"].as_array().map(Vec::len), Some(2));
        assert_eq!(on_disk["data"][0]["id"], json!("a"));

        assert_eq!(store.remove_all().await.unwrap(), 2);
        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({ "data": [] }));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FilesystemItemStore::new(&path);
        let result = store.list_all().await;
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory where the document should be blocks the rename.
        let path = dir.path().join("items.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupied"), "x").unwrap();

        let store = FilesystemItemStore::new(&path);
        let result = store.write_items(vec![item("a")]).await;

        assert!(matches!(result, Err(Error::OperationFailed { .. })));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_default_path() {
        if let Some(p) = FilesystemItemStore::default_path() {
            assert!(p.to_string_lossy().contains("itemdb"));
            assert!(p.to_string_lossy().ends_with("items.json"));
        }
    }
}
