//! SQLite-based item store.
//!
//! Each item maps to one row through [`ItemRow`]: the identifier lives in a
//! `UNIQUE` column and the remaining fields in a JSON document column. The
//! `seq` column keeps insertion order for listing.
//!
//! A connection is opened per call on the blocking pool and dropped when the
//! call returns, on success and error paths alike.

use crate::models::{Item, ItemId};
use crate::storage::{ItemStore, validate_collection_name};
use crate::{Error, Result};
use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Row representation of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    /// Item identifier.
    pub id: String,
    /// JSON object holding every field except the identifier.
    pub document: String,
}

impl ItemRow {
    /// Maps an item to its row form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the fields cannot be serialized.
    pub fn from_item(item: &Item) -> Result<Self> {
        let document = serde_json::to_string(item.fields()).map_err(|e| Error::OperationFailed {
            operation: "serialize_item_row".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self {
            id: item.id_str().to_string(),
            document,
        })
    }

    /// Maps a row back to an item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the document is not a JSON object.
    pub fn into_item(self) -> Result<Item> {
        let fields: Map<String, Value> =
            serde_json::from_str(&self.document).map_err(|e| Error::OperationFailed {
                operation: "parse_item_row".to_string(),
                cause: format!("item {}: {e}", self.id),
            })?;

        Ok(Item::new(ItemId::new(self.id), fields))
    }

    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            document: row.get(1)?,
        })
    }
}

/// `SQLite`-based item store.
pub struct SqliteItemStore {
    /// Path to the `SQLite` database.
    db_path: PathBuf,
    /// Table holding the collection.
    table: String,
}

impl SqliteItemStore {
    /// Creates a new `SQLite` item store.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the `SQLite` database file
    /// * `collection` - Table name for the collection
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `collection` is not a plain identifier.
    pub fn new(db_path: impl Into<PathBuf>, collection: &str) -> Result<Self> {
        Ok(Self {
            db_path: db_path.into(),
            table: validate_collection_name(collection)?.to_string(),
        })
    }

    /// Returns the default database path.
    ///
    /// Returns `<data dir>/itemdb/items.db`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.data_dir().join("itemdb").join("items.db"))
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Runs `f` against a fresh connection on the blocking pool.
    async fn with_connection<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        let table = self.table.clone();

        tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;
            f(&conn, &table)
        })
        .await
        .map_err(|e| Error::OperationFailed {
            operation: operation.to_string(),
            cause: e.to_string(),
        })?
    }
}

/// Opens and configures a connection.
fn open_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path).map_err(|e| Error::ConnectionError {
        backend: "sqlite".to_string(),
        cause: format!("{}: {e}", db_path.display()),
    })?;

    // journal_mode returns a row, so its result is ignored
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| query_failed("set_busy_timeout", &e))?;

    Ok(conn)
}

fn query_failed(operation: &str, e: &rusqlite::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::ConnectionError {
                    backend: self.backend_name().to_string(),
                    cause: format!("{}: {e}", parent.display()),
                })?;
        }

        self.with_connection("create_items_table", |conn, table| {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        seq INTEGER PRIMARY KEY AUTOINCREMENT,
                        id TEXT NOT NULL UNIQUE,
                        document TEXT NOT NULL
                    )"
                ),
                [],
            )
            .map_err(|e| query_failed("create_items_table", &e))?;
            Ok(())
        })
        .await?;

        tracing::debug!(
            path = %self.db_path.display(),
            table = %self.table,
            "SQLite item table ready"
        );
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Item>> {
        self.with_connection("list_items", |conn, table| {
            let mut stmt = conn
                .prepare(&format!("SELECT id, document FROM {table} ORDER BY seq"))
                .map_err(|e| query_failed("list_items", &e))?;

            let rows = stmt
                .query_map([], ItemRow::read)
                .map_err(|e| query_failed("list_items", &e))?;

            let mut items = Vec::new();
            for row in rows {
                let row = row.map_err(|e| query_failed("list_items", &e))?;
                items.push(row.into_item()?);
            }
            Ok(items)
        })
        .await
    }

    async fn find(&self, id: &ItemId) -> Result<Option<Item>> {
        let id = id.as_str().to_string();

        self.with_connection("find_item", move |conn, table| {
            let row = conn
                .query_row(
                    &format!("SELECT id, document FROM {table} WHERE id = ?1"),
                    params![id],
                    ItemRow::read,
                )
                .optional()
                .map_err(|e| query_failed("find_item", &e))?;

            row.map(ItemRow::into_item).transpose()
        })
        .await
    }

    async fn insert(&self, item: &Item) -> Result<()> {
        let row = ItemRow::from_item(item)?;

        self.with_connection("insert_item", move |conn, table| {
            let result = conn.execute(
                &format!("INSERT INTO {table} (id, document) VALUES (?1, ?2)"),
                params![row.id, row.document],
            );

            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    Err(Error::DuplicateId(row.id))
                },
                Err(e) => Err(query_failed("insert_item", &e)),
            }
        })
        .await
    }

    async fn replace(&self, id: &ItemId, item: &Item) -> Result<bool> {
        let id = id.as_str().to_string();
        let row = ItemRow::from_item(item)?;

        self.with_connection("replace_item", move |conn, table| {
            let changed = conn
                .execute(
                    &format!("UPDATE {table} SET document = ?2 WHERE id = ?1"),
                    params![id, row.document],
                )
                .map_err(|e| query_failed("replace_item", &e))?;
            Ok(changed > 0)
        })
        .await
    }

    async fn remove_one(&self, id: &ItemId) -> Result<Option<Item>> {
        let id = id.as_str().to_string();

        self.with_connection("remove_item", move |conn, table| {
            let row = conn
                .query_row(
                    &format!("DELETE FROM {table} WHERE id = ?1 RETURNING id, document"),
                    params![id],
                    ItemRow::read,
                )
                .optional()
                .map_err(|e| query_failed("remove_item", &e))?;

            row.map(ItemRow::into_item).transpose()
        })
        .await
    }

    async fn remove_all(&self) -> Result<u64> {
        self.with_connection("remove_all_items", |conn, table| {
            let removed = conn
                .execute(&format!("DELETE FROM {table}"), [])
                .map_err(|e| query_failed("remove_all_items", &e))?;
            Ok(removed as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn item(id: &str, n: i64) -> Item {
        let mut fields = Map::new();
        fields.insert("n".to_string(), json!(n));
        Item::new(ItemId::new(id), fields)
    }

    async fn store(dir: &TempDir) -> SqliteItemStore {
        let store = SqliteItemStore::new(dir.path().join("items.db"), "items").unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let result = SqliteItemStore::new("items.db", "items; DROP TABLE x");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_item_row_mapping() {
        let row = ItemRow::from_item(&item("a", 1)).unwrap();
        assert_eq!(row.id, "a");
        assert_eq!(row.document, r#"{"n":1}"#);
        assert_eq!(row.into_item().unwrap(), item("a", 1));

        let bad = ItemRow {
            id: "b".to_string(),
            document: "[1]".to_string(),
        };
        assert!(bad.into_item().is_err());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        store.insert(&item("a", 1)).await.unwrap();

        store.initialize().await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unique_constraint_maps_to_duplicate() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        store.insert(&item("a", 1)).await.unwrap();
        let result = store.insert(&item("a", 2)).await;

        assert!(matches!(result, Err(Error::DuplicateId(id)) if id == "a"));
        let stored = store.find(&ItemId::new("a")).await.unwrap().unwrap();
        assert_eq!(stored.get("n"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        for id in ["c", "a", "b"] {
            store.insert(&item(id, 0)).await.unwrap();
        }

        let ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id_str().to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_remove_one_returns_prior_state() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        store.insert(&item("a", 7)).await.unwrap();

        let removed = store.remove_one(&ItemId::new("a")).await.unwrap();
        assert_eq!(removed, Some(item("a", 7)));
        assert_eq!(store.remove_one(&ItemId::new("a")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_database_is_connection_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let store = SqliteItemStore::new(blocker.join("items.db"), "items").unwrap();
        let result = store.initialize().await;
        assert!(matches!(result, Err(Error::ConnectionError { .. })));
    }
}
