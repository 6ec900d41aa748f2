//! Item storage backends.
//!
//! Every backend implements [`ItemStore`] and is interchangeable behind the
//! repository:
//!
//! | Backend | Type | Medium |
//! |---------|------|--------|
//! | Filesystem | [`FilesystemItemStore`] | One JSON document `{ "data": [...] }` |
//! | `SQLite` | [`SqliteItemStore`] | Table with id column + JSON document column |
//! | PostgreSQL | [`PostgresItemStore`] | JSONB documents (feature `postgres`) |
//! | Redis | [`RedisItemStore`] | Hash of JSON documents (feature `redis`) |
//! | Memory | [`MemoryItemStore`] | Process memory, not persisted |
//!
//! Identifier uniqueness is enforced inside each store: `insert` is an
//! insert-if-absent that reports [`Error::DuplicateId`].

// Allow significant_drop_tightening - dropping connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]
// Allow cast_possible_truncation/sign_loss for row counts.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

mod filesystem;
mod memory;
mod postgresql;
mod redis;
mod sqlite;
mod traits;

pub use filesystem::FilesystemItemStore;
pub use memory::MemoryItemStore;
pub use postgresql::PostgresItemStore;
pub use redis::RedisItemStore;
pub use sqlite::{ItemRow, SqliteItemStore};
pub use traits::ItemStore;

use crate::config::StorageSettings;
use crate::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Backend type for item storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackendType {
    /// Flat JSON document.
    Filesystem,
    /// `SQLite` database.
    #[default]
    Sqlite,
    /// PostgreSQL database.
    PostgreSQL,
    /// Redis.
    Redis,
    /// In-process memory.
    Memory,
}

impl StoreBackendType {
    /// Returns the configuration name of the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Sqlite => "sqlite",
            Self::PostgreSQL => "postgresql",
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackendType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "filesystem" | "file" | "fs" | "json" => Ok(Self::Filesystem),
            "sqlite" => Ok(Self::Sqlite),
            "postgresql" | "postgres" | "pg" => Ok(Self::PostgreSQL),
            "redis" => Ok(Self::Redis),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(Error::InvalidInput(format!(
                "unknown storage backend '{other}'"
            ))),
        }
    }
}

/// Checks that a collection name is safe to splice into SQL and keys.
///
/// Accepts `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn validate_collection_name(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest {
        Ok(name)
    } else {
        Err(Error::InvalidInput(format!(
            "collection name '{name}' must match [A-Za-z_][A-Za-z0-9_]*"
        )))
    }
}

/// Factory for creating item stores from configuration.
pub struct ItemStoreFactory;

impl ItemStoreFactory {
    /// Creates the store described by the storage settings.
    ///
    /// # Errors
    ///
    /// Returns an error if required paths or connection strings are missing,
    /// the collection name is invalid, or the backend's feature is disabled.
    pub fn create(settings: &StorageSettings) -> Result<Arc<dyn ItemStore>> {
        Self::create_with_backend(
            settings.backend,
            settings.path.clone(),
            settings.connection_url.clone(),
            &settings.collection,
        )
    }

    /// Creates storage with an explicit backend type.
    ///
    /// # Arguments
    ///
    /// * `backend` - The backend type to use
    /// * `path` - Document path (filesystem) or database path (`SQLite`)
    /// * `connection_url` - Connection URL for network backends (PostgreSQL, Redis)
    /// * `collection` - Collection name (table, key, ...)
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be constructed.
    pub fn create_with_backend(
        backend: StoreBackendType,
        path: Option<PathBuf>,
        connection_url: Option<String>,
        collection: &str,
    ) -> Result<Arc<dyn ItemStore>> {
        tracing::debug!(%backend, collection, "Creating item store");

        match backend {
            StoreBackendType::Filesystem => {
                let path = path
                    .or_else(FilesystemItemStore::default_path)
                    .ok_or_else(|| {
                        Error::InvalidInput(
                            "Document path required for filesystem backend".to_string(),
                        )
                    })?;
                Ok(Arc::new(FilesystemItemStore::new(path)))
            },
            StoreBackendType::Sqlite => {
                let db_path = path.or_else(SqliteItemStore::default_path).ok_or_else(|| {
                    Error::InvalidInput("Database path required for SQLite backend".to_string())
                })?;
                Ok(Arc::new(SqliteItemStore::new(db_path, collection)?))
            },
            StoreBackendType::PostgreSQL => {
                let url = connection_url.ok_or_else(|| {
                    Error::InvalidInput(
                        "Connection URL required for PostgreSQL backend".to_string(),
                    )
                })?;
                Ok(Arc::new(PostgresItemStore::new(&url, collection)?))
            },
            StoreBackendType::Redis => {
                let url = connection_url.ok_or_else(|| {
                    Error::InvalidInput("Connection URL required for Redis backend".to_string())
                })?;
                Ok(Arc::new(RedisItemStore::new(&url, collection)?))
            },
            StoreBackendType::Memory => Ok(Arc::new(MemoryItemStore::new())),
        }
    }
}
