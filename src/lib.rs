//! # itemdb
//!
//! A small item database: create/read/update/delete over a named collection
//! of JSON items, with interchangeable storage backends and a REST surface.
//!
//! ## Features
//!
//! - One repository contract shared by every backend
//! - Pluggable stores (flat JSON file, `SQLite`, PostgreSQL, Redis, in-memory)
//! - Identifier uniqueness enforced inside each store (insert-if-absent)
//! - axum router translating REST calls into repository operations
//!
//! ## Example
//!
//! ```rust,ignore
//! use itemdb::services::ItemRepository;
//! use itemdb::storage::MemoryItemStore;
//! use serde_json::json;
//!
//! let repository = ItemRepository::new(MemoryItemStore::new());
//! repository.initialize().await?;
//! let item = repository.add_item(json!({ "name": "a" })).await?;
//! assert_eq!(repository.get_by_id(item.id_str()).await?, item);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod http;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::ItemdbConfig;
pub use models::{Item, ItemId};
pub use services::ItemRepository;
pub use storage::{ItemStore, ItemStoreFactory, StoreBackendType};

/// Error type for itemdb operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Payload is not a JSON object, identifier is not a string, bad config value |
/// | `DuplicateId` | An item with the supplied identifier already exists |
/// | `NotFound` | No item has the requested identifier |
/// | `ConnectionError` | The backend cannot be reached or opened |
/// | `OperationFailed` | I/O errors, queries fail, documents cannot be (de)serialized |
/// | `FeatureNotEnabled` | A backend is selected whose cargo feature is not compiled in |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - An item payload is not a JSON object
    /// - An item identifier is present but not a string
    /// - A collection name is not a plain identifier
    /// - A configuration value cannot be parsed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An item with this identifier already exists.
    #[error("duplicate item id: {0}")]
    DuplicateId(String),

    /// No item with this identifier exists.
    #[error("item not found: {0}")]
    NotFound(String),

    /// The storage backend is unreachable.
    ///
    /// Raised when:
    /// - A database file or directory cannot be opened or created
    /// - A pooled or per-call network connection cannot be acquired
    #[error("backend '{backend}' unreachable: {cause}")]
    ConnectionError {
        /// The backend that could not be reached.
        backend: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O errors occur
    /// - Database statements fail
    /// - A stored document cannot be parsed
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

/// Result type alias for itemdb operations.
pub type Result<T> = std::result::Result<T, Error>;
