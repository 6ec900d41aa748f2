//! Redis integration tests.
//!
//! These tests require a running Redis server. Set the environment variable
//! `ITEMDB_TEST_REDIS_URL` to enable them:
//!
//! ```bash
//! export ITEMDB_TEST_REDIS_URL="redis://localhost:6379"
//! cargo test --features redis --test redis_integration
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::print_stderr)]
#![cfg(feature = "redis")]

mod common;

use itemdb::models::{Item, ItemId};
use itemdb::storage::RedisItemStore;
use itemdb::{Error, ItemRepository, ItemStore};
use serde_json::{Map, json};
use std::env;
use std::sync::Arc;

/// Environment variable for Redis test connection URL.
const REDIS_URL_ENV: &str = "ITEMDB_TEST_REDIS_URL";

/// Macro to skip tests when Redis is not available.
macro_rules! require_redis {
    () => {
        match env::var(REDIS_URL_ENV).ok() {
            Some(url) => url,
            None => {
                eprintln!("Skipping test: {REDIS_URL_ENV} not set");
                return;
            },
        }
    };
}

fn unique_key(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn test_redis_store_contract() {
    let url = require_redis!();
    let store: Arc<dyn ItemStore> =
        Arc::new(RedisItemStore::new(&url, &unique_key("contract")).unwrap());

    let repo = ItemRepository::from_arc(store);
    repo.initialize().await.unwrap();
    common::run_all(&repo).await;
}

#[tokio::test]
async fn test_redis_insert_if_absent() {
    let url = require_redis!();
    let store = RedisItemStore::new(&url, &unique_key("hsetnx")).unwrap();
    store.initialize().await.unwrap();

    let mut fields = Map::new();
    fields.insert("v".to_string(), json!(1));
    let item = Item::new(ItemId::new("k"), fields);

    store.insert(&item).await.unwrap();
    assert!(matches!(
        store.insert(&item).await,
        Err(Error::DuplicateId(id)) if id == "k"
    ));
    assert_eq!(store.remove_all().await.unwrap(), 1);
    assert!(!store.replace(&ItemId::new("k"), &item).await.unwrap());
}

#[tokio::test]
async fn test_redis_unreachable_server_is_connection_error() {
    let _ = require_redis!();
    let store = RedisItemStore::new("redis://127.0.0.1:1", "items").unwrap();

    let result = store.initialize().await;
    assert!(matches!(result, Err(Error::ConnectionError { .. })));
}
