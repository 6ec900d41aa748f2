//! Redis-based item store.
//!
//! Keeps the collection in a single hash: field = item id, value = JSON
//! document of the remaining fields. Multi-step primitives run as server-side
//! scripts so each one is atomic.

#[cfg(feature = "redis")]
mod implementation {
    use crate::models::{Item, ItemId};
    use crate::storage::{ItemStore, validate_collection_name};
    use crate::{Error, Result};
    use async_trait::async_trait;
    use redis::aio::MultiplexedConnection;
    use redis::{AsyncCommands, Client, Script};
    use serde_json::{Map, Value};

    /// Replaces a field only if it already exists.
    const REPLACE_SCRIPT: &str = r"
        if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 1 then
            redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
            return 1
        end
        return 0
    ";

    /// Removes a field and returns its prior value.
    const REMOVE_ONE_SCRIPT: &str = r"
        local value = redis.call('HGET', KEYS[1], ARGV[1])
        if value then
            redis.call('HDEL', KEYS[1], ARGV[1])
        end
        return value
    ";

    /// Drops the hash and returns how many fields it held.
    const REMOVE_ALL_SCRIPT: &str = r"
        local count = redis.call('HLEN', KEYS[1])
        redis.call('DEL', KEYS[1])
        return count
    ";

    /// Redis-based item store.
    pub struct RedisItemStore {
        /// Redis client.
        client: Client,
        /// Hash key holding the collection.
        key: String,
    }

    impl RedisItemStore {
        /// Creates a new Redis item store.
        ///
        /// # Errors
        ///
        /// Returns an error if the URL cannot be parsed or the collection
        /// name is invalid.
        pub fn new(connection_url: &str, collection: &str) -> Result<Self> {
            let key = validate_collection_name(collection)?.to_string();
            let client = Client::open(connection_url).map_err(|e| Error::ConnectionError {
                backend: "redis".to_string(),
                cause: e.to_string(),
            })?;

            Ok(Self { client, key })
        }

        /// Returns the hash key holding the collection.
        #[must_use]
        pub fn key(&self) -> &str {
            &self.key
        }

        /// Opens a connection for one call.
        async fn connect(&self) -> Result<MultiplexedConnection> {
            self.client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| Error::ConnectionError {
                    backend: "redis".to_string(),
                    cause: e.to_string(),
                })
        }

        fn serialize_fields(item: &Item) -> Result<String> {
            serde_json::to_string(item.fields()).map_err(|e| Error::OperationFailed {
                operation: "redis_serialize_item".to_string(),
                cause: e.to_string(),
            })
        }

        fn deserialize_item(id: String, document: &str) -> Result<Item> {
            let fields: Map<String, Value> =
                serde_json::from_str(document).map_err(|e| Error::OperationFailed {
                    operation: "redis_parse_item".to_string(),
                    cause: format!("item {id}: {e}"),
                })?;
            Ok(Item::new(ItemId::new(id), fields))
        }
    }

    fn command_failed(operation: &str, e: &redis::RedisError) -> Error {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: e.to_string(),
        }
    }

    #[async_trait]
    impl ItemStore for RedisItemStore {
        fn backend_name(&self) -> &'static str {
            "redis"
        }

        async fn initialize(&self) -> Result<()> {
            // The hash is created by the first write; this only proves reachability.
            let mut conn = self.connect().await?;
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| Error::ConnectionError {
                    backend: "redis".to_string(),
                    cause: e.to_string(),
                })?;
            Ok(())
        }

        async fn list_all(&self) -> Result<Vec<Item>> {
            let mut conn = self.connect().await?;

            let entries: Vec<(String, String)> = conn
                .hgetall(&self.key)
                .await
                .map_err(|e| command_failed("redis_list_items", &e))?;

            entries
                .into_iter()
                .map(|(id, document)| Self::deserialize_item(id, &document))
                .collect()
        }

        async fn find(&self, id: &ItemId) -> Result<Option<Item>> {
            let mut conn = self.connect().await?;

            let document: Option<String> = conn
                .hget(&self.key, id.as_str())
                .await
                .map_err(|e| command_failed("redis_find_item", &e))?;

            document
                .map(|document| Self::deserialize_item(id.as_str().to_string(), &document))
                .transpose()
        }

        async fn insert(&self, item: &Item) -> Result<()> {
            let mut conn = self.connect().await?;
            let document = Self::serialize_fields(item)?;

            let inserted: bool = conn
                .hset_nx(&self.key, item.id_str(), document)
                .await
                .map_err(|e| command_failed("redis_insert_item", &e))?;

            if !inserted {
                return Err(Error::DuplicateId(item.id_str().to_string()));
            }
            Ok(())
        }

        async fn replace(&self, id: &ItemId, item: &Item) -> Result<bool> {
            let mut conn = self.connect().await?;
            let document = Self::serialize_fields(item)?;

            let replaced: i64 = Script::new(REPLACE_SCRIPT)
                .key(&self.key)
                .arg(id.as_str())
                .arg(document)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| command_failed("redis_replace_item", &e))?;

            Ok(replaced == 1)
        }

        async fn remove_one(&self, id: &ItemId) -> Result<Option<Item>> {
            let mut conn = self.connect().await?;

            let document: Option<String> = Script::new(REMOVE_ONE_SCRIPT)
                .key(&self.key)
                .arg(id.as_str())
                .invoke_async(&mut conn)
                .await
                .map_err(|e| command_failed("redis_remove_item", &e))?;

            document
                .map(|document| Self::deserialize_item(id.as_str().to_string(), &document))
                .transpose()
        }

        async fn remove_all(&self) -> Result<u64> {
            let mut conn = self.connect().await?;

            let removed: u64 = Script::new(REMOVE_ALL_SCRIPT)
                .key(&self.key)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| command_failed("redis_remove_all_items", &e))?;

            Ok(removed)
        }
    }
}

#[cfg(feature = "redis")]
pub use implementation::RedisItemStore;

#[cfg(not(feature = "redis"))]
mod stub {
    use crate::models::{Item, ItemId};
    use crate::storage::ItemStore;
    use crate::{Error, Result};
    use async_trait::async_trait;

    /// Stub Redis item store when feature is not enabled.
    pub struct RedisItemStore;

    impl RedisItemStore {
        /// Creates a new Redis item store (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn new(_connection_url: &str, _collection: &str) -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }
    }

    #[async_trait]
    impl ItemStore for RedisItemStore {
        fn backend_name(&self) -> &'static str {
            "redis"
        }

        async fn initialize(&self) -> Result<()> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        async fn list_all(&self) -> Result<Vec<Item>> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        async fn insert(&self, _item: &Item) -> Result<()> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        async fn replace(&self, _id: &ItemId, _item: &Item) -> Result<bool> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        async fn remove_one(&self, _id: &ItemId) -> Result<Option<Item>> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        async fn remove_all(&self) -> Result<u64> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }
    }
}

#[cfg(not(feature = "redis"))]
pub use stub::RedisItemStore;
