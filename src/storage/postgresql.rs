//! PostgreSQL-based item store.
//!
//! Stores each item as a JSONB document keyed by identifier. Includes
//! embedded migrations that bring the schema up to date on `initialize`.

#[cfg(feature = "postgres")]
mod implementation {
    use crate::models::{Item, ItemId};
    use crate::storage::{ItemStore, validate_collection_name};
    use crate::{Error, Result};
    use async_trait::async_trait;
    use deadpool_postgres::{
        Config, ManagerConfig, Object, Pool, RecyclingMethod, Runtime, Transaction,
    };
    use serde_json::Value;
    use tokio_postgres::NoTls;

    /// A single migration with version and SQL.
    struct Migration {
        /// Migration version (sequential, starting at 1).
        version: i32,
        /// Human-readable description.
        description: &'static str,
        /// SQL to apply (may contain multiple statements separated by semicolons).
        sql: &'static str,
    }

    /// Embedded migrations compiled into the binary.
    const MIGRATIONS: &[Migration] = &[Migration {
        version: 1,
        description: "Initial items table",
        sql: r"
                CREATE TABLE IF NOT EXISTS {table} (
                    seq BIGSERIAL,
                    id TEXT PRIMARY KEY,
                    document JSONB NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_seq ON {table} (seq);
            ",
    }];

    /// PostgreSQL-based item store backed by a connection pool.
    pub struct PostgresItemStore {
        /// Connection pool.
        pool: Pool,
        /// Table name for the collection.
        table_name: String,
    }

    impl PostgresItemStore {
        /// Creates a new PostgreSQL item store.
        ///
        /// The pool connects lazily; nothing is sent to the server until
        /// the first call.
        ///
        /// # Errors
        ///
        /// Returns an error if the collection name is invalid or the pool
        /// cannot be created.
        pub fn new(connection_url: &str, collection: &str) -> Result<Self> {
            let table_name = validate_collection_name(collection)?.to_string();

            let mut cfg = Config::new();
            cfg.url = Some(connection_url.to_string());
            cfg.manager = Some(ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            });

            let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
                Error::ConnectionError {
                    backend: "postgresql".to_string(),
                    cause: e.to_string(),
                }
            })?;

            Ok(Self { pool, table_name })
        }

        /// Returns the table name.
        #[must_use]
        pub fn table_name(&self) -> &str {
            &self.table_name
        }

        /// Returns the current schema version.
        ///
        /// # Errors
        ///
        /// Returns an error if the database cannot be queried.
        pub async fn schema_version(&self) -> Result<i32> {
            let mut client = self.connect().await?;
            let tx = client
                .transaction()
                .await
                .map_err(|e| query_failed("schema_version_begin_tx", &e))?;
            // Read-only; the transaction rolls back on drop.
            let version = self.get_current_version(&tx).await?;
            Ok(version)
        }

        /// Checks a client out of the pool; it returns to the pool on drop.
        async fn connect(&self) -> Result<Object> {
            self.pool.get().await.map_err(|e| Error::ConnectionError {
                backend: "postgresql".to_string(),
                cause: e.to_string(),
            })
        }

        /// Returns the name of the migrations tracking table.
        fn migrations_table_name(&self) -> String {
            format!("{}_schema_migrations", self.table_name)
        }

        /// Brings the schema up to date inside one transaction.
        ///
        /// A transaction-scoped advisory lock keyed on the migrations table
        /// serialises concurrent initializers, and the version is read after
        /// the lock is held. Any failure rolls back every statement and the
        /// version records together.
        async fn migrate(&self, client: &mut Object) -> Result<()> {
            let migrations_table = self.migrations_table_name();

            let tx = client
                .transaction()
                .await
                .map_err(|e| query_failed("migration_begin_tx", &e))?;

            tx.execute(
                "SELECT pg_advisory_xact_lock(hashtext($1))",
                &[&migrations_table],
            )
            .await
            .map_err(|e| query_failed("migration_lock", &e))?;

            self.ensure_migrations_table(&tx).await?;
            let current_version = self.get_current_version(&tx).await?;

            for migration in MIGRATIONS {
                if migration.version > current_version {
                    self.apply_migration(&tx, migration).await?;
                }
            }

            tx.commit()
                .await
                .map_err(|e| query_failed("migration_commit", &e))
        }

        /// Ensures the `schema_migrations` table exists.
        async fn ensure_migrations_table(&self, tx: &Transaction<'_>) -> Result<()> {
            let migrations_table = self.migrations_table_name();

            let sql = format!(
                r"
                CREATE TABLE IF NOT EXISTS {migrations_table} (
                    version INTEGER PRIMARY KEY,
                    description TEXT NOT NULL,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "
            );

            tx.execute(&sql, &[])
                .await
                .map_err(|e| query_failed("create_migrations_table", &e))?;

            Ok(())
        }

        /// Gets the current schema version.
        async fn get_current_version(&self, tx: &Transaction<'_>) -> Result<i32> {
            let migrations_table = self.migrations_table_name();

            let exists_sql = r"
                SELECT EXISTS (
                    SELECT FROM information_schema.tables
                    WHERE table_name = $1
                )
            ";

            let exists: bool = tx
                .query_one(exists_sql, &[&migrations_table])
                .await
                .and_then(|row| row.try_get(0))
                .map_err(|e| query_failed("check_migrations_table", &e))?;

            if !exists {
                return Ok(0);
            }

            let sql = format!("SELECT COALESCE(MAX(version), 0) FROM {migrations_table}");

            tx.query_one(&sql, &[])
                .await
                .and_then(|row| row.try_get(0))
                .map_err(|e| query_failed("get_schema_version", &e))
        }

        /// Applies a single migration inside the caller's transaction.
        async fn apply_migration(&self, tx: &Transaction<'_>, migration: &Migration) -> Result<()> {
            let table_name = &self.table_name;
            let migrations_table = self.migrations_table_name();

            let sql = migration.sql.replace("{table}", table_name);

            for statement in sql.split(';') {
                let statement = statement.trim();
                if statement.is_empty() {
                    continue;
                }

                tx.execute(statement, &[])
                    .await
                    .map_err(|e| Error::OperationFailed {
                        operation: format!(
                            "migration_v{}: {}",
                            migration.version, migration.description
                        ),
                        cause: e.to_string(),
                    })?;
            }

            let record_sql =
                format!("INSERT INTO {migrations_table} (version, description) VALUES ($1, $2)");

            tx.execute(&record_sql, &[&migration.version, &migration.description])
                .await
                .map_err(|e| query_failed("record_migration", &e))?;

            tracing::info!(
                version = migration.version,
                description = migration.description,
                table = %table_name,
                "Applied migration"
            );

            Ok(())
        }
    }

    fn query_failed(operation: &str, e: &tokio_postgres::Error) -> Error {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: e.to_string(),
        }
    }

    /// Maps an `(id, document)` row to an item.
    fn row_to_item(row: &tokio_postgres::Row) -> Result<Item> {
        let id: String = row.try_get("id").map_err(|e| query_failed("read_item_row", &e))?;
        let document: Value = row
            .try_get("document")
            .map_err(|e| query_failed("read_item_row", &e))?;

        let Value::Object(fields) = document else {
            return Err(Error::OperationFailed {
                operation: "read_item_row".to_string(),
                cause: format!("item {id}: document is not an object"),
            });
        };

        Ok(Item::new(ItemId::new(id), fields))
    }

    fn item_document(item: &Item) -> Value {
        Value::Object(item.fields().clone())
    }

    #[async_trait]
    impl ItemStore for PostgresItemStore {
        fn backend_name(&self) -> &'static str {
            "postgresql"
        }

        async fn initialize(&self) -> Result<()> {
            let mut client = self.connect().await?;
            self.migrate(&mut client).await
        }

        async fn list_all(&self) -> Result<Vec<Item>> {
            let client = self.connect().await?;
            let table_name = &self.table_name;

            let rows = client
                .query(
                    &format!("SELECT id, document FROM {table_name} ORDER BY seq"),
                    &[],
                )
                .await
                .map_err(|e| query_failed("list_items", &e))?;

            rows.iter().map(row_to_item).collect()
        }

        async fn find(&self, id: &ItemId) -> Result<Option<Item>> {
            let client = self.connect().await?;
            let table_name = &self.table_name;

            let row = client
                .query_opt(
                    &format!("SELECT id, document FROM {table_name} WHERE id = $1"),
                    &[&id.as_str()],
                )
                .await
                .map_err(|e| query_failed("find_item", &e))?;

            row.as_ref().map(row_to_item).transpose()
        }

        async fn insert(&self, item: &Item) -> Result<()> {
            let client = self.connect().await?;
            let table_name = &self.table_name;
            let document = item_document(item);

            let inserted = client
                .execute(
                    &format!(
                        "INSERT INTO {table_name} (id, document) VALUES ($1, $2)
                         ON CONFLICT (id) DO NOTHING"
                    ),
                    &[&item.id_str(), &document],
                )
                .await
                .map_err(|e| query_failed("insert_item", &e))?;

            if inserted == 0 {
                return Err(Error::DuplicateId(item.id_str().to_string()));
            }
            Ok(())
        }

        async fn replace(&self, id: &ItemId, item: &Item) -> Result<bool> {
            let client = self.connect().await?;
            let table_name = &self.table_name;
            let document = item_document(item);

            let updated = client
                .execute(
                    &format!("UPDATE {table_name} SET document = $2 WHERE id = $1"),
                    &[&id.as_str(), &document],
                )
                .await
                .map_err(|e| query_failed("replace_item", &e))?;

            Ok(updated > 0)
        }

        async fn remove_one(&self, id: &ItemId) -> Result<Option<Item>> {
            let client = self.connect().await?;
            let table_name = &self.table_name;

            let row = client
                .query_opt(
                    &format!("DELETE FROM {table_name} WHERE id = $1 RETURNING id, document"),
                    &[&id.as_str()],
                )
                .await
                .map_err(|e| query_failed("remove_item", &e))?;

            row.as_ref().map(row_to_item).transpose()
        }

        async fn remove_all(&self) -> Result<u64> {
            let client = self.connect().await?;
            let table_name = &self.table_name;

            client
                .execute(&format!("DELETE FROM {table_name}"), &[])
                .await
                .map_err(|e| query_failed("remove_all_items", &e))
        }
    }
}

#[cfg(feature = "postgres")]
pub use implementation::PostgresItemStore;

#[cfg(not(feature = "postgres"))]
mod stub {
    use crate::models::{Item, ItemId};
    use crate::storage::ItemStore;
    use crate::{Error, Result};
    use async_trait::async_trait;

    /// Stub PostgreSQL item store when feature is not enabled.
    pub struct PostgresItemStore {
        _private: (),
    }

    impl PostgresItemStore {
        /// Creates a new PostgreSQL item store (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn new(_connection_url: &str, _collection: &str) -> Result<Self> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }
    }

    #[async_trait]
    impl ItemStore for PostgresItemStore {
        fn backend_name(&self) -> &'static str {
            "postgresql"
        }

        async fn initialize(&self) -> Result<()> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }

        async fn list_all(&self) -> Result<Vec<Item>> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }

        async fn insert(&self, _item: &Item) -> Result<()> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }

        async fn replace(&self, _id: &ItemId, _item: &Item) -> Result<bool> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }

        async fn remove_one(&self, _id: &ItemId) -> Result<Option<Item>> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }

        async fn remove_all(&self) -> Result<u64> {
            Err(Error::FeatureNotEnabled("postgres".to_string()))
        }
    }
}

#[cfg(not(feature = "postgres"))]
pub use stub::PostgresItemStore;
