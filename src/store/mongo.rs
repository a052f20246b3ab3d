//! MongoDB backing stores
//!
//! Each media database is a separate MongoDB deployment (typically a
//! free-tier cluster with a fixed storage quota). Capacity is read with the
//! `dbStats` command, falling back to `collStats` on the media collection
//! when the account lacks the privilege for database-wide statistics.
//!
//! Field mapping:
//!
//! | command     | logical     | allocated                         |
//! |-------------|-------------|-----------------------------------|
//! | `dbStats`   | `dataSize`  | `storageSize` + `indexSize`       |
//! | `collStats` | `size`      | `storageSize` + `totalIndexSize`  |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campus_core_placement::{CapacitySnapshot, ProbeSource};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tracing::{debug, warn};

use super::catalog::StoreCatalog;
use super::config::{redact_uri, StoreConfig};
use super::error::{StoreError, StoreResult};
use super::StoreConnector;
use crate::probe::CapacityProbe;

const APP_NAME: &str = "campus-media";

/// Opens verified MongoDB connections
#[derive(Debug, Clone)]
pub struct MongoConnector {
    connect_timeout: Duration,
}

impl MongoConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl StoreConnector for MongoConnector {
    type Connection = MongoStore;

    async fn connect(&self, config: &StoreConfig) -> StoreResult<MongoStore> {
        let (client, database) =
            open_database(&config.name, config.uri(), None, self.connect_timeout).await?;

        debug!(store = %config.name, database = database.name(), "media database answered ping");

        Ok(MongoStore::new(config.name.clone(), client, database))
    }

    async fn close(&self, connection: &MongoStore) {
        connection.mark_closed();
        connection.client.clone().shutdown().immediate(true).await;
    }
}

/// A live connection to one media database
#[derive(Debug, Clone)]
pub struct MongoStore {
    name: String,
    client: Client,
    database: Database,
    /// Shared by clones; set once the client has been shut down
    closed: Arc<AtomicBool>,
}

impl MongoStore {
    fn new(name: String, client: Client, database: Database) -> Self {
        Self {
            name,
            client,
            database,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a reload or shutdown has closed this connection
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Database that media is written to
    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn command(&self, name: &str, command: Document) -> StoreResult<Document> {
        if self.is_closed() {
            return Err(StoreError::Closed {
                store: self.name.clone(),
            });
        }

        self.database
            .run_command(command)
            .await
            .map_err(|e| StoreError::Command {
                store: self.name.clone(),
                command: name.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl CapacityProbe for MongoStore {
    async fn aggregate_stats(&self) -> StoreResult<CapacitySnapshot> {
        let stats = self.command("dbStats", doc! { "dbStats": 1 }).await?;
        snapshot_from_db_stats(&self.name, &stats)
    }

    async fn collection_stats(&self, collection: &str) -> StoreResult<CapacitySnapshot> {
        let stats = self
            .command("collStats", doc! { "collStats": collection })
            .await?;
        snapshot_from_coll_stats(&self.name, &stats)
    }
}

/// Media database list stored in a collection of the site's main database.
///
/// Documents look like `{ name: "gallery-2", uri: "mongodb+srv://..." }`.
pub struct MongoCatalog {
    client: Client,
    database: Database,
    collection: String,
}

impl MongoCatalog {
    /// Connect to the main database holding the catalog collection
    pub async fn connect(
        uri: &str,
        database: Option<&str>,
        collection: impl Into<String>,
        connect_timeout: Duration,
    ) -> StoreResult<Self> {
        let (client, database) = open_database("catalog", uri, database, connect_timeout).await?;
        Ok(Self {
            client,
            database,
            collection: collection.into(),
        })
    }
}

#[async_trait]
impl StoreCatalog for MongoCatalog {
    async fn list(&self) -> StoreResult<Vec<StoreConfig>> {
        let catalog_err = |e: mongodb::error::Error| StoreError::Catalog(e.to_string());

        let mut cursor = self
            .database
            .collection::<Document>(&self.collection)
            .find(doc! {})
            .await
            .map_err(catalog_err)?;

        let mut stores = Vec::new();
        while let Some(entry) = cursor.try_next().await.map_err(catalog_err)? {
            match store_from_document(&entry) {
                Some(store) => stores.push(store),
                None => warn!(
                    collection = %self.collection,
                    id = ?entry.get("_id"),
                    "catalog entry without string name and uri, skipping"
                ),
            }
        }

        Ok(stores)
    }

    fn describe(&self) -> String {
        format!("collection {}.{}", self.database.name(), self.collection)
    }

    async fn close(&self) {
        self.client.clone().shutdown().immediate(true).await;
    }
}

async fn open_database(
    store: &str,
    uri: &str,
    database: Option<&str>,
    connect_timeout: Duration,
) -> StoreResult<(Client, Database)> {
    let connection_failed = |e: mongodb::error::Error| StoreError::ConnectionFailed {
        store: store.to_string(),
        endpoint: redact_uri(uri),
        source: Some(Box::new(e)),
    };

    let mut options = ClientOptions::parse(uri).await.map_err(|e| {
        StoreError::InvalidConfig {
            store: store.to_string(),
            message: e.to_string(),
        }
    })?;
    options.app_name = Some(APP_NAME.to_string());
    options.connect_timeout = Some(connect_timeout);
    options.server_selection_timeout = Some(connect_timeout);

    let database_name = database
        .map(str::to_string)
        .or_else(|| options.default_database.clone())
        .unwrap_or_else(|| store.to_string());

    let client = Client::with_options(options).map_err(connection_failed)?;
    let database = client.database(&database_name);

    // Clients connect lazily; ping so unreachable stores fail here
    database
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(connection_failed)?;

    Ok((client, database))
}

fn store_from_document(entry: &Document) -> Option<StoreConfig> {
    let name = entry.get_str("name").ok()?;
    let uri = entry.get_str("uri").ok()?;
    if name.trim().is_empty() || uri.trim().is_empty() {
        return None;
    }
    Some(StoreConfig::new(name, uri))
}

/// Snapshot from a `dbStats` reply
pub fn snapshot_from_db_stats(store: &str, stats: &Document) -> StoreResult<CapacitySnapshot> {
    let logical = stat_bytes(store, stats, "dataSize")?;
    let storage = stat_bytes(store, stats, "storageSize")?;
    let index = optional_stat_bytes(store, stats, "indexSize")?;

    Ok(CapacitySnapshot::new(logical, storage.saturating_add(index))
        .with_source(ProbeSource::Aggregate))
}

/// Snapshot from a `collStats` reply
pub fn snapshot_from_coll_stats(store: &str, stats: &Document) -> StoreResult<CapacitySnapshot> {
    let logical = stat_bytes(store, stats, "size")?;
    let storage = stat_bytes(store, stats, "storageSize")?;
    let index = optional_stat_bytes(store, stats, "totalIndexSize")?;

    Ok(CapacitySnapshot::new(logical, storage.saturating_add(index))
        .with_source(ProbeSource::Collection))
}

fn optional_stat_bytes(store: &str, stats: &Document, field: &str) -> StoreResult<u64> {
    if stats.contains_key(field) {
        stat_bytes(store, stats, field)
    } else {
        Ok(0)
    }
}

/// Byte counts come back as int32, int64 or double depending on size
fn stat_bytes(store: &str, stats: &Document, field: &str) -> StoreResult<u64> {
    match stats.get(field) {
        Some(Bson::Int32(v)) if *v >= 0 => Ok(*v as u64),
        Some(Bson::Int64(v)) if *v >= 0 => Ok(*v as u64),
        Some(Bson::Double(v)) if v.is_finite() && *v >= 0.0 => Ok(*v as u64),
        _ => Err(StoreError::InvalidStats {
            store: store.to_string(),
            field: field.to_string(),
        }),
    }
}
