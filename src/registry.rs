//! Connection registry for media stores
//!
//! Holds one live handle per reachable configured store, in catalog order.
//! The registry is an owned service value: construct it at startup, hand it
//! to a [`MediaRouter`](crate::router::MediaRouter), and share the router.
//!
//! A store that cannot be reached is logged and left out; it never aborts a
//! load or leaves a half-registered entry behind.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::{MediaStoreHandle, StoreCatalog, StoreConfig, StoreConnector};

/// Shared handle type produced by connector `K`
pub type SharedHandle<K> = Arc<MediaStoreHandle<<K as StoreConnector>::Connection>>;

/// Outcome of a load or reload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Stores connected by this call
    pub connected: Vec<String>,

    /// Stores that were already in the registry
    pub already_connected: Vec<String>,

    /// Repeated names in the catalog (first entry wins)
    pub duplicates: Vec<String>,

    /// Stores that could not be connected, with the reason
    pub failed: Vec<(String, String)>,
}

impl LoadReport {
    /// Whether every configured store is now in the registry
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registry of live backing-store handles
pub struct StoreRegistry<K: StoreConnector> {
    connector: K,
    catalog: Arc<dyn StoreCatalog>,
    handles: RwLock<Vec<SharedHandle<K>>>,
}

impl<K: StoreConnector> StoreRegistry<K> {
    /// Create an empty registry; call [`load`](Self::load) to connect
    pub fn new(connector: K, catalog: Arc<dyn StoreCatalog>) -> Self {
        Self {
            connector,
            catalog,
            handles: RwLock::new(Vec::new()),
        }
    }

    /// Connect every configured store that is not connected yet.
    ///
    /// Connection failures are logged and reported; the failed store is
    /// simply absent. Only a failure to read the catalog is an error.
    /// Connecting happens outside the registry lock, so selections keep
    /// running against the stores already registered.
    pub async fn load(&self) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let configs = dedupe(self.catalog.list().await?, &mut report);
        let order: Vec<String> = configs.iter().map(|c| c.name.clone()).collect();

        let registered = self.names().await;
        let mut pending = Vec::with_capacity(configs.len());
        for config in configs {
            if registered.contains(&config.name) {
                report.already_connected.push(config.name);
            } else {
                pending.push(config);
            }
        }

        let fresh = self.connect_all(&pending, &mut report).await;

        let mut surplus = Vec::new();
        {
            let mut handles = self.handles.write().await;
            for handle in fresh {
                if handles.iter().any(|h| h.name() == handle.name()) {
                    surplus.push(handle);
                } else {
                    handles.push(handle);
                }
            }
            handles.sort_by_key(|h| {
                order
                    .iter()
                    .position(|name| name == h.name())
                    .unwrap_or(usize::MAX)
            });
        }

        // A concurrent load registered these first
        for handle in surplus {
            debug!(store = handle.name(), "store connected twice, closing the spare");
            report.connected.retain(|name| name != handle.name());
            report.already_connected.push(handle.name().to_string());
            self.connector.close(handle.connection()).await;
        }

        Ok(report)
    }

    /// Reconnect every configured store and replace the registry contents.
    ///
    /// The catalog is read first; if that fails the current handles are kept.
    /// New connections are opened before the swap and the old ones closed
    /// after it, so the write lock is held only for the swap itself.
    pub async fn reload(&self) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let configs = dedupe(self.catalog.list().await?, &mut report);
        let fresh = self.connect_all(&configs, &mut report).await;

        let old = {
            let mut handles = self.handles.write().await;
            std::mem::replace(&mut *handles, fresh)
        };

        info!(count = old.len(), "closing media databases replaced by reload");
        for handle in &old {
            self.connector.close(handle.connection()).await;
        }

        Ok(report)
    }

    /// Connect `configs` concurrently, returning handles in the same order
    async fn connect_all(
        &self,
        configs: &[StoreConfig],
        report: &mut LoadReport,
    ) -> Vec<SharedHandle<K>> {
        let results = join_all(configs.iter().map(|config| async move {
            (config, self.connector.connect(config).await)
        }))
        .await;

        let mut handles = Vec::with_capacity(results.len());
        for (config, result) in results {
            match result {
                Ok(connection) => {
                    info!(
                        store = %config.name,
                        endpoint = %config.redacted_uri(),
                        "connected media database"
                    );
                    handles.push(Arc::new(MediaStoreHandle::new(
                        config.name.clone(),
                        connection,
                    )));
                    report.connected.push(config.name.clone());
                }
                Err(e) => {
                    warn!(
                        store = %config.name,
                        endpoint = %config.redacted_uri(),
                        error = %e,
                        "failed to connect media database, skipping"
                    );
                    report.failed.push((config.name.clone(), e.to_string()));
                }
            }
        }

        handles
    }

    /// Handle for `name`, if connected
    pub async fn get(&self, name: &str) -> Option<SharedHandle<K>> {
        let handles = self.handles.read().await;
        handles.iter().find(|h| h.name() == name).cloned()
    }

    /// Snapshot of every handle, in catalog order
    pub async fn handles(&self) -> Vec<SharedHandle<K>> {
        self.handles.read().await.clone()
    }

    /// Names of connected stores, in catalog order
    pub async fn names(&self) -> Vec<String> {
        let handles = self.handles.read().await;
        handles.iter().map(|h| h.name().to_string()).collect()
    }

    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }

    /// Configured stores as listed by the catalog
    pub async fn configured(&self) -> Result<Vec<StoreConfig>> {
        Ok(self.catalog.list().await?)
    }

    /// Close and remove every handle
    pub async fn close_all(&self) {
        let mut handles = self.handles.write().await;
        for handle in handles.drain(..) {
            self.connector.close(handle.connection()).await;
        }
    }

    /// Close every handle and the catalog; the registry cannot load again
    pub async fn shutdown(&self) {
        self.close_all().await;
        self.catalog.close().await;
    }

    /// Catalog description for logs
    pub fn catalog_description(&self) -> String {
        self.catalog.describe()
    }
}

/// Drop repeated names from the catalog list; the first entry wins
fn dedupe(configs: Vec<StoreConfig>, report: &mut LoadReport) -> Vec<StoreConfig> {
    let mut seen = HashSet::new();
    configs
        .into_iter()
        .filter(|config| {
            if seen.insert(config.name.clone()) {
                true
            } else {
                warn!(store = %config.name, "duplicate media database name in catalog, skipping");
                report.duplicates.push(config.name.clone());
                false
            }
        })
        .collect()
}
