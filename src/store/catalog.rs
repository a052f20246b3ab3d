//! Store catalogs: where the list of configured stores comes from

use async_trait::async_trait;

use super::config::StoreConfig;
use super::error::StoreResult;

/// Source of the configured store list, read on every load/reload
#[async_trait]
pub trait StoreCatalog: Send + Sync {
    /// Stores to connect, in configuration order
    async fn list(&self) -> StoreResult<Vec<StoreConfig>>;

    /// Short description for logs
    fn describe(&self) -> String;

    /// Release any connection held by the catalog
    async fn close(&self) {}
}

/// Fixed store list, typically the `[[stores]]` array of the config file
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    stores: Vec<StoreConfig>,
}

impl StaticCatalog {
    pub fn new(stores: Vec<StoreConfig>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl StoreCatalog for StaticCatalog {
    async fn list(&self) -> StoreResult<Vec<StoreConfig>> {
        Ok(self.stores.clone())
    }

    fn describe(&self) -> String {
        format!("static list of {} store(s)", self.stores.len())
    }
}
