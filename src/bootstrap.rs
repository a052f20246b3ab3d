//! Build a MongoDB-backed router from configuration

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::info;

use crate::config::{CatalogConfig, RouterConfig};
use crate::error::Result;
use crate::registry::StoreRegistry;
use crate::router::MediaRouter;
use crate::store::{MongoCatalog, MongoConnector, StaticCatalog, StoreCatalog};

/// Router over MongoDB media databases
pub type MongoRouter = MediaRouter<MongoConnector>;

/// Open the catalog described by `config`
pub async fn open_catalog(config: &RouterConfig) -> Result<Arc<dyn StoreCatalog>> {
    let catalog: Arc<dyn StoreCatalog> = match &config.catalog {
        CatalogConfig::Static => Arc::new(StaticCatalog::new(config.store_configs())),
        CatalogConfig::Mongo {
            uri,
            database,
            collection,
        } => Arc::new(
            MongoCatalog::connect(
                uri.expose_secret(),
                database.as_deref(),
                collection.clone(),
                config.connect_timeout(),
            )
            .await?,
        ),
    };

    info!(catalog = %catalog.describe(), "opened media database catalog");
    Ok(catalog)
}

/// Validate `config` and build an unloaded router from it
pub async fn build_router(config: &RouterConfig) -> Result<MongoRouter> {
    config.validate()?;

    let catalog = open_catalog(config).await?;
    let registry = StoreRegistry::new(MongoConnector::new(config.connect_timeout()), catalog);

    Ok(MediaRouter::new(
        registry,
        config.policy(),
        config.probe_options(),
    ))
}
