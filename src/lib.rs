/*!
 * campus-media - capacity-aware media database router
 *
 * The school website keeps uploaded media (gallery images, hero video,
 * teacher portraits) in several independently quota-limited MongoDB
 * databases. This library decides which database receives each upload:
 * - Connection registry with per-store failure isolation
 * - Live capacity probing with a collection-level fallback
 * - Best-fit selection with an overhead margin
 * - In-flight reservations so concurrent uploads cannot overrun a quota
 */

pub mod cli_style;
pub mod config;
pub mod error;
pub mod logging;
pub mod probe;
pub mod registry;
pub mod router;
pub mod store;

#[cfg(feature = "mongodb-native")]
pub mod bootstrap;

// Re-export commonly used types
pub use campus_core_placement::{CapacityPolicy, CapacitySnapshot, PlacementError, ProbeSource};
pub use config::{CatalogConfig, LogLevel, RouterConfig};
pub use error::{Result, RouterError};
pub use probe::{CapacityProbe, ProbeOptions};
pub use registry::{LoadReport, StoreRegistry};
pub use router::{MediaRouter, Placement, StoreStatus};
pub use store::{MediaStoreHandle, StoreCatalog, StoreConfig, StoreConnector, StoreError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
