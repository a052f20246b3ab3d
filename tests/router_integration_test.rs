/*!
 * Integration tests for the media router
 *
 * These tests drive registry loading, live probing and best-fit selection
 * through the public API, using an in-memory connector whose stores report
 * whatever usage the test sets.
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use campus_core_placement::MIB;
use campus_media::store::{StaticCatalog, StoreResult};
use campus_media::{
    CapacityPolicy, CapacityProbe, CapacitySnapshot, MediaRouter, PlacementError, ProbeOptions,
    ProbeSource, RouterError, StoreCatalog, StoreConfig, StoreConnector, StoreError,
    StoreRegistry,
};

const LIMIT: u64 = 512 * MIB;

/// What a fake store answers to each statistics call
#[derive(Debug, Clone, Copy)]
struct Usage {
    aggregate: Option<CapacitySnapshot>,
    collection: Option<CapacitySnapshot>,
}

impl Usage {
    /// Store with `free` bytes left under the quota
    fn free(free: u64) -> Self {
        let allocated = LIMIT - free;
        Self {
            aggregate: Some(CapacitySnapshot::new(allocated, allocated)),
            collection: None,
        }
    }

    fn unavailable() -> Self {
        Self {
            aggregate: None,
            collection: None,
        }
    }
}

type UsageMap = Arc<Mutex<HashMap<String, Usage>>>;

#[derive(Debug)]
struct FakeStore {
    name: String,
    usage: UsageMap,
}

impl FakeStore {
    fn usage(&self) -> Usage {
        self.usage
            .lock()
            .unwrap()
            .get(&self.name)
            .copied()
            .unwrap_or_else(Usage::unavailable)
    }

    fn refused(&self, command: &str) -> StoreError {
        StoreError::Command {
            store: self.name.clone(),
            command: command.to_string(),
            message: "not authorized".to_string(),
        }
    }
}

#[async_trait]
impl CapacityProbe for FakeStore {
    async fn aggregate_stats(&self) -> StoreResult<CapacitySnapshot> {
        self.usage().aggregate.ok_or_else(|| self.refused("dbStats"))
    }

    async fn collection_stats(&self, _collection: &str) -> StoreResult<CapacitySnapshot> {
        self.usage()
            .collection
            .ok_or_else(|| self.refused("collStats"))
    }
}

/// Connects every store except those marked unreachable
#[derive(Clone, Default)]
struct FakeConnector {
    usage: UsageMap,
    unreachable: Arc<Mutex<Vec<String>>>,
}

impl FakeConnector {
    fn set(&self, store: &str, usage: Usage) {
        self.usage.lock().unwrap().insert(store.to_string(), usage);
    }

    fn set_unreachable(&self, store: &str) {
        self.unreachable.lock().unwrap().push(store.to_string());
    }
}

#[async_trait]
impl StoreConnector for FakeConnector {
    type Connection = FakeStore;

    async fn connect(&self, config: &StoreConfig) -> StoreResult<FakeStore> {
        if self.unreachable.lock().unwrap().contains(&config.name) {
            return Err(StoreError::ConnectionFailed {
                store: config.name.clone(),
                endpoint: config.redacted_uri(),
                source: None,
            });
        }
        Ok(FakeStore {
            name: config.name.clone(),
            usage: Arc::clone(&self.usage),
        })
    }
}

fn catalog(names: &[&str]) -> Arc<dyn StoreCatalog> {
    Arc::new(StaticCatalog::new(
        names
            .iter()
            .map(|n| StoreConfig::new(*n, format!("mongodb://admin:secret@{}/media", n)))
            .collect(),
    ))
}

fn router(connector: FakeConnector, names: &[&str], margin: f64) -> MediaRouter<FakeConnector> {
    MediaRouter::new(
        StoreRegistry::new(connector, catalog(names)),
        CapacityPolicy::new(LIMIT, margin),
        ProbeOptions::default(),
    )
}

#[tokio::test]
async fn test_selects_store_with_most_headroom() {
    let connector = FakeConnector::default();
    connector.set("gallery-a", Usage::free(100 * MIB));
    connector.set("gallery-b", Usage::free(300 * MIB));

    let router = router(connector, &["gallery-a", "gallery-b"], 0.9);
    router.load().await.unwrap();

    let placement = router.select(50 * MIB).await.unwrap();
    assert_eq!(placement.name(), "gallery-b");
    assert_eq!(placement.free_bytes(), 300 * MIB);
    assert_eq!(placement.file_size(), 50 * MIB);
    assert_eq!(placement.connection().name, "gallery-b");
}

#[tokio::test]
async fn test_no_store_with_room() {
    let connector = FakeConnector::default();
    connector.set("gallery-a", Usage::free(40 * MIB));

    let router = router(connector, &["gallery-a"], 0.9);
    router.load().await.unwrap();

    let err = router.select(50 * MIB).await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::Placement(PlacementError::NoCapacityAvailable { .. })
    ));
    assert_eq!(err.exit_code(), 4);
    assert_eq!(err.http_status(), 507);
}

#[tokio::test]
async fn test_empty_registry() {
    let router = router(FakeConnector::default(), &[], 0.9);
    router.load().await.unwrap();

    let err = router.select(1).await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::Placement(PlacementError::NoStoresRegistered)
    ));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(err.http_status(), 503);
}

#[tokio::test]
async fn test_all_probes_failing_is_no_capacity() {
    let connector = FakeConnector::default();
    connector.set("gallery-a", Usage::unavailable());
    connector.set("gallery-b", Usage::unavailable());

    let router = router(connector, &["gallery-a", "gallery-b"], 0.9);
    router.load().await.unwrap();

    let err = router.select(MIB).await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::Placement(PlacementError::NoCapacityAvailable { .. })
    ));
}

#[tokio::test]
async fn test_unprobeable_store_is_skipped_not_zeroed() {
    let connector = FakeConnector::default();
    connector.set("gallery-a", Usage::unavailable());
    connector.set("gallery-b", Usage::free(60 * MIB));

    let router = router(connector, &["gallery-a", "gallery-b"], 0.9);
    router.load().await.unwrap();

    let placement = router.select(50 * MIB).await.unwrap();
    assert_eq!(placement.name(), "gallery-b");
}

#[tokio::test]
async fn test_collection_fallback_feeds_selection() {
    let connector = FakeConnector::default();
    connector.set(
        "gallery-a",
        Usage {
            aggregate: None,
            collection: Some(CapacitySnapshot::new(0, 12 * MIB)),
        },
    );

    let router = router(connector, &["gallery-a"], 0.9);
    router.load().await.unwrap();

    let placement = router.select(MIB).await.unwrap();
    assert_eq!(placement.snapshot().source, ProbeSource::Collection);
    assert_eq!(placement.free_bytes(), LIMIT - 12 * MIB);
}

#[tokio::test]
async fn test_margin_boundary_is_strict() {
    let connector = FakeConnector::default();
    connector.set("gallery-a", Usage::free(100 * MIB));

    // 100 MiB * 0.5 == 50 MiB is not strictly greater than 50 MiB
    let router = router(connector, &["gallery-a"], 0.5);
    router.load().await.unwrap();

    assert!(router.select(50 * MIB).await.is_err());
    assert!(router.select(50 * MIB - 1).await.is_ok());
}

#[tokio::test]
async fn test_probes_are_live_for_every_selection() {
    let connector = FakeConnector::default();
    connector.set("gallery-a", Usage::free(300 * MIB));
    connector.set("gallery-b", Usage::free(100 * MIB));

    let router = router(connector.clone(), &["gallery-a", "gallery-b"], 0.9);
    router.load().await.unwrap();
    assert_eq!(router.select(MIB).await.unwrap().name(), "gallery-a");

    connector.set("gallery-a", Usage::free(10 * MIB));
    assert_eq!(router.select(MIB).await.unwrap().name(), "gallery-b");
}

#[tokio::test]
async fn test_in_flight_reservations_spread_uploads() {
    let connector = FakeConnector::default();
    connector.set("gallery-a", Usage::free(100 * MIB));
    connector.set("gallery-b", Usage::free(90 * MIB));

    let router = router(connector, &["gallery-a", "gallery-b"], 1.0);
    router.load().await.unwrap();

    let first = router.select(60 * MIB).await.unwrap();
    assert_eq!(first.name(), "gallery-a");
    assert_eq!(router.ledger().reserved("gallery-a"), 60 * MIB);

    // gallery-a now has only 40 MiB of headroom left
    let second = router.select(60 * MIB).await.unwrap();
    assert_eq!(second.name(), "gallery-b");

    assert!(router.select(60 * MIB).await.is_err());

    drop(first);
    assert_eq!(router.ledger().reserved("gallery-a"), 0);
    assert_eq!(router.select(60 * MIB).await.unwrap().name(), "gallery-a");
}

#[tokio::test]
async fn test_concurrent_selects_never_overcommit() {
    let connector = FakeConnector::default();
    connector.set("gallery-a", Usage::free(100 * MIB));

    let router = Arc::new(router(connector, &["gallery-a"], 1.0));
    router.load().await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.select(30 * MIB).await })
        })
        .collect();

    let mut granted = Vec::new();
    for task in tasks {
        if let Ok(placement) = task.await.unwrap() {
            granted.push(placement);
        }
    }

    assert_eq!(granted.len(), 3);
    assert_eq!(router.ledger().reserved("gallery-a"), 90 * MIB);
}

#[tokio::test]
async fn test_unreachable_store_is_absent_after_load() {
    let connector = FakeConnector::default();
    connector.set("gallery-a", Usage::free(100 * MIB));
    connector.set("gallery-b", Usage::free(400 * MIB));
    connector.set_unreachable("gallery-b");

    let router = router(connector, &["gallery-a", "gallery-b"], 0.9);
    let report = router.load().await.unwrap();

    assert_eq!(report.connected, vec!["gallery-a"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "gallery-b");
    assert!(!report.failed[0].1.contains("secret"));

    assert_eq!(router.registry().len().await, 1);
    assert_eq!(router.select(50 * MIB).await.unwrap().name(), "gallery-a");
}

#[tokio::test]
async fn test_reload_matches_reachable_stores() {
    let connector = FakeConnector::default();
    for name in ["a", "b", "c"] {
        connector.set(name, Usage::free(100 * MIB));
    }

    let router = router(connector.clone(), &["a", "b", "c"], 0.9);
    router.load().await.unwrap();
    assert_eq!(router.registry().len().await, 3);

    connector.set_unreachable("b");
    let report = router.reload().await.unwrap();

    assert_eq!(report.connected, vec!["a", "c"]);
    assert_eq!(router.registry().names().await, vec!["a", "c"]);
}

#[tokio::test]
async fn test_placement_outlives_reload() {
    let connector = FakeConnector::default();
    connector.set("gallery-a", Usage::free(100 * MIB));

    let router = router(connector, &["gallery-a"], 0.9);
    router.load().await.unwrap();

    let placement = router.select(10 * MIB).await.unwrap();
    router.reload().await.unwrap();

    assert_eq!(placement.name(), "gallery-a");
    assert_eq!(router.ledger().reserved("gallery-a"), 10 * MIB);
}

#[tokio::test]
async fn test_capacity_report() {
    let connector = FakeConnector::default();
    connector.set("gallery-a", Usage::free(100 * MIB));
    connector.set("gallery-b", Usage::unavailable());

    let router = router(connector, &["gallery-a", "gallery-b"], 0.9);
    router.load().await.unwrap();
    let _held = router.select(20 * MIB).await.unwrap();

    let report = router.capacity_report().await;
    assert_eq!(report.len(), 2);

    let a = &report[0];
    assert_eq!(a.name, "gallery-a");
    assert!(a.is_available());
    assert_eq!(a.reserved_bytes, 20 * MIB);
    assert_eq!(a.free_bytes, Some(80 * MIB));

    let b = &report[1];
    assert_eq!(b.name, "gallery-b");
    assert!(!b.is_available());
    assert!(b.error.as_deref().unwrap().contains("collStats"));
}
