/*!
 * Capacity Prober - live storage statistics for backing stores
 *
 * Every placement decision probes each registered store afresh. The primary
 * method asks the store for whole-database statistics; if that fails the
 * prober falls back to the statistics of the media collection. A store for
 * which both calls fail is unavailable for this round only, never treated
 * as having zero capacity.
 */

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campus_core_placement::{CapacitySnapshot, ProbeSource};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::store::{MediaStoreHandle, StoreError, StoreResult};

/// Default bound on each statistics call
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default collection probed when aggregate statistics fail (GridFS chunks)
pub const DEFAULT_FALLBACK_COLLECTION: &str = "fs.chunks";

/// Reads storage statistics from a backing store
///
/// Abstracts the vendor-specific statistics commands so alternate stores
/// (and fakes in tests) can be substituted.
#[async_trait]
pub trait CapacityProbe: Send + Sync {
    /// Whole-database usage (primary method)
    async fn aggregate_stats(&self) -> StoreResult<CapacitySnapshot>;

    /// Usage of a single collection (fallback method)
    async fn collection_stats(&self, collection: &str) -> StoreResult<CapacitySnapshot>;
}

/// How probes are run
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Collection queried when aggregate statistics fail
    pub fallback_collection: String,

    /// Upper bound for each statistics call
    pub timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            fallback_collection: DEFAULT_FALLBACK_COLLECTION.to_string(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Probe one store, falling back to collection statistics.
///
/// Returns the fallback's error when both methods fail.
pub async fn probe_store<C: CapacityProbe>(
    handle: &MediaStoreHandle<C>,
    options: &ProbeOptions,
) -> StoreResult<CapacitySnapshot> {
    let store = handle.name();
    let probe = handle.connection();

    let primary = bounded(store, "aggregate stats", options.timeout, probe.aggregate_stats()).await;
    let primary_err = match primary {
        Ok(snapshot) => return Ok(snapshot.with_source(ProbeSource::Aggregate)),
        Err(e) => e,
    };

    debug!(
        store,
        error = %primary_err,
        collection = %options.fallback_collection,
        "aggregate stats failed, falling back to collection stats"
    );

    let fallback = bounded(
        store,
        "collection stats",
        options.timeout,
        probe.collection_stats(&options.fallback_collection),
    )
    .await;

    match fallback {
        Ok(snapshot) => Ok(snapshot.with_source(ProbeSource::Collection)),
        Err(e) => {
            warn!(
                store,
                primary_error = %primary_err,
                fallback_error = %e,
                "store unavailable for this round, skipping"
            );
            Err(e)
        }
    }
}

/// Probe every handle concurrently, preserving input order
pub async fn probe_all<C: CapacityProbe>(
    handles: &[Arc<MediaStoreHandle<C>>],
    options: &ProbeOptions,
) -> Vec<(Arc<MediaStoreHandle<C>>, StoreResult<CapacitySnapshot>)> {
    join_all(handles.iter().map(|handle| async move {
        let outcome = probe_store(handle, options).await;
        (Arc::clone(handle), outcome)
    }))
    .await
}

async fn bounded<T, F>(store: &str, operation: &str, timeout: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            store: store.to_string(),
            operation: operation.to_string(),
            duration_secs: timeout.as_secs(),
        }),
    }
}
