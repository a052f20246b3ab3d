//! Media router: chooses the backing store for each upload
//!
//! For every upload the router probes all registered stores afresh, skips
//! the ones that cannot report their usage, and hands the best-fit store to
//! the upload collaborator together with a reservation for the file's bytes.
//!
//! # Example
//!
//! ```ignore
//! let router = MediaRouter::new(registry, CapacityPolicy::default(), ProbeOptions::default());
//! router.load().await?;
//!
//! let placement = router.select(upload.len() as u64).await?;
//! write_to_gridfs(placement.connection(), upload).await?;
//! drop(placement); // releases the reservation
//! ```

use std::sync::Arc;

use campus_core_placement::{
    CapacityPolicy, CapacitySnapshot, PlacementError, Reservation, ReservationLedger,
    StoreCapacity,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::probe::{probe_all, ProbeOptions};
use crate::registry::{LoadReport, StoreRegistry};
use crate::store::{MediaStoreHandle, StoreConnector};

/// A chosen store plus the reservation held for the upload
#[derive(Debug)]
pub struct Placement<C> {
    store: Arc<MediaStoreHandle<C>>,
    snapshot: CapacitySnapshot,
    free_bytes: u64,
    reservation: Reservation,
}

impl<C> Placement<C> {
    /// Handle of the chosen store
    pub fn store(&self) -> &Arc<MediaStoreHandle<C>> {
        &self.store
    }

    /// Connection to write the file through
    pub fn connection(&self) -> &C {
        self.store.connection()
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    /// Usage probed for this decision
    pub fn snapshot(&self) -> CapacitySnapshot {
        self.snapshot
    }

    /// Free bytes probed for this decision, before reservations
    pub fn free_bytes(&self) -> u64 {
        self.free_bytes
    }

    /// Bytes reserved for the upload
    pub fn file_size(&self) -> u64 {
        self.reservation.bytes()
    }
}

/// Capacity of one registered store, for status output
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<CapacitySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_bytes: Option<u64>,
    pub reserved_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreStatus {
    pub fn is_available(&self) -> bool {
        self.snapshot.is_some()
    }
}

/// Capacity-aware router over a [`StoreRegistry`]
pub struct MediaRouter<K: StoreConnector> {
    registry: StoreRegistry<K>,
    policy: CapacityPolicy,
    probe: ProbeOptions,
    ledger: ReservationLedger,
}

impl<K: StoreConnector> MediaRouter<K> {
    pub fn new(registry: StoreRegistry<K>, policy: CapacityPolicy, probe: ProbeOptions) -> Self {
        Self {
            registry,
            policy,
            probe,
            ledger: ReservationLedger::new(),
        }
    }

    pub fn registry(&self) -> &StoreRegistry<K> {
        &self.registry
    }

    pub fn policy(&self) -> &CapacityPolicy {
        &self.policy
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.ledger
    }

    /// Connect configured stores that are not connected yet
    pub async fn load(&self) -> Result<LoadReport> {
        self.registry.load().await
    }

    /// Reconnect every configured store.
    ///
    /// In-flight reservations are kept: their uploads still consume quota on
    /// stores that come back under the same name.
    pub async fn reload(&self) -> Result<LoadReport> {
        self.registry.reload().await
    }

    /// Choose the store for a file of `file_size` bytes and reserve the space.
    ///
    /// # Errors
    ///
    /// - `PlacementError::NoStoresRegistered` if the registry is empty
    /// - `PlacementError::NoCapacityAvailable` if no store that answered its
    ///   probe has room (including when none answered)
    pub async fn select(&self, file_size: u64) -> Result<Placement<K::Connection>> {
        let handles = self.registry.handles().await;
        if handles.is_empty() {
            warn!(file_size, "no media databases registered");
            return Err(PlacementError::NoStoresRegistered.into());
        }

        let mut available = Vec::with_capacity(handles.len());
        let mut candidates = Vec::with_capacity(handles.len());
        for (handle, outcome) in probe_all(&handles, &self.probe).await {
            if let Ok(snapshot) = outcome {
                candidates.push(StoreCapacity::new(handle.name(), snapshot));
                available.push((handle, snapshot));
            }
        }

        let (index, reservation) = self
            .ledger
            .place(&candidates, file_size, &self.policy)
            .map_err(|e| {
                warn!(
                    file_size,
                    registered = handles.len(),
                    probed = candidates.len(),
                    error = %e,
                    "no media database can take file"
                );
                e
            })?;

        let (store, snapshot) = available.swap_remove(index);
        let free_bytes = snapshot.free_bytes(self.policy.capacity_limit_bytes);

        info!(
            store = store.name(),
            file_size,
            free_bytes,
            in_flight = self.ledger.reserved(store.name()),
            "selected media database"
        );

        Ok(Placement {
            store,
            snapshot,
            free_bytes,
            reservation,
        })
    }

    /// Probe every registered store and report its capacity
    pub async fn capacity_report(&self) -> Vec<StoreStatus> {
        let handles = self.registry.handles().await;
        let limit = self.policy.capacity_limit_bytes;

        probe_all(&handles, &self.probe)
            .await
            .into_iter()
            .map(|(handle, outcome)| {
                let reserved_bytes = self.ledger.reserved(handle.name());
                match outcome {
                    Ok(snapshot) => StoreStatus {
                        name: handle.name().to_string(),
                        snapshot: Some(snapshot),
                        free_bytes: Some(
                            snapshot.free_bytes(limit).saturating_sub(reserved_bytes),
                        ),
                        reserved_bytes,
                        utilization: Some(snapshot.utilization(limit)),
                        error: None,
                    },
                    Err(e) => StoreStatus {
                        name: handle.name().to_string(),
                        snapshot: None,
                        free_bytes: None,
                        reserved_bytes,
                        utilization: None,
                        error: Some(e.to_string()),
                    },
                }
            })
            .collect()
    }
}
