//! Reservation Ledger: bytes promised to in-flight uploads
//!
//! Probed statistics only reflect files that have finished writing. Two
//! uploads that select at the same moment would both see the same free
//! space and could together overrun a store's quota. The ledger closes that
//! gap: selection and reservation happen under one lock, and each upload
//! holds a [`Reservation`] until it finishes.
//!
//! # Example
//!
//! ```
//! use campus_core_placement::{
//!     CapacityPolicy, CapacitySnapshot, ReservationLedger, StoreCapacity, MIB,
//! };
//!
//! let policy = CapacityPolicy::new(512 * MIB, 1.0);
//! let ledger = ReservationLedger::new();
//! let stores = vec![StoreCapacity::new("hero", CapacitySnapshot::new(0, 412 * MIB))];
//!
//! let (_, first) = ledger.place(&stores, 60 * MIB, &policy).unwrap();
//! assert_eq!(ledger.reserved("hero"), 60 * MIB);
//!
//! // Only 40 MiB of headroom is left while the first upload is in flight
//! assert!(ledger.place(&stores, 60 * MIB, &policy).is_err());
//!
//! drop(first);
//! assert_eq!(ledger.reserved("hero"), 0);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::PlacementError;
use crate::policy::CapacityPolicy;
use crate::selector::{select_best_fit, StoreCapacity};

/// Reserved bytes per store, tagged with the generation they belong to
#[derive(Debug, Default)]
struct Reservations {
    /// Bumped by [`ReservationLedger::clear`]; older guards release nothing
    generation: u64,
    bytes: HashMap<String, u64>,
}

impl Reservations {
    fn held(&self, store: &str) -> u64 {
        self.bytes.get(store).copied().unwrap_or(0)
    }

    fn add(&mut self, store: &str, bytes: u64) {
        let entry = self.bytes.entry(store.to_string()).or_insert(0);
        *entry = entry.saturating_add(bytes);
    }
}

/// Per-store totals of in-flight reserved bytes
#[derive(Debug, Clone, Default)]
pub struct ReservationLedger {
    reserved: Arc<Mutex<Reservations>>,
}

impl ReservationLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Reservations> {
        // Counters stay consistent even if a holder panicked
        self.reserved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bytes currently reserved on `store`
    pub fn reserved(&self, store: &str) -> u64 {
        self.lock().held(store)
    }

    /// Total bytes reserved across all stores
    pub fn total_reserved(&self) -> u64 {
        self.lock().bytes.values().sum()
    }

    /// Reserve `bytes` on `store` without running a selection
    pub fn reserve(&self, store: &str, bytes: u64) -> Reservation {
        let mut reserved = self.lock();
        reserved.add(store, bytes);
        self.guard(&reserved, store.to_string(), bytes)
    }

    /// Select the best-fit store and reserve `file_size` bytes on it.
    ///
    /// The reservations of every candidate are read and updated under the
    /// same lock, so concurrent callers never both claim the same headroom.
    /// `reserved_bytes` already set on the candidates is ignored and replaced
    /// with the ledger's figures.
    pub fn place(
        &self,
        candidates: &[StoreCapacity],
        file_size: u64,
        policy: &CapacityPolicy,
    ) -> Result<(usize, Reservation), PlacementError> {
        let mut reserved = self.lock();

        let adjusted: Vec<StoreCapacity> = candidates
            .iter()
            .map(|c| c.clone().with_reserved(reserved.held(&c.name)))
            .collect();

        let index = select_best_fit(&adjusted, file_size, policy)?;
        let store = adjusted[index].name.clone();
        reserved.add(&store, file_size);

        tracing::debug!(
            store = %store,
            bytes = file_size,
            in_flight = reserved.held(&store),
            "reserved capacity"
        );

        Ok((index, self.guard(&reserved, store, file_size)))
    }

    /// Forget every reservation.
    ///
    /// Guards handed out before the call stay alive but release nothing when
    /// dropped, so reservations made afterwards are never undercounted.
    pub fn clear(&self) {
        let mut reserved = self.lock();
        reserved.bytes.clear();
        reserved.generation = reserved.generation.wrapping_add(1);
    }

    fn guard(&self, reserved: &Reservations, store: String, bytes: u64) -> Reservation {
        Reservation {
            ledger: self.clone(),
            generation: reserved.generation,
            store,
            bytes,
        }
    }

    fn release(&self, generation: u64, store: &str, bytes: u64) {
        let mut reserved = self.lock();
        if reserved.generation != generation {
            return;
        }
        if let Some(held) = reserved.bytes.get_mut(store) {
            *held = held.saturating_sub(bytes);
            if *held == 0 {
                reserved.bytes.remove(store);
            }
        }
    }
}

/// Guard over bytes reserved for one upload; dropping it releases them
#[derive(Debug)]
pub struct Reservation {
    ledger: ReservationLedger,
    generation: u64,
    store: String,
    bytes: u64,
}

impl Reservation {
    /// Store the bytes are reserved on
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Number of reserved bytes
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.ledger.release(self.generation, &self.store, self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::CapacitySnapshot;
    use crate::MIB;

    fn stores() -> Vec<StoreCapacity> {
        vec![
            StoreCapacity::new("a", CapacitySnapshot::new(0, 412 * MIB)), // 100 MiB free
            StoreCapacity::new("b", CapacitySnapshot::new(0, 362 * MIB)), // 150 MiB free
        ]
    }

    #[test]
    fn test_place_reserves_on_chosen_store() {
        let ledger = ReservationLedger::new();
        let policy = CapacityPolicy::new(512 * MIB, 1.0);

        let (index, reservation) = ledger.place(&stores(), 50 * MIB, &policy).unwrap();
        assert_eq!(index, 1);
        assert_eq!(reservation.store(), "b");
        assert_eq!(ledger.reserved("b"), 50 * MIB);
        assert_eq!(ledger.reserved("a"), 0);
    }

    #[test]
    fn test_concurrent_placements_spread_out() {
        let ledger = ReservationLedger::new();
        let policy = CapacityPolicy::new(512 * MIB, 1.0);
        let candidates = stores();

        // b: 150 free -> take 60 -> 90 free, now a (100) wins
        let (_, first) = ledger.place(&candidates, 60 * MIB, &policy).unwrap();
        let (_, second) = ledger.place(&candidates, 60 * MIB, &policy).unwrap();

        assert_eq!(first.store(), "b");
        assert_eq!(second.store(), "a");
        assert_eq!(ledger.total_reserved(), 120 * MIB);
    }

    #[test]
    fn test_drop_releases() {
        let ledger = ReservationLedger::new();
        let policy = CapacityPolicy::new(512 * MIB, 1.0);

        {
            let (_, _reservation) = ledger.place(&stores(), 10 * MIB, &policy).unwrap();
            assert_eq!(ledger.total_reserved(), 10 * MIB);
        }

        assert_eq!(ledger.total_reserved(), 0);
    }

    #[test]
    fn test_failed_place_reserves_nothing() {
        let ledger = ReservationLedger::new();
        let policy = CapacityPolicy::default();

        let result = ledger.place(&stores(), 400 * MIB, &policy);
        assert!(result.is_err());
        assert_eq!(ledger.total_reserved(), 0);
    }

    #[test]
    fn test_manual_reserve_and_clear() {
        let ledger = ReservationLedger::new();
        let guard = ledger.reserve("a", 5);
        assert_eq!(ledger.reserved("a"), 5);

        ledger.clear();
        assert_eq!(ledger.reserved("a"), 0);

        // Releasing after a clear must not underflow
        drop(guard);
        assert_eq!(ledger.reserved("a"), 0);
    }

    #[test]
    fn test_guard_from_before_clear_leaves_new_reservations_alone() {
        let ledger = ReservationLedger::new();
        let policy = CapacityPolicy::new(512 * MIB, 1.0);
        let old = ledger.reserve("a", 60 * MIB);
        ledger.clear();

        let only_a = vec![StoreCapacity::new("a", CapacitySnapshot::new(0, 0))];
        let (_, live) = ledger.place(&only_a, 80 * MIB, &policy).unwrap();
        assert_eq!(ledger.reserved("a"), 80 * MIB);

        drop(old);
        assert_eq!(ledger.reserved("a"), 80 * MIB);

        drop(live);
        assert_eq!(ledger.reserved("a"), 0);
    }

    #[test]
    fn test_threads_never_overcommit() {
        let ledger = ReservationLedger::new();
        let policy = CapacityPolicy::new(512 * MIB, 1.0);
        let candidates = vec![StoreCapacity::new("only", CapacitySnapshot::new(0, 412 * MIB))];

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                let candidates = candidates.clone();
                std::thread::spawn(move || ledger.place(&candidates, 30 * MIB, &policy).ok())
            })
            .collect();

        let granted: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();

        // 100 MiB free, 30 MiB each, strict fit: at most 3 succeed
        assert_eq!(granted.len(), 3);
        assert_eq!(ledger.total_reserved(), 90 * MIB);
    }
}
