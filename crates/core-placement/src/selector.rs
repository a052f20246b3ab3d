//! Best-fit selection over freshly probed stores
//!
//! The selector is a pure function: it takes the capacity of every store
//! that answered a probe this round and returns the index of the store with
//! the most free space among those that can hold the file.
//!
//! ```text
//! free      = capacity_limit - allocated - reserved   (saturating)
//! qualifies = free * overhead_margin > file_size
//! choice    = argmax(free) over qualifying stores, first seen on ties
//! ```

use crate::error::PlacementError;
use crate::policy::CapacityPolicy;
use crate::snapshot::CapacitySnapshot;

/// Capacity of one store as seen by a single selection round
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCapacity {
    /// Registry name of the store
    pub name: String,

    /// Freshly probed usage
    pub snapshot: CapacitySnapshot,

    /// Bytes already promised to in-flight uploads on this store
    pub reserved_bytes: u64,
}

impl StoreCapacity {
    pub fn new(name: impl Into<String>, snapshot: CapacitySnapshot) -> Self {
        Self {
            name: name.into(),
            snapshot,
            reserved_bytes: 0,
        }
    }

    pub fn with_reserved(mut self, reserved_bytes: u64) -> Self {
        self.reserved_bytes = reserved_bytes;
        self
    }

    /// Free bytes after subtracting allocation and in-flight reservations
    pub fn free_bytes(&self, policy: &CapacityPolicy) -> u64 {
        self.snapshot
            .free_bytes(policy.capacity_limit_bytes)
            .saturating_sub(self.reserved_bytes)
    }
}

/// Pick the store with the most free space that can still hold `file_size`.
///
/// An empty `candidates` slice means every store failed its probe (or none
/// exists); callers that can tell the registry is empty should report
/// [`PlacementError::NoStoresRegistered`] before calling this.
pub fn select_best_fit(
    candidates: &[StoreCapacity],
    file_size: u64,
    policy: &CapacityPolicy,
) -> Result<usize, PlacementError> {
    let mut best: Option<(usize, u64)> = None;
    let mut largest_free: Option<u64> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let free = candidate.free_bytes(policy);
        largest_free = Some(largest_free.map_or(free, |l| l.max(free)));

        if !policy.fits(free, file_size) {
            tracing::trace!(
                store = %candidate.name,
                free,
                file_size,
                "store cannot fit file"
            );
            continue;
        }

        // Strictly greater keeps the first-seen store on ties
        match best {
            Some((_, best_free)) if free <= best_free => {}
            _ => best = Some((index, free)),
        }
    }

    match best {
        Some((index, _)) => Ok(index),
        None => Err(PlacementError::NoCapacityAvailable {
            requested: file_size,
            largest_free,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MIB;

    const LIMIT: u64 = 512 * MIB;

    fn store_with_free(name: &str, free: u64) -> StoreCapacity {
        let allocated = LIMIT - free;
        StoreCapacity::new(name, CapacitySnapshot::new(allocated, allocated))
    }

    #[test]
    fn test_picks_store_with_most_free_space() {
        let policy = CapacityPolicy::default();
        let candidates = vec![
            store_with_free("small", 100 * MIB),
            store_with_free("large", 300 * MIB),
        ];

        let index = select_best_fit(&candidates, 50 * MIB, &policy).unwrap();
        assert_eq!(candidates[index].name, "large");
    }

    #[test]
    fn test_insufficient_space_fails() {
        let policy = CapacityPolicy::default();
        let candidates = vec![store_with_free("only", 40 * MIB)];

        let err = select_best_fit(&candidates, 50 * MIB, &policy).unwrap_err();
        assert_eq!(
            err,
            PlacementError::NoCapacityAvailable {
                requested: 50 * MIB,
                largest_free: Some(40 * MIB),
            }
        );
    }

    #[test]
    fn test_empty_candidates_is_no_capacity() {
        let policy = CapacityPolicy::default();
        let err = select_best_fit(&[], 1, &policy).unwrap_err();
        assert_eq!(
            err,
            PlacementError::NoCapacityAvailable {
                requested: 1,
                largest_free: None,
            }
        );
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let policy = CapacityPolicy::default();
        let candidates = vec![
            store_with_free("first", 200 * MIB),
            store_with_free("second", 200 * MIB),
        ];

        let index = select_best_fit(&candidates, MIB, &policy).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn test_margin_excludes_store_that_fits_raw() {
        let policy = CapacityPolicy::new(LIMIT, 0.5);
        // 90 MiB free * 0.5 = 45 MiB, cannot take a 50 MiB file
        let candidates = vec![store_with_free("tight", 90 * MIB)];

        assert!(select_best_fit(&candidates, 50 * MIB, &policy).is_err());
    }

    #[test]
    fn test_reservations_reduce_free_space() {
        let policy = CapacityPolicy::default();
        let candidates = vec![
            store_with_free("a", 300 * MIB).with_reserved(250 * MIB),
            store_with_free("b", 100 * MIB),
        ];

        let index = select_best_fit(&candidates, 50 * MIB, &policy).unwrap();
        assert_eq!(candidates[index].name, "b");
    }

    #[test]
    fn test_over_quota_store_never_selected() {
        let policy = CapacityPolicy::default();
        let over = StoreCapacity::new("over", CapacitySnapshot::new(600 * MIB, 700 * MIB));
        let err = select_best_fit(&[over], 1, &policy).unwrap_err();
        assert_eq!(
            err,
            PlacementError::NoCapacityAvailable {
                requested: 1,
                largest_free: Some(0),
            }
        );
    }

    #[test]
    fn test_result_is_global_maximum_among_qualifying() {
        let policy = CapacityPolicy::default();
        let frees = [12u64, 310, 45, 77, 309, 0, 150];
        let candidates: Vec<_> = frees
            .iter()
            .enumerate()
            .map(|(i, f)| store_with_free(&format!("s{}", i), f * MIB))
            .collect();

        for size in [0u64, 10 * MIB, 100 * MIB, 250 * MIB] {
            let index = select_best_fit(&candidates, size, &policy).unwrap();
            let chosen = candidates[index].free_bytes(&policy);
            for candidate in &candidates {
                let free = candidate.free_bytes(&policy);
                if policy.fits(free, size) {
                    assert!(chosen >= free);
                }
            }
        }
    }
}
