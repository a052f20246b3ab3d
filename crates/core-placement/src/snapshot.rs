//! Capacity snapshots probed from a backing store

use serde::{Deserialize, Serialize};

/// Which statistics call produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeSource {
    /// Whole-database aggregate statistics
    Aggregate,
    /// Statistics of a single media collection (fallback)
    Collection,
}

/// Storage usage of one store at one point in time.
///
/// Ephemeral: fetched for a single placement decision and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    /// Bytes of data actually stored
    pub logical_used_bytes: u64,

    /// Bytes allocated on disk, counted against the quota
    pub allocated_bytes: u64,

    /// Statistics call that produced this snapshot
    pub source: ProbeSource,
}

impl CapacitySnapshot {
    /// Snapshot from aggregate statistics
    pub fn new(logical_used_bytes: u64, allocated_bytes: u64) -> Self {
        Self {
            logical_used_bytes,
            allocated_bytes,
            source: ProbeSource::Aggregate,
        }
    }

    /// Tag the snapshot with the call that produced it
    pub fn with_source(mut self, source: ProbeSource) -> Self {
        self.source = source;
        self
    }

    /// Free bytes left under `capacity_limit`, zero if already over quota
    pub fn free_bytes(&self, capacity_limit: u64) -> u64 {
        capacity_limit.saturating_sub(self.allocated_bytes)
    }

    /// Fraction of `capacity_limit` allocated (may exceed 1.0)
    pub fn utilization(&self, capacity_limit: u64) -> f64 {
        if capacity_limit == 0 {
            return 1.0;
        }
        self.allocated_bytes as f64 / capacity_limit as f64
    }
}
