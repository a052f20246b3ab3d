//! Capacity policy: per-store quota and overhead margin

use crate::MIB;

/// Default per-store quota (512 MiB, a free-tier database)
pub const DEFAULT_CAPACITY_LIMIT_BYTES: u64 = 512 * MIB;

/// Default fraction of free space considered usable
///
/// Stored documents carry chunking and index overhead beyond the raw file
/// bytes, so only this share of the free space is offered to a new file.
pub const DEFAULT_OVERHEAD_MARGIN: f64 = 0.9;

/// Rules for deciding whether a store can take a file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityPolicy {
    /// Quota of each backing store in bytes
    pub capacity_limit_bytes: u64,

    /// Usable share of free space, in (0.0, 1.0]
    pub overhead_margin: f64,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            capacity_limit_bytes: DEFAULT_CAPACITY_LIMIT_BYTES,
            overhead_margin: DEFAULT_OVERHEAD_MARGIN,
        }
    }
}

impl CapacityPolicy {
    /// Create a policy with explicit limit and margin
    pub fn new(capacity_limit_bytes: u64, overhead_margin: f64) -> Self {
        Self {
            capacity_limit_bytes,
            overhead_margin,
        }
    }

    /// Check that the policy can admit any file at all
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity_limit_bytes == 0 {
            return Err("capacity_limit_bytes must be greater than zero".to_string());
        }
        if !(self.overhead_margin > 0.0 && self.overhead_margin <= 1.0) {
            return Err(format!(
                "overhead_margin must be in (0, 1], got {}",
                self.overhead_margin
            ));
        }
        Ok(())
    }

    /// Whether `free_bytes` of space can hold a file of `file_size` bytes.
    ///
    /// Strict: a store whose margin-adjusted free space equals the file size
    /// does not qualify.
    pub fn fits(&self, free_bytes: u64, file_size: u64) -> bool {
        free_bytes as f64 * self.overhead_margin > file_size as f64
    }
}
