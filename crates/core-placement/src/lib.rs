//! Campus Core Placement: Pure-logic capacity placement
//!
//! # Overview
//!
//! This crate decides where an uploaded media file should live when media is
//! spread across several independently quota-limited backing stores. It
//! includes:
//!
//! - **Capacity Snapshot**: Logical and allocated byte counts probed from a store
//! - **Capacity Policy**: Per-store quota and the overhead margin applied to free space
//! - **Best-Fit Selector**: Picks the store with the most free space that still fits the file
//! - **Reservation Ledger**: Tracks bytes promised to in-flight uploads per store
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Database drivers or connection handling
//! - How statistics are fetched
//! - Application-specific concerns
//!
//! Capacity numbers are never cached here. Callers probe fresh snapshots for
//! every decision and pass them in.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Router (probes every store)           │
//! └─────────────┬───────────────────────────┘
//!               │ Vec<StoreCapacity>
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Reservation Ledger                │  ← subtract in-flight bytes
//! │  (one lock around select + reserve)     │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Best-Fit Selector                 │  ← free * margin > size
//! │  (max free wins, first seen on ties)    │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//!      (index, Reservation guard)
//! ```
//!
//! # Usage Example
//!
//! ```
//! use campus_core_placement::{
//!     CapacityPolicy, CapacitySnapshot, ReservationLedger, StoreCapacity, MIB,
//! };
//!
//! let policy = CapacityPolicy::default();
//! let ledger = ReservationLedger::new();
//!
//! let candidates = vec![
//!     StoreCapacity::new("gallery-a", CapacitySnapshot::new(400 * MIB, 412 * MIB)),
//!     StoreCapacity::new("gallery-b", CapacitySnapshot::new(180 * MIB, 212 * MIB)),
//! ];
//!
//! let (index, reservation) = ledger.place(&candidates, 50 * MIB, &policy).unwrap();
//! assert_eq!(candidates[index].name, "gallery-b");
//! assert_eq!(reservation.bytes(), 50 * MIB);
//! ```

pub mod error;
pub mod ledger;
pub mod policy;
pub mod selector;
pub mod snapshot;

// Re-export main types for convenience
pub use error::PlacementError;
pub use ledger::{Reservation, ReservationLedger};
pub use policy::{CapacityPolicy, DEFAULT_CAPACITY_LIMIT_BYTES, DEFAULT_OVERHEAD_MARGIN};
pub use selector::{select_best_fit, StoreCapacity};
pub use snapshot::{CapacitySnapshot, ProbeSource};

/// One kibibyte
pub const KIB: u64 = 1024;

/// One mebibyte
pub const MIB: u64 = 1024 * KIB;

/// One gibibyte
pub const GIB: u64 = 1024 * MIB;

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::error::PlacementError;
    pub use super::ledger::{Reservation, ReservationLedger};
    pub use super::policy::CapacityPolicy;
    pub use super::selector::{select_best_fit, StoreCapacity};
    pub use super::snapshot::{CapacitySnapshot, ProbeSource};
}
