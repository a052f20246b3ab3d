//! Placement errors

use thiserror::Error;

/// Why no store could be chosen for a file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// The registry holds no stores at all
    #[error("no media databases are registered")]
    NoStoresRegistered,

    /// Stores exist but none has enough free space for the file
    #[error("no media database has room for {requested} bytes{}", largest_free_suffix(.largest_free))]
    NoCapacityAvailable {
        requested: u64,
        /// Largest free space among the stores that answered a probe
        largest_free: Option<u64>,
    },
}

fn largest_free_suffix(largest_free: &Option<u64>) -> String {
    match largest_free {
        Some(free) => format!(" (largest free: {} bytes)", free),
        None => " (no store reported its capacity)".to_string(),
    }
}

impl PlacementError {
    /// The action an operator should take to resolve this error
    pub fn hint(&self) -> &'static str {
        match self {
            PlacementError::NoStoresRegistered => "Add at least one media database",
            PlacementError::NoCapacityAvailable { .. } => {
                "No space available, add a media database or free space on an existing one"
            }
        }
    }
}
