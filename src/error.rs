/*!
 * Error types for campus-media
 */

use std::io;
use std::path::PathBuf;

use campus_core_placement::PlacementError;
use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, RouterError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_NO_STORES: i32 = 3;
pub const EXIT_NO_CAPACITY: i32 = 4;

#[derive(Debug, Error)]
pub enum RouterError {
    /// No store could be chosen for a file
    #[error(transparent)]
    Placement(#[from] PlacementError),

    /// A backing store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for the expected schema
    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl RouterError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RouterError::Placement(PlacementError::NoStoresRegistered) => EXIT_NO_STORES,
            RouterError::Placement(PlacementError::NoCapacityAvailable { .. }) => {
                EXIT_NO_CAPACITY
            }
            RouterError::Config(_)
            | RouterError::ConfigFile { .. }
            | RouterError::ConfigParse(_) => EXIT_CONFIG,
            _ => EXIT_FAILURE,
        }
    }

    /// HTTP status the enclosing admin API should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            // Service cannot accept uploads until a store is added
            RouterError::Placement(PlacementError::NoStoresRegistered) => 503,
            // Insufficient Storage
            RouterError::Placement(PlacementError::NoCapacityAvailable { .. }) => 507,
            RouterError::Store(e) if e.is_transient() => 503,
            _ => 500,
        }
    }

    /// Suggested operator action, if there is one
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            RouterError::Placement(e) => Some(e.hint()),
            RouterError::Config(_) | RouterError::ConfigParse(_) => {
                Some("Run `campus-media check-config` to validate the config file")
            }
            RouterError::ConfigFile { .. } => {
                Some("Pass --config or set CAMPUS_MEDIA_CONFIG to point at the config file")
            }
            _ => None,
        }
    }

    /// Whether this error is one of the two user-actionable placement failures
    pub fn is_placement(&self) -> bool {
        matches!(self, RouterError::Placement(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_exit_codes() {
        let none: RouterError = PlacementError::NoStoresRegistered.into();
        let full: RouterError = PlacementError::NoCapacityAvailable {
            requested: 10,
            largest_free: Some(5),
        }
        .into();

        assert_eq!(none.exit_code(), EXIT_NO_STORES);
        assert_eq!(full.exit_code(), EXIT_NO_CAPACITY);
        assert!(none.is_placement());
        assert!(full.is_placement());
    }

    #[test]
    fn test_http_status() {
        let none: RouterError = PlacementError::NoStoresRegistered.into();
        let full: RouterError = PlacementError::NoCapacityAvailable {
            requested: 10,
            largest_free: None,
        }
        .into();

        assert_eq!(none.http_status(), 503);
        assert_eq!(full.http_status(), 507);
        assert_eq!(RouterError::Other("boom".into()).http_status(), 500);
    }

    #[test]
    fn test_transient_store_error_is_503() {
        let err: RouterError = StoreError::Timeout {
            store: "gallery".into(),
            operation: "dbStats".into(),
            duration_secs: 5,
        }
        .into();
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn test_config_errors_exit_code() {
        assert_eq!(RouterError::Config("bad".into()).exit_code(), EXIT_CONFIG);
        let err = RouterError::ConfigFile {
            path: PathBuf::from("/nope.toml"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.exit_code(), EXIT_CONFIG);
        assert!(err.to_string().contains("/nope.toml"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_placement_display_is_transparent() {
        let err: RouterError = PlacementError::NoStoresRegistered.into();
        assert_eq!(err.to_string(), "no media databases are registered");
        assert_eq!(err.hint(), Some("Add at least one media database"));
    }

    #[test]
    fn test_closed_store_is_503() {
        let err: RouterError = StoreError::Closed {
            store: "gallery".into(),
        }
        .into();
        assert_eq!(err.http_status(), 503);
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }
}
