//! Backing-store abstraction for media databases
//!
//! Each backing store is an independently quota-limited document database.
//! This module defines how stores are described, connected and listed, with
//! a consistent async interface so the registry and router never depend on
//! a specific database driver.
//!
//! # Features
//!
//! - **Trait-based abstraction**: [`StoreConnector`] opens connections,
//!   [`CapacityProbe`](crate::probe::CapacityProbe) reads their statistics
//! - **Pluggable catalogs**: [`StoreCatalog`] yields the configured store list
//! - **Security**: Connection strings are held with the `secrecy` crate and
//!   only ever displayed redacted
//! - **MongoDB**: Native implementation behind the `mongodb-native` feature
//!
//! # Example Implementation
//!
//! ```ignore
//! use campus_media::store::{StoreConfig, StoreConnector, StoreResult};
//! use async_trait::async_trait;
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl StoreConnector for MyConnector {
//!     type Connection = MyConnection;
//!
//!     async fn connect(&self, config: &StoreConfig) -> StoreResult<MyConnection> {
//!         // Open the connection and verify the store answers
//!     }
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;

#[cfg(feature = "mongodb-native")]
pub mod mongo;

pub use catalog::{StaticCatalog, StoreCatalog};
pub use config::{redact_uri, serialize_redacted, StoreConfig, StoreEntry};
pub use error::{StoreError, StoreResult};

#[cfg(feature = "mongodb-native")]
pub use mongo::{MongoCatalog, MongoConnector, MongoStore};

use std::time::Instant;

use async_trait::async_trait;

use crate::probe::CapacityProbe;

/// Opens connections to backing stores
///
/// Implementors must verify the store is reachable in `connect`; a handle
/// that reaches the registry is expected to answer probes.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Live connection type handed to the upload collaborator
    type Connection: CapacityProbe + 'static;

    /// Open and verify a connection for `config`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConnectionFailed` or `StoreError::Timeout` if the
    /// store is unreachable, `StoreError::InvalidConfig` if the entry is
    /// unusable.
    async fn connect(&self, config: &StoreConfig) -> StoreResult<Self::Connection>;

    /// Close a connection (optional cleanup)
    async fn close(&self, _connection: &Self::Connection) {}
}

/// A live, named connection to one backing store
#[derive(Debug)]
pub struct MediaStoreHandle<C> {
    name: String,
    connection: C,
    connected_at: Instant,
}

impl<C> MediaStoreHandle<C> {
    pub fn new(name: impl Into<String>, connection: C) -> Self {
        Self {
            name: name.into(),
            connection,
            connected_at: Instant::now(),
        }
    }

    /// Registry name of the store
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The live connection
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// When the connection was opened
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }
}
