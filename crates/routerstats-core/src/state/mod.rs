// # Store Implementations
//
// This module provides implementations of the TrafficStore and LeaseStore
// traits for different persistence strategies.

pub mod file;
pub mod json_file;
pub mod memory;
pub mod tables;

pub use file::{FileLeaseStore, FileTrafficStore};
pub use memory::{MemoryLeaseStore, MemoryTrafficStore};
pub use tables::{LeaseTable, TrafficTables};

use crate::Error;
use crate::config::StateStoreConfig;
use crate::traits::{LeaseStore, TrafficStore};

/// Open the traffic store described by `config`
pub async fn open_traffic_store(config: &StateStoreConfig) -> Result<Box<dyn TrafficStore>, Error> {
    match config {
        StateStoreConfig::File { path } => Ok(Box::new(FileTrafficStore::new(path).await?)),
        StateStoreConfig::Memory => Ok(Box::new(MemoryTrafficStore::new())),
    }
}

/// Open the lease store described by `config`
pub async fn open_lease_store(config: &StateStoreConfig) -> Result<Box<dyn LeaseStore>, Error> {
    match config {
        StateStoreConfig::File { path } => Ok(Box::new(FileLeaseStore::new(path).await?)),
        StateStoreConfig::Memory => Ok(Box::new(MemoryLeaseStore::new())),
    }
}
