// # Memory Stores
//
// In-memory implementations of TrafficStore and LeaseStore.
//
// ## Purpose
//
// Fast stores that don't persist across restarts. Useful for testing and
// dry runs against real devices.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - The first cycle after a restart treats every entity as first-seen and
//   counts its full cumulative value again

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use crate::Error;
use crate::parse::DhcpLease;
use crate::state::tables::{LeaseTable, TrafficTables};
use crate::traits::{
    CounterRecord, LeaseRecord, LeaseStore, MonthlyRecord, SampleCommit, TrafficStore,
};

/// In-memory traffic store
///
/// # Example
///
/// ```rust,no_run
/// use routerstats_core::state::MemoryTrafficStore;
/// use routerstats_core::traits::TrafficStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryTrafficStore::new();
///
///     store.put_counter("main_wan", 1000, 200).await?;
///     let counter = store.get_counter("main_wan").await?;
///     assert_eq!(counter.map(|c| c.rx_bytes), Some(1000));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTrafficStore {
    inner: Arc<RwLock<TrafficTables>>,
}

impl MemoryTrafficStore {
    /// Create a new empty memory traffic store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrafficStore for MemoryTrafficStore {
    async fn get_counter(&self, entity_id: &str) -> Result<Option<CounterRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.cumulative_stats.get(entity_id).copied())
    }

    async fn put_counter(&self, entity_id: &str, rx_bytes: u64, tx_bytes: u64) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .put_counter(entity_id, rx_bytes, tx_bytes);
        Ok(())
    }

    async fn get_monthly(&self, entity_id: &str) -> Result<Option<MonthlyRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.monthly_stats.get(entity_id).copied())
    }

    async fn initialize_monthly(
        &self,
        entity_id: &str,
        timestamp: NaiveDateTime,
    ) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .initialize_monthly(entity_id, timestamp);
        Ok(())
    }

    async fn accumulate(
        &self,
        entity_id: &str,
        delta_rx: u64,
        delta_tx: u64,
        timestamp: NaiveDateTime,
    ) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .accumulate(entity_id, delta_rx, delta_tx, timestamp)
    }

    async fn reset_all_if_new_month(&self, now: NaiveDateTime) -> Result<bool, Error> {
        Ok(self.inner.write().await.reset_all_if_new_month(now))
    }

    async fn commit_sample(&self, commit: &SampleCommit) -> Result<(), Error> {
        self.inner.write().await.commit_sample(commit)
    }

    async fn list_entities(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.monthly_stats.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}

/// In-memory lease snapshot
#[derive(Debug, Clone, Default)]
pub struct MemoryLeaseStore {
    inner: Arc<RwLock<LeaseTable>>,
}

impl MemoryLeaseStore {
    /// Create a new empty memory lease store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of leases in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.dhcp_leases.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.dhcp_leases.is_empty()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn upsert_many(&self, leases: &[DhcpLease], now: NaiveDateTime) -> Result<usize, Error> {
        Ok(self.inner.write().await.upsert_many(leases, now))
    }

    async fn get_lease(&self, mac_address: &str) -> Result<Option<LeaseRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.dhcp_leases.get(mac_address).cloned())
    }

    async fn list_leases(&self) -> Result<Vec<LeaseRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.dhcp_leases.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}
