// # Traffic Store Trait
//
// Defines the interface for the persistent traffic-accounting tables.
//
// ## Purpose
//
// The traffic store holds two keyed tables:
// - `cumulative_stats`: the last cumulative (rx, tx) sample seen per entity
// - `monthly_stats`: bytes accumulated since the start of the calendar month
//
// Both tables live behind one trait because an accepted sample must update
// them together (see `commit_sample`).
//
// ## Implementations
//
// - Memory-based: `MemoryTrafficStore`
// - File-based: `FileTrafficStore` (versioned JSON with crash recovery)
//
// ## Usage
//
// ```rust,ignore
// use routerstats_core::TrafficStore;
//
// let store = /* TrafficStore implementation */;
// let now = routerstats_core::timestamp::now();
//
// store.reset_all_if_new_month(now).await?;
// store.initialize_monthly("aa:bb:cc:dd:ee:ff", now).await?;
// let last = store.get_counter("aa:bb:cc:dd:ee:ff").await?;
// ```

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Last-observed cumulative sample for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Cumulative received bytes as reported by the device
    pub rx_bytes: u64,
    /// Cumulative transmitted bytes as reported by the device
    pub tx_bytes: u64,
}

/// Bytes accumulated for an entity during the current calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    /// Received bytes this month
    pub rx_bytes: u64,
    /// Transmitted bytes this month
    pub tx_bytes: u64,
    /// Time of the most recent contribution (or reset)
    #[serde(with = "crate::timestamp::serde_local")]
    pub timestamp: NaiveDateTime,
}

impl MonthlyRecord {
    /// A zeroed record stamped with `timestamp`
    pub fn zeroed(timestamp: NaiveDateTime) -> Self {
        Self {
            rx_bytes: 0,
            tx_bytes: 0,
            timestamp,
        }
    }
}

/// One accepted sample: the ledger delta plus the new counter baseline
///
/// Applied by [`TrafficStore::commit_sample`] as a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCommit {
    /// Entity the sample belongs to
    pub entity_id: String,
    /// Bytes to add to the monthly rx total
    pub delta_rx: u64,
    /// Bytes to add to the monthly tx total
    pub delta_tx: u64,
    /// Cumulative rx to store as the new baseline
    pub new_rx: u64,
    /// Cumulative tx to store as the new baseline
    pub new_tx: u64,
    /// Time of the sample
    pub timestamp: NaiveDateTime,
}

/// Trait for traffic store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently. Serializing the
/// read-modify-write sequence for one entity is the caller's job
/// (see `TrafficAccountant`); each individual method must be atomic.
///
/// ## Implementation Guidelines
///
/// - **No accounting logic**: deltas are computed by the accountant
/// - **Atomic commit**: `commit_sample` applies both tables or neither
/// - **Explicit flush**: `flush()` must persist all pending changes
#[async_trait]
pub trait TrafficStore: Send + Sync {
    /// Get the last cumulative sample stored for an entity
    ///
    /// # Returns
    ///
    /// - `Ok(Some(CounterRecord))`: The stored baseline
    /// - `Ok(None)`: The entity has never been observed
    /// - `Err(Error)`: Storage error
    async fn get_counter(&self, entity_id: &str) -> Result<Option<CounterRecord>, crate::Error>;

    /// Insert or replace the cumulative baseline for an entity
    async fn put_counter(
        &self,
        entity_id: &str,
        rx_bytes: u64,
        tx_bytes: u64,
    ) -> Result<(), crate::Error>;

    /// Get the monthly totals for an entity
    async fn get_monthly(&self, entity_id: &str) -> Result<Option<MonthlyRecord>, crate::Error>;

    /// Create a zeroed monthly record if none exists
    ///
    /// No-op when the record is already present.
    async fn initialize_monthly(
        &self,
        entity_id: &str,
        timestamp: NaiveDateTime,
    ) -> Result<(), crate::Error>;

    /// Add deltas to an existing monthly record and restamp it
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: `initialize_monthly` was not called first
    async fn accumulate(
        &self,
        entity_id: &str,
        delta_rx: u64,
        delta_tx: u64,
        timestamp: NaiveDateTime,
    ) -> Result<(), crate::Error>;

    /// Zero every monthly record if the latest stored timestamp is in a
    /// different (year, month) than `now`
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: A rollover happened
    /// - `Ok(false)`: Same month, or the ledger is empty
    async fn reset_all_if_new_month(&self, now: NaiveDateTime) -> Result<bool, crate::Error>;

    /// Accumulate the sample's delta and overwrite its counter baseline as
    /// one unit
    ///
    /// On error neither table is changed. Requires the monthly record to
    /// exist.
    async fn commit_sample(&self, commit: &SampleCommit) -> Result<(), crate::Error>;

    /// List every entity with a monthly record
    async fn list_entities(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
