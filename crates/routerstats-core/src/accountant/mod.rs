//! Traffic accounting
//!
//! The `TrafficAccountant` turns cumulative device counters, sampled at
//! irregular intervals, into monthly byte totals.
//!
//! ## Sample Flow
//!
//! ```text
//! (entity, new_rx, new_tx, now)
//!         │
//!         ▼
//!  initialize_monthly ── zeroed record if absent
//!         │
//!         ▼
//!  get_counter ───────── last (rx, tx) baseline, if any
//!         │
//!         ▼
//!  compute_delta ─────── per direction
//!         │
//!         ▼
//!  commit_sample ─────── ledger += delta, baseline = new  (one unit)
//! ```
//!
//! ## Counter Resets
//!
//! A device reboot or counter wrap shows up as a reading lower than the
//! stored baseline. The whole new reading is then counted as fresh traffic.
//! Bytes transferred between the previous sample and the reset are lost from
//! the ledger; bytes after the reset are counted in full. This is a known
//! approximation and is kept as-is so historical totals stay comparable.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::traits::{SampleCommit, TrafficStore};

/// Entity id under which a device's WAN interface is accounted
pub const WAN_ENTITY_ID: &str = "main_wan";

/// Result of applying one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleOutcome {
    /// Bytes added to the monthly rx total
    pub delta_rx: u64,
    /// Bytes added to the monthly tx total
    pub delta_tx: u64,
    /// No baseline existed; the raw reading was counted in full
    pub first_observation: bool,
    /// At least one direction went backwards and was treated as a reset
    pub counter_reset: bool,
}

/// Incremental bytes between a stored baseline and a new reading
///
/// Returns `(delta, reset_detected)`.
pub fn compute_delta(new_value: u64, last_value: Option<u64>) -> (u64, bool) {
    match last_value {
        None => (new_value, false),
        Some(last) if new_value >= last => (new_value - last, false),
        Some(_) => (new_value, true),
    }
}

/// Stateful accountant over a [`TrafficStore`]
///
/// ## Concurrency
///
/// `record_sample` is a read-modify-write against the store. Calls for the
/// same entity are serialized through a per-entity lock, so concurrent
/// callers can never double-count or drop a delta. Calls for different
/// entities proceed independently.
pub struct TrafficAccountant {
    store: Box<dyn TrafficStore>,
    entity_locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TrafficAccountant {
    /// Create an accountant over `store`
    pub fn new(store: Box<dyn TrafficStore>) -> Self {
        Self {
            store,
            entity_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &dyn TrafficStore {
        self.store.as_ref()
    }

    /// Zero the monthly ledger if `now` is in a later month than its latest
    /// contribution
    ///
    /// Run once per poll cycle before any sample is recorded. Works across
    /// any number of skipped months because it compares against stored
    /// timestamps, not the calendar day.
    pub async fn reset_all_if_new_month(&self, now: NaiveDateTime) -> Result<bool> {
        let rolled = self.store.reset_all_if_new_month(now).await?;
        if rolled {
            info!("New month detected. Monthly stats reset at {}", now);
        }
        Ok(rolled)
    }

    /// Apply one cumulative sample for `entity_id`
    ///
    /// On error nothing beyond the (zeroed) monthly record creation has been
    /// applied, and the next sample is measured against the previous
    /// baseline.
    pub async fn record_sample(
        &self,
        entity_id: &str,
        new_rx: u64,
        new_tx: u64,
        now: NaiveDateTime,
    ) -> Result<SampleOutcome> {
        let lock = self.entity_lock(entity_id);
        let result = {
            let _guard = lock.lock().await;
            self.apply_sample(entity_id, new_rx, new_tx, now).await
        };
        drop(lock);
        self.release_entity_lock(entity_id);

        result
    }

    async fn apply_sample(
        &self,
        entity_id: &str,
        new_rx: u64,
        new_tx: u64,
        now: NaiveDateTime,
    ) -> Result<SampleOutcome> {
        self.store.initialize_monthly(entity_id, now).await?;
        let last = self.store.get_counter(entity_id).await?;

        let (delta_rx, rx_reset) = compute_delta(new_rx, last.map(|c| c.rx_bytes));
        let (delta_tx, tx_reset) = compute_delta(new_tx, last.map(|c| c.tx_bytes));

        let outcome = SampleOutcome {
            delta_rx,
            delta_tx,
            first_observation: last.is_none(),
            counter_reset: rx_reset || tx_reset,
        };

        if outcome.counter_reset {
            info!(
                "Counter reset detected for {} (rx reset: {}, tx reset: {}); counting full reading",
                entity_id, rx_reset, tx_reset
            );
        }

        self.store
            .commit_sample(&SampleCommit {
                entity_id: entity_id.to_string(),
                delta_rx,
                delta_tx,
                new_rx,
                new_tx,
                timestamp: now,
            })
            .await?;

        debug!(
            "Recorded {}: +{} rx, +{} tx (cumulative {} / {})",
            entity_id, delta_rx, delta_tx, new_rx, new_tx
        );

        Ok(outcome)
    }

    fn entity_lock(&self, entity_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .entity_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(entity_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry once no caller holds or waits on it, so entities
    /// seen once (randomized MACs) do not pin memory
    fn release_entity_lock(&self, entity_id: &str) {
        let mut locks = self
            .entity_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks
            .get(entity_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(entity_id);
        }
    }
}
