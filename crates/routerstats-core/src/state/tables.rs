// # Store Tables
//
// Plain in-memory tables behind every store implementation. They hold the
// table semantics (insert-or-replace, zero-on-rollover, all-or-nothing
// commit) so the memory and file stores only add locking and persistence.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::parse::DhcpLease;
use crate::timestamp;
use crate::traits::{CounterRecord, LeaseRecord, MonthlyRecord, SampleCommit};

/// `cumulative_stats` and `monthly_stats`, keyed by entity id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficTables {
    #[serde(default)]
    pub cumulative_stats: BTreeMap<String, CounterRecord>,
    #[serde(default)]
    pub monthly_stats: BTreeMap<String, MonthlyRecord>,
}

/// Both table rows for one entity, captured before a mutation
#[derive(Debug, Clone)]
pub(crate) struct EntityRows {
    entity_id: String,
    counter: Option<CounterRecord>,
    monthly: Option<MonthlyRecord>,
}

impl TrafficTables {
    pub fn put_counter(&mut self, entity_id: &str, rx_bytes: u64, tx_bytes: u64) {
        self.cumulative_stats
            .insert(entity_id.to_string(), CounterRecord { rx_bytes, tx_bytes });
    }

    /// Returns true when a record was created
    pub fn initialize_monthly(&mut self, entity_id: &str, timestamp: NaiveDateTime) -> bool {
        if self.monthly_stats.contains_key(entity_id) {
            return false;
        }
        self.monthly_stats
            .insert(entity_id.to_string(), MonthlyRecord::zeroed(timestamp));
        true
    }

    pub fn accumulate(
        &mut self,
        entity_id: &str,
        delta_rx: u64,
        delta_tx: u64,
        timestamp: NaiveDateTime,
    ) -> Result<(), Error> {
        let record = self.monthly_stats.get_mut(entity_id).ok_or_else(|| {
            Error::not_found(format!("monthly record for {}", entity_id))
        })?;

        record.rx_bytes = record.rx_bytes.saturating_add(delta_rx);
        record.tx_bytes = record.tx_bytes.saturating_add(delta_tx);
        record.timestamp = timestamp;
        Ok(())
    }

    /// Latest contribution across the whole ledger
    pub fn latest_timestamp(&self) -> Option<NaiveDateTime> {
        self.monthly_stats.values().map(|r| r.timestamp).max()
    }

    /// Returns true when the ledger was zeroed
    pub fn reset_all_if_new_month(&mut self, now: NaiveDateTime) -> bool {
        let Some(latest) = self.latest_timestamp() else {
            return false;
        };
        if timestamp::is_same_month(&latest, &now) {
            return false;
        }

        for record in self.monthly_stats.values_mut() {
            *record = MonthlyRecord::zeroed(now);
        }
        true
    }

    /// Validates before touching anything, so an error leaves both tables as they were
    pub fn commit_sample(&mut self, commit: &SampleCommit) -> Result<(), Error> {
        self.accumulate(
            &commit.entity_id,
            commit.delta_rx,
            commit.delta_tx,
            commit.timestamp,
        )?;
        self.put_counter(&commit.entity_id, commit.new_rx, commit.new_tx);
        Ok(())
    }

    pub(crate) fn capture(&self, entity_id: &str) -> EntityRows {
        EntityRows {
            entity_id: entity_id.to_string(),
            counter: self.cumulative_stats.get(entity_id).copied(),
            monthly: self.monthly_stats.get(entity_id).copied(),
        }
    }

    pub(crate) fn restore(&mut self, rows: EntityRows) {
        match rows.counter {
            Some(counter) => {
                self.cumulative_stats.insert(rows.entity_id.clone(), counter);
            }
            None => {
                self.cumulative_stats.remove(&rows.entity_id);
            }
        }
        match rows.monthly {
            Some(monthly) => {
                self.monthly_stats.insert(rows.entity_id, monthly);
            }
            None => {
                self.monthly_stats.remove(&rows.entity_id);
            }
        }
    }
}

/// `dhcp_leases`, keyed by MAC address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseTable {
    #[serde(default)]
    pub dhcp_leases: BTreeMap<String, LeaseRecord>,
}

impl LeaseTable {
    pub fn upsert_many(&mut self, leases: &[DhcpLease], now: NaiveDateTime) -> usize {
        for lease in leases {
            self.dhcp_leases.insert(
                lease.mac_address.clone(),
                LeaseRecord::from_lease(lease, now),
            );
        }
        leases.len()
    }
}
