// # File Stores
//
// File-based implementations of TrafficStore and LeaseStore.
//
// ## Durability
//
// Every mutation is written through to disk before the call returns, using
// the atomic write-then-rename and backup recovery of `JsonFile`.
//
// - Traffic store: if the write fails, the in-memory rows touched by the
//   call are rolled back, so a failed commit never advances a counter
//   without its delta.
// - Lease store: if the write fails, the in-memory snapshot is kept and
//   persisted by the next successful write or `flush()`.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "cumulative_stats": { "main_wan": { "rx_bytes": 1000, "tx_bytes": 200 } },
//   "monthly_stats": {
//     "main_wan": { "rx_bytes": 1000, "tx_bytes": 200, "timestamp": "2025-01-09 12:00:00" }
//   }
// }
// ```

use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Error;
use crate::parse::DhcpLease;
use crate::state::json_file::{DOCUMENT_VERSION, JsonFile, VersionedDocument};
use crate::state::tables::{LeaseTable, TrafficTables};
use crate::traits::{
    CounterRecord, LeaseRecord, LeaseStore, MonthlyRecord, SampleCommit, TrafficStore,
};

#[derive(Debug, Serialize, Deserialize)]
struct TrafficDocument {
    version: String,
    #[serde(flatten)]
    tables: TrafficTables,
}

#[derive(Serialize)]
struct TrafficDocumentRef<'a> {
    version: &'a str,
    #[serde(flatten)]
    tables: &'a TrafficTables,
}

impl Default for TrafficDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            tables: TrafficTables::default(),
        }
    }
}

impl VersionedDocument for TrafficDocument {
    fn version(&self) -> &str {
        &self.version
    }
}

/// File-based traffic store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use routerstats_core::state::FileTrafficStore;
/// use routerstats_core::traits::TrafficStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileTrafficStore::new("/var/lib/routerstats/network_stats.json").await?;
///
///     // Written to disk before returning
///     store.put_counter("main_wan", 1000, 200).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileTrafficStore {
    file: JsonFile,
    tables: RwLock<TrafficTables>,
}

impl FileTrafficStore {
    /// Create or load a file traffic store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the existing document, recovering from backup if corrupt
    /// 3. Start empty if neither is usable
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = JsonFile::open(path).await?;
        let doc: TrafficDocument = file.load_with_recovery().await?;

        tracing::debug!(
            "Loaded traffic state from {}: {} counters, {} monthly records",
            file.path().display(),
            doc.tables.cumulative_stats.len(),
            doc.tables.monthly_stats.len()
        );

        Ok(Self {
            file,
            tables: RwLock::new(doc.tables),
        })
    }

    async fn persist(&self, tables: &TrafficTables) -> Result<(), Error> {
        self.file
            .write(&TrafficDocumentRef {
                version: DOCUMENT_VERSION,
                tables,
            })
            .await
    }

    /// Apply `mutate` to one entity's rows and write through, rolling the rows
    /// back if either step fails
    async fn mutate_entity<F>(&self, entity_id: &str, mutate: F) -> Result<(), Error>
    where
        F: FnOnce(&mut TrafficTables) -> Result<bool, Error> + Send,
    {
        let mut guard = self.tables.write().await;
        let before = guard.capture(entity_id);

        let changed = match mutate(&mut *guard) {
            Ok(changed) => changed,
            Err(e) => {
                guard.restore(before);
                return Err(e);
            }
        };
        if !changed {
            return Ok(());
        }

        if let Err(e) = self.persist(&guard).await {
            guard.restore(before);
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl TrafficStore for FileTrafficStore {
    async fn get_counter(&self, entity_id: &str) -> Result<Option<CounterRecord>, Error> {
        let guard = self.tables.read().await;
        Ok(guard.cumulative_stats.get(entity_id).copied())
    }

    async fn put_counter(&self, entity_id: &str, rx_bytes: u64, tx_bytes: u64) -> Result<(), Error> {
        self.mutate_entity(entity_id, |tables| {
            tables.put_counter(entity_id, rx_bytes, tx_bytes);
            Ok(true)
        })
        .await
    }

    async fn get_monthly(&self, entity_id: &str) -> Result<Option<MonthlyRecord>, Error> {
        let guard = self.tables.read().await;
        Ok(guard.monthly_stats.get(entity_id).copied())
    }

    async fn initialize_monthly(
        &self,
        entity_id: &str,
        timestamp: NaiveDateTime,
    ) -> Result<(), Error> {
        self.mutate_entity(entity_id, |tables| {
            Ok(tables.initialize_monthly(entity_id, timestamp))
        })
        .await
    }

    async fn accumulate(
        &self,
        entity_id: &str,
        delta_rx: u64,
        delta_tx: u64,
        timestamp: NaiveDateTime,
    ) -> Result<(), Error> {
        self.mutate_entity(entity_id, |tables| {
            tables.accumulate(entity_id, delta_rx, delta_tx, timestamp)?;
            Ok(true)
        })
        .await
    }

    async fn reset_all_if_new_month(&self, now: NaiveDateTime) -> Result<bool, Error> {
        let mut guard = self.tables.write().await;
        let before = guard.monthly_stats.clone();

        if !guard.reset_all_if_new_month(now) {
            return Ok(false);
        }

        if let Err(e) = self.persist(&guard).await {
            guard.monthly_stats = before;
            return Err(e);
        }
        Ok(true)
    }

    async fn commit_sample(&self, commit: &SampleCommit) -> Result<(), Error> {
        self.mutate_entity(&commit.entity_id, |tables| {
            tables.commit_sample(commit)?;
            Ok(true)
        })
        .await
    }

    async fn list_entities(&self) -> Result<Vec<String>, Error> {
        let guard = self.tables.read().await;
        Ok(guard.monthly_stats.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Every successful mutation has already been written
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LeaseDocument {
    version: String,
    #[serde(flatten)]
    table: LeaseTable,
}

#[derive(Serialize)]
struct LeaseDocumentRef<'a> {
    version: &'a str,
    #[serde(flatten)]
    table: &'a LeaseTable,
}

impl Default for LeaseDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            table: LeaseTable::default(),
        }
    }
}

impl VersionedDocument for LeaseDocument {
    fn version(&self) -> &str {
        &self.version
    }
}

#[derive(Debug)]
struct LeaseState {
    table: LeaseTable,
    dirty: bool,
}

/// File-based DHCP lease snapshot
#[derive(Debug)]
pub struct FileLeaseStore {
    file: JsonFile,
    state: RwLock<LeaseState>,
}

impl FileLeaseStore {
    /// Create or load a file lease store
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = JsonFile::open(path).await?;
        let doc: LeaseDocument = file.load_with_recovery().await?;

        tracing::debug!(
            "Loaded lease snapshot from {}: {} leases",
            file.path().display(),
            doc.table.dhcp_leases.len()
        );

        Ok(Self {
            file,
            state: RwLock::new(LeaseState {
                table: doc.table,
                dirty: false,
            }),
        })
    }

    async fn write_state(&self, state: &mut LeaseState) -> Result<(), Error> {
        self.file
            .write(&LeaseDocumentRef {
                version: DOCUMENT_VERSION,
                table: &state.table,
            })
            .await?;
        state.dirty = false;
        Ok(())
    }
}

#[async_trait]
impl LeaseStore for FileLeaseStore {
    async fn upsert_many(&self, leases: &[DhcpLease], now: NaiveDateTime) -> Result<usize, Error> {
        if leases.is_empty() {
            return Ok(0);
        }

        let mut guard = self.state.write().await;
        let written = guard.table.upsert_many(leases, now);
        guard.dirty = true;

        self.write_state(&mut guard).await?;
        Ok(written)
    }

    async fn get_lease(&self, mac_address: &str) -> Result<Option<LeaseRecord>, Error> {
        let guard = self.state.read().await;
        Ok(guard.table.dhcp_leases.get(mac_address).cloned())
    }

    async fn list_leases(&self) -> Result<Vec<LeaseRecord>, Error> {
        let guard = self.state.read().await;
        Ok(guard.table.dhcp_leases.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;
        if guard.dirty {
            self.write_state(&mut guard).await
        } else {
            Ok(())
        }
    }
}
