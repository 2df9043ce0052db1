// # Lease Store Trait
//
// Defines the interface for the DHCP lease snapshot.
//
// The snapshot keeps the latest lease per MAC address. There is no history
// and no accounting: every parsed lease simply overwrites its key. Stale
// leases are never purged here.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::parse::DhcpLease;

/// Latest known DHCP lease for a MAC address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Lowercased MAC address (the key)
    pub mac_address: String,
    /// Lease expiry, epoch seconds
    pub lease_end_time: i64,
    /// Assigned IPv4 address
    pub ip_address: String,
    /// Client hostname (`Unknown` when the device reported `*`)
    pub hostname: String,
    /// DHCP client identifier
    pub client_id: String,
    /// When this snapshot entry was written
    #[serde(with = "crate::timestamp::serde_local")]
    pub timestamp: NaiveDateTime,
}

impl LeaseRecord {
    /// Stamp a parsed lease with the time it was stored
    pub fn from_lease(lease: &DhcpLease, timestamp: NaiveDateTime) -> Self {
        Self {
            mac_address: lease.mac_address.clone(),
            lease_end_time: lease.lease_end_time,
            ip_address: lease.ip_address.clone(),
            hostname: lease.hostname.clone(),
            client_id: lease.client_id.clone(),
            timestamp,
        }
    }
}

/// Trait for lease snapshot implementations
///
/// A partially applied batch is acceptable: the device resends the full
/// lease table every cycle, so the next upsert converges.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Insert or replace each lease keyed by MAC, all stamped with `now`
    ///
    /// # Returns
    ///
    /// - `Ok(usize)`: Number of leases written
    /// - `Err(Error)`: Storage error
    async fn upsert_many(
        &self,
        leases: &[DhcpLease],
        now: NaiveDateTime,
    ) -> Result<usize, crate::Error>;

    /// Get the stored lease for a MAC address
    async fn get_lease(&self, mac_address: &str) -> Result<Option<LeaseRecord>, crate::Error>;

    /// List every stored lease, ordered by MAC address
    async fn list_leases(&self) -> Result<Vec<LeaseRecord>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
