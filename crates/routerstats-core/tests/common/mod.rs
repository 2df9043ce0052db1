//! Test doubles and common utilities for behaviour contract tests

#![allow(dead_code)]

use chrono::NaiveDateTime;
use routerstats_core::config::{DeviceEndpoints, EngineConfig, StateStoreConfig, StatsConfig};
use routerstats_core::error::{Error, Result};
use routerstats_core::parse::DhcpLease;
use routerstats_core::state::MemoryTrafficStore;
use routerstats_core::traits::{
    CounterRecord, LeaseRecord, LeaseStore, MonthlyRecord, ReportFetcher, SampleCommit,
    TrafficStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp
pub fn ts(s: &str) -> NaiveDateTime {
    routerstats_core::timestamp::parse(s).expect("valid test timestamp")
}

/// A ReportFetcher serving canned report bodies by URL
///
/// URLs without a body behave like a transport failure.
#[derive(Clone, Default)]
pub struct StubFetcher {
    reports: Arc<std::sync::Mutex<HashMap<String, String>>>,
    fetch_count: Arc<AtomicUsize>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url` from now on
    pub fn set_report(&self, url: &str, body: &str) {
        self.reports
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    /// Make `url` unavailable
    pub fn remove_report(&self, url: &str) {
        self.reports.lock().unwrap().remove(url);
    }

    /// Number of fetch() calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReportFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.reports.lock().unwrap().get(url).cloned()
    }

    fn fetcher_name(&self) -> &'static str {
        "stub"
    }
}

/// A TrafficStore over a memory store that can be told to fail
#[derive(Clone, Default)]
pub struct FailingTrafficStore {
    inner: MemoryTrafficStore,
    fail_commits: Arc<AtomicBool>,
    fail_rollover: Arc<AtomicBool>,
}

impl FailingTrafficStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped store, for inspecting state
    pub fn inner(&self) -> &MemoryTrafficStore {
        &self.inner
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_rollover(&self, fail: bool) {
        self.fail_rollover.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl TrafficStore for FailingTrafficStore {
    async fn get_counter(&self, entity_id: &str) -> Result<Option<CounterRecord>> {
        self.inner.get_counter(entity_id).await
    }

    async fn put_counter(&self, entity_id: &str, rx_bytes: u64, tx_bytes: u64) -> Result<()> {
        self.inner.put_counter(entity_id, rx_bytes, tx_bytes).await
    }

    async fn get_monthly(&self, entity_id: &str) -> Result<Option<MonthlyRecord>> {
        self.inner.get_monthly(entity_id).await
    }

    async fn initialize_monthly(&self, entity_id: &str, timestamp: NaiveDateTime) -> Result<()> {
        self.inner.initialize_monthly(entity_id, timestamp).await
    }

    async fn accumulate(
        &self,
        entity_id: &str,
        delta_rx: u64,
        delta_tx: u64,
        timestamp: NaiveDateTime,
    ) -> Result<()> {
        self.inner
            .accumulate(entity_id, delta_rx, delta_tx, timestamp)
            .await
    }

    async fn reset_all_if_new_month(&self, now: NaiveDateTime) -> Result<bool> {
        if self.fail_rollover.load(Ordering::SeqCst) {
            return Err(Error::state_store("traffic store unavailable"));
        }
        self.inner.reset_all_if_new_month(now).await
    }

    async fn commit_sample(&self, commit: &SampleCommit) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(Error::state_store("traffic store unavailable"));
        }
        self.inner.commit_sample(commit).await
    }

    async fn list_entities(&self) -> Result<Vec<String>> {
        self.inner.list_entities().await
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// A LeaseStore whose writes always fail
#[derive(Clone, Default)]
pub struct BrokenLeaseStore {
    upsert_attempts: Arc<AtomicUsize>,
}

impl BrokenLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_attempts(&self) -> usize {
        self.upsert_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LeaseStore for BrokenLeaseStore {
    async fn upsert_many(&self, _leases: &[DhcpLease], _now: NaiveDateTime) -> Result<usize> {
        self.upsert_attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::state_store("lease store unavailable"))
    }

    async fn get_lease(&self, _mac_address: &str) -> Result<Option<LeaseRecord>> {
        Ok(None)
    }

    async fn list_leases(&self) -> Result<Vec<LeaseRecord>> {
        Ok(Vec::new())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

pub const ROUTER: &str = "192.168.1.1";
pub const ROUTER_AP: &str = "http://192.168.1.1/cgi-bin/totalwifi.cgi";
pub const ROUTER_WAN: &str = "http://192.168.1.1/cgi-bin/wan.cgi";
pub const ROUTER_DHCP: &str = "http://192.168.1.1/cgi-bin/dhcp.cgi";
pub const ACCESS_POINT: &str = "192.168.1.2";
pub const ACCESS_POINT_AP: &str = "http://192.168.1.2/cgi-bin/totalwifi.cgi";

/// The router + access point layout used across the contract tests
pub fn two_device_config() -> StatsConfig {
    StatsConfig {
        devices: [
            (
                ROUTER.to_string(),
                DeviceEndpoints {
                    ap_stats: Some(ROUTER_AP.to_string()),
                    wan_stats: Some(ROUTER_WAN.to_string()),
                    dhcp_leases: Some(ROUTER_DHCP.to_string()),
                },
            ),
            (
                ACCESS_POINT.to_string(),
                DeviceEndpoints::ap_only(ACCESS_POINT_AP),
            ),
        ]
        .into_iter()
        .collect(),
        traffic_store: StateStoreConfig::Memory,
        lease_store: StateStoreConfig::Memory,
        engine: EngineConfig {
            poll_interval_secs: 1,
            fetch_timeout_secs: 1,
            event_channel_capacity: 100,
        },
    }
}
