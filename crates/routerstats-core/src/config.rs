//! Configuration types for the collector
//!
//! This module defines all configuration structures used throughout the crate.
//! A [`StatsConfig`] is built once at startup and handed to the engine by
//! value; nothing reads configuration from global state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Devices to poll, keyed by device identifier
    pub devices: BTreeMap<String, DeviceEndpoints>,

    /// Store for cumulative counters and monthly totals
    #[serde(default = "default_traffic_store")]
    pub traffic_store: StateStoreConfig,

    /// Store for the DHCP lease snapshot
    #[serde(default = "default_lease_store")]
    pub lease_store: StateStoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl StatsConfig {
    /// Create a new configuration with defaults and no devices
    pub fn new() -> Self {
        Self {
            devices: BTreeMap::new(),
            traffic_store: default_traffic_store(),
            lease_store: default_lease_store(),
            engine: EngineConfig::default(),
        }
    }

    /// Add a device
    pub fn with_device(mut self, id: impl Into<String>, endpoints: DeviceEndpoints) -> Self {
        self.devices.insert(id.into(), endpoints);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.devices.is_empty() {
            return Err(crate::Error::config("No devices configured"));
        }

        for (id, endpoints) in &self.devices {
            if id.trim().is_empty() {
                return Err(crate::Error::config("Device identifier cannot be empty"));
            }
            endpoints.validate(id)?;
        }

        self.traffic_store.validate()?;
        self.lease_store.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Report endpoints of one device
///
/// Any endpoint may be absent; that report type is then skipped for the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEndpoints {
    /// Wireless client counters (`<mac> <rx> <tx>` per line)
    #[serde(default)]
    pub ap_stats: Option<String>,

    /// WAN counters (`wan: <rx> <tx>`)
    #[serde(default)]
    pub wan_stats: Option<String>,

    /// DHCP lease table
    #[serde(default)]
    pub dhcp_leases: Option<String>,
}

impl DeviceEndpoints {
    /// Endpoints with only the wireless client report
    pub fn ap_only(url: impl Into<String>) -> Self {
        Self {
            ap_stats: Some(url.into()),
            ..Self::default()
        }
    }

    /// Whether no endpoint is configured
    pub fn is_empty(&self) -> bool {
        self.ap_stats.is_none() && self.wan_stats.is_none() && self.dhcp_leases.is_none()
    }

    fn validate(&self, device_id: &str) -> Result<(), crate::Error> {
        if self.is_empty() {
            return Err(crate::Error::config(format!(
                "Device {} has no endpoints configured",
                device_id
            )));
        }

        let endpoints = [
            ("ap_stats", &self.ap_stats),
            ("wan_stats", &self.wan_stats),
            ("dhcp_leases", &self.dhcp_leases),
        ];
        for (name, url) in endpoints {
            let Some(url) = url else { continue };
            if url.is_empty() {
                return Err(crate::Error::config(format!(
                    "Device {} endpoint {} cannot be empty",
                    device_id, name
                )));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(crate::Error::config(format!(
                    "Device {} endpoint {} must use HTTP or HTTPS scheme. Got: {}",
                    device_id, name, url
                )));
            }
        }

        Ok(())
    }
}

/// State store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based store
    File {
        /// Path to the store document
        path: String,
    },

    /// In-memory store (not persistent)
    Memory,
}

impl StateStoreConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("State store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

fn default_traffic_store() -> StateStoreConfig {
    StateStoreConfig::File {
        path: "network_stats.json".to_string(),
    }
}

fn default_lease_store() -> StateStoreConfig {
    StateStoreConfig::File {
        path: "dhcp_leases.json".to_string(),
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between poll cycles (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-request timeout for report fetches (in seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(crate::Error::config("Fetch timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_device_map_with_missing_endpoints() {
        let json = r#"{
            "devices": {
                "192.168.1.1": {
                    "ap_stats": "http://192.168.1.1/cgi-bin/totalwifi.cgi",
                    "wan_stats": "http://192.168.1.1/cgi-bin/wan.cgi",
                    "dhcp_leases": "http://192.168.1.1/cgi-bin/dhcp.cgi"
                },
                "192.168.1.2": {
                    "ap_stats": "http://192.168.1.2/cgi-bin/totalwifi.cgi",
                    "wan_stats": null
                }
            }
        }"#;

        let config: StatsConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        let ap = &config.devices["192.168.1.2"];
        assert!(ap.wan_stats.is_none());
        assert!(ap.dhcp_leases.is_none());
        assert_eq!(config.engine.fetch_timeout_secs, 10);
        assert_eq!(
            config.traffic_store,
            StateStoreConfig::File {
                path: "network_stats.json".to_string()
            }
        );
    }

    #[test]
    fn rejects_empty_device_table() {
        assert!(StatsConfig::new().validate().is_err());
    }

    #[test]
    fn rejects_device_without_endpoints() {
        let config = StatsConfig::new().with_device("ap", DeviceEndpoints::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let config = StatsConfig::new().with_device("ap", DeviceEndpoints::ap_only("ftp://ap/stats"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_interval() {
        let mut config =
            StatsConfig::new().with_device("ap", DeviceEndpoints::ap_only("http://ap/stats"));
        config.engine.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
