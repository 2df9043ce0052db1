//! Report parsers
//!
//! Pure functions turning raw device report text into records. A malformed
//! line is skipped on its own and never aborts the rest of the report.
//!
//! ## Formats
//!
//! ```text
//! wireless stats:  <mac> <rx_bytes> <tx_bytes>
//! WAN stats:       ... wan: <rx_bytes> <tx_bytes> ...
//! DHCP leases:     <lease_end> <mac> <ipv4> <hostname> <client_id>
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static WAN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"wan:\s+(\d+)\s+(\d+)").expect("Invalid WAN pattern"));

static MAC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9a-fA-F]{2}:){5}[0-9a-fA-F]{2}$").expect("Invalid MAC pattern")
});

static LEASE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+([0-9a-fA-F:]{17})\s+([\d\.]+)\s+(.*?)\s+([0-9a-fA-F:]+)")
        .expect("Invalid DHCP lease pattern")
});

/// Hostname recorded when the device reports `*`
pub const UNKNOWN_HOSTNAME: &str = "Unknown";

/// Cumulative byte counters for one wireless client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTraffic {
    pub mac_address: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Cumulative byte counters for a WAN interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WanTraffic {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// One IPv4 DHCP lease as reported by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpLease {
    pub mac_address: String,
    pub lease_end_time: i64,
    pub ip_address: String,
    pub hostname: String,
    pub client_id: String,
}

/// Parse the wireless client report
///
/// Each well-formed line is exactly three whitespace-separated tokens, the
/// first a colon-separated MAC address.
pub fn parse_wifi_stats(data: &str) -> Vec<ClientTraffic> {
    data.trim()
        .lines()
        .filter_map(|line| {
            let client = parse_wifi_line(line);
            if client.is_none() && !line.trim().is_empty() {
                debug!("Skipping malformed wireless stats line: {:?}", line);
            }
            client
        })
        .collect()
}

fn parse_wifi_line(line: &str) -> Option<ClientTraffic> {
    let mut parts = line.split_whitespace();
    let (mac, rx, tx) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || !MAC_PATTERN.is_match(mac) {
        return None;
    }

    Some(ClientTraffic {
        mac_address: mac.to_lowercase(),
        rx_bytes: rx.parse().ok()?,
        tx_bytes: tx.parse().ok()?,
    })
}

/// Parse the WAN report
///
/// The first `wan: <rx> <tx>` occurrence wins.
pub fn parse_wan_stats(data: &str) -> Option<WanTraffic> {
    let caps = WAN_PATTERN.captures(data)?;
    let rx_bytes = caps[1].parse().ok()?;
    let tx_bytes = caps[2].parse().ok()?;

    Some(WanTraffic { rx_bytes, tx_bytes })
}

/// Parse the DHCP lease report
///
/// Only the first token of the hostname field is kept; `*` becomes
/// [`UNKNOWN_HOSTNAME`].
pub fn parse_dhcp_leases(data: &str) -> Vec<DhcpLease> {
    data.trim()
        .lines()
        .filter_map(|line| {
            let lease = parse_lease_line(line);
            if lease.is_none() && !line.trim().is_empty() {
                debug!("Skipping malformed DHCP lease line: {:?}", line);
            }
            lease
        })
        .collect()
}

fn parse_lease_line(line: &str) -> Option<DhcpLease> {
    let caps = LEASE_PATTERN.captures(line)?;

    let hostname = caps[4].trim();
    let hostname = if hostname == "*" {
        UNKNOWN_HOSTNAME.to_string()
    } else {
        hostname.split_whitespace().next()?.to_string()
    };

    Some(DhcpLease {
        lease_end_time: caps[1].parse().ok()?,
        mac_address: caps[2].to_lowercase(),
        ip_address: caps[3].to_string(),
        hostname,
        client_id: caps[5].to_string(),
    })
}
