// # routerstatsd - Router Stats Daemon
//
// This is a thin integration layer. Accounting, parsing and persistence
// live in routerstats-core; this binary only wires them together.
//
// The routerstatsd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Opening the traffic and lease stores
// 4. Running one poll cycle (one-shot) or polling until shutdown
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Devices
// - `ROUTERSTATS_DEVICES_FILE`: JSON file mapping device id to its report URLs
//
// ```json
// {
//   "192.168.1.1": {
//     "ap_stats": "http://192.168.1.1/cgi-bin/totalwifi.cgi",
//     "wan_stats": "http://192.168.1.1/cgi-bin/wan.cgi",
//     "dhcp_leases": "http://192.168.1.1/cgi-bin/dhcp.cgi"
//   },
//   "192.168.1.2": { "ap_stats": "http://192.168.1.2/cgi-bin/totalwifi.cgi" }
// }
// ```
//
// ### Stores
// - `ROUTERSTATS_STORE_TYPE`: Type of store (file, memory)
// - `ROUTERSTATS_TRAFFIC_STORE_PATH`: Traffic document (default: network_stats.json)
// - `ROUTERSTATS_LEASE_STORE_PATH`: Lease document (default: dhcp_leases.json)
//
// ### Engine
// - `ROUTERSTATS_POLL_INTERVAL_SECS`: Seconds between cycles (default: 300)
// - `ROUTERSTATS_FETCH_TIMEOUT_SECS`: Per-request timeout (default: 10)
// - `ROUTERSTATS_ONESHOT`: Run a single cycle and exit (for cron/systemd timers)
// - `ROUTERSTATS_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export ROUTERSTATS_DEVICES_FILE=/etc/routerstats/devices.json
// export ROUTERSTATS_TRAFFIC_STORE_PATH=/var/lib/routerstats/network_stats.json
// export ROUTERSTATS_LEASE_STORE_PATH=/var/lib/routerstats/dhcp_leases.json
// export ROUTERSTATS_ONESHOT=true
//
// routerstatsd
// ```

use anyhow::{Context, Result};
use routerstats_core::config::{DeviceEndpoints, EngineConfig, StateStoreConfig, StatsConfig};
use routerstats_core::{EngineEvent, PollEngine};
use routerstats_http::HttpReportFetcher;
use std::collections::BTreeMap;
use std::env;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum StatsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<StatsExitCode> for ExitCode {
    fn from(code: StatsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    devices_file: String,
    store_type: String,
    traffic_store_path: String,
    lease_store_path: String,
    poll_interval_secs: u64,
    fetch_timeout_secs: u64,
    oneshot: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            devices_file: env::var("ROUTERSTATS_DEVICES_FILE")
                .context("ROUTERSTATS_DEVICES_FILE is required")?,
            store_type: env::var("ROUTERSTATS_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            traffic_store_path: env::var("ROUTERSTATS_TRAFFIC_STORE_PATH")
                .unwrap_or_else(|_| "network_stats.json".to_string()),
            lease_store_path: env::var("ROUTERSTATS_LEASE_STORE_PATH")
                .unwrap_or_else(|_| "dhcp_leases.json".to_string()),
            poll_interval_secs: parse_env_u64("ROUTERSTATS_POLL_INTERVAL_SECS", 300)?,
            fetch_timeout_secs: parse_env_u64("ROUTERSTATS_FETCH_TIMEOUT_SECS", 10)?,
            oneshot: env::var("ROUTERSTATS_ONESHOT")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            log_level: env::var("ROUTERSTATS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the daemon-level settings
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "ROUTERSTATS_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if self.store_type == "file" && self.traffic_store_path == self.lease_store_path {
            anyhow::bail!(
                "ROUTERSTATS_TRAFFIC_STORE_PATH and ROUTERSTATS_LEASE_STORE_PATH must differ. Got: {}",
                self.traffic_store_path
            );
        }

        if !(10..=86_400).contains(&self.poll_interval_secs) {
            anyhow::bail!(
                "ROUTERSTATS_POLL_INTERVAL_SECS must be between 10 and 86400 seconds. Got: {}",
                self.poll_interval_secs
            );
        }

        if !(1..=300).contains(&self.fetch_timeout_secs) {
            anyhow::bail!(
                "ROUTERSTATS_FETCH_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.fetch_timeout_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ROUTERSTATS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn store_config(&self, path: &str) -> StateStoreConfig {
        match self.store_type.as_str() {
            "memory" => StateStoreConfig::Memory,
            _ => StateStoreConfig::File {
                path: path.to_string(),
            },
        }
    }

    /// Build the core configuration, reading the device table from disk
    fn to_stats_config(&self) -> Result<StatsConfig> {
        let raw = std::fs::read_to_string(&self.devices_file)
            .with_context(|| format!("Failed to read devices file {}", self.devices_file))?;
        let devices: BTreeMap<String, DeviceEndpoints> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid devices file {}", self.devices_file))?;

        let config = StatsConfig {
            devices,
            traffic_store: self.store_config(&self.traffic_store_path),
            lease_store: self.store_config(&self.lease_store_path),
            engine: EngineConfig {
                poll_interval_secs: self.poll_interval_secs,
                fetch_timeout_secs: self.fetch_timeout_secs,
                ..EngineConfig::default()
            },
        };
        config.validate()?;

        Ok(config)
    }
}

fn parse_env_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer. Got: {}", key, value)),
        Err(_) => Ok(default),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return StatsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return StatsExitCode::ConfigError.into();
    }

    let stats_config = match config.to_stats_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return StatsExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return StatsExitCode::ConfigError.into();
    }

    info!("Starting routerstatsd");
    info!(
        "Configuration loaded: {} device(s)",
        stats_config.devices.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return StatsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(stats_config, config.oneshot).await {
            error!("Daemon error: {:#}", e);
            StatsExitCode::RuntimeError
        } else {
            StatsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: StatsConfig, oneshot: bool) -> Result<()> {
    let traffic_store = routerstats_core::state::open_traffic_store(&config.traffic_store)
        .await
        .context("Failed to open traffic store")?;
    let lease_store = routerstats_core::state::open_lease_store(&config.lease_store)
        .await
        .context("Failed to open lease store")?;
    let fetcher =
        HttpReportFetcher::with_timeout(Duration::from_secs(config.engine.fetch_timeout_secs));

    info!("Traffic store: {:?}", config.traffic_store);
    info!("Lease store: {:?}", config.lease_store);

    let (engine, mut events) =
        PollEngine::new(Box::new(fetcher), traffic_store, lease_store, config)?;

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    if oneshot {
        let summary = engine.run_once().await;
        engine.accountant().store().flush().await?;
        engine.lease_store().flush().await?;
        info!(
            "All stats processed and stored ({} failure(s))",
            summary.failures
        );
    } else {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            match wait_for_shutdown().await {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => error!("Signal handler error: {:#}", e),
            }
            let _ = shutdown_tx.send(());
        });

        engine.run_with_shutdown(Some(shutdown_rx)).await?;
    }

    // Dropping the engine closes the event channel
    drop(engine);
    let _ = event_logger.await;

    info!("Shutting down routerstatsd");
    Ok(())
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::MonthRolledOver { at } => info!("Monthly ledger rolled over at {}", at),
        EngineEvent::CounterReset {
            device_id,
            entity_id,
        } => info!("{}: counter reset for {}", device_id, entity_id),
        other => debug!("Engine event: {:?}", other),
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_with(devices_file: String) -> Config {
        Config {
            devices_file,
            store_type: "file".to_string(),
            traffic_store_path: "network_stats.json".to_string(),
            lease_store_path: "dhcp_leases.json".to_string(),
            poll_interval_secs: 300,
            fetch_timeout_secs: 10,
            oneshot: true,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn builds_stats_config_from_devices_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "192.168.1.1": {{
                    "ap_stats": "http://192.168.1.1/cgi-bin/totalwifi.cgi",
                    "wan_stats": "http://192.168.1.1/cgi-bin/wan.cgi",
                    "dhcp_leases": "http://192.168.1.1/cgi-bin/dhcp.cgi"
                }},
                "192.168.1.2": {{ "ap_stats": "http://192.168.1.2/cgi-bin/totalwifi.cgi" }}
            }}"#
        )
        .unwrap();

        let config = config_with(file.path().display().to_string());
        config.validate().unwrap();
        let stats = config.to_stats_config().unwrap();

        assert_eq!(stats.devices.len(), 2);
        assert!(stats.devices["192.168.1.2"].dhcp_leases.is_none());
        assert_eq!(
            stats.lease_store,
            StateStoreConfig::File {
                path: "dhcp_leases.json".to_string()
            }
        );
    }

    #[test]
    fn rejects_shared_store_path() {
        let mut config = config_with("devices.json".to_string());
        config.lease_store_path = config.traffic_store_path.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_store_type() {
        let mut config = config_with("devices.json".to_string());
        config.store_type = "sqlite".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn memory_store_type_ignores_paths() {
        let mut config = config_with("devices.json".to_string());
        config.store_type = "memory".to_string();
        assert_eq!(config.store_config("x.json"), StateStoreConfig::Memory);
    }
}
