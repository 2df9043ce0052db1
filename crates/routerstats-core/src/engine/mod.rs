//! Poll engine
//!
//! The PollEngine is responsible for:
//! - Detecting month rollover before any sample is recorded
//! - Fetching each configured report of each device
//! - Feeding parsed counters to the `TrafficAccountant`
//! - Upserting parsed leases into the `LeaseStore`
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ ReportFetcher │─── raw text ───┐
//! └───────────────┘                │
//!                                  ▼
//!                           ┌─────────────┐
//!                           │ parse::*    │
//!                           └─────────────┘
//!                                  │
//!                                  ▼
//!                           ┌─────────────┐
//!                           │ PollEngine  │
//!                           └─────────────┘
//!                                  │
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//! ┌───────────────────┐    ┌──────────────┐         ┌─────────────┐
//! │ TrafficAccountant │    │  LeaseStore  │         │   Events    │
//! │  (TrafficStore)   │    │  (upsert)    │         │  (notify)   │
//! └───────────────────┘    └──────────────┘         └─────────────┘
//! ```
//!
//! ## Failure Isolation
//!
//! - An unavailable report skips that report for that device this cycle
//! - A report with no clients or leases is normal and only logged at debug
//! - A store failure abandons only the affected entity (or lease batch)
//! - The traffic and lease stores never block each other
//! - A failed month-rollover check skips traffic accounting for the cycle,
//!   so no delta lands in the wrong month; counters stay at their previous
//!   baseline and the next cycle picks the traffic up

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::accountant::{TrafficAccountant, WAN_ENTITY_ID};
use crate::config::{DeviceEndpoints, StatsConfig};
use crate::error::Result;
use crate::parse;
use crate::timestamp;
use crate::traits::{LeaseStore, ReportFetcher, TrafficStore};

/// The report types a device can expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Wireless client counters
    ApStats,
    /// WAN counters
    WanStats,
    /// DHCP lease table
    DhcpLeases,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::ApStats => f.write_str("ap_stats"),
            ReportKind::WanStats => f.write_str("wan_stats"),
            ReportKind::DhcpLeases => f.write_str("dhcp_leases"),
        }
    }
}

/// Counts gathered over one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Devices visited
    pub devices_polled: usize,
    /// Samples applied to the ledger
    pub samples_recorded: usize,
    /// Samples where a counter went backwards
    pub counter_resets: usize,
    /// Leases written to the snapshot
    pub leases_upserted: usize,
    /// Configured reports that could not be fetched, or a WAN report
    /// without counters
    pub reports_unavailable: usize,
    /// Store operations that failed
    pub failures: usize,
    /// Whether the monthly ledger was zeroed this cycle
    pub month_rolled_over: bool,
}

/// Events emitted by the PollEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started { devices_count: usize },

    /// Poll cycle started
    CycleStarted { at: NaiveDateTime },

    /// Monthly ledger zeroed
    MonthRolledOver { at: NaiveDateTime },

    /// Sample applied to the ledger
    SampleRecorded {
        device_id: String,
        entity_id: String,
        delta_rx: u64,
        delta_tx: u64,
    },

    /// Counter went backwards and the full reading was counted
    CounterReset {
        device_id: String,
        entity_id: String,
    },

    /// Lease snapshot updated
    LeasesUpdated { device_id: String, count: usize },

    /// A configured report could not be fetched or lacked WAN counters
    ReportUnavailable {
        device_id: String,
        report: ReportKind,
    },

    /// A store update failed and was abandoned for this cycle
    UpdateFailed {
        device_id: String,
        target: String,
        error: String,
    },

    /// Poll cycle finished
    CycleCompleted { summary: CycleSummary },

    /// Engine stopped
    Stopped { reason: String },
}

/// Core poll engine
///
/// ## Lifecycle
///
/// 1. Create with [`PollEngine::new()`]
/// 2. Either call [`PollEngine::run_once()`] (cron-style) or
///    [`PollEngine::run()`] (periodic until shutdown)
/// 3. Both stores are flushed when `run()` returns
///
/// ## Threading
///
/// A cycle processes devices and entities strictly in order.
pub struct PollEngine {
    /// Fetcher for device reports
    fetcher: Box<dyn ReportFetcher>,

    /// Counter/ledger state machine
    accountant: TrafficAccountant,

    /// DHCP lease snapshot
    lease_store: Box<dyn LeaseStore>,

    /// Devices to poll
    devices: BTreeMap<String, DeviceEndpoints>,

    /// Interval between cycles
    poll_interval: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl PollEngine {
    /// Create a new poll engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        fetcher: Box<dyn ReportFetcher>,
        traffic_store: Box<dyn TrafficStore>,
        lease_store: Box<dyn LeaseStore>,
        config: StatsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            fetcher,
            accountant: TrafficAccountant::new(traffic_store),
            lease_store,
            devices: config.devices,
            poll_interval: Duration::from_secs(config.engine.poll_interval_secs),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The traffic accountant driving the ledger
    pub fn accountant(&self) -> &TrafficAccountant {
        &self.accountant
    }

    /// The lease snapshot store
    pub fn lease_store(&self) -> &dyn LeaseStore {
        self.lease_store.as_ref()
    }

    /// Run one cycle stamped with the current local time
    pub async fn run_once(&self) -> CycleSummary {
        self.run_cycle(timestamp::now()).await
    }

    /// Run one poll cycle as of `now`
    ///
    /// Never fails: every error is logged, counted in the summary and
    /// reported as an event.
    pub async fn run_cycle(&self, now: NaiveDateTime) -> CycleSummary {
        let mut summary = CycleSummary::default();
        self.emit_event(EngineEvent::CycleStarted { at: now });

        let traffic_ready = match self.accountant.reset_all_if_new_month(now).await {
            Ok(rolled) => {
                if rolled {
                    summary.month_rolled_over = true;
                    self.emit_event(EngineEvent::MonthRolledOver { at: now });
                }
                true
            }
            Err(e) => {
                error!(
                    "Month rollover check failed, skipping traffic accounting this cycle: {}",
                    e
                );
                summary.failures += 1;
                self.emit_event(EngineEvent::UpdateFailed {
                    device_id: String::new(),
                    target: "monthly_stats".to_string(),
                    error: e.to_string(),
                });
                false
            }
        };

        for (device_id, endpoints) in &self.devices {
            info!("Processing device: {}", device_id);
            summary.devices_polled += 1;

            if traffic_ready {
                if let Some(url) = &endpoints.ap_stats {
                    self.process_ap_stats(device_id, url, now, &mut summary)
                        .await;
                }
                if let Some(url) = &endpoints.wan_stats {
                    self.process_wan_stats(device_id, url, now, &mut summary)
                        .await;
                }
            }

            if let Some(url) = &endpoints.dhcp_leases {
                self.process_dhcp_leases(device_id, url, now, &mut summary)
                    .await;
            }
        }

        info!(
            "Cycle complete: {} devices, {} samples ({} resets), {} leases, {} unavailable, {} failures",
            summary.devices_polled,
            summary.samples_recorded,
            summary.counter_resets,
            summary.leases_upserted,
            summary.reports_unavailable,
            summary.failures
        );
        self.emit_event(EngineEvent::CycleCompleted {
            summary: summary.clone(),
        });

        summary
    }

    async fn process_ap_stats(
        &self,
        device_id: &str,
        url: &str,
        now: NaiveDateTime,
        summary: &mut CycleSummary,
    ) {
        let Some(text) = self.fetcher.fetch(url).await else {
            self.report_unavailable(device_id, ReportKind::ApStats, summary);
            return;
        };
        let clients = parse::parse_wifi_stats(&text);
        if clients.is_empty() {
            debug!("{}: no wireless clients reported", device_id);
            return;
        }

        debug!("{}: {} wireless clients", device_id, clients.len());
        for client in clients {
            self.record(
                device_id,
                &client.mac_address,
                client.rx_bytes,
                client.tx_bytes,
                now,
                summary,
            )
            .await;
        }
    }

    async fn process_wan_stats(
        &self,
        device_id: &str,
        url: &str,
        now: NaiveDateTime,
        summary: &mut CycleSummary,
    ) {
        let wan = match self.fetcher.fetch(url).await {
            Some(text) => parse::parse_wan_stats(&text),
            None => None,
        };
        let Some(wan) = wan else {
            self.report_unavailable(device_id, ReportKind::WanStats, summary);
            return;
        };

        self.record(
            device_id,
            WAN_ENTITY_ID,
            wan.rx_bytes,
            wan.tx_bytes,
            now,
            summary,
        )
        .await;
    }

    async fn process_dhcp_leases(
        &self,
        device_id: &str,
        url: &str,
        now: NaiveDateTime,
        summary: &mut CycleSummary,
    ) {
        let Some(text) = self.fetcher.fetch(url).await else {
            self.report_unavailable(device_id, ReportKind::DhcpLeases, summary);
            return;
        };
        let leases = parse::parse_dhcp_leases(&text);
        if leases.is_empty() {
            debug!("{}: no DHCP leases reported", device_id);
            return;
        }

        match self.lease_store.upsert_many(&leases, now).await {
            Ok(count) => {
                debug!("{}: upserted {} DHCP leases", device_id, count);
                summary.leases_upserted += count;
                self.emit_event(EngineEvent::LeasesUpdated {
                    device_id: device_id.to_string(),
                    count,
                });
            }
            Err(e) => {
                error!("Error updating DHCP leases for {}: {}", device_id, e);
                summary.failures += 1;
                self.emit_event(EngineEvent::UpdateFailed {
                    device_id: device_id.to_string(),
                    target: "dhcp_leases".to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    async fn record(
        &self,
        device_id: &str,
        entity_id: &str,
        rx_bytes: u64,
        tx_bytes: u64,
        now: NaiveDateTime,
        summary: &mut CycleSummary,
    ) {
        match self
            .accountant
            .record_sample(entity_id, rx_bytes, tx_bytes, now)
            .await
        {
            Ok(outcome) => {
                summary.samples_recorded += 1;
                if outcome.counter_reset {
                    summary.counter_resets += 1;
                    self.emit_event(EngineEvent::CounterReset {
                        device_id: device_id.to_string(),
                        entity_id: entity_id.to_string(),
                    });
                }
                self.emit_event(EngineEvent::SampleRecorded {
                    device_id: device_id.to_string(),
                    entity_id: entity_id.to_string(),
                    delta_rx: outcome.delta_rx,
                    delta_tx: outcome.delta_tx,
                });
            }
            Err(e) => {
                // Baseline untouched: the next cycle's delta covers this one
                error!("Error updating traffic stats for {}: {}", entity_id, e);
                summary.failures += 1;
                self.emit_event(EngineEvent::UpdateFailed {
                    device_id: device_id.to_string(),
                    target: entity_id.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn report_unavailable(&self, device_id: &str, report: ReportKind, summary: &mut CycleSummary) {
        warn!("No {} data from {} this cycle", report, device_id);
        summary.reports_unavailable += 1;
        self.emit_event(EngineEvent::ReportUnavailable {
            device_id: device_id.to_string(),
            report,
        });
    }

    /// Run the engine
    ///
    /// Polls every `poll_interval_secs` (the first cycle starts immediately)
    /// until SIGINT / Ctrl-C.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Final flush failed
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// Used by the daemon, which owns signal handling, and by tests.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            devices_count: self.devices.len(),
        });
        info!(
            "Polling {} device(s) every {:?} via {}",
            self.devices.len(),
            self.poll_interval,
            self.fetcher.fetcher_name()
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // A cycle always runs to completion before shutdown is observed
                    self.run_once().await;
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        // Flush both stores before exiting; one failing must not skip the other
        let lease_result = self.lease_store.flush().await;
        if let Err(e) = &lease_result {
            error!("Failed to flush lease store: {}", e);
        }
        self.accountant.store().flush().await?;
        lease_result?;

        info!("State flushed, engine stopped");
        Ok(())
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging warning if channel is full (backpressure)
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
