//! Core traits for the collector
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ReportFetcher`]: Retrieve raw device reports
//! - [`TrafficStore`]: Cumulative counters and monthly totals
//! - [`LeaseStore`]: DHCP lease snapshot

pub mod lease_store;
pub mod report_fetcher;
pub mod traffic_store;

pub use lease_store::{LeaseRecord, LeaseStore};
pub use report_fetcher::ReportFetcher;
pub use traffic_store::{CounterRecord, MonthlyRecord, SampleCommit, TrafficStore};
