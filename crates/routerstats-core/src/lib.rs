// # routerstats-core
//
// Core library for the router traffic and DHCP lease collector.
//
// ## Architecture Overview
//
// - **ReportFetcher**: Trait for retrieving raw device reports
// - **parse**: Pure parsers for the wireless, WAN and DHCP report formats
// - **TrafficStore**: Trait for cumulative counters and monthly totals
// - **LeaseStore**: Trait for the DHCP lease snapshot
// - **TrafficAccountant**: Turns cumulative samples into monthly deltas
// - **PollEngine**: Orchestrates fetch → parse → account / upsert per cycle
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Accounting logic is separate from I/O
// 2. **Library-First**: All core functionality can be used as a library
// 3. **Atomic Samples**: A sample's ledger delta and counter baseline are
//    committed together or not at all
// 4. **Failure Isolation**: Devices, entities and the two stores fail
//    independently; nothing aborts the process

pub mod accountant;
pub mod config;
pub mod engine;
pub mod error;
pub mod parse;
pub mod state;
pub mod timestamp;
pub mod traits;

// Re-export core types for convenience
pub use accountant::{SampleOutcome, TrafficAccountant, WAN_ENTITY_ID};
pub use config::{DeviceEndpoints, EngineConfig, StateStoreConfig, StatsConfig};
pub use engine::{CycleSummary, EngineEvent, PollEngine, ReportKind};
pub use error::{Error, Result};
pub use state::{FileLeaseStore, FileTrafficStore, MemoryLeaseStore, MemoryTrafficStore};
pub use traits::{LeaseStore, ReportFetcher, TrafficStore};
