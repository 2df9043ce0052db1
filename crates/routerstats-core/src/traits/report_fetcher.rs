// # Report Fetcher Trait
//
// Defines the interface for retrieving raw status reports from devices.
//
// ## Implementations
//
// - HTTP-based: `routerstats-http` crate
//
// ## Usage
//
// ```rust,ignore
// use routerstats_core::ReportFetcher;
//
// let fetcher = /* ReportFetcher implementation */;
// if let Some(text) = fetcher.fetch("http://192.168.1.1/cgi-bin/wan.cgi").await {
//     let wan = routerstats_core::parse::parse_wan_stats(&text);
// }
// ```

use async_trait::async_trait;

/// Trait for report fetcher implementations
///
/// Fetchers are observers: they return the report body or nothing, and
/// never touch the stores.
///
/// # Failure Semantics
///
/// Network errors, timeouts, non-2xx responses and unreadable bodies all
/// collapse to `None`. The caller treats every case as "no data this cycle".
/// Implementations are expected to log the classified reason themselves.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    /// Fetch the report at `url`
    ///
    /// # Returns
    ///
    /// - `Some(String)`: The response body
    /// - `None`: The report is unavailable this cycle
    async fn fetch(&self, url: &str) -> Option<String>;

    /// Short name used in logs
    fn fetcher_name(&self) -> &'static str;
}
