// # HTTP Report Fetcher
//
// This crate provides the HTTP-based ReportFetcher for the collector.
//
// ## Purpose
//
// Routers and access points expose their status reports as plain-text CGI
// endpoints (e.g. `http://192.168.1.1/cgi-bin/wan.cgi`). This fetcher issues
// a GET per report with a bounded timeout.
//
// ## Failure Classification
//
// Every failure yields `None`; the reason is logged:
// - request could not be sent (DNS, connection refused, TLS)
// - request timed out
// - non-2xx status
// - body could not be read

use std::fmt;
use std::time::Duration;

use routerstats_core::traits::ReportFetcher;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Why a report could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Request could not be sent or the connection failed
    Request(String),
    /// Request exceeded the timeout
    Timeout,
    /// Server answered with a non-success status
    Status(u16),
    /// Response body could not be read
    Body(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Request(e) => write!(f, "request failed: {}", e),
            FetchFailure::Timeout => f.write_str("request timed out"),
            FetchFailure::Status(code) => write!(f, "HTTP error: {}", code),
            FetchFailure::Body(e) => write!(f, "failed to read response: {}", e),
        }
    }
}

/// HTTP-based report fetcher
pub struct HttpReportFetcher {
    /// HTTP client with the per-request timeout applied
    client: reqwest::Client,
}

impl HttpReportFetcher {
    /// Create a fetcher with the default 10 second timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Fetch a report, classifying any failure
    pub async fn try_fetch(&self, url: &str) -> Result<String, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Body(e.to_string())
            }
        })
    }
}

impl Default for HttpReportFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReportFetcher for HttpReportFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        if url.is_empty() {
            return None;
        }

        match self.try_fetch(url).await {
            Ok(body) => {
                tracing::debug!("Fetched {} bytes from {}", body.len(), url);
                Some(body)
            }
            Err(failure) => {
                tracing::warn!("Error fetching data from {}: {}", url, failure);
                None
            }
        }
    }

    fn fetcher_name(&self) -> &'static str {
        "http"
    }
}
