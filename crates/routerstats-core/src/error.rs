//! Error types for the router stats collector
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for collector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the collector
#[derive(Error, Debug)]
pub enum Error {
    /// Persistence-layer errors (traffic or lease store)
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored value could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
