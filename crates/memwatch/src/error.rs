//! Error taxonomy for the memory health engine
//!
//! Every kind except the deliberate emergency shutdown is recovered locally:
//! collection failures skip a tick, persistence and notification failures are
//! logged, and action failures are recorded on the owning alert or
//! recommendation.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by engine components
#[derive(Debug, Error)]
pub enum EngineError {
    /// Runtime counters could not be read for this tick
    #[error("memory counters unavailable: {0}")]
    CountersUnavailable(String),

    /// A journal line, snapshot or report could not be persisted
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// An automated remediation action failed
    #[error("action failed: {0}")]
    Action(String),

    /// A notification channel failed to deliver
    #[error("notification channel {channel} failed: {message}")]
    Notification { channel: String, message: String },

    /// The runtime does not support the requested capability
    #[error("operation not supported by runtime: {0}")]
    Unsupported(&'static str),

    /// The metrics source did not become available within the readiness bound
    #[error("metrics source not ready after {0:?}")]
    NotReady(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid webhook url: {0}")]
    WebhookUrl(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
