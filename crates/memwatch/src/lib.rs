//! Runtime memory health engine
//!
//! This crate provides the core functionality for:
//! - Memory sampling with fragmentation, growth and trend tracking
//! - Leak pattern detection and tiered threshold evaluation
//! - Cooldown-gated alerting with automated remediation
//! - Prioritized recommendations with risk-gated auto-implementation and learning
//! - Health scoring, status surfaces and best-effort sync
//! - Health checks and observability

pub mod alerts;
pub mod anomaly;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod health;
pub mod journal;
pub mod models;
pub mod observability;
pub mod optimizer;
pub mod runtime;
pub mod sampler;
pub mod scheduler;
pub mod sync;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use engine::{EngineBuilder, EngineHandle, EngineRunner, MemoryHealthEngine, StatusSummary};
pub use error::{ConfigError, EngineError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
