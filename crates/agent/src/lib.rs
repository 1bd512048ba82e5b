//! Standalone host for the memory health engine
//!
//! Serves health probes, Prometheus metrics and the engine's status, alert,
//! recommendation and pattern surfaces over HTTP.

pub mod api;
pub mod config;
pub mod shutdown;
pub mod webhook;
