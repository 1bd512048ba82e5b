//! Pattern detection over the sample stream
//!
//! This module provides:
//! - Leak heuristics over a sliding window (sustained growth, staircase, GC inefficiency)
//! - Tiered threshold evaluation for system, heap and fragmentation metrics

mod leak_detector;
mod thresholds;

pub use leak_detector::{LeakDetector, LeakSignal, PatternScore};
pub use thresholds::{ThresholdEvaluator, ThresholdEvent, ThresholdMetric};
