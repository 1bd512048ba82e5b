//! Learned-pattern store
//!
//! Every implementation attempt updates the pattern of its
//! `(type, priority)` key. Patterns that prove reliable are surfaced again as
//! learned recommendations.

use super::types::{ActionType, ImplementationResult, LearnedPattern, PatternKey};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Attempts needed for full confidence
const CONFIDENCE_ATTEMPTS: f64 = 10.0;
const QUALIFYING_CONFIDENCE: f64 = 0.8;
const QUALIFYING_SUCCESS_RATE: f64 = 0.7;

#[derive(Debug, Default, Clone)]
pub struct PatternStore {
    patterns: BTreeMap<PatternKey, LearnedPattern>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one attempt into its pattern, creating it on first use
    pub fn record(
        &mut self,
        result: &ImplementationResult,
        actions: Vec<ActionType>,
    ) -> &LearnedPattern {
        let pattern = self
            .patterns
            .entry(result.key)
            .or_insert_with(|| LearnedPattern {
                key: result.key,
                attempts: 0,
                successes: 0,
                success_rate: 0.0,
                confidence: 0.0,
                actions: Vec::new(),
                last_used: result.timestamp,
            });

        pattern.attempts += 1;
        if result.success {
            pattern.successes += 1;
        }
        pattern.success_rate = f64::from(pattern.successes) / f64::from(pattern.attempts);
        pattern.confidence = (f64::from(pattern.attempts) / CONFIDENCE_ATTEMPTS).min(1.0);
        pattern.actions = actions;
        pattern.last_used = result.timestamp;
        pattern
    }

    /// Patterns reliable enough to be recommended again
    pub fn qualifying(&self) -> impl Iterator<Item = &LearnedPattern> {
        self.patterns.values().filter(|p| {
            p.confidence > QUALIFYING_CONFIDENCE && p.success_rate > QUALIFYING_SUCCESS_RATE
        })
    }

    /// Drop stale or unreliable patterns once the table exceeds `cap`.
    /// Returns the number removed.
    pub fn prune(
        &mut self,
        cap: usize,
        stale_after: Duration,
        min_success_rate: f64,
        now: DateTime<Utc>,
    ) -> usize {
        if self.patterns.len() <= cap {
            return 0;
        }
        let before = self.patterns.len();
        self.patterns.retain(|_, p| {
            now - p.last_used <= stale_after && p.success_rate >= min_success_rate
        });
        before - self.patterns.len()
    }

    pub fn get(&self, key: &PatternKey) -> Option<&LearnedPattern> {
        self.patterns.get(key)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &LearnedPattern> {
        self.patterns.values()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Load previously learned patterns, replacing any with the same key
    pub fn restore(&mut self, patterns: impl IntoIterator<Item = LearnedPattern>) {
        for pattern in patterns {
            self.patterns.insert(pattern.key, pattern);
        }
    }
}
