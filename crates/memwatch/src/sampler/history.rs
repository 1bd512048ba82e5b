//! Bounded sample history

use crate::models::MetricSample;
use std::collections::VecDeque;
use std::sync::Arc;

/// Ring buffer of samples in insertion order; the oldest is dropped on overflow
#[derive(Debug)]
pub struct History {
    samples: VecDeque<Arc<MetricSample>>,
    capacity: usize,
    total_appended: u64,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total_appended: 0,
        }
    }

    pub fn push(&mut self, sample: Arc<MetricSample>) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.total_appended += 1;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples appended over the lifetime of the history, including evicted ones
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    pub fn latest(&self) -> Option<&Arc<MetricSample>> {
        self.samples.back()
    }

    /// The most recent `n` samples, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &MetricSample> + '_ {
        self.samples
            .iter()
            .skip(self.samples.len().saturating_sub(n))
            .map(|s| s.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSample> + '_ {
        self.samples.iter().map(|s| s.as_ref())
    }
}
