//! Per-session memory accounting

use crate::models::SessionRecord;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<String, SessionRecord>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample for a session, creating the record on first sight
    pub fn observe(&mut self, session_id: &str, resident: u64, now: DateTime<Utc>) -> &SessionRecord {
        let record = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionRecord {
                session_id: session_id.to_string(),
                start_time: now,
                last_seen: now,
                initial_memory: resident,
                current_memory: resident,
                peak_memory: resident,
                sample_count: 0,
                total_growth_ratio: 0.0,
            });

        record.last_seen = now;
        record.current_memory = resident;
        record.peak_memory = record.peak_memory.max(resident);
        record.sample_count += 1;
        record.total_growth_ratio = if record.initial_memory == 0 {
            0.0
        } else {
            (resident as f64 - record.initial_memory as f64) / record.initial_memory as f64
        };

        record
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionRecord> {
        self.sessions.get(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions seen within `window` of `now`
    pub fn active_count(&self, now: DateTime<Utc>, window: Duration) -> usize {
        self.sessions
            .values()
            .filter(|s| now - s.last_seen <= window)
            .count()
    }

    /// All records, oldest session first
    pub fn records(&self) -> Vec<&SessionRecord> {
        let mut records: Vec<_> = self.sessions.values().collect();
        records.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        records
    }
}
