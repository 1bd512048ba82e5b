//! Periodic task scheduling
//!
//! The scheduler only tracks deadlines; it never sleeps. The runner asks for
//! the next deadline, waits on the tokio timer, then drains due tasks. Tests
//! drive the same structure by passing virtual instants.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Work the engine performs on a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Sample,
    StatusUpdate,
    Sync,
    AutomationReset,
    PatternPrune,
    RetentionSweep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

#[derive(Debug, Clone)]
struct PeriodicTask {
    kind: TaskKind,
    period: ChronoDuration,
    next_due: DateTime<Utc>,
}

/// Registry of periodic tasks keyed by id
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: BTreeMap<TaskId, PeriodicTask>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task whose first run is one period after `now`
    pub fn register(&mut self, kind: TaskKind, period: Duration, now: DateTime<Utc>) -> TaskId {
        let period = to_chrono(period);
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.insert(
            id,
            PeriodicTask {
                kind,
                period,
                next_due: now + period,
            },
        );
        id
    }

    /// Returns false if the task was not registered
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.tasks.remove(&id).is_some()
    }

    pub fn is_registered(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.tasks.values().map(|t| t.next_due).min()
    }

    /// Drain tasks due at `now`, ordered by deadline then registration.
    ///
    /// A task that fell several periods behind runs once and is rescheduled
    /// relative to `now`.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<(TaskId, TaskKind)> {
        let mut due: Vec<(DateTime<Utc>, TaskId, TaskKind)> = Vec::new();

        for (id, task) in self.tasks.iter_mut() {
            if task.next_due <= now {
                due.push((task.next_due, *id, task.kind));
                let next = task.next_due + task.period;
                task.next_due = if next <= now { now + task.period } else { next };
            }
        }

        due.sort_by_key(|(deadline, id, _)| (*deadline, *id));
        due.into_iter().map(|(_, id, kind)| (id, kind)).collect()
    }
}

fn to_chrono(period: Duration) -> ChronoDuration {
    let millis = i64::try_from(period.as_millis()).unwrap_or(i64::MAX / 2);
    ChronoDuration::milliseconds(millis.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_task_not_due_before_period() {
        let mut scheduler = Scheduler::new();
        scheduler.register(TaskKind::Sample, Duration::from_secs(5), t0());

        assert!(scheduler.take_due(t0() + ChronoDuration::seconds(4)).is_empty());
        let due = scheduler.take_due(t0() + ChronoDuration::seconds(5));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1, TaskKind::Sample);
    }

    #[test]
    fn test_due_order_by_deadline() {
        let mut scheduler = Scheduler::new();
        scheduler.register(TaskKind::Sync, Duration::from_secs(30), t0());
        scheduler.register(TaskKind::Sample, Duration::from_secs(5), t0());

        let due = scheduler.take_due(t0() + ChronoDuration::seconds(30));
        let kinds: Vec<_> = due.iter().map(|(_, k)| *k).collect();
        assert_eq!(kinds, vec![TaskKind::Sample, TaskKind::Sync]);
    }

    #[test]
    fn test_late_task_runs_once() {
        let mut scheduler = Scheduler::new();
        scheduler.register(TaskKind::Sample, Duration::from_secs(5), t0());

        let due = scheduler.take_due(t0() + ChronoDuration::seconds(60));
        assert_eq!(due.len(), 1);
        assert_eq!(
            scheduler.next_deadline(),
            Some(t0() + ChronoDuration::seconds(65))
        );
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.register(TaskKind::Sample, Duration::from_secs(5), t0());

        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(scheduler.is_empty());
        assert!(scheduler.next_deadline().is_none());
    }
}
