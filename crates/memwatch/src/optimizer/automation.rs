//! Risk-gated automatic remediation

use super::analysis::Criticality;
use super::types::{ActionType, Aggressiveness, ImplementationResult, Recommendation, RiskLevel};
use crate::alerts::write_leak_report;
use crate::anomaly::LeakSignal;
use crate::error::Result;
use crate::journal::{Journal, LogKind};
use crate::models::MetricSample;
use crate::runtime::{capture_snapshot, RuntimeControl};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Hourly cap on automation attempts
#[derive(Debug, Clone)]
pub struct AutomationBudget {
    cap: u32,
    used: u32,
    window_start: DateTime<Utc>,
}

impl AutomationBudget {
    pub fn new(cap: u32, now: DateTime<Utc>) -> Self {
        Self {
            cap,
            used: 0,
            window_start: now,
        }
    }

    /// Take one slot; false once the cap is reached for the current hour
    pub fn try_consume(&mut self, now: DateTime<Utc>) -> bool {
        if now - self.window_start >= Duration::hours(1) {
            self.reset(now);
        }
        if self.used >= self.cap {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.used = 0;
        self.window_start = now;
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn remaining(&self) -> u32 {
        self.cap.saturating_sub(self.used)
    }
}

/// Whether a recommendation may be applied without an operator
pub fn is_eligible(
    rec: &Recommendation,
    aggressiveness: Aggressiveness,
    criticality: Criticality,
) -> bool {
    if !aggressiveness.allows(rec.risk_level) || !rec.has_automated_actions() {
        return false;
    }
    criticality != Criticality::Critical || rec.risk_level == RiskLevel::VeryLow
}

/// Runs the automated actions of one recommendation
pub struct Executor<'a> {
    pub runtime: &'a dyn RuntimeControl,
    pub journal: &'a Journal,
}

impl Executor<'_> {
    /// Every automated action is attempted; a failure does not stop the rest
    pub fn execute(
        &self,
        rec: &Recommendation,
        sample: &MetricSample,
        leak: Option<&LeakSignal>,
        now: DateTime<Utc>,
    ) -> ImplementationResult {
        let mut executed = Vec::new();
        let mut errors = Vec::new();

        for action in rec.actions.iter().filter(|a| a.automated) {
            match self.run(action.action_type, rec, sample, leak, now) {
                Ok(()) => executed.push(action.action_type),
                Err(e) => {
                    debug!(action = action.action_type.as_str(), error = %e, "Automated action failed");
                    errors.push(format!("{}: {}", action.action_type.as_str(), e));
                }
            }
        }

        ImplementationResult {
            recommendation_id: rec.id.clone(),
            key: rec.key(),
            success: !executed.is_empty() && errors.is_empty(),
            executed,
            errors,
            timestamp: now,
        }
    }

    fn run(
        &self,
        action: ActionType,
        rec: &Recommendation,
        sample: &MetricSample,
        leak: Option<&LeakSignal>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match action {
            ActionType::ForceGc => {
                let outcome = self.runtime.force_collect()?;
                debug!(
                    bytes_reclaimed = outcome.bytes_reclaimed,
                    duration_ms = outcome.duration_ms,
                    "Forced collection for recommendation"
                );
            }
            ActionType::CaptureSnapshot => {
                capture_snapshot(self.runtime, self.journal, now)?;
            }
            ActionType::WriteLeakReport => {
                write_leak_report(self.journal, None, Some(sample), leak, now)?;
            }
            ActionType::OptimizeCheckpoints => {
                self.journal.append(
                    LogKind::Implementations,
                    "checkpoints_optimized",
                    now,
                    &serde_json::json!({
                        "recommendationId": rec.id,
                        "residentSetSize": sample.process.resident_set_size,
                    }),
                )?;
            }
            ActionType::IncreaseMemoryLimit
            | ActionType::ReviewAllocations
            | ActionType::InvestigateLeak
            | ActionType::ScheduleRestart
            | ActionType::ReviewSessionLifecycle => {}
        }
        Ok(())
    }
}
