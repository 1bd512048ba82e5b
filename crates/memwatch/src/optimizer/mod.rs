//! Recommendation engine
//!
//! This module provides:
//! - Six-dimension analysis of each sample
//! - Rule-based recommendations with stable priority ordering
//! - Risk-gated automatic remediation under an hourly cap
//! - A learned-pattern feedback loop keyed by (type, priority)

mod analysis;
mod automation;
mod learning;
mod prioritize;
mod rules;
mod types;

pub use analysis::{
    Analysis, AnalysisContext, Criticality, FragmentationUrgency, LeakSeverity, Performance,
    PressureLevel, SessionGrowth,
};
pub use automation::{is_eligible, AutomationBudget};
pub use learning::PatternStore;
pub use prioritize::prioritize;
pub use types::{
    Action, ActionType, Aggressiveness, Impact, ImplementationResult, LearnedPattern, PatternKey,
    Priority, Recommendation, RecommendationType, RiskLevel, Urgency,
};

use crate::anomaly::LeakSignal;
use crate::config::{EngineConfig, FragmentationBands, OptimizationConfig, ThresholdTiers};
use crate::events::EventBus;
use crate::journal::{Journal, LogKind};
use crate::models::{MetricSample, SessionRecord};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::runtime::RuntimeControl;
use analysis::Analyzer;
use automation::Executor;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Smoothing factor of the rolling efficiency baseline
const BASELINE_ALPHA: f64 = 0.1;

pub struct OptimizationEngine {
    config: OptimizationConfig,
    system_tiers: ThresholdTiers,
    fragmentation_bands: FragmentationBands,
    max_recommendations: usize,
    criticality: Criticality,
    external_baseline: Option<f64>,
    rolling_baseline: Option<f64>,
    history: VecDeque<Recommendation>,
    latest: Vec<Recommendation>,
    last_analysis: Option<Analysis>,
    patterns: PatternStore,
    budget: AutomationBudget,
    auto_implemented: u64,
    next_id: u64,
    runtime: Arc<dyn RuntimeControl>,
    journal: Journal,
    events: EventBus,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl OptimizationEngine {
    pub fn new(
        config: &EngineConfig,
        runtime: Arc<dyn RuntimeControl>,
        journal: Journal,
        events: EventBus,
        logger: StructuredLogger,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            config: config.optimization.clone(),
            system_tiers: config.thresholds.system_memory,
            fragmentation_bands: config.thresholds.fragmentation,
            max_recommendations: config.retention.max_recommendations,
            criticality: Criticality::Normal,
            external_baseline: None,
            rolling_baseline: None,
            history: VecDeque::new(),
            latest: Vec::new(),
            last_analysis: None,
            patterns: PatternStore::new(),
            budget: AutomationBudget::new(config.optimization.max_automations_per_hour, now),
            auto_implemented: 0,
            next_id: 0,
            runtime,
            journal,
            events,
            metrics: EngineMetrics::new(),
            logger,
        }
    }

    pub fn set_criticality(&mut self, criticality: Criticality) {
        self.criticality = criticality;
    }

    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    /// Compare efficiency against a host-supplied baseline instead of the
    /// rolling one; `None` reverts to the rolling baseline
    pub fn set_external_baseline(&mut self, baseline: Option<f64>) {
        self.external_baseline = baseline;
    }

    pub fn baseline(&self) -> Option<f64> {
        self.external_baseline.or(self.rolling_baseline)
    }

    /// Analyze one sample and return its prioritized recommendations
    pub fn generate(
        &mut self,
        sample: &MetricSample,
        session: Option<&SessionRecord>,
        leak: Option<&LeakSignal>,
        now: DateTime<Utc>,
    ) -> Vec<Recommendation> {
        let analysis = Analyzer {
            tiers: &self.system_tiers,
            bands: &self.fragmentation_bands,
            config: &self.config,
        }
        .analyze(sample, session, leak, self.baseline(), self.criticality, now);

        let mut recs = rules::build(&analysis, now);
        if self.config.learning_mode {
            rules::append_learned(&mut recs, &self.patterns, now);
        }
        prioritize(&mut recs, &analysis.context);

        for rec in recs.iter_mut() {
            self.next_id += 1;
            rec.id = format!("rec-{}", self.next_id);
        }

        let efficiency = analysis.performance.efficiency;
        self.rolling_baseline = Some(match self.rolling_baseline {
            Some(b) => b + BASELINE_ALPHA * (efficiency - b),
            None => efficiency,
        });

        self.history.extend(recs.iter().cloned());
        self.cap_history();
        self.metrics.add_recommendations(recs.len());
        for rec in &recs {
            self.events.publish_recommendation(rec.clone());
        }
        debug!(
            count = recs.len(),
            pressure = ?analysis.pressure,
            leak = ?analysis.leak,
            "Recommendations generated"
        );

        self.latest = recs.clone();
        self.last_analysis = Some(analysis);
        recs
    }

    /// Apply eligible recommendations in priority order until the hourly cap
    /// is reached
    pub fn auto_implement(
        &mut self,
        recs: &[Recommendation],
        sample: &MetricSample,
        leak: Option<&LeakSignal>,
        now: DateTime<Utc>,
    ) -> Vec<ImplementationResult> {
        if !self.config.auto_optimize {
            return Vec::new();
        }

        let mut results = Vec::new();
        for rec in recs {
            if !is_eligible(rec, self.config.aggressiveness, self.criticality) {
                continue;
            }
            if !self.budget.try_consume(now) {
                debug!(
                    cap = self.config.max_automations_per_hour,
                    "Automation cap reached for this hour"
                );
                break;
            }

            let result = Executor {
                runtime: self.runtime.as_ref(),
                journal: &self.journal,
            }
            .execute(rec, sample, leak, now);

            if result.success {
                self.auto_implemented += 1;
            }
            self.metrics.inc_automations(result.success);
            self.logger
                .log_automation(&rec.id, rec.rec_type.as_str(), result.success, &result.errors);
            if let Err(e) = self.journal.append(
                LogKind::Implementations,
                "recommendation_implemented",
                now,
                &result,
            ) {
                warn!(recommendation_id = %rec.id, error = %e, "Failed to journal implementation");
            }

            if self.config.learning_mode {
                let actions = rec.actions.iter().map(|a| a.action_type).collect();
                self.patterns.record(&result, actions);
            }
            results.push(result);
        }
        results
    }

    /// Start a fresh automation hour
    pub fn reset_automation_budget(&mut self, now: DateTime<Utc>) {
        self.budget.reset(now);
    }

    pub fn automation_budget(&self) -> &AutomationBudget {
        &self.budget
    }

    /// Prune learned patterns; returns the number removed
    pub fn prune_patterns(&mut self, now: DateTime<Utc>) -> usize {
        let removed = self.patterns.prune(
            self.config.max_learned_patterns,
            Duration::days(self.config.pattern_stale_days),
            self.config.min_pattern_success_rate,
            now,
        );
        if removed > 0 {
            debug!(removed, remaining = self.patterns.len(), "Pruned learned patterns");
        }
        removed
    }

    /// Keep only the most recent recommendations
    pub fn cap_history(&mut self) -> usize {
        let excess = self.history.len().saturating_sub(self.max_recommendations);
        self.history.drain(..excess);
        excess
    }

    /// Stored recommendations, newest first
    pub fn recommendations(&self) -> impl Iterator<Item = &Recommendation> {
        self.history.iter().rev()
    }

    pub fn recommendation_count(&self) -> usize {
        self.history.len()
    }

    pub fn high_priority_count(&self) -> usize {
        self.history
            .iter()
            .filter(|r| r.priority >= Priority::High)
            .count()
    }

    /// Prioritized output of the last cycle
    pub fn latest(&self) -> &[Recommendation] {
        &self.latest
    }

    pub fn last_analysis(&self) -> Option<&Analysis> {
        self.last_analysis.as_ref()
    }

    pub fn patterns(&self) -> &PatternStore {
        &self.patterns
    }

    pub fn auto_implemented_count(&self) -> u64 {
        self.auto_implemented
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_with, t0, FakeRuntime};

    fn engine_with(config: EngineConfig, runtime: Arc<FakeRuntime>) -> OptimizationEngine {
        OptimizationEngine::new(
            &config,
            runtime,
            Journal::disabled(),
            EventBus::new(),
            StructuredLogger::new("test"),
            t0(),
        )
    }

    #[test]
    fn test_generate_assigns_ids_and_orders() {
        let mut engine = engine_with(EngineConfig::default(), Arc::new(FakeRuntime::new()));
        let sample = sample_with(0, 1000, 500, 1000, 0.97);

        let recs = engine.generate(&sample, None, None, t0());
        assert_eq!(recs[0].rec_type, RecommendationType::MemoryPressure);
        assert_eq!(recs[0].priority, Priority::Critical);
        assert_eq!(recs[0].id, "rec-1");
        assert!(recs
            .windows(2)
            .all(|w| w[0].priority_score >= w[1].priority_score));
        assert_eq!(engine.latest().len(), recs.len());
        assert!(engine.high_priority_count() >= 1);
    }

    #[test]
    fn test_history_capped() {
        let mut config = EngineConfig::default();
        config.retention.max_recommendations = 5;
        let mut engine = engine_with(config, Arc::new(FakeRuntime::new()));
        let sample = sample_with(0, 1000, 500, 1000, 0.97);

        for i in 0..4 {
            engine.generate(&sample, None, None, t0() + Duration::seconds(i));
        }
        assert_eq!(engine.recommendation_count(), 5);
        // newest first
        let first = engine.recommendations().next().unwrap();
        assert_eq!(first.created_at, t0() + Duration::seconds(3));
    }

    #[test]
    fn test_rolling_baseline_detects_degradation() {
        let mut engine = engine_with(EngineConfig::default(), Arc::new(FakeRuntime::new()));
        // heap utilization 0.4 is the largest load -> efficiency 0.6
        let healthy = sample_with(0, 1000, 400, 1000, 0.2);
        engine.generate(&healthy, None, None, t0());
        assert!((engine.baseline().unwrap() - 0.6).abs() < 1e-9);

        // load 0.7 -> efficiency 0.3, half the baseline
        let loaded = sample_with(5, 1000, 700, 1000, 0.7);
        let recs = engine.generate(&loaded, None, None, t0());
        assert!(recs
            .iter()
            .any(|r| r.rec_type == RecommendationType::Performance));
        assert!((engine.baseline().unwrap() - 0.57).abs() < 1e-6);
    }

    #[test]
    fn test_external_baseline_overrides_rolling() {
        let mut engine = engine_with(EngineConfig::default(), Arc::new(FakeRuntime::new()));
        engine.set_external_baseline(Some(0.95));
        let sample = sample_with(0, 1000, 400, 1000, 0.4);
        let recs = engine.generate(&sample, None, None, t0());
        assert!(recs
            .iter()
            .any(|r| r.rec_type == RecommendationType::Performance));
    }

    #[test]
    fn test_auto_implement_can_be_disabled() {
        let runtime = Arc::new(FakeRuntime::new());
        let mut config = EngineConfig::default();
        config.optimization.auto_optimize = false;
        let mut engine = engine_with(config, runtime.clone());
        let sample = sample_with(0, 1000, 500, 1000, 0.97);
        let recs = engine.generate(&sample, None, None, t0());

        assert!(engine.auto_implement(&recs, &sample, None, t0()).is_empty());
        assert_eq!(runtime.collect_calls(), 0);
    }

    #[test]
    fn test_auto_implement_respects_cap_and_learns() {
        let runtime = Arc::new(FakeRuntime::new());
        let mut config = EngineConfig::default();
        config.optimization.max_automations_per_hour = 2;
        let mut engine = engine_with(config, runtime.clone());
        let sample = sample_with(0, 1000, 500, 1000, 0.97);

        let recs = engine.generate(&sample, None, None, t0());
        let results = engine.auto_implement(&recs, &sample, None, t0());
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(engine.auto_implemented_count(), 2);
        assert_eq!(engine.patterns().len(), 2);

        assert!(engine.auto_implement(&recs, &sample, None, t0()).is_empty());
        assert_eq!(engine.automation_budget().remaining(), 0);
        engine.reset_automation_budget(t0());
        assert_eq!(engine.auto_implement(&recs, &sample, None, t0()).len(), 2);
    }

    #[test]
    fn test_critical_context_limits_to_very_low_risk() {
        let runtime = Arc::new(FakeRuntime::new());
        let mut engine = engine_with(EngineConfig::default(), runtime.clone());
        engine.set_criticality(Criticality::Critical);
        let sample = sample_with(0, 1000, 500, 1000, 0.97);

        let recs = engine.generate(&sample, None, None, t0());
        let results = engine.auto_implement(&recs, &sample, None, t0());
        for result in &results {
            let rec = recs
                .iter()
                .find(|r| r.id == result.recommendation_id)
                .unwrap();
            assert_eq!(rec.risk_level, RiskLevel::VeryLow);
        }
        // pressure relief is low risk, so no forced collection
        assert_eq!(runtime.collect_calls(), 0);
    }

    #[test]
    fn test_learned_recommendations_surface() {
        let runtime = Arc::new(FakeRuntime::new());
        let mut engine = engine_with(EngineConfig::default(), runtime);
        let calm = sample_with(0, 1000, 500, 1000, 0.3);
        let checkpoint = |engine: &mut OptimizationEngine| {
            let recs = engine.generate(&calm, None, None, t0());
            engine.reset_automation_budget(t0());
            engine.auto_implement(&recs, &calm, None, t0());
        };
        for _ in 0..9 {
            checkpoint(&mut engine);
        }

        let key = PatternKey {
            rec_type: RecommendationType::CheckpointOptimization,
            priority: Priority::Low,
        };
        assert_eq!(engine.patterns().get(&key).unwrap().attempts, 9);
        assert_eq!(engine.patterns().qualifying().count(), 1);
    }
}
