//! Recommendation rules, one set per analysis dimension

use super::analysis::{
    Analysis, FragmentationUrgency, LeakSeverity, PressureLevel, SessionGrowth,
};
use super::learning::PatternStore;
use super::types::{
    Action, ActionType, Impact, Priority, Recommendation, RecommendationType, RiskLevel, Urgency,
};
use chrono::{DateTime, Utc};

/// Build the unprioritized recommendations for one analysis.
///
/// Ids and scores are filled in later; the standing checkpoint suggestion is
/// always last.
pub fn build(analysis: &Analysis, now: DateTime<Utc>) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    recs.extend(pressure(analysis, now));
    recs.extend(fragmentation(analysis, now));
    recs.extend(leak(analysis, now));
    recs.extend(performance(analysis, now));
    recs.extend(session_growth(analysis, now));
    recs.push(checkpoint(now));
    recs
}

/// Append one recommendation per qualifying learned pattern whose key is not
/// already present
pub fn append_learned(recs: &mut Vec<Recommendation>, patterns: &PatternStore, now: DateTime<Utc>) {
    for pattern in patterns.qualifying() {
        if recs.iter().any(|r| r.key() == pattern.key) {
            continue;
        }
        let actions = pattern
            .actions
            .iter()
            .map(|&action_type| {
                if action_type.is_executable() {
                    Action::automated(action_type, "Repeat the remediation that worked before", Impact::Medium)
                } else {
                    Action::manual(action_type, "Repeat the remediation that worked before", Impact::Medium, "varies")
                }
            })
            .collect();

        recs.push(Recommendation {
            actions,
            learned: true,
            ..draft(
                pattern.key.rec_type,
                pattern.key.priority,
                Urgency::Moderate,
                format!("Apply learned remediation for {}", pattern.key.rec_type),
                format!(
                    "This remediation succeeded in {:.0}% of {} attempts",
                    pattern.success_rate * 100.0,
                    pattern.attempts
                ),
                now,
            )
        });
    }
}

fn draft(
    rec_type: RecommendationType,
    priority: Priority,
    urgency: Urgency,
    title: impl Into<String>,
    description: impl Into<String>,
    now: DateTime<Utc>,
) -> Recommendation {
    Recommendation {
        id: String::new(),
        rec_type,
        priority,
        urgency,
        title: title.into(),
        description: description.into(),
        actions: Vec::new(),
        risk_level: RiskLevel::Low,
        reversible: true,
        learned: false,
        created_at: now,
        priority_score: 0.0,
        impact_score: 0.0,
        risk_score: 0.0,
    }
}

fn pressure(analysis: &Analysis, now: DateTime<Utc>) -> Option<Recommendation> {
    let pct = analysis.utilization * 100.0;
    let rec = match analysis.pressure {
        PressureLevel::Normal => return None,
        PressureLevel::Critical => Recommendation {
            actions: vec![
                Action::automated(ActionType::ForceGc, "Run a collection cycle now", Impact::High),
                Action::automated(
                    ActionType::CaptureSnapshot,
                    "Capture a heap snapshot for later analysis",
                    Impact::None,
                ),
                Action::manual(
                    ActionType::IncreaseMemoryLimit,
                    "Raise the memory limit of the host",
                    Impact::High,
                    "minutes",
                ),
            ],
            ..draft(
                RecommendationType::MemoryPressure,
                Priority::Critical,
                Urgency::Immediate,
                "Relieve critical memory pressure",
                format!("System memory is {:.1}% utilized", pct),
                now,
            )
        },
        PressureLevel::High => Recommendation {
            actions: vec![
                Action::automated(ActionType::ForceGc, "Run a collection cycle now", Impact::Medium),
                Action::manual(
                    ActionType::ReviewAllocations,
                    "Review the largest allocation sites",
                    Impact::Medium,
                    "hours",
                ),
            ],
            ..draft(
                RecommendationType::MemoryPressure,
                Priority::High,
                Urgency::Urgent,
                "Reduce high memory pressure",
                format!("System memory is {:.1}% utilized", pct),
                now,
            )
        },
        PressureLevel::Elevated => Recommendation {
            actions: vec![
                Action::automated(ActionType::ForceGc, "Run a collection cycle", Impact::Low),
                Action::manual(
                    ActionType::ReviewAllocations,
                    "Check recent allocation growth",
                    Impact::Low,
                    "hours",
                ),
            ],
            risk_level: RiskLevel::VeryLow,
            ..draft(
                RecommendationType::MemoryPressure,
                Priority::Medium,
                Urgency::Moderate,
                "Watch elevated memory usage",
                format!("System memory is {:.1}% utilized", pct),
                now,
            )
        },
    };
    Some(rec)
}

fn fragmentation(analysis: &Analysis, now: DateTime<Utc>) -> Option<Recommendation> {
    let description = format!(
        "Fragmentation score is {:.2}",
        analysis.fragmentation_score
    );
    let rec = match analysis.fragmentation {
        FragmentationUrgency::None => return None,
        FragmentationUrgency::Urgent => Recommendation {
            actions: vec![
                Action::automated(ActionType::ForceGc, "Compact the heap with a full cycle", Impact::Medium),
                Action::automated(
                    ActionType::OptimizeCheckpoints,
                    "Shrink retained checkpoint buffers",
                    Impact::Low,
                ),
            ],
            ..draft(
                RecommendationType::Fragmentation,
                Priority::High,
                Urgency::Urgent,
                "Reduce heap fragmentation",
                description,
                now,
            )
        },
        FragmentationUrgency::Moderate => Recommendation {
            actions: vec![Action::automated(
                ActionType::OptimizeCheckpoints,
                "Shrink retained checkpoint buffers",
                Impact::Low,
            )],
            risk_level: RiskLevel::VeryLow,
            ..draft(
                RecommendationType::Fragmentation,
                Priority::Medium,
                Urgency::Moderate,
                "Optimize memory layout",
                description,
                now,
            )
        },
    };
    Some(rec)
}

fn leak(analysis: &Analysis, now: DateTime<Utc>) -> Option<Recommendation> {
    let description = format!("Leak score is {:.2}", analysis.leak_score);
    let investigate = Action::manual(
        ActionType::InvestigateLeak,
        "Compare snapshots and find the retaining paths",
        Impact::High,
        "hours",
    );
    let report = Action::automated(
        ActionType::WriteLeakReport,
        "Write a structured leak report",
        Impact::None,
    );
    let snapshot = Action::automated(
        ActionType::CaptureSnapshot,
        "Capture a heap snapshot",
        Impact::None,
    );

    let rec = match analysis.leak {
        LeakSeverity::None => return None,
        LeakSeverity::Critical => Recommendation {
            actions: vec![
                snapshot,
                report,
                investigate,
                Action::manual(
                    ActionType::ScheduleRestart,
                    "Schedule a restart to release leaked memory",
                    Impact::High,
                    "minutes",
                ),
            ],
            ..draft(
                RecommendationType::MemoryLeak,
                Priority::Critical,
                Urgency::Immediate,
                "Investigate probable memory leak",
                description,
                now,
            )
        },
        LeakSeverity::High => Recommendation {
            actions: vec![snapshot, report, investigate],
            risk_level: RiskLevel::VeryLow,
            ..draft(
                RecommendationType::MemoryLeak,
                Priority::High,
                Urgency::Urgent,
                "Investigate memory growth",
                description,
                now,
            )
        },
        LeakSeverity::Medium => Recommendation {
            actions: vec![report, investigate],
            risk_level: RiskLevel::VeryLow,
            ..draft(
                RecommendationType::MemoryLeak,
                Priority::Medium,
                Urgency::Moderate,
                "Review suspicious memory pattern",
                description,
                now,
            )
        },
    };
    Some(rec)
}

fn performance(analysis: &Analysis, now: DateTime<Utc>) -> Option<Recommendation> {
    let perf = &analysis.performance;
    if !perf.is_degraded() {
        return None;
    }
    let (priority, urgency) = if perf.is_severe() {
        (Priority::High, Urgency::Urgent)
    } else {
        (Priority::Medium, Urgency::Moderate)
    };

    Some(Recommendation {
        actions: vec![
            Action::automated(ActionType::ForceGc, "Reclaim memory to restore headroom", Impact::Medium),
            Action::manual(
                ActionType::ReviewAllocations,
                "Profile the hot allocation paths",
                Impact::Medium,
                "hours",
            ),
        ],
        ..draft(
            RecommendationType::Performance,
            priority,
            urgency,
            "Restore memory efficiency",
            format!(
                "Efficiency {:.2} is {:.0}% below baseline",
                perf.efficiency,
                perf.degradation * 100.0
            ),
            now,
        )
    })
}

fn session_growth(analysis: &Analysis, now: DateTime<Utc>) -> Option<Recommendation> {
    let description = format!(
        "Session memory grew {:.0}% since it started",
        analysis.growth_ratio * 100.0
    );
    let review = Action::manual(
        ActionType::ReviewSessionLifecycle,
        "Release per-session state that outlives its use",
        Impact::Medium,
        "hours",
    );

    let rec = match analysis.session_growth {
        SessionGrowth::None => return None,
        SessionGrowth::Excessive => Recommendation {
            actions: vec![
                review,
                Action::manual(
                    ActionType::ScheduleRestart,
                    "Restart the session at a quiet moment",
                    Impact::High,
                    "minutes",
                ),
            ],
            risk_level: RiskLevel::Medium,
            reversible: false,
            ..draft(
                RecommendationType::SessionGrowth,
                Priority::High,
                Urgency::Urgent,
                "Contain excessive session growth",
                description,
                now,
            )
        },
        SessionGrowth::High => Recommendation {
            actions: vec![review],
            ..draft(
                RecommendationType::SessionGrowth,
                Priority::Medium,
                Urgency::Moderate,
                "Review session memory growth",
                description,
                now,
            )
        },
        SessionGrowth::Moderate => Recommendation {
            actions: vec![review],
            risk_level: RiskLevel::VeryLow,
            ..draft(
                RecommendationType::SessionGrowth,
                Priority::Low,
                Urgency::Low,
                "Keep an eye on session growth",
                description,
                now,
            )
        },
    };
    Some(rec)
}

fn checkpoint(now: DateTime<Utc>) -> Recommendation {
    Recommendation {
        actions: vec![Action::automated(
            ActionType::OptimizeCheckpoints,
            "Trim checkpoint buffers ahead of growth",
            Impact::Low,
        )],
        risk_level: RiskLevel::VeryLow,
        ..draft(
            RecommendationType::CheckpointOptimization,
            Priority::Low,
            Urgency::Low,
            "Optimize checkpoints",
            "Preventive trimming of retained checkpoint state",
            now,
        )
    }
}
