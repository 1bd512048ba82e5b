//! Recommendation data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounds which risk levels may be remediated without an operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggressiveness {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl Aggressiveness {
    pub fn allows(&self, risk: RiskLevel) -> bool {
        let ceiling = match self {
            Aggressiveness::Conservative => RiskLevel::VeryLow,
            Aggressiveness::Moderate => RiskLevel::Low,
            Aggressiveness::Aggressive => RiskLevel::Medium,
        };
        risk <= ceiling
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    MemoryPressure,
    Fragmentation,
    MemoryLeak,
    Performance,
    SessionGrowth,
    CheckpointOptimization,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::MemoryPressure => "memory_pressure",
            RecommendationType::Fragmentation => "fragmentation",
            RecommendationType::MemoryLeak => "memory_leak",
            RecommendationType::Performance => "performance",
            RecommendationType::SessionGrowth => "session_growth",
            RecommendationType::CheckpointOptimization => "checkpoint_optimization",
        }
    }
}

impl std::fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn base_weight(&self) -> f64 {
        match self {
            Priority::Low => 1.0,
            Priority::Medium => 2.0,
            Priority::High => 3.0,
            Priority::Critical => 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Moderate,
    Urgent,
    Immediate,
}

impl Urgency {
    pub fn multiplier(&self) -> f64 {
        match self {
            Urgency::Low => 1.0,
            Urgency::Moderate => 1.2,
            Urgency::Urgent => 1.5,
            Urgency::Immediate => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::VeryLow,
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::VeryHigh,
    ];

    /// 0 for very low up to 1 for very high
    pub fn score(&self) -> f64 {
        match self {
            RiskLevel::VeryLow => 0.0,
            RiskLevel::Low => 0.25,
            RiskLevel::Medium => 0.5,
            RiskLevel::High => 0.75,
            RiskLevel::VeryHigh => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    None,
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn score(&self) -> f64 {
        match self {
            Impact::None => 0.0,
            Impact::Low => 0.3,
            Impact::Medium => 0.6,
            Impact::High => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ForceGc,
    CaptureSnapshot,
    WriteLeakReport,
    OptimizeCheckpoints,
    IncreaseMemoryLimit,
    ReviewAllocations,
    InvestigateLeak,
    ScheduleRestart,
    ReviewSessionLifecycle,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ForceGc => "force_gc",
            ActionType::CaptureSnapshot => "capture_snapshot",
            ActionType::WriteLeakReport => "write_leak_report",
            ActionType::OptimizeCheckpoints => "optimize_checkpoints",
            ActionType::IncreaseMemoryLimit => "increase_memory_limit",
            ActionType::ReviewAllocations => "review_allocations",
            ActionType::InvestigateLeak => "investigate_leak",
            ActionType::ScheduleRestart => "schedule_restart",
            ActionType::ReviewSessionLifecycle => "review_session_lifecycle",
        }
    }

    /// Whether the engine can carry this action out itself
    pub fn is_executable(&self) -> bool {
        matches!(
            self,
            ActionType::ForceGc
                | ActionType::CaptureSnapshot
                | ActionType::WriteLeakReport
                | ActionType::OptimizeCheckpoints
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub description: String,
    pub automated: bool,
    pub estimated_impact: Impact,
    pub implementation_time: String,
}

impl Action {
    /// Action the engine runs itself
    pub fn automated(action_type: ActionType, description: &str, impact: Impact) -> Self {
        Self {
            action_type,
            description: description.to_string(),
            automated: action_type.is_executable(),
            estimated_impact: impact,
            implementation_time: "immediate".to_string(),
        }
    }

    /// Action left to an operator
    pub fn manual(action_type: ActionType, description: &str, impact: Impact, time: &str) -> Self {
        Self {
            action_type,
            description: description.to_string(),
            automated: false,
            estimated_impact: impact,
            implementation_time: time.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub rec_type: RecommendationType,
    pub priority: Priority,
    pub urgency: Urgency,
    pub title: String,
    pub description: String,
    pub actions: Vec<Action>,
    pub risk_level: RiskLevel,
    pub reversible: bool,
    /// Surfaced from a learned pattern
    pub learned: bool,
    pub created_at: DateTime<Utc>,
    pub priority_score: f64,
    pub impact_score: f64,
    pub risk_score: f64,
}

impl Recommendation {
    pub fn has_automated_actions(&self) -> bool {
        self.actions.iter().any(|a| a.automated)
    }

    pub fn key(&self) -> PatternKey {
        PatternKey {
            rec_type: self.rec_type,
            priority: self.priority,
        }
    }
}

/// Learning key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternKey {
    #[serde(rename = "type")]
    pub rec_type: RecommendationType,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedPattern {
    pub key: PatternKey,
    pub attempts: u32,
    pub successes: u32,
    pub success_rate: f64,
    pub confidence: f64,
    pub actions: Vec<ActionType>,
    pub last_used: DateTime<Utc>,
}

/// Outcome of one automatic implementation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationResult {
    pub recommendation_id: String,
    pub key: PatternKey,
    pub executed: Vec<ActionType>,
    pub errors: Vec<String>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}
