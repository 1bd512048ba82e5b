//! Scoring and ordering of a recommendation batch

use super::analysis::{AnalysisContext, Criticality};
use super::types::{Recommendation, RiskLevel};

const MAINTENANCE_BOOST: f64 = 1.2;
const CRITICAL_AUTOMATION_DISCOUNT: f64 = 0.8;

/// Fill in the derived scores and sort by priority score, highest first.
/// Equal scores keep their input order.
pub fn prioritize(recs: &mut [Recommendation], context: &AnalysisContext) {
    for rec in recs.iter_mut() {
        rec.priority_score =
            rec.priority.base_weight() * rec.urgency.multiplier() * context_adjustment(rec, context);
        rec.impact_score = impact_score(rec);
        rec.risk_score = rec.risk_level.score();
    }
    recs.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
}

fn context_adjustment(rec: &Recommendation, context: &AnalysisContext) -> f64 {
    let mut adjustment = 1.0;
    if context.maintenance_window {
        adjustment *= MAINTENANCE_BOOST;
    }
    // Automation is restricted to very-low risk in a critical context
    if context.criticality == Criticality::Critical
        && rec.has_automated_actions()
        && rec.risk_level != RiskLevel::VeryLow
    {
        adjustment *= CRITICAL_AUTOMATION_DISCOUNT;
    }
    adjustment
}

fn impact_score(rec: &Recommendation) -> f64 {
    if rec.actions.is_empty() {
        return 0.0;
    }
    let total: f64 = rec.actions.iter().map(|a| a.estimated_impact.score()).sum();
    total / rec.actions.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::types::{
        Action, ActionType, Impact, Priority, RecommendationType, Urgency,
    };
    use crate::testing::t0;

    fn rec(title: &str, priority: Priority, urgency: Urgency, risk: RiskLevel) -> Recommendation {
        Recommendation {
            id: String::new(),
            rec_type: RecommendationType::MemoryPressure,
            priority,
            urgency,
            title: title.into(),
            description: String::new(),
            actions: vec![
                Action::automated(ActionType::ForceGc, "gc", Impact::High),
                Action::manual(ActionType::ReviewAllocations, "review", Impact::Low, "hours"),
            ],
            risk_level: risk,
            reversible: true,
            learned: false,
            created_at: t0(),
            priority_score: 0.0,
            impact_score: 0.0,
            risk_score: 0.0,
        }
    }

    fn normal() -> AnalysisContext {
        AnalysisContext {
            maintenance_window: false,
            criticality: Criticality::Normal,
        }
    }

    #[test]
    fn test_scores_and_descending_order() {
        let mut recs = vec![
            rec("low", Priority::Low, Urgency::Low, RiskLevel::VeryLow),
            rec("critical", Priority::Critical, Urgency::Immediate, RiskLevel::Low),
            rec("high", Priority::High, Urgency::Urgent, RiskLevel::Low),
        ];
        prioritize(&mut recs, &normal());

        let titles: Vec<_> = recs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["critical", "high", "low"]);
        assert!((recs[0].priority_score - 8.0).abs() < 1e-9);
        assert!((recs[1].priority_score - 4.5).abs() < 1e-9);
        assert!((recs[0].impact_score - 0.65).abs() < 1e-9);
        assert!((recs[0].risk_score - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let mut recs = vec![
            rec("first", Priority::Medium, Urgency::Moderate, RiskLevel::Low),
            rec("second", Priority::Medium, Urgency::Moderate, RiskLevel::Low),
            rec("third", Priority::Medium, Urgency::Moderate, RiskLevel::Low),
        ];
        prioritize(&mut recs, &normal());
        let titles: Vec<_> = recs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_context_adjustments() {
        let window = AnalysisContext {
            maintenance_window: true,
            criticality: Criticality::Normal,
        };
        let mut recs = vec![rec("r", Priority::Medium, Urgency::Low, RiskLevel::Low)];
        prioritize(&mut recs, &window);
        assert!((recs[0].priority_score - 2.4).abs() < 1e-9);

        let critical = AnalysisContext {
            maintenance_window: false,
            criticality: Criticality::Critical,
        };
        let mut recs = vec![
            rec("risky", Priority::Medium, Urgency::Low, RiskLevel::Low),
            rec("safe", Priority::Medium, Urgency::Low, RiskLevel::VeryLow),
        ];
        prioritize(&mut recs, &critical);
        assert_eq!(recs[0].title, "safe");
        assert!((recs[1].priority_score - 1.6).abs() < 1e-9);
    }
}
