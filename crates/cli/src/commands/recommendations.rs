//! Recommendation and learned-pattern commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, LearnedPattern, Recommendation};
use crate::output::{color_level, color_score, format_percent, print_list, OutputFormat};

/// Row for recommendations table
#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    rec_type: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Urgency")]
    urgency: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Risk")]
    risk: String,
    #[tabled(rename = "Actions")]
    actions: String,
    #[tabled(rename = "Title")]
    title: String,
}

/// Row for learned patterns table
#[derive(Tabled)]
struct PatternRow {
    #[tabled(rename = "Type")]
    rec_type: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Attempts")]
    attempts: u32,
    #[tabled(rename = "Success")]
    success_rate: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Last used")]
    last_used: String,
}

/// Automated actions are marked with `*`
fn action_summary(rec: &Recommendation) -> String {
    rec.actions
        .iter()
        .map(|a| {
            if a.automated {
                format!("{}*", a.action_type)
            } else {
                a.action_type.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Show recommendations, newest first
pub async fn get_recommendations(
    client: &ApiClient,
    limit: usize,
    min_priority: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let recs: Vec<Recommendation> = client
        .get(&format!("api/v1/recommendations?limit={}", limit))
        .await?;

    let filtered: Vec<_> = match min_priority {
        Some(ref min) => {
            let floor = priority_rank(min);
            recs.into_iter()
                .filter(|r| priority_rank(&r.priority) >= floor)
                .collect()
        }
        None => recs,
    };

    print_list(
        &filtered,
        |recs| {
            recs.iter()
                .map(|r| RecommendationRow {
                    id: r.id.clone(),
                    rec_type: if r.learned {
                        format!("{} (learned)", r.rec_type)
                    } else {
                        r.rec_type.clone()
                    },
                    priority: color_level(&r.priority),
                    urgency: r.urgency.clone(),
                    score: format!("{:.2}", r.priority_score),
                    risk: r.risk_level.clone(),
                    actions: action_summary(r),
                    title: r.title.clone(),
                })
                .collect()
        },
        "No recommendations found",
        format,
    )
}

/// Show learned remediation patterns
pub async fn get_patterns(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let patterns: Vec<LearnedPattern> = client.get("api/v1/patterns").await?;

    print_list(
        &patterns,
        |patterns| {
            patterns
                .iter()
                .map(|p| PatternRow {
                    rec_type: p.key.rec_type.clone(),
                    priority: color_level(&p.key.priority),
                    attempts: p.attempts,
                    success_rate: format_percent(p.success_rate),
                    confidence: color_score(p.confidence),
                    last_used: p.last_used.format("%Y-%m-%d %H:%M").to_string(),
                })
                .collect()
        },
        "No learned patterns yet",
        format,
    )
}

fn priority_rank(priority: &str) -> u8 {
    match priority.to_lowercase().as_str() {
        "critical" => 3,
        "high" => 2,
        "medium" => 1,
        _ => 0,
    }
}
