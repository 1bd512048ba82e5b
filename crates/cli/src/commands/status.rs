//! Engine status overview

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, Status};
use crate::output::{
    color_level, color_score, format_bytes, format_percent, print_info, OutputFormat,
};

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn rows(status: &Status) -> Vec<StatusRow> {
    let mut rows = vec![
        StatusRow {
            field: "State",
            value: color_level(&status.status),
        },
        StatusRow {
            field: "Health",
            value: match status.health_status {
                Some(ref label) => format!("{} ({})", color_score(status.health_score), color_level(label)),
                None => "-".to_string(),
            },
        },
        StatusRow {
            field: "Sampling",
            value: if status.monitoring.active {
                color_level("running")
            } else {
                color_level("stopped")
            },
        },
        StatusRow {
            field: "Samples",
            value: format!(
                "{} ({} errors)",
                status.monitoring.samples_collected, status.monitoring.collection_errors
            ),
        },
    ];

    if let Some(ref sample) = status.memory.current {
        rows.push(StatusRow {
            field: "RSS",
            value: format_bytes(sample.process.resident_set_size),
        });
        rows.push(StatusRow {
            field: "Heap",
            value: format!(
                "{} / {} ({})",
                format_bytes(sample.process.heap_used),
                format_bytes(sample.process.heap_total),
                format_percent(sample.process.heap_utilization)
            ),
        });
        rows.push(StatusRow {
            field: "System",
            value: format!(
                "{} / {} ({})",
                format_bytes(sample.system.used),
                format_bytes(sample.system.total),
                format_percent(sample.system.utilization)
            ),
        });
        rows.push(StatusRow {
            field: "Session",
            value: sample.session_id.clone(),
        });
    }
    if let Some(ref trend) = status.memory.trend {
        rows.push(StatusRow {
            field: "Trend",
            value: trend.clone(),
        });
    }
    if let Some(score) = status.memory.leak_score {
        rows.push(StatusRow {
            field: "Leak score",
            value: format!("{:.2}", score),
        });
    }

    rows.push(StatusRow {
        field: "Alerts",
        value: format!(
            "{} active ({} critical, {} warnings), {} total",
            status.alerts.active, status.alerts.critical, status.alerts.warnings, status.alerts.total
        ),
    });
    rows.push(StatusRow {
        field: "Sessions",
        value: format!("{} active / {} total", status.sessions.active, status.sessions.total),
    });
    rows.push(StatusRow {
        field: "Recommendations",
        value: format!(
            "{} ({} high priority, {} auto-applied)",
            status.optimizations.total_recommendations,
            status.optimizations.high_priority,
            status.optimizations.auto_implemented
        ),
    });
    rows
}

/// Show the engine status summary
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: Status = client.get("api/v1/status").await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Table => {
            let table = tabled::Table::new(rows(&status))
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            if let Some(updated) = status.monitoring.last_update {
                print_info(&format!("Last update {}", updated.format("%Y-%m-%d %H:%M:%S UTC")));
            }
        }
    }

    Ok(())
}
