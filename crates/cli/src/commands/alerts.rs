//! Alert listing and lifecycle commands

use anyhow::Result;
use reqwest::Method;
use tabled::Tabled;

use crate::client::{ActorRequest, Alert, ApiClient, ApiError};
use crate::output::{color_level, print_list, print_success, print_warning, OutputFormat};

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    alert_type: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn state(alert: &Alert) -> String {
    if alert.resolved {
        "resolved".to_string()
    } else if alert.acknowledged {
        match alert.acknowledged_by {
            Some(ref by) => format!("acked by {}", by),
            None => "acked".to_string(),
        }
    } else {
        "open".to_string()
    }
}

/// List alerts, newest first
pub async fn list_alerts(client: &ApiClient, active_only: bool, format: OutputFormat) -> Result<()> {
    let path = if active_only {
        "api/v1/alerts?active=true"
    } else {
        "api/v1/alerts"
    };
    let alerts: Vec<Alert> = client.get(path).await?;

    print_list(
        &alerts,
        |alerts| {
            alerts
                .iter()
                .map(|a| AlertRow {
                    id: a.id.clone(),
                    alert_type: a.alert_type.clone(),
                    level: color_level(&a.level),
                    time: a.timestamp.format("%H:%M:%S").to_string(),
                    state: state(a),
                    message: a.message.clone(),
                })
                .collect()
        },
        "No alerts found",
        format,
    )
}

/// Lifecycle change requested from the CLI
#[derive(Debug, Clone, Copy)]
pub enum AlertAction {
    Acknowledge,
    Resolve,
}

impl AlertAction {
    fn path_segment(&self) -> &'static str {
        match self {
            AlertAction::Acknowledge => "acknowledge",
            AlertAction::Resolve => "resolve",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            AlertAction::Acknowledge => "acknowledged",
            AlertAction::Resolve => "resolved",
        }
    }
}

/// Acknowledge or resolve one alert
pub async fn update_alert(
    client: &ApiClient,
    id: &str,
    action: AlertAction,
    actor: &str,
) -> Result<()> {
    let path = format!("api/v1/alerts/{}/{}", id, action.path_segment());
    let request = ActorRequest {
        actor: actor.to_string(),
    };

    match client.send_no_content(Method::POST, &path, &request).await {
        Ok(()) => {
            print_success(&format!("Alert {} {} by {}", id, action.past_tense(), actor));
            Ok(())
        }
        Err(e) => match e.downcast_ref::<ApiError>() {
            Some(api) if api.is_not_found() => {
                print_warning(&format!("Alert {} not found", id));
                Err(e)
            }
            _ => Err(e),
        },
    }
}
