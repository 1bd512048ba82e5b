//! Commands that steer the running engine

use anyhow::Result;
use reqwest::Method;
use serde::Serialize;

use crate::client::{ApiClient, BaselineRequest, SamplingToggle};
use crate::output::{print_info, print_success};

/// Start or stop periodic sampling
pub async fn set_sampling(client: &ApiClient, start: bool) -> Result<()> {
    let (path, verb) = if start {
        ("api/v1/sampling/start", "started")
    } else {
        ("api/v1/sampling/stop", "stopped")
    };
    let toggle: SamplingToggle = client.post(path, &serde_json::json!({})).await?;

    if toggle.changed {
        print_success(&format!("Sampling {}", verb));
    } else {
        print_info(&format!("Sampling already {}", verb));
    }
    Ok(())
}

/// Set or clear the externally supplied efficiency baseline
pub async fn set_baseline(client: &ApiClient, efficiency: Option<f64>) -> Result<()> {
    if let Some(value) = efficiency {
        anyhow::ensure!(
            (0.0..=1.0).contains(&value),
            "baseline efficiency must be within 0..=1 (got {})",
            value
        );
    }

    client
        .send_no_content(Method::PUT, "api/v1/baseline", &BaselineRequest { efficiency })
        .await?;

    match efficiency {
        Some(value) => print_success(&format!("Baseline efficiency set to {:.2}", value)),
        None => print_success("Baseline cleared, using the rolling average"),
    }
    Ok(())
}

#[derive(Serialize)]
struct SessionRequest<'a> {
    session_id: Option<&'a str>,
}

/// Attribute subsequent samples to a session
pub async fn set_session(client: &ApiClient, session_id: Option<&str>) -> Result<()> {
    client
        .send_no_content(Method::PUT, "api/v1/session", &SessionRequest { session_id })
        .await?;

    match session_id {
        Some(id) => print_success(&format!("Samples now attributed to session {}", id)),
        None => print_success("Session cleared"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_out_of_range_is_rejected_before_request() {
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let err = tokio_test::block_on(set_baseline(&client, Some(1.5))).unwrap_err();
        assert!(err.to_string().contains("0..=1"));
    }

    #[tokio::test]
    async fn test_baseline_clear_sends_null() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/v1/baseline")
            .match_body(mockito::Matcher::Json(serde_json::json!({ "efficiency": null })))
            .with_status(204)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        set_baseline(&client, None).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sampling_toggle_reads_changed_flag() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/sampling/stop")
            .with_status(200)
            .with_body(r#"{"changed":false}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        set_sampling(&client, false).await.unwrap();
        mock.assert_async().await;
    }
}
