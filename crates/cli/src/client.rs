//! API client for the memwatch agent

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Non-success answer from the agent
#[derive(Debug, Error)]
#[error("API error ({status}): {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// API client for the agent's HTTP surface
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.send_json(reqwest::Method::POST, path, body).await?;
        response.json().await.context("Failed to parse response")
    }

    /// Make a request whose success carries no body
    pub async fn send_no_content<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<()> {
        self.send_json(method, path, body).await?;
        Ok(())
    }

    async fn send_json<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<Response> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .request(method, url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::check(response).await
    }

    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        Err(ApiError { status, message }.into())
    }
}

// API response types. Only the fields the CLI renders are declared.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub status: String,
    pub health_score: f64,
    pub health_status: Option<String>,
    pub memory: MemoryStatus,
    pub monitoring: MonitoringStatus,
    pub alerts: AlertCounts,
    pub sessions: SessionCounts,
    pub optimizations: OptimizationCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStatus {
    pub current: Option<Sample>,
    pub trend: Option<String>,
    pub leak_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub process: ProcessMemory,
    pub system: SystemMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMemory {
    pub resident_set_size: u64,
    pub heap_used: u64,
    pub heap_total: u64,
    pub heap_utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMemory {
    pub total: u64,
    pub used: u64,
    pub utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStatus {
    pub active: bool,
    pub samples_collected: u64,
    pub collection_errors: u64,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCounts {
    pub total: usize,
    pub active: usize,
    pub critical: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCounts {
    pub total: usize,
    pub active: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationCounts {
    pub total_recommendations: usize,
    pub high_priority: usize,
    pub auto_implemented: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub level: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    pub resolved: bool,
    #[serde(default)]
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub rec_type: String,
    pub priority: String,
    pub urgency: String,
    pub title: String,
    pub risk_level: String,
    pub learned: bool,
    pub priority_score: f64,
    pub actions: Vec<RecommendedAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub automated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedPattern {
    pub key: PatternKey,
    pub attempts: u32,
    pub successes: u32,
    pub success_rate: f64,
    pub confidence: f64,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternKey {
    #[serde(rename = "type")]
    pub rec_type: String,
    pub priority: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRequest {
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineRequest {
    pub efficiency: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingToggle {
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_parses_alert_list() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/alerts?active=true")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":"system_memory:critical:1","type":"system_memory","level":"critical",
                    "message":"System memory at 91%","data":{},"timestamp":"2024-01-01T00:00:00Z",
                    "acknowledged":false,"resolved":false,"actions":["force_gc"]}]"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let alerts: Vec<Alert> = client.get("api/v1/alerts?active=true").await.unwrap();

        mock.assert_async().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, "critical");
        assert_eq!(alerts[0].actions, vec!["force_gc"]);
    }

    #[tokio::test]
    async fn test_error_body_becomes_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/alerts/nope/acknowledge")
            .with_status(404)
            .with_body(r#"{"error":"alert nope not found"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .send_no_content(
                reqwest::Method::POST,
                "api/v1/alerts/nope/acknowledge",
                &ActorRequest {
                    actor: "cli".to_string(),
                },
            )
            .await
            .unwrap_err();

        let api = err.downcast_ref::<ApiError>().unwrap();
        assert!(api.is_not_found());
        assert_eq!(api.message, "alert nope not found");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
