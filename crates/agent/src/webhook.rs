//! Delivery of queued webhook notifications
//!
//! The engine hands payloads to a bounded queue and never waits on the
//! network. This task drains the queue and POSTs each payload to its target.
//! A failed delivery is logged and dropped.

use anyhow::{Context, Result};
use memwatch::alerts::WebhookPayload;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookSender {
    client: Client,
}

impl WebhookSender {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    /// POST one payload to its target
    pub async fn send(&self, payload: &WebhookPayload) -> Result<()> {
        let response = self
            .client
            .post(&payload.target)
            .json(payload)
            .send()
            .await
            .context("Failed to send webhook")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Webhook rejected ({}): {}", status, body);
        }
        Ok(())
    }

    /// Drain the queue until every sender is dropped; returns the number delivered
    pub async fn run(self, mut queue: mpsc::Receiver<WebhookPayload>) -> usize {
        let mut delivered = 0;
        while let Some(payload) = queue.recv().await {
            match self.send(&payload).await {
                Ok(()) => {
                    delivered += 1;
                    debug!(
                        alert_type = %payload.alert_type,
                        level = %payload.level,
                        "Webhook delivered"
                    );
                }
                Err(e) => warn!(
                    error = %format!("{:#}", e),
                    alert_type = %payload.alert_type,
                    target = %payload.target,
                    "Webhook delivery failed"
                ),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn payload(target: String) -> WebhookPayload {
        WebhookPayload {
            target,
            alert_type: "system_memory".to_string(),
            level: "critical".to_string(),
            message: "System memory at 91%".to_string(),
            data: serde_json::json!({ "utilization": 0.91 }),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_run_posts_queued_payloads() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "type": "system_memory",
                "level": "critical"
            })))
            .with_status(200)
            .expect(2)
            .create_async()
            .await;

        let (tx, rx) = mpsc::channel(4);
        tx.send(payload(format!("{}/hook", server.url()))).await.unwrap();
        tx.send(payload(format!("{}/hook", server.url()))).await.unwrap();
        drop(tx);

        let delivered = WebhookSender::new().unwrap().run(rx).await;
        assert_eq!(delivered, 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_delivery_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .with_status(500)
            .with_body("down")
            .create_async()
            .await;

        let sender = WebhookSender::new().unwrap();
        let err = sender
            .send(&payload(format!("{}/hook", server.url())))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));

        let (tx, rx) = mpsc::channel(1);
        tx.send(payload(format!("{}/hook", server.url()))).await.unwrap();
        drop(tx);
        assert_eq!(sender.run(rx).await, 0);
    }
}
