// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Zapier webhook delivery.
//!
//! [`WebhookPublisher`] POSTs a [`WebhookPayload`] as JSON. Server errors,
//! timeouts and connection failures are retried with exponential backoff;
//! 4xx responses fail immediately with a hint about what to check.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::backoff;
use crate::post::PostArtifact;
use crate::{InstapostError, Result};

/// JSON body sent to the webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Caption with hashtags appended
    pub content: String,
    pub media_urls: Vec<String>,
    pub preferred_posting_time: String,
    pub timezone: String,
    pub account: Option<String>,
    pub post_type: String,
    pub brand_name: Option<String>,
}

/// Scheduling details that are not part of the generated artifact
#[derive(Debug, Clone)]
pub struct Schedule {
    pub account: Option<String>,
    pub posting_time: String,
    pub timezone: String,
    pub post_type: String,
}

impl WebhookPayload {
    /// Assemble the payload; local media files are left out
    pub fn assemble(artifact: &PostArtifact, schedule: &Schedule) -> Self {
        Self {
            content: artifact.full_content(),
            media_urls: artifact
                .media
                .iter()
                .filter_map(|m| m.as_url().map(str::to_string))
                .collect(),
            preferred_posting_time: schedule.posting_time.clone(),
            timezone: schedule.timezone.clone(),
            account: schedule.account.clone(),
            post_type: schedule.post_type.clone(),
            brand_name: Some(artifact.brand.clone()),
        }
    }
}

/// What the webhook said on success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub status: u16,
    /// Parsed JSON body, or `{"text": ...}` when the body is not JSON
    pub response: serde_json::Value,
    pub attempts: u32,
    pub delivered_at: DateTime<Utc>,
}

/// Sends payloads to one webhook URL
pub struct WebhookPublisher {
    client: Client,
    url: String,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
}

impl WebhookPublisher {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("instapost/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            timeout,
            retries: 0,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Publisher for the configured URL, or `None` when no webhook is set
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>> {
        let publisher = &config.publisher;
        match &publisher.webhook_url {
            Some(url) => Ok(Some(
                Self::new(url, Duration::from_secs(publisher.timeout_secs))?
                    .with_retries(publisher.retries, Duration::from_millis(publisher.retry_delay_ms)),
            )),
            None => Ok(None),
        }
    }

    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver the payload, retrying transient failures
    pub async fn send(&self, payload: &WebhookPayload) -> Result<DeliveryReceipt> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.try_send(payload).await {
                Ok((status, response)) => {
                    info!(status, attempt, "Webhook accepted post");
                    return Ok(DeliveryReceipt {
                        status,
                        response,
                        attempts: attempt,
                        delivered_at: Utc::now(),
                    });
                }
                Err(e) if e.is_transient() && attempt <= self.retries => {
                    let delay = backoff(self.retry_delay, attempt);
                    warn!(attempt, error = %e, "Webhook delivery failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(attempt, error = %e, "Webhook delivery failed");
                    return Err(e);
                }
            }
        }
    }

    /// Execute a single POST and classify the response
    async fn try_send(&self, payload: &WebhookPayload) -> Result<(u16, serde_json::Value)> {
        debug!("POST {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InstapostError::WebhookUnreachable(format!("timed out after {:?}", self.timeout))
                } else if e.is_connect() {
                    InstapostError::WebhookUnreachable(format!("connection to {} failed: {}", self.url, e))
                } else {
                    InstapostError::Http(e)
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        classify_response(status, &body).map(|value| (status, value))
    }
}

/// Map a webhook response to a receipt body or a descriptive error
pub fn classify_response(status: u16, body: &str) -> Result<serde_json::Value> {
    let message = match status {
        200..=299 => {
            return Ok(serde_json::from_str(body)
                .unwrap_or_else(|_| serde_json::json!({ "text": body })));
        }
        400 => format!("bad request, check the payload format and required fields ({})", body.trim()),
        401 => "unauthorized, verify the webhook URL is correct".to_string(),
        404 => "webhook not found, verify it exists and is active".to_string(),
        500..=599 => format!("server error, this may be temporary ({})", body.trim()),
        _ => format!("unexpected response ({})", body.trim()),
    };

    Err(InstapostError::Webhook { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{Caption, Hashtag, MediaRef};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn artifact() -> PostArtifact {
        PostArtifact {
            brand: "Bean There".to_string(),
            caption: Caption::new("Autumn is brewing.").unwrap(),
            hashtags: vec![Hashtag::parse("coffee").unwrap(), Hashtag::parse("#fall").unwrap()],
            media: vec![
                MediaRef::Url("https://cdn.example.com/a.jpg".to_string()),
                MediaRef::Local("/tmp/b.jpg".into()),
            ],
            idea: None,
        }
    }

    fn schedule() -> Schedule {
        Schedule {
            account: Some("@beanthere".to_string()),
            posting_time: "1:10 PM".to_string(),
            timezone: "EST".to_string(),
            post_type: "feed".to_string(),
        }
    }

    fn payload() -> WebhookPayload {
        WebhookPayload::assemble(&artifact(), &schedule())
    }

    #[test]
    fn assembled_payload_matches_webhook_schema() {
        let value = serde_json::to_value(payload()).unwrap();
        assert_eq!(
            value,
            json!({
                "content": "Autumn is brewing. #coffee #fall",
                "media_urls": ["https://cdn.example.com/a.jpg"],
                "preferred_posting_time": "1:10 PM",
                "timezone": "EST",
                "account": "@beanthere",
                "post_type": "feed",
                "brand_name": "Bean There"
            })
        );
    }

    #[test]
    fn classifies_statuses() {
        assert_eq!(classify_response(200, r#"{"status":"success"}"#).unwrap()["status"], "success");
        assert_eq!(classify_response(200, "ok").unwrap()["text"], "ok");

        for (status, hint) in [(400, "payload"), (401, "URL"), (404, "active"), (502, "temporary"), (302, "unexpected")] {
            let err = classify_response(status, "").unwrap_err();
            assert!(err.to_string().contains(hint), "{status}: {err}");
        }
    }

    #[tokio::test]
    async fn delivers_json_with_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/catch/1/abc"))
            .and(header("user-agent", concat!("instapost/", env!("CARGO_PKG_VERSION"))))
            .and(body_json(serde_json::to_value(payload()).unwrap()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "zap-1", "status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = WebhookPublisher::new(&format!("{}/hooks/catch/1/abc", server.uri()), Duration::from_secs(5)).unwrap();
        let receipt = publisher.send(&payload()).await.unwrap();
        assert_eq!(receipt.status, 200);
        assert_eq!(receipt.attempts, 1);
        assert_eq!(receipt.response["id"], "zap-1");
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Accepted"))
            .mount(&server)
            .await;

        let publisher = WebhookPublisher::new(&server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_retries(2, Duration::from_millis(1));
        let receipt = publisher.send(&payload()).await.unwrap();
        assert_eq!(receipt.attempts, 3);
        assert_eq!(receipt.response["text"], "Accepted");
    }

    #[tokio::test]
    async fn gives_up_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let publisher = WebhookPublisher::new(&server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_retries(1, Duration::from_millis(1));
        let err = publisher.send(&payload()).await.unwrap_err();
        assert!(matches!(err, InstapostError::Webhook { status: 500, .. }));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = WebhookPublisher::new(&server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_retries(3, Duration::from_millis(1));
        let err = publisher.send(&payload()).await.unwrap_err();
        assert!(matches!(err, InstapostError::Webhook { status: 404, .. }));
    }

    #[tokio::test]
    async fn unreachable_webhook_is_reported() {
        // Nothing listens on port 9 of localhost
        let publisher = WebhookPublisher::new("http://127.0.0.1:9/hook", Duration::from_secs(2)).unwrap();
        let err = publisher.send(&payload()).await.unwrap_err();
        match err {
            InstapostError::WebhookUnreachable(message) => assert!(message.contains("connection")),
            other => panic!("expected WebhookUnreachable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn slow_webhook_times_out_and_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .expect(2)
            .mount(&server)
            .await;

        let publisher = WebhookPublisher::new(&server.uri(), Duration::from_millis(200))
            .unwrap()
            .with_retries(1, Duration::from_millis(1));
        let err = publisher.send(&payload()).await.unwrap_err();
        match err {
            InstapostError::WebhookUnreachable(message) => assert!(message.contains("timed out")),
            other => panic!("expected WebhookUnreachable, got {:?}", other),
        }
    }
}
