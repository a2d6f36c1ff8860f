// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Client for OpenAI-compatible chat, vision and image APIs

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::backoff;
use crate::{InstapostError, Result};

/// OpenAI API client
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retries: u32,
    retry_delay: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    id: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("instapost/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Normalize URL
        let base_url = base_url
            .trim_end_matches('/')
            .trim_end_matches("/chat/completions")
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
            retries: 0,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Build a client from the `ai_engine` section and the API key secret
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let engine = &config.ai_engine;
        Ok(Self::new(
            &engine.base_url,
            config.secrets.openai_api_key.clone(),
            Duration::from_secs(engine.timeout_secs),
        )?
        .with_retries(engine.retries, Duration::from_millis(engine.retry_delay_ms)))
    }

    /// Retry failed calls with exponential backoff starting at `delay`
    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(format!("{}{}", self.base_url, path)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Check if the API is reachable and the key is accepted
    pub async fn health_check(&self) -> Result<()> {
        let response = self
            .get("/models")
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                InstapostError::Model(format!("Cannot connect to {}: {}", self.base_url, e))
            })?;

        check_status(response).await?;
        Ok(())
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = check_status(self.get("/models").send().await?).await?;
        let models: ModelsResponse = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    /// Check if a specific model is available
    pub async fn model_available(&self, model: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m == model))
    }

    /// Text-only chat completion
    pub async fn chat(&self, model: &str, prompt: &str, temperature: f32) -> Result<String> {
        self.with_retry("chat", move || {
            self.send_chat(model, MessageContent::Text(prompt.to_string()), temperature)
        })
        .await
    }

    /// Chat completion with images attached (vision models).
    ///
    /// `image_urls` may be public URLs or `data:` URLs.
    pub async fn chat_with_images(
        &self,
        model: &str,
        prompt: &str,
        image_urls: &[String],
        temperature: f32,
    ) -> Result<String> {
        if image_urls.is_empty() {
            return self.chat(model, prompt, temperature).await;
        }

        self.with_retry("vision chat", move || {
            let mut parts = vec![ContentPart::Text { text: prompt.to_string() }];
            parts.extend(image_urls.iter().map(|url| ContentPart::ImageUrl {
                image_url: ImageUrl { url: url.clone() },
            }));
            self.send_chat(model, MessageContent::Parts(parts), temperature)
        })
        .await
    }

    /// Generate one image and return its hosted URL
    pub async fn generate_image(&self, model: &str, prompt: &str, size: &str) -> Result<String> {
        self.with_retry("image generation", move || async move {
            let request = ImageRequest { model, prompt, n: 1, size };

            debug!("Sending image request: model={}", model);

            let response = self.post("/images/generations").json(&request).send().await?;
            let result: ImageResponse = check_status(response).await?.json().await?;

            result
                .data
                .into_iter()
                .find_map(|d| d.url)
                .ok_or_else(|| InstapostError::Model("Image API returned no URL".to_string()))
        })
        .await
    }

    async fn send_chat(&self, model: &str, content: MessageContent, temperature: f32) -> Result<String> {
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage { role: "user", content }],
            temperature,
        };

        debug!("Sending chat request: model={}", model);

        let response = self.post("/chat/completions").json(&request).send().await?;
        let result: ChatResponse = check_status(response).await?.json().await?;

        result
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| InstapostError::Model("Model returned an empty response".to_string()))
    }

    async fn with_retry<F, Fut, T>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    let delay = backoff(self.retry_delay, attempt);
                    warn!("{} failed ({}), retrying in {:?} (attempt {})", what, e, delay, attempt + 1);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!("{} failed after {} attempt(s): {}", what, attempt + 1, e);
                    return Err(e);
                }
            }
        }
    }
}

/// Turn non-2xx responses into errors, preferring the API's own message
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or(body);

    Err(InstapostError::ModelApi {
        status: status.as_u16(),
        message,
    })
}
