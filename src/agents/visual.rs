// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Visual content creator: generates an image when the post has none

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Agent, PostContext};
use crate::openai::OpenAiClient;
use crate::post::MediaRef;
use crate::prompts;
use crate::{AppConfig, Result};

pub struct VisualContentAgent {
    llm: Arc<OpenAiClient>,
}

impl VisualContentAgent {
    pub fn new(llm: Arc<OpenAiClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Agent for VisualContentAgent {
    fn name(&self) -> &'static str {
        "visual"
    }

    fn role(&self) -> &'static str {
        "Visual content creator"
    }

    async fn run(&self, ctx: &mut PostContext, config: &AppConfig) -> Result<()> {
        if !ctx.media.is_empty() {
            debug!("Post already has {} media item(s)", ctx.media.len());
            return Ok(());
        }
        if !ctx.request.generate_image || !config.generation.generate_images {
            debug!("Image generation disabled");
            return Ok(());
        }

        let prompt = prompts::render(&config.prompts.image, &ctx.prompt_context(config))?;
        match self
            .llm
            .generate_image(&config.ai_engine.models.image, &prompt, &config.ai_engine.image_size)
            .await
        {
            Ok(url) => {
                info!("Generated image: {}", url);
                ctx.media.push(MediaRef::Url(url));
            }
            // Text-only posts are still worth captioning
            Err(e) => warn!("Image generation failed, continuing without media: {}", e),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::request;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_image() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"url": "https://images.example.com/1.png"}]
            })))
            .mount(&server)
            .await;
        server
    }

    fn agent(server: &MockServer) -> VisualContentAgent {
        VisualContentAgent::new(Arc::new(OpenAiClient::new(&server.uri(), None, Duration::from_secs(5)).unwrap()))
    }

    #[tokio::test]
    async fn generates_image_when_media_missing() {
        let server = server_with_image().await;
        let mut ctx = PostContext::new(request("acme"));
        agent(&server).run(&mut ctx, &AppConfig::default()).await.unwrap();
        assert_eq!(ctx.media, vec![MediaRef::Url("https://images.example.com/1.png".to_string())]);
    }

    #[tokio::test]
    async fn keeps_supplied_media() {
        let server = server_with_image().await;
        let mut req = request("acme");
        req.media = vec![MediaRef::Url("https://cdn.example.com/own.jpg".to_string())];
        let mut ctx = PostContext::new(req);

        agent(&server).run(&mut ctx, &AppConfig::default()).await.unwrap();
        assert_eq!(ctx.media.len(), 1);
        assert_eq!(ctx.media[0].as_url(), Some("https://cdn.example.com/own.jpg"));
    }

    #[tokio::test]
    async fn respects_no_image_flag() {
        let server = server_with_image().await;
        let mut req = request("acme");
        req.generate_image = false;
        let mut ctx = PostContext::new(req);

        agent(&server).run(&mut ctx, &AppConfig::default()).await.unwrap();
        assert!(ctx.media.is_empty());
    }
}
