// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Hashtag strategist

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Agent, PostContext};
use crate::openai::OpenAiClient;
use crate::post::{parse_hashtags, MAX_HASHTAGS};
use crate::prompts;
use crate::{AppConfig, Result};

/// Suggests hashtags from the caption and the trend research
pub struct HashtagStrategistAgent {
    llm: Arc<OpenAiClient>,
}

impl HashtagStrategistAgent {
    pub fn new(llm: Arc<OpenAiClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Agent for HashtagStrategistAgent {
    fn name(&self) -> &'static str {
        "hashtags"
    }

    fn role(&self) -> &'static str {
        "Hashtag strategist"
    }

    async fn run(&self, ctx: &mut PostContext, config: &AppConfig) -> Result<()> {
        let limit = config.generation.max_hashtags.min(MAX_HASHTAGS);
        let prompt = prompts::render(&config.prompts.hashtags, &ctx.prompt_context(config))?;

        let raw = self
            .llm
            .chat(&config.ai_engine.models.text, &prompt, config.ai_engine.temperature)
            .await?;

        let tags = parse_hashtags(&raw, limit);
        if tags.is_empty() {
            warn!("Model suggested no usable hashtags: {:?}", raw);
        } else {
            info!(
                "Hashtags: {}",
                tags.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(" ")
            );
        }

        ctx.hashtags = tags;
        Ok(())
    }
}
