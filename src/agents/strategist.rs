// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Content strategist: trend research and the post idea

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Agent, PostContext};
use crate::openai::OpenAiClient;
use crate::prompts;
use crate::search::SerperClient;
use crate::{AppConfig, Result};

/// Researches the topic and proposes one post idea
pub struct ContentStrategistAgent {
    llm: Arc<OpenAiClient>,
    search: Option<Arc<SerperClient>>,
}

impl ContentStrategistAgent {
    pub fn new(llm: Arc<OpenAiClient>, search: Option<Arc<SerperClient>>) -> Self {
        Self { llm, search }
    }

    async fn research(&self, ctx: &mut PostContext, config: &AppConfig) {
        let Some(search) = &self.search else {
            debug!("Trend research disabled");
            return;
        };

        let query = format!("{} instagram trends", ctx.topic());
        match search.search(&query, config.search.results).await {
            Ok(hits) => {
                info!("Found {} trend results for '{}'", hits.len(), query);
                ctx.research = hits;
            }
            Err(e) => warn!("Trend research failed, continuing without it: {}", e),
        }
    }
}

#[async_trait]
impl Agent for ContentStrategistAgent {
    fn name(&self) -> &'static str {
        "strategist"
    }

    fn role(&self) -> &'static str {
        "Social media content strategist"
    }

    async fn run(&self, ctx: &mut PostContext, config: &AppConfig) -> Result<()> {
        self.research(ctx, config).await;

        let prompt = prompts::render(&config.prompts.strategist, &ctx.prompt_context(config))?;
        let idea = self
            .llm
            .chat(&config.ai_engine.models.text, &prompt, config.ai_engine.temperature)
            .await?;

        info!("Post idea: {}", idea);
        ctx.idea = Some(idea);
        Ok(())
    }
}
