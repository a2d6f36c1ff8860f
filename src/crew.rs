// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! The crew: runs the agents in order over one post

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::agents::caption::CaptionCreatorAgent;
use crate::agents::hashtags::HashtagStrategistAgent;
use crate::agents::memory::PreferenceMemoryAgent;
use crate::agents::publisher::PublisherAgent;
use crate::agents::strategist::ContentStrategistAgent;
use crate::agents::visual::VisualContentAgent;
use crate::agents::{Agent, PostContext, PostRequest};
use crate::db::Database;
use crate::openai::OpenAiClient;
use crate::search::SerperClient;
use crate::webhook::WebhookPublisher;
use crate::{AppConfig, Result};

/// Sequential pipeline of agents
pub struct Crew {
    agents: Vec<Box<dyn Agent>>,
}

impl Crew {
    /// Build the default crew from config
    pub fn new(config: &AppConfig, db: Database) -> Result<Self> {
        let llm = Arc::new(OpenAiClient::from_config(config)?);
        let search = SerperClient::from_config(config)?.map(Arc::new);
        if search.is_none() {
            debug!("Trend research unavailable (disabled or no SERPER_API_KEY)");
        }
        let publisher = WebhookPublisher::from_config(config)?;

        let mut crew = Self::empty();
        crew.register(Box::new(PreferenceMemoryAgent::new(db.clone())));
        crew.register(Box::new(ContentStrategistAgent::new(llm.clone(), search)));
        crew.register(Box::new(VisualContentAgent::new(llm.clone())));
        crew.register(Box::new(CaptionCreatorAgent::new(llm.clone())));
        crew.register(Box::new(HashtagStrategistAgent::new(llm)));
        crew.register(Box::new(PublisherAgent::new(publisher, db)));
        Ok(crew)
    }

    /// A crew with no agents
    pub fn empty() -> Self {
        Self { agents: Vec::new() }
    }

    /// Append an agent to the end of the pipeline
    pub fn register(&mut self, agent: Box<dyn Agent>) {
        self.agents.push(agent);
    }

    pub fn agent_names(&self) -> Vec<&'static str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Run every agent in order; the first error stops the run
    pub async fn kickoff(&self, request: PostRequest, config: &AppConfig) -> Result<PostContext> {
        let mut ctx = PostContext::new(request);
        let total = self.agents.len();

        for (i, agent) in self.agents.iter().enumerate() {
            info!("[{}/{}] {}", i + 1, total, agent.role());
            let started = Instant::now();
            agent.run(&mut ctx, config).await?;
            debug!("{} finished in {:?}", agent.name(), started.elapsed());
        }

        Ok(ctx)
    }
}
