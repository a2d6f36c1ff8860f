// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Agents: one step of post creation each

pub mod caption;
pub mod hashtags;
pub mod memory;
pub mod publisher;
pub mod strategist;
pub mod visual;

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::db::{BrandPreferences, PostStatus};
use crate::post::{Caption, Hashtag, MediaRef, PostArtifact};
use crate::prompts::PromptContext;
use crate::search::SearchHit;
use crate::webhook::{DeliveryReceipt, WebhookPayload};
use crate::{AppConfig, InstapostError, Result};

/// What the user asked for
#[derive(Debug, Clone, Default)]
pub struct PostRequest {
    pub brand: String,
    pub topic: Option<String>,
    pub media: Vec<MediaRef>,
    pub posting_time: Option<String>,
    pub timezone: Option<String>,
    pub dry_run: bool,
    /// Allow the visual agent to generate an image when no media was given
    pub generate_image: bool,
    pub allow_duplicate: bool,
}

/// Result of the publishing step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub record_id: String,
    pub status: PostStatus,
    pub payload: WebhookPayload,
    pub receipt: Option<DeliveryReceipt>,
}

/// State handed from agent to agent during one run
#[derive(Debug, Clone)]
pub struct PostContext {
    pub request: PostRequest,
    pub preferences: BrandPreferences,
    /// Captions the brand published before, for tone continuity
    pub recent_captions: Vec<String>,
    pub research: Vec<SearchHit>,
    pub idea: Option<String>,
    pub media: Vec<MediaRef>,
    pub caption: Option<Caption>,
    pub hashtags: Vec<Hashtag>,
    pub outcome: Option<PublishOutcome>,
}

impl PostContext {
    pub fn new(request: PostRequest) -> Self {
        let preferences = BrandPreferences::new(&request.brand);
        let media = request.media.clone();
        Self {
            request,
            preferences,
            recent_captions: Vec::new(),
            research: Vec::new(),
            idea: None,
            media,
            caption: None,
            hashtags: Vec::new(),
            outcome: None,
        }
    }

    /// Topic for this post: the request's, a stored default, or the brand itself
    pub fn topic(&self) -> String {
        self.request
            .topic
            .clone()
            .or_else(|| self.preferences.extras.get("topic").cloned())
            .unwrap_or_else(|| self.preferences.name.clone())
    }

    /// Template variables drawn from the current state
    pub fn prompt_context(&self, config: &AppConfig) -> PromptContext {
        let mut examples = self.preferences.examples.clone();
        for caption in &self.recent_captions {
            if !examples.contains(caption) {
                examples.push(caption.clone());
            }
        }

        PromptContext {
            brand: self.preferences.name.clone(),
            tone: self.preferences.tone.clone(),
            audience: self.preferences.audience.clone(),
            extras: self.preferences.extras.clone(),
            examples,
            topic: self.topic(),
            date: Local::now().format("%Y-%m-%d").to_string(),
            idea: self.idea.clone(),
            research: self.research.clone(),
            caption: self.caption.as_ref().map(|c| c.as_str().to_string()),
            has_media: !self.media.is_empty(),
            max_hashtags: config.generation.max_hashtags,
        }
    }

    /// The post as generated so far; needs a caption
    pub fn artifact(&self) -> Result<PostArtifact> {
        let caption = self
            .caption
            .clone()
            .ok_or_else(|| InstapostError::Validation("no caption has been generated".to_string()))?;

        Ok(PostArtifact {
            brand: self.preferences.name.clone(),
            caption,
            hashtags: self.hashtags.clone(),
            media: self.media.clone(),
            idea: self.idea.clone(),
        })
    }
}

/// Trait for crew agents
#[async_trait]
pub trait Agent: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// One-line description of the agent's job
    fn role(&self) -> &'static str;

    /// Do this agent's step, reading and updating the shared context
    async fn run(&self, ctx: &mut PostContext, config: &AppConfig) -> Result<()>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_falls_back_to_stored_preference_then_brand() {
        let mut ctx = PostContext::new(PostRequest { brand: "acme".to_string(), ..Default::default() });
        assert_eq!(ctx.topic(), "acme");

        ctx.preferences.extras.insert("topic".to_string(), "rockets".to_string());
        assert_eq!(ctx.topic(), "rockets");

        ctx.request.topic = Some("anvils".to_string());
        assert_eq!(ctx.topic(), "anvils");
    }

    #[test]
    fn prompt_context_merges_examples_without_duplicates() {
        let mut ctx = PostContext::new(testing::request("acme"));
        ctx.preferences.examples = vec!["Boom.".to_string()];
        ctx.recent_captions = vec!["Boom.".to_string(), "Whoosh.".to_string()];

        let prompt = ctx.prompt_context(&AppConfig::default());
        assert_eq!(prompt.examples, vec!["Boom.", "Whoosh."]);
        assert_eq!(prompt.max_hashtags, 15);
        assert!(!prompt.has_media);
    }

    #[test]
    fn artifact_needs_a_caption() {
        let mut ctx = PostContext::new(testing::request("acme"));
        assert!(ctx.artifact().is_err());

        ctx.caption = Some(Caption::new("Hello").unwrap());
        assert_eq!(ctx.artifact().unwrap().brand, "acme");
    }
}
