// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for instapost

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::post::MAX_HASHTAGS;
use crate::prompts;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// AI engine configuration
    #[serde(default)]
    pub ai_engine: EngineConfig,

    /// Trend research settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Webhook publishing settings
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Generation limits and switches
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Prompt templates
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Fallbacks for brands without stored scheduling preferences
    #[serde(default)]
    pub defaults: PostDefaults,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// API keys, only ever read from the environment
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_image_size")]
    pub image_size: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_text_model")]
    pub text: String,
    #[serde(default = "default_vision_model")]
    pub vision: String,
    #[serde(default = "default_image_model")]
    pub image: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_search_url")]
    pub url: String,
    #[serde(default = "default_search_results")]
    pub results: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PublisherConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_post_type")]
    pub post_type: String,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_webhook_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_max_hashtags")]
    pub max_hashtags: usize,
    #[serde(default = "default_true")]
    pub generate_images: bool,
    #[serde(default = "default_history_examples")]
    pub history_examples: usize,
    #[serde(default = "default_true")]
    pub duplicate_detection: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_strategist_prompt")]
    pub strategist: String,
    #[serde(default = "default_caption_prompt")]
    pub caption: String,
    #[serde(default = "default_hashtags_prompt")]
    pub hashtags: String,
    #[serde(default = "default_image_prompt")]
    pub image: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PostDefaults {
    #[serde(default = "default_posting_time")]
    pub posting_time: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub openai_api_key: Option<String>,
    pub serper_api_key: Option<String>,
}

// Default value functions
fn default_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_temperature() -> f32 { 0.7 }
fn default_timeout() -> u64 { 120 }
fn default_retries() -> u32 { 3 }
fn default_retry_delay() -> u64 { 1000 }
fn default_image_size() -> String { "1024x1024".to_string() }
fn default_text_model() -> String { "gpt-4o-mini".to_string() }
fn default_vision_model() -> String { "gpt-4o-mini".to_string() }
fn default_image_model() -> String { "dall-e-3".to_string() }
fn default_true() -> bool { true }
fn default_search_url() -> String { "https://google.serper.dev".to_string() }
fn default_search_results() -> u32 { 5 }
fn default_post_type() -> String { "feed".to_string() }
fn default_webhook_timeout() -> u64 { 30 }
fn default_webhook_retries() -> u32 { 2 }
fn default_max_hashtags() -> usize { 15 }
fn default_history_examples() -> usize { 3 }
fn default_posting_time() -> String { "9:00 AM".to_string() }
fn default_timezone() -> String { "UTC".to_string() }
fn default_db_path() -> String { "instapost.db".to_string() }

fn default_strategist_prompt() -> String {
    "You are the social media content strategist for {{ brand }}.\n\
     {% if tone %}Brand voice: {{ tone }}.\n{% endif %}\
     {% if audience %}Audience: {{ audience }}.\n{% endif %}\
     {% for key, value in extras|items %}{{ key }}: {{ value }}\n{% endfor %}\
     Today is {{ date }}.\n\
     {% if research %}Current trends related to the topic:\n\
     {% for hit in research %}- {{ hit.title }}: {{ hit.snippet }}\n{% endfor %}{% endif %}\
     Propose ONE Instagram post idea about {{ topic }} in two or three sentences. \
     Describe the visual and the message. Return ONLY the idea.".to_string()
}

fn default_caption_prompt() -> String {
    "Write an Instagram caption for {{ brand }}.\n\
     {% if tone %}Brand voice: {{ tone }}.\n{% endif %}\
     {% if audience %}Audience: {{ audience }}.\n{% endif %}\
     {% for key, value in extras|items %}{{ key }}: {{ value }}\n{% endfor %}\
     {% if idea %}Post idea: {{ idea }}\n{% endif %}\
     {% if has_media %}Describe what makes the attached image worth stopping for.\n{% endif %}\
     {% if examples %}Previous captions, match their voice without repeating them:\n\
     {% for example in examples %}- {{ example }}\n{% endfor %}{% endif %}\
     Keep it under 150 words, end with a call to action, and do NOT include hashtags. \
     Return ONLY the caption.".to_string()
}

fn default_hashtags_prompt() -> String {
    "You are a hashtag strategist for {{ brand }}{% if audience %}, reaching {{ audience }}{% endif %}.\n\
     Caption: {{ caption }}\n\
     {% if research %}Trending now:\n\
     {% for hit in research %}- {{ hit.title }}\n{% endfor %}{% endif %}\
     Suggest {{ max_hashtags }} hashtags mixing broad, niche and trending tags. \
     Return ONLY the hashtags separated by spaces.".to_string()
}

fn default_image_prompt() -> String {
    "A square, scroll-stopping Instagram photo for {{ brand }}. \
     {% if idea %}{{ idea }} {% else %}Theme: {{ topic }}. {% endif %}\
     {% if tone %}Mood: {{ tone }}. {% endif %}No text overlays.".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ai_engine: EngineConfig::default(),
            search: SearchConfig::default(),
            publisher: PublisherConfig::default(),
            generation: GenerationConfig::default(),
            prompts: PromptConfig::default(),
            defaults: PostDefaults::default(),
            database: DatabaseConfig::default(),
            secrets: Secrets::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            models: ModelConfig::default(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            image_size: default_image_size(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            text: default_text_model(),
            vision: default_vision_model(),
            image: default_image_model(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_search_url(),
            results: default_search_results(),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            post_type: default_post_type(),
            timeout_secs: default_webhook_timeout(),
            retries: default_webhook_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_hashtags: default_max_hashtags(),
            generate_images: true,
            history_examples: default_history_examples(),
            duplicate_detection: true,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            strategist: default_strategist_prompt(),
            caption: default_caption_prompt(),
            hashtags: default_hashtags_prompt(),
            image: default_image_prompt(),
        }
    }
}

impl Default for PostDefaults {
    fn default() -> Self {
        Self {
            posting_time: default_posting_time(),
            timezone: default_timezone(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn load(path: &Path) -> crate::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str::<Self>(&content)
                .map_err(|e| crate::InstapostError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Save configuration to a JSON file (secrets are never written)
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (normally the process environment)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.secrets.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.ai_engine.base_url = url;
        }
        if let Some(key) = lookup("SERPER_API_KEY") {
            self.secrets.serper_api_key = Some(key);
        }
        if let Some(url) = lookup("ZAPIER_WEBHOOK_URL") {
            self.publisher.webhook_url = Some(url);
        }
    }

    /// Check the configuration; hard errors fail, soft problems come back as warnings
    pub fn validate(&self) -> crate::Result<Vec<String>> {
        let mut warnings = Vec::new();

        if !is_http_url(&self.ai_engine.base_url) {
            return Err(crate::InstapostError::Config(format!(
                "ai_engine.base_url must be an http(s) URL, got '{}'",
                self.ai_engine.base_url
            )));
        }
        if !(0.0..=2.0).contains(&self.ai_engine.temperature) {
            return Err(crate::InstapostError::Config(format!(
                "ai_engine.temperature must be within 0.0-2.0, got {}",
                self.ai_engine.temperature
            )));
        }
        if self.generation.max_hashtags == 0 || self.generation.max_hashtags > MAX_HASHTAGS {
            return Err(crate::InstapostError::Config(format!(
                "generation.max_hashtags must be within 1-{}, got {}",
                MAX_HASHTAGS, self.generation.max_hashtags
            )));
        }

        match &self.publisher.webhook_url {
            Some(url) if !is_http_url(url) => {
                return Err(crate::InstapostError::Config(format!(
                    "publisher.webhook_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
            Some(_) => {}
            None => warnings.push(
                "No webhook URL configured (set publisher.webhook_url or ZAPIER_WEBHOOK_URL); only dry runs will work".to_string(),
            ),
        }

        for (name, template) in [
            ("strategist", &self.prompts.strategist),
            ("caption", &self.prompts.caption),
            ("hashtags", &self.prompts.hashtags),
            ("image", &self.prompts.image),
        ] {
            prompts::check(template).map_err(|e| {
                crate::InstapostError::Config(format!("prompts.{} is not a valid template: {}", name, e))
            })?;
        }

        if self.secrets.openai_api_key.is_none() {
            warnings.push("OPENAI_API_KEY is not set".to_string());
        }
        if self.search.enabled && self.secrets.serper_api_key.is_none() {
            warnings.push("SERPER_API_KEY is not set; trend research will be skipped".to_string());
        }

        Ok(warnings)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.ai_engine.models.text, "gpt-4o-mini");
        assert_eq!(config.publisher.post_type, "feed");
        assert_eq!(config.generation.max_hashtags, 15);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"ai_engine": {"base_url": "http://localhost:8080/v1", "models": {"text": "local"}},
                "publisher": {"webhook_url": "https://hooks.zapier.com/hooks/catch/1/abc"}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.ai_engine.models.text, "local");
        assert_eq!(config.ai_engine.models.image, "dall-e-3");
        assert_eq!(config.publisher.timeout_secs, 30);
        assert_eq!(config.defaults.timezone, "UTC");
    }

    #[test]
    fn webhook_only_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"publisher": {"webhook_url": "https://hooks.zapier.com/hooks/catch/1/abc"}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.ai_engine.base_url, "https://api.openai.com/v1");
        assert_eq!(config.ai_engine.models.vision, "gpt-4o-mini");
        assert_eq!(config.ai_engine.retries, 3);

        std::fs::write(&path, r#"{"ai_engine": {"base_url": "http://localhost:8080/v1"}}"#).unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.ai_engine.base_url, "http://localhost:8080/v1");
        assert_eq!(config.ai_engine.models.text, "gpt-4o-mini");
    }

    #[test]
    fn save_does_not_write_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.secrets.openai_api_key = Some("sk-secret".to_string());
        config.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("sk-secret"));
    }

    #[test]
    fn env_overrides_apply_and_ignore_blank_values() {
        let vars: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("SERPER_API_KEY", "  "),
            ("ZAPIER_WEBHOOK_URL", "https://hooks.example.com/x"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.secrets.openai_api_key.as_deref(), Some("sk-test"));
        assert!(config.secrets.serper_api_key.is_none());
        assert_eq!(config.publisher.webhook_url.as_deref(), Some("https://hooks.example.com/x"));
    }

    #[test]
    fn validate_reports_missing_pieces_as_warnings() {
        let warnings = AppConfig::default().validate().unwrap();
        assert!(warnings.iter().any(|w| w.contains("webhook")));
        assert!(warnings.iter().any(|w| w.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.generation.max_hashtags = 31;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.publisher.webhook_url = Some("ftp://nope".to_string());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.prompts.caption = "{% if %}".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_prompts_are_valid_templates() {
        let config = AppConfig::default();
        for template in [
            &config.prompts.strategist,
            &config.prompts.caption,
            &config.prompts.hashtags,
            &config.prompts.image,
        ] {
            prompts::check(template).unwrap();
        }
    }
}
