// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Prompt rendering with minijinja

use minijinja::Environment;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::search::SearchHit;
use crate::Result;

/// Variables available to every prompt template
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptContext {
    pub brand: String,
    pub tone: String,
    pub audience: String,
    pub extras: BTreeMap<String, String>,
    pub examples: Vec<String>,
    pub topic: String,
    pub date: String,
    pub idea: Option<String>,
    pub research: Vec<SearchHit>,
    pub caption: Option<String>,
    pub has_media: bool,
    pub max_hashtags: usize,
}

/// Render a template against the context
pub fn render(template: &str, context: &PromptContext) -> Result<String> {
    let env = Environment::new();
    let rendered = env.render_str(template, context)?;
    Ok(rendered.trim().to_string())
}

/// Check that a template parses
pub fn check(template: &str) -> Result<()> {
    let env = Environment::new();
    env.template_from_str(template)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptConfig;

    fn context() -> PromptContext {
        PromptContext {
            brand: "Bean There".to_string(),
            tone: "warm and witty".to_string(),
            audience: "remote workers".to_string(),
            extras: [("emoji".to_string(), "sparingly".to_string())].into_iter().collect(),
            examples: vec!["Monday needs a refill.".to_string()],
            topic: "autumn drinks".to_string(),
            date: "2026-10-19".to_string(),
            idea: Some("Pumpkin spice flat lay".to_string()),
            research: vec![SearchHit {
                title: "Maple lattes trend".to_string(),
                link: "https://example.com".to_string(),
                snippet: "Maple is the new pumpkin".to_string(),
            }],
            caption: Some("Cozy season is here.".to_string()),
            has_media: true,
            max_hashtags: 12,
        }
    }

    #[test]
    fn renders_variables_and_loops() {
        let out = render("{{ brand }} / {% for e in examples %}[{{ e }}]{% endfor %}", &context()).unwrap();
        assert_eq!(out, "Bean There / [Monday needs a refill.]");
    }

    #[test]
    fn default_prompts_use_brand_context() {
        let prompts = PromptConfig::default();
        let ctx = context();

        let strategist = render(&prompts.strategist, &ctx).unwrap();
        assert!(strategist.contains("Bean There"));
        assert!(strategist.contains("Maple lattes trend"));
        assert!(strategist.contains("emoji: sparingly"));

        let caption = render(&prompts.caption, &ctx).unwrap();
        assert!(caption.contains("warm and witty"));
        assert!(caption.contains("Monday needs a refill."));
        assert!(caption.contains("Pumpkin spice flat lay"));

        let hashtags = render(&prompts.hashtags, &ctx).unwrap();
        assert!(hashtags.contains("Suggest 12 hashtags"));
        assert!(hashtags.contains("Cozy season is here."));
    }

    #[test]
    fn optional_sections_disappear_when_empty() {
        let prompts = PromptConfig::default();
        let ctx = PromptContext {
            brand: "Solo".to_string(),
            topic: "launch day".to_string(),
            max_hashtags: 5,
            ..Default::default()
        };

        let caption = render(&prompts.caption, &ctx).unwrap();
        assert!(!caption.contains("Brand voice"));
        assert!(!caption.contains("Previous captions"));

        let image = render(&prompts.image, &ctx).unwrap();
        assert!(image.contains("Theme: launch day."));
    }

    #[test]
    fn broken_template_is_an_error() {
        assert!(check("{{ unclosed").is_err());
        assert!(render("{% for %}", &context()).is_err());
    }
}
