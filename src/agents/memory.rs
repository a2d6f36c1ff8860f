// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Preference memory: brand voice and recent captions

use async_trait::async_trait;
use tracing::{info, warn};

use super::{Agent, PostContext};
use crate::db::{BrandPreferences, Database};
use crate::{AppConfig, Result};

/// Loads stored brand preferences into the context
pub struct PreferenceMemoryAgent {
    db: Database,
}

impl PreferenceMemoryAgent {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Agent for PreferenceMemoryAgent {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn role(&self) -> &'static str {
        "Brand preference memory"
    }

    async fn run(&self, ctx: &mut PostContext, config: &AppConfig) -> Result<()> {
        let brand = &ctx.request.brand;

        ctx.preferences = match self.db.get_brand(brand)? {
            Some(prefs) => {
                info!("Loaded preferences for '{}' ({} extras)", prefs.name, prefs.extras.len());
                prefs
            }
            None => {
                warn!("No stored preferences for '{}', using defaults", brand);
                BrandPreferences::new(brand)
            }
        };

        let limit = config.generation.history_examples;
        if limit > 0 {
            ctx.recent_captions = self.db.published_captions(brand, limit)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::request;
    use crate::db::PostStatus;

    #[tokio::test]
    async fn loads_brand_and_recent_captions() {
        let db = Database::in_memory().unwrap();
        let mut brand = BrandPreferences::new("acme");
        brand.tone = "bold".to_string();
        db.upsert_brand(&brand).unwrap();
        for caption in ["one", "two", "three", "four"] {
            db.insert_post("acme", caption, &[], &[], caption, PostStatus::Published, Some(200)).unwrap();
        }

        let mut config = AppConfig::default();
        config.generation.history_examples = 2;

        let mut ctx = PostContext::new(request("acme"));
        PreferenceMemoryAgent::new(db).run(&mut ctx, &config).await.unwrap();

        assert_eq!(ctx.preferences.tone, "bold");
        assert_eq!(ctx.recent_captions, vec!["four", "three"]);
    }

    #[tokio::test]
    async fn unknown_brand_gets_defaults() {
        let db = Database::in_memory().unwrap();
        let mut ctx = PostContext::new(request("newcomer"));
        PreferenceMemoryAgent::new(db).run(&mut ctx, &AppConfig::default()).await.unwrap();

        assert_eq!(ctx.preferences.name, "newcomer");
        assert!(ctx.preferences.tone.is_empty());
        assert!(ctx.recent_captions.is_empty());
    }
}
