// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Publisher connector: hands the finished post to the webhook

use async_trait::async_trait;
use tracing::{info, warn};

use super::{Agent, PostContext, PublishOutcome};
use crate::db::{Database, PostStatus};
use crate::post::MediaRef;
use crate::webhook::{Schedule, WebhookPayload, WebhookPublisher};
use crate::{AppConfig, InstapostError, Result};

/// Assembles the payload, sends it and records the post
pub struct PublisherAgent {
    publisher: Option<WebhookPublisher>,
    db: Database,
}

impl PublisherAgent {
    pub fn new(publisher: Option<WebhookPublisher>, db: Database) -> Self {
        Self { publisher, db }
    }

    fn schedule(ctx: &PostContext, config: &AppConfig) -> Schedule {
        let prefs = &ctx.preferences;
        Schedule {
            account: prefs.account.clone(),
            posting_time: ctx
                .request
                .posting_time
                .clone()
                .or_else(|| prefs.preferred_posting_time.clone())
                .unwrap_or_else(|| config.defaults.posting_time.clone()),
            timezone: ctx
                .request
                .timezone
                .clone()
                .or_else(|| prefs.timezone.clone())
                .unwrap_or_else(|| config.defaults.timezone.clone()),
            post_type: config.publisher.post_type.clone(),
        }
    }
}

#[async_trait]
impl Agent for PublisherAgent {
    fn name(&self) -> &'static str {
        "publisher"
    }

    fn role(&self) -> &'static str {
        "Content publishing manager"
    }

    async fn run(&self, ctx: &mut PostContext, config: &AppConfig) -> Result<()> {
        let artifact = ctx.artifact()?;
        artifact.validate_media()?;

        let dry_run = ctx.request.dry_run;
        let fingerprint = artifact.fingerprint();

        if !dry_run && config.generation.duplicate_detection && !ctx.request.allow_duplicate {
            if let Some(id) = self.db.find_duplicate(&fingerprint)? {
                return Err(InstapostError::DuplicatePost(id));
            }
        }

        let payload = WebhookPayload::assemble(&artifact, &Self::schedule(ctx, config));
        let hashtags: Vec<String> = artifact.hashtags.iter().map(|t| t.as_str().to_string()).collect();
        let local_files = artifact
            .media
            .iter()
            .filter(|m| matches!(m, MediaRef::Local(_)))
            .count();

        let record = |status: PostStatus, webhook_status: Option<u16>| {
            self.db.insert_post(
                &artifact.brand,
                artifact.caption.as_str(),
                &hashtags,
                &payload.media_urls,
                &fingerprint,
                status,
                webhook_status,
            )
        };

        if dry_run {
            if local_files > 0 {
                warn!("{} local media file(s) left out of the payload", local_files);
            }
            info!("DRY RUN: payload not sent");
            let record_id = record(PostStatus::DryRun, None)?;
            ctx.outcome = Some(PublishOutcome {
                record_id,
                status: PostStatus::DryRun,
                payload,
                receipt: None,
            });
            return Ok(());
        }

        if local_files > 0 {
            return Err(InstapostError::Validation(format!(
                "{} local media file(s) cannot be published; upload them and pass their URLs",
                local_files
            )));
        }

        let publisher = self.publisher.as_ref().ok_or_else(|| {
            InstapostError::Config(
                "No webhook URL configured (set publisher.webhook_url or ZAPIER_WEBHOOK_URL)".to_string(),
            )
        })?;

        info!("Sending post to webhook {}", publisher.url());
        match publisher.send(&payload).await {
            Ok(receipt) => {
                let record_id = record(PostStatus::Published, Some(receipt.status))?;
                ctx.outcome = Some(PublishOutcome {
                    record_id,
                    status: PostStatus::Published,
                    payload,
                    receipt: Some(receipt),
                });
                Ok(())
            }
            Err(e) => {
                let status = match &e {
                    InstapostError::Webhook { status, .. } => Some(*status),
                    _ => None,
                };
                if let Err(db_err) = record(PostStatus::Failed, status) {
                    warn!("Failed to record failed post: {}", db_err);
                }
                Err(e)
            }
        }
    }
}
