// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Caption creator using a vision model

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Agent, PostContext};
use crate::openai::OpenAiClient;
use crate::post::{clean_caption, Caption, MediaRef};
use crate::prompts;
use crate::{AppConfig, Result};

/// Longest side sent to the vision model
const MAX_IMAGE_SIDE: u32 = 1024;

/// Writes the caption, looking at the post's media when there is any
pub struct CaptionCreatorAgent {
    llm: Arc<OpenAiClient>,
}

impl CaptionCreatorAgent {
    pub fn new(llm: Arc<OpenAiClient>) -> Self {
        Self { llm }
    }

    /// URL form the vision API accepts: public URLs as-is, local files inlined
    fn image_url(media: &MediaRef) -> Result<String> {
        match media {
            MediaRef::Url(url) => Ok(url.clone()),
            MediaRef::Local(path) => {
                let (mime, data) = match Self::prepare_image(path) {
                    Ok(data) => ("image/jpeg", data),
                    Err(e) => {
                        debug!("Could not re-encode {:?} ({}), sending raw bytes", path, e);
                        let mime = ImageFormat::from_path(path)
                            .map(|f| f.to_mime_type())
                            .unwrap_or("image/jpeg");
                        (mime, std::fs::read(path)?)
                    }
                };
                Ok(format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(&data)))
            }
        }
    }

    /// Resize large images and re-encode as JPEG
    fn prepare_image(path: &Path) -> Result<Vec<u8>> {
        let img = image::open(path)?;

        let img = if img.width() > MAX_IMAGE_SIDE || img.height() > MAX_IMAGE_SIDE {
            img.resize(MAX_IMAGE_SIDE, MAX_IMAGE_SIDE, image::imageops::FilterType::Triangle)
        } else {
            img
        };
        debug!("Prepared {:?} at {:?}", path, img.dimensions());

        // JPEG has no alpha channel
        let img = DynamicImage::ImageRgb8(img.to_rgb8());

        let mut buffer = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Jpeg)?;
        Ok(buffer)
    }
}

#[async_trait]
impl Agent for CaptionCreatorAgent {
    fn name(&self) -> &'static str {
        "caption"
    }

    fn role(&self) -> &'static str {
        "Caption creator"
    }

    async fn run(&self, ctx: &mut PostContext, config: &AppConfig) -> Result<()> {
        let prompt = prompts::render(&config.prompts.caption, &ctx.prompt_context(config))?;
        let engine = &config.ai_engine;

        let images = ctx
            .media
            .iter()
            .map(Self::image_url)
            .collect::<Result<Vec<_>>>()?;

        let raw = if images.is_empty() {
            warn!("No media for this post, writing caption from text alone");
            self.llm.chat(&engine.models.text, &prompt, engine.temperature).await?
        } else {
            self.llm
                .chat_with_images(&engine.models.vision, &prompt, &images, engine.temperature)
                .await?
        };

        let caption = Caption::new(clean_caption(&raw))?;
        info!("Caption ({} chars): {}", caption.char_count(), caption);
        ctx.caption = Some(caption);
        Ok(())
    }
}
