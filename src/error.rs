// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for instapost

use std::time::Duration;
use thiserror::Error;

/// Result type alias for instapost operations
pub type Result<T> = std::result::Result<T, InstapostError>;

/// instapost error types
#[derive(Error, Debug)]
pub enum InstapostError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model API error: {0}")]
    Model(String),

    #[error("Model API returned HTTP {status}: {message}")]
    ModelApi { status: u16, message: String },

    #[error("Search error: {0}")]
    Search(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid post: {0}")]
    Validation(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Webhook returned HTTP {status}: {message}")]
    Webhook { status: u16, message: String },

    #[error("Webhook unreachable: {0}")]
    WebhookUnreachable(String),

    #[error("Brand not found: {0}")]
    BrandNotFound(String),

    #[error("Post already published (record {0})")]
    DuplicatePost(String),
}

impl InstapostError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Webhook { status, .. } => *status >= 500,
            Self::ModelApi { status, .. } => *status >= 500 || *status == 429,
            Self::WebhookUnreachable(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Exponential backoff delay before retry number `retry` (1-based)
pub fn backoff(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
}
