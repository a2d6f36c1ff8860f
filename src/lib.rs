// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Instapost: AI agent crew for Instagram posts
//!
//! Agents research a topic, write a caption and hashtags in the brand's
//! voice, then hand the post to a Zapier webhook that schedules it in Buffer.

pub mod agents;
pub mod config;
pub mod crew;
pub mod db;
pub mod error;
pub mod openai;
pub mod post;
pub mod prompts;
pub mod search;
pub mod webhook;

pub use config::AppConfig;
pub use error::{InstapostError, Result};
