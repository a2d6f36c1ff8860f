// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Post artifacts: captions, hashtags and media references

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::{InstapostError, Result};

/// Instagram caption limit, hashtags included
pub const MAX_CAPTION_CHARS: usize = 2200;

/// Instagram hashtag limit per post
pub const MAX_HASHTAGS: usize = 30;

/// Carousel limit
pub const MAX_MEDIA: usize = 10;

const MAX_HASHTAG_CHARS: usize = 100;

/// A validated, non-empty caption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Caption(String);

impl Caption {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(InstapostError::Validation("caption is empty".to_string()));
        }
        let len = text.chars().count();
        if len > MAX_CAPTION_CHARS {
            return Err(InstapostError::Validation(format!(
                "caption is {} characters, Instagram allows {}",
                len, MAX_CAPTION_CHARS
            )));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl TryFrom<String> for Caption {
    type Error = InstapostError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Caption> for String {
    fn from(caption: Caption) -> Self {
        caption.0
    }
}

impl fmt::Display for Caption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A hashtag, stored without its leading '#'
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hashtag(String);

impl Hashtag {
    pub fn parse(raw: &str) -> Result<Self> {
        let tag = raw.trim().trim_start_matches('#');

        if tag.is_empty() {
            return Err(InstapostError::Validation("hashtag is empty".to_string()));
        }
        if tag.chars().count() > MAX_HASHTAG_CHARS {
            return Err(InstapostError::Validation(format!("hashtag '{}' is too long", tag)));
        }
        if !tag.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(InstapostError::Validation(format!(
                "hashtag '{}' may only contain letters, digits and underscores",
                tag
            )));
        }
        if tag.chars().all(char::is_numeric) {
            return Err(InstapostError::Validation(format!("hashtag '{}' is only digits", tag)));
        }

        Ok(Self(tag.to_string()))
    }

    /// Tag text without '#'
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Hashtag {
    type Error = InstapostError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Hashtag> for String {
    fn from(tag: Hashtag) -> Self {
        tag.0
    }
}

impl fmt::Display for Hashtag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pull hashtags out of free-form model output.
///
/// Tokens are split on whitespace and commas; list bullets, numbering and
/// punctuation around the tag are dropped. Invalid tokens are skipped,
/// duplicates (case-insensitive) keep their first spelling.
pub fn parse_hashtags(text: &str, limit: usize) -> Vec<Hashtag> {
    if limit == 0 {
        return Vec::new();
    }

    let tokens: Vec<&str> = strip_preamble(text)
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(|token| {
            token
                .trim_start_matches(['-', '*', '\u{2022}'])
                .trim_matches(['"', '\'', '`', '.', '!', '?', ':', '(', ')', '[', ']'])
        })
        .filter(|token| !token.is_empty())
        .collect();

    // Once the model marks tags with '#', unmarked words are prose
    let marked_only = tokens.iter().any(|t| t.starts_with('#'));

    let mut tags: Vec<Hashtag> = Vec::new();
    for token in tokens {
        if marked_only && !token.starts_with('#') {
            continue;
        }

        let Ok(tag) = Hashtag::parse(token) else {
            continue;
        };

        if tags.iter().any(|t| t.as_str().to_lowercase() == tag.as_str().to_lowercase()) {
            continue;
        }

        tags.push(tag);
        if tags.len() >= limit {
            break;
        }
    }

    tags
}

/// Drop a chat preamble such as "Here are some hashtags:" from the first line
fn strip_preamble(text: &str) -> &str {
    let text = text.trim_start();
    let first_line = text.lines().next().unwrap_or("");
    match first_line.find(':') {
        Some(idx) if !first_line[..idx].contains('#') => &text[idx + 1..],
        _ => text,
    }
}

/// Where the post's media lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum MediaRef {
    Url(String),
    Local(PathBuf),
}

impl MediaRef {
    /// Parse a CLI/config reference: http(s) URLs stay URLs, anything else must be an existing file
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(InstapostError::Validation("media reference is empty".to_string()));
        }

        if raw.starts_with("http://") || raw.starts_with("https://") {
            let host = raw.split("://").nth(1).unwrap_or("");
            if host.is_empty() || host.starts_with('/') {
                return Err(InstapostError::Validation(format!("media URL '{}' has no host", raw)));
            }
            return Ok(Self::Url(raw.to_string()));
        }

        if raw.contains("://") {
            return Err(InstapostError::Validation(format!(
                "media URL '{}' must use http or https",
                raw
            )));
        }

        let path = PathBuf::from(raw);
        if !path.is_file() {
            return Err(InstapostError::Validation(format!("media file {:?} does not exist", path)));
        }
        Ok(Self::Local(path))
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Local(_) => None,
        }
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A fully generated post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostArtifact {
    pub brand: String,
    pub caption: Caption,
    pub hashtags: Vec<Hashtag>,
    pub media: Vec<MediaRef>,
    pub idea: Option<String>,
}

impl PostArtifact {
    /// Caption followed by the hashtags, the way the post will read.
    ///
    /// Trailing hashtags are dropped until the text fits the caption limit.
    pub fn full_content(&self) -> String {
        let mut content = self.caption.as_str().to_string();
        let mut used = self.caption.char_count();

        for tag in &self.hashtags {
            let rendered = tag.to_string();
            let extra = rendered.chars().count() + 1;
            if used + extra > MAX_CAPTION_CHARS {
                tracing::warn!(
                    "Dropping hashtags from {} onwards to stay within {} characters",
                    rendered,
                    MAX_CAPTION_CHARS
                );
                break;
            }
            content.push(' ');
            content.push_str(&rendered);
            used += extra;
        }

        content
    }

    /// Check the media list against Instagram limits
    pub fn validate_media(&self) -> Result<()> {
        if self.media.len() > MAX_MEDIA {
            return Err(InstapostError::Validation(format!(
                "{} media items, Instagram allows {}",
                self.media.len(),
                MAX_MEDIA
            )));
        }
        Ok(())
    }

    /// Stable fingerprint of brand, caption and media; hashtags are left out
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.brand.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.caption.as_str().as_bytes());
        for media in &self.media {
            hasher.update(&[0]);
            hasher.update(media.to_string().as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// "Caption", "Instagram caption (short)", "Here's your caption" and the like
fn is_caption_preamble(prefix: &str) -> bool {
    let prefix = prefix.trim().trim_matches('*').trim().to_lowercase();
    let Some(idx) = prefix.rfind("caption") else {
        return false;
    };

    let head = prefix[..idx].trim();
    let tail = &prefix[idx + "caption".len()..];
    let head_ok = head.is_empty()
        || head == "instagram"
        || head.starts_with("here's")
        || head.starts_with("here is")
        || head.starts_with("here\u{2019}s");

    head_ok && tail.chars().count() <= 15 && !prefix.contains('\n')
}

/// Clean up a caption returned by a chat model
pub fn clean_caption(raw: &str) -> String {
    // Trailing lines that are only hashtags belong to the hashtag agent
    let mut lines: Vec<&str> = raw.trim().lines().collect();
    while let Some(last) = lines.last() {
        let trimmed = last.trim();
        let only_tags = !trimmed.is_empty()
            && trimmed.split_whitespace().all(|w| w.starts_with('#'));
        if trimmed.is_empty() || only_tags {
            lines.pop();
        } else {
            break;
        }
    }
    let mut text = lines.join("\n").trim().to_string();

    // Chat prefixes such as "Caption:" or "Here is your caption:"
    if let Some(idx) = text.find(':') {
        if is_caption_preamble(&text[..idx]) {
            text = text[idx + 1..].trim_start_matches('*').trim().to_string();
        }
    }

    // Surrounding quotes, unless the caption quotes something inside
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')] {
        if text.chars().count() > 1 && text.starts_with(open) && text.ends_with(close) {
            let inner = &text[open.len_utf8()..text.len() - close.len_utf8()];
            if !inner.contains(open) && !inner.contains(close) {
                text = inner.trim().to_string();
            }
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(caption: &str, tags: &[&str]) -> PostArtifact {
        PostArtifact {
            brand: "acme".to_string(),
            caption: Caption::new(caption).unwrap(),
            hashtags: tags.iter().map(|t| Hashtag::parse(t).unwrap()).collect(),
            media: vec![MediaRef::Url("https://cdn.example.com/a.jpg".to_string())],
            idea: None,
        }
    }

    #[test]
    fn caption_rejects_empty_and_oversized() {
        assert!(Caption::new("   ").is_err());
        assert!(Caption::new("x".repeat(MAX_CAPTION_CHARS + 1)).is_err());
        assert_eq!(Caption::new("  hello ").unwrap().as_str(), "hello");
    }

    #[test]
    fn hashtag_validation() {
        assert_eq!(Hashtag::parse("#CoffeeTime").unwrap().as_str(), "CoffeeTime");
        assert_eq!(Hashtag::parse("café_life").unwrap().to_string(), "#café_life");
        assert!(Hashtag::parse("#").is_err());
        assert!(Hashtag::parse("two words").is_err());
        assert!(Hashtag::parse("no-dash").is_err());
        assert!(Hashtag::parse("2024").is_err());
        assert!(Hashtag::parse("\u{0661}\u{0662}\u{0663}").is_err());
        assert!(Hashtag::parse("2024goals").is_ok());
    }

    #[test]
    fn parses_hashtags_from_model_output() {
        let raw = "Here you go:\n1. #coffee\n2. #MorningRitual, #coffee\n- #latte_art\n#Coffee #brew!";
        let tags: Vec<String> = parse_hashtags(raw, 10).iter().map(|t| t.to_string()).collect();
        assert_eq!(tags, vec!["#coffee", "#MorningRitual", "#latte_art", "#brew"]);
    }

    #[test]
    fn unmarked_hashtags_skip_the_preamble() {
        let tags: Vec<String> = parse_hashtags("Here are some hashtags: coffee latte autumn", 10)
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(tags, vec!["#coffee", "#latte", "#autumn"]);

        let tags = parse_hashtags("Suggested hashtags:\ncoffee, latte", 10);
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn hashtag_parsing_respects_limit() {
        let raw = "#a1 #b2 #c3 #d4";
        assert_eq!(parse_hashtags(raw, 2).len(), 2);
    }

    #[test]
    fn full_content_joins_caption_and_tags() {
        let post = artifact("Fresh beans today.", &["coffee", "#roast"]);
        assert_eq!(post.full_content(), "Fresh beans today. #coffee #roast");
    }

    #[test]
    fn full_content_drops_tags_that_do_not_fit() {
        let caption = "y".repeat(MAX_CAPTION_CHARS - 8);
        let post = artifact(&caption, &["abc", "defgh"]);
        let content = post.full_content();
        assert!(content.ends_with(" #abc"));
        assert!(content.chars().count() <= MAX_CAPTION_CHARS);
    }

    #[test]
    fn media_parsing() {
        assert_eq!(
            MediaRef::parse("https://cdn.example.com/x.png").unwrap(),
            MediaRef::Url("https://cdn.example.com/x.png".to_string())
        );
        assert!(MediaRef::parse("ftp://cdn.example.com/x.png").is_err());
        assert!(MediaRef::parse("https://").is_err());
        assert!(MediaRef::parse("/definitely/not/here.jpg").is_err());

        let file = tempfile::NamedTempFile::new().unwrap();
        let parsed = MediaRef::parse(file.path().to_str().unwrap()).unwrap();
        assert!(matches!(parsed, MediaRef::Local(_)));
        assert!(parsed.as_url().is_none());
    }

    #[test]
    fn too_many_media_items_are_rejected() {
        let mut post = artifact("Carousel", &[]);
        post.media = (0..11).map(|i| MediaRef::Url(format!("https://cdn.example.com/{i}.jpg"))).collect();
        assert!(post.validate_media().is_err());
    }

    #[test]
    fn fingerprint_tracks_caption_and_media() {
        let a = artifact("Same words", &["x1"]);
        let b = artifact("Same words", &["y2"]);
        let c = artifact("Other words", &["x1"]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());

        let mut other_brand = artifact("Same words", &["x1"]);
        other_brand.brand = "globex".to_string();
        assert_ne!(a.fingerprint(), other_brand.fingerprint());
    }

    #[test]
    fn cleans_model_captions() {
        let raw = "Caption: \"Sunday slow pour. Tag a friend!\"\n\n#coffee #sunday";
        assert_eq!(clean_caption(raw), "Sunday slow pour. Tag a friend!");

        let raw = "Rainy day, warm cup.\nCome say hi: open till 6.";
        assert_eq!(clean_caption(raw), raw);

        assert_eq!(clean_caption("Here's your caption: Fresh out the oven."), "Fresh out the oven.");
        assert_eq!(clean_caption("**Instagram Caption:** Weekend mode."), "Weekend mode.");
    }

    #[test]
    fn caption_text_that_mentions_captions_survives() {
        let raw = "Our caption contest is live: tell us what this latte is thinking!";
        assert_eq!(clean_caption(raw), raw);
    }

    #[test]
    fn inner_quotes_keep_their_outer_quotes() {
        let raw = "\"Stay cozy,\" she said. \"Refill?\"";
        assert_eq!(clean_caption(raw), raw);
    }
}
