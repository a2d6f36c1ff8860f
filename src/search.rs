// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Serper web search client used for trend research

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::AppConfig;
use crate::{InstapostError, Result};

/// One organic search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
}

/// Serper API client
pub struct SerperClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SerperClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').trim_end_matches("/search").to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Client from config, or `None` when research is disabled or no key is set
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>> {
        if !config.search.enabled {
            return Ok(None);
        }
        match &config.secrets.serper_api_key {
            Some(key) => Ok(Some(Self::new(&config.search.url, key)?)),
            None => Ok(None),
        }
    }

    /// Run a search and return up to `num` organic results
    pub async fn search(&self, query: &str, num: u32) -> Result<Vec<SearchHit>> {
        debug!("Searching: {}", query);

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .json(&SearchRequest { q: query, num })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(InstapostError::Search(format!(
                "Serper returned status {}",
                response.status()
            )));
        }

        let result: SearchResponse = response.json().await?;
        Ok(result.organic.into_iter().take(num as usize).collect())
    }
}
