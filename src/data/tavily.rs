//! Tavily web-search provider.
//!
//! Supplies evidence for claim validation and settlement.
//!
//! API: `https://api.tavily.com/search`
//! Auth: API key in the JSON body. Depth is "basic" or "advanced".

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::EvidenceSearch;
use crate::types::SearchResult;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";
const DEFAULT_MAX_RESULTS: u32 = 5;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl From<TavilyHit> for SearchResult {
    fn from(hit: TavilyHit) -> Self {
        SearchResult {
            title: hit.title.unwrap_or_default(),
            url: hit.url.unwrap_or_default(),
            content: hit.content.unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub struct TavilySearch {
    http: Client,
    api_key: SecretString,
    search_depth: String,
    max_results: u32,
}

impl TavilySearch {
    pub fn new(api_key: SecretString, search_depth: Option<String>, max_results: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("CryptoSage/0.1.0")
            .build()
            .context("Failed to build Tavily HTTP client")?;
        Ok(Self {
            http,
            api_key,
            search_depth: search_depth.unwrap_or_else(|| "basic".to_string()),
            max_results: max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        })
    }

    fn parse_response(body: SearchResponse) -> Vec<SearchResult> {
        body.results.into_iter().map(SearchResult::from).collect()
    }
}

#[async_trait]
impl EvidenceSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let request = SearchRequest {
            api_key: self.api_key.expose_secret(),
            query,
            search_depth: &self.search_depth,
            max_results: self.max_results,
        };

        let resp = self.http
            .post(TAVILY_API_URL)
            .json(&request)
            .send()
            .await
            .context("Tavily request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            warn!(status = %status, "Tavily returned error");
            anyhow::bail!("Tavily search error {status}: {error_text}");
        }

        let body: SearchResponse = resp.json().await
            .context("Failed to parse Tavily response")?;
        let results = Self::parse_response(body);

        debug!(query, hits = results.len(), "Tavily search complete");
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
