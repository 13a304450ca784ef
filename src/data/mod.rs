//! Evidence search providers.
//!
//! Defines the `EvidenceSearch` trait plus helpers that turn raw search
//! hits into the URL list and evidence bundle used by the pipeline.

pub mod tavily;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::SearchResult;

/// Abstraction over a web-search provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvidenceSearch: Send + Sync {
    /// Run a query and return the raw result records.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;
}

/// URLs of every result that carries one.
pub fn extract_urls(results: &[SearchResult]) -> Vec<String> {
    results.iter()
        .filter(|r| !r.url.is_empty())
        .map(|r| r.url.clone())
        .collect()
}

/// Content strings of every result with non-empty content.
pub fn extract_content(results: &[SearchResult]) -> Vec<String> {
    results.iter()
        .filter(|r| !r.content.is_empty())
        .map(|r| r.content.clone())
        .collect()
}

/// Join result contents into a single space-separated evidence bundle.
/// Empty when there are no results.
pub fn evidence_bundle(results: &[SearchResult]) -> String {
    extract_content(results).join(" ")
}

/// Search and report whether any keyword appears in the combined content.
pub async fn search_and_judge(
    search: &dyn EvidenceSearch,
    query: &str,
    keywords: &[&str],
) -> Result<bool> {
    let results = search.search(query).await?;
    let combined = evidence_bundle(&results);
    Ok(keywords.iter().any(|k| combined.contains(k)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
