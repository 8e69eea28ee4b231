//! Web search through the Tavily API.
//!
//! The news digest grounds its prompt in live search results. [`WebSearch`]
//! abstracts the provider so the generator can be tested without network
//! access; [`TavilyClient`] is the hosted implementation.

use crate::utils::truncate_for_log;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tracing::{info, instrument, warn};
use url::Url;

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Snippet of page content relevant to the query.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub published_date: Option<String>,
}

/// A search provider returning ranked snippets for a query.
pub trait WebSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, Box<dyn Error>>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    topic: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Client for Tavily's `search` endpoint.
pub struct TavilyClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    max_results: usize,
}

impl fmt::Debug for TavilyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TavilyClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("max_results", &self.max_results)
            .finish_non_exhaustive()
    }
}

impl TavilyClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        max_results: usize,
        timeout: StdDuration,
    ) -> Result<Self, Box<dyn Error>> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint: base.join("search")?,
            api_key: api_key.to_string(),
            max_results,
        })
    }
}

impl WebSearch for TavilyClient {
    #[instrument(level = "info", skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, Box<dyn Error>> {
        let t0 = Instant::now();
        let body = SearchRequest {
            query,
            topic: "news",
            max_results: self.max_results,
        };
        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(%status, body = %truncate_for_log(&text, 300), "Search call failed");
            return Err(format!("search provider returned {status}").into());
        }

        let parsed: SearchResponse = resp.json().await?;
        info!(
            count = parsed.results.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Search returned results"
        );
        Ok(parsed.results)
    }
}

/// Render search hits as numbered plain-text blocks for prompt interpolation.
pub fn render_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "(no search results)".to_string();
    }
    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", i + 1, r.title.trim()));
        if !r.url.is_empty() {
            out.push_str(&format!("URL: {}\n", r.url));
        }
        if let Some(date) = r.published_date.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!("Published: {date}\n"));
        }
        out.push_str(r.content.trim());
        out.push_str("\n\n");
    }
    out.trim_end().to_string()
}
