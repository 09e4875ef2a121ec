//! Wikipedia access: the `WikiSource` seam and its MediaWiki HTTP client.
//!
//! The tools only see [`WikiSource`]; tests replace it with a stub. The
//! parsing of MediaWiki responses lives in pure functions so it can be
//! exercised without a network.

use async_trait::async_trait;
use asklab_core::error::ToolError;
use regex_lite::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    /// Plain-text snippet, markup removed
    pub snippet: String,
}

/// A page's plain-text extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExtract {
    /// Canonical title after redirects
    pub title: String,
    pub text: String,
}

/// Outcome of looking up a page by title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLookup {
    Found(PageExtract),
    Missing,
    /// A disambiguation page; holds candidate titles.
    Ambiguous(Vec<String>),
}

/// Anything that can search and read encyclopedia pages.
#[async_trait]
pub trait WikiSource: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ToolError>;

    async fn page(&self, title: &str) -> Result<PageLookup, ToolError>;
}

/// Public URL of an English Wikipedia article.
pub fn article_url(title: &str) -> String {
    format!("https://en.wikipedia.org/wiki/{}", title.trim().replace(' ', "_"))
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Remove HTML tags (e.g. `<span class="searchmatch">`) and decode common entities.
pub fn strip_html(text: &str) -> String {
    TAG_RE
        .replace_all(text, "")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Parse a `list=search` response.
pub fn parse_search(body: &serde_json::Value) -> Vec<SearchHit> {
    body["query"]["search"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| {
                    let title = hit["title"].as_str()?.to_string();
                    let snippet = strip_html(hit["snippet"].as_str().unwrap_or_default());
                    Some(SearchHit { title, snippet })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a `prop=extracts|pageprops` response.
///
/// Returns `Ambiguous(vec![])` for disambiguation pages; the caller fetches
/// the candidate links separately.
pub fn parse_page(body: &serde_json::Value) -> PageLookup {
    let Some(pages) = body["query"]["pages"].as_object() else {
        return PageLookup::Missing;
    };

    for (page_id, page) in pages {
        if page_id == "-1" || page.get("missing").is_some() || page.get("invalid").is_some() {
            continue;
        }
        if page["pageprops"].get("disambiguation").is_some() {
            return PageLookup::Ambiguous(Vec::new());
        }
        let text = page["extract"].as_str().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }
        let title = page["title"].as_str().unwrap_or_default().to_string();
        return PageLookup::Found(PageExtract {
            title,
            text: text.to_string(),
        });
    }

    PageLookup::Missing
}

/// Parse a `prop=links` response into article titles.
pub fn parse_links(body: &serde_json::Value) -> Vec<String> {
    let Some(pages) = body["query"]["pages"].as_object() else {
        return Vec::new();
    };
    pages
        .values()
        .filter_map(|page| page["links"].as_array())
        .flatten()
        .filter(|link| link["ns"].as_i64().unwrap_or(0) == 0)
        .filter_map(|link| link["title"].as_str().map(str::to_string))
        .collect()
}

/// MediaWiki action API client with bounded, linearly backed-off retries.
pub struct WikipediaClient {
    api_url: String,
    user_agent: String,
    retries: u32,
    retry_delay: Duration,
    client: reqwest::Client,
}

impl WikipediaClient {
    pub fn new(base_url: &str, user_agent: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_url: format!("{}/w/api.php", base_url.trim_end_matches('/')),
            user_agent: user_agent.into(),
            retries: 3,
            retry_delay: Duration::from_secs(1),
            client,
        }
    }

    pub fn with_retries(mut self, retries: u32, retry_delay: Duration) -> Self {
        self.retries = retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    async fn fetch(&self, params: &[(&str, &str)]) -> Result<serde_json::Value, ToolError> {
        let mut last_error = String::new();

        for attempt in 1..=self.retries {
            let result = self
                .client
                .get(&self.api_url)
                .header("User-Agent", &self.user_agent)
                .query(&[("action", "query"), ("format", "json")])
                .query(params)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    return response.json().await.map_err(|e| ToolError::ExecutionFailed {
                        tool_name: "wikipedia".into(),
                        reason: format!("Unreadable response: {e}"),
                    });
                }
                Ok(response) => {
                    last_error = format!("HTTP {}", response.status());
                    warn!(attempt, status = response.status().as_u16(), "Wikipedia API error");
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(attempt, error = %e, "Wikipedia request failed");
                }
            }

            if attempt < self.retries {
                tokio::time::sleep(self.retry_delay * attempt).await;
            }
        }

        Err(ToolError::ExecutionFailed {
            tool_name: "wikipedia".into(),
            reason: format!("gave up after {} attempts: {last_error}", self.retries),
        })
    }
}

#[async_trait]
impl WikiSource for WikipediaClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ToolError> {
        debug!(query, "Wikipedia search");
        let body = self
            .fetch(&[("list", "search"), ("srsearch", query), ("srlimit", "10"), ("srprop", "snippet")])
            .await?;
        let mut hits = parse_search(&body);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn page(&self, title: &str) -> Result<PageLookup, ToolError> {
        debug!(title, "Wikipedia page read");
        let body = self
            .fetch(&[
                ("prop", "extracts|pageprops"),
                ("ppprop", "disambiguation"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;

        match parse_page(&body) {
            PageLookup::Ambiguous(_) => {
                let links = self
                    .fetch(&[("prop", "links"), ("pllimit", "20"), ("redirects", "1"), ("titles", title)])
                    .await?;
                Ok(PageLookup::Ambiguous(parse_links(&links)))
            }
            other => Ok(other),
        }
    }
}
