use async_trait::async_trait;
use asklab_core::error::ToolError;
use std::collections::HashMap;

use crate::wikipedia::{PageExtract, PageLookup, SearchHit, WikiSource};

/// In-memory [`WikiSource`] for tool tests.
#[derive(Default)]
pub struct StubWiki {
    hits: Vec<SearchHit>,
    pages: HashMap<String, PageLookup>,
}

impl StubWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hit(mut self, title: &str, snippet: &str) -> Self {
        self.hits.push(SearchHit {
            title: title.into(),
            snippet: snippet.into(),
        });
        self
    }

    pub fn with_page(mut self, title: &str, text: &str) -> Self {
        self.pages.insert(
            title.into(),
            PageLookup::Found(PageExtract {
                title: title.into(),
                text: text.into(),
            }),
        );
        self
    }

    pub fn with_ambiguous(mut self, title: &str, candidates: &[&str]) -> Self {
        self.pages.insert(
            title.into(),
            PageLookup::Ambiguous(candidates.iter().map(|c| c.to_string()).collect()),
        );
        self
    }
}

#[async_trait]
impl WikiSource for StubWiki {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>, ToolError> {
        Ok(self.hits.iter().take(limit).cloned().collect())
    }

    async fn page(&self, title: &str) -> Result<PageLookup, ToolError> {
        Ok(self.pages.get(title).cloned().unwrap_or(PageLookup::Missing))
    }
}
