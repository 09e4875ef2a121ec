//! Research tools for AskLab.
//!
//! Three tools are exposed to the model: `search` and `read_page` over
//! Wikipedia, and `search_memory` over the asking user's past
//! conversations. Registration of `search_memory` is conditional on a
//! memory backend being configured.

pub mod memory_search;
pub mod read_page;
pub mod search;
pub mod wikipedia;

#[cfg(test)]
mod test_support;

use asklab_core::memory::MemoryBackend;
use asklab_core::tool::ToolRegistry;
use std::sync::Arc;

pub use memory_search::MemorySearchTool;
pub use read_page::ReadPageTool;
pub use search::SearchTool;
pub use wikipedia::{PageExtract, PageLookup, SearchHit, WikiSource, WikipediaClient, article_url};

/// Limits applied by the research tools.
#[derive(Debug, Clone, Copy)]
pub struct ToolSettings {
    /// Search hits returned per query
    pub max_results: usize,
    /// Characters of a page extract handed to the model
    pub read_char_cap: usize,
    /// Memories returned per recall
    pub recall_limit: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            read_char_cap: 3000,
            recall_limit: 3,
        }
    }
}

/// Build the registry the research loop dispatches against.
pub fn research_registry(
    source: Arc<dyn WikiSource>,
    memory: Option<Arc<dyn MemoryBackend>>,
    settings: ToolSettings,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SearchTool::new(source.clone(), settings.max_results)));
    registry.register(Box::new(ReadPageTool::new(source, settings.read_char_cap)));
    if let Some(backend) = memory {
        registry.register(Box::new(MemorySearchTool::new(backend, settings.recall_limit)));
    }
    registry
}
