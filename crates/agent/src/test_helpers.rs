//! Shared test helpers for loop and executor tests.

use asklab_core::channel::{ChatSink, ProgressEvent, RequestContext};
use asklab_core::error::{ChannelError, ProviderError, ToolError};
use asklab_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use asklab_core::turn::{ConversationId, ToolCallRequest, Turn};
use asklab_tools::{PageExtract, PageLookup, SearchHit, WikiSource};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A mock provider that returns a sequence of scripted results.
///
/// Each call to `complete` returns the next result in the queue. Once the
/// queue is empty the repeating response is used; without one, it panics.
pub struct SequentialMockProvider {
    results: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    repeat: Option<ProviderResponse>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    pub fn from_results(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that answers every call with the same response.
    pub fn repeating(response: ProviderResponse) -> Self {
        let mut provider = Self::new(vec![]);
        provider.repeat = Some(response);
        provider
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.results.lock().unwrap().pop_front();
        match (next, &self.repeat) {
            (Some(result), _) => result,
            (None, Some(response)) => Ok(response.clone()),
            (None, None) => panic!("SequentialMockProvider: no more responses (call #{call})"),
        }
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    make_response(Turn::assistant(text))
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<ToolCallRequest>, thought: &str) -> ProviderResponse {
    make_response(Turn::assistant_with_calls(thought, tool_calls))
}

fn make_response(turn: Turn) -> ProviderResponse {
    ProviderResponse {
        turn,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, serde_json::to_string(&args).unwrap())
}

/// In-memory [`WikiSource`] that counts page reads and can be slowed down.
#[derive(Default)]
pub struct StubWiki {
    hits: Vec<SearchHit>,
    pages: HashMap<String, String>,
    delay: Option<Duration>,
    page_reads: Arc<AtomicUsize>,
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
        self.pages.insert(title.into(), text.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn page_reads(&self) -> Arc<AtomicUsize> {
        self.page_reads.clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl WikiSource for StubWiki {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>, ToolError> {
        self.pause().await;
        Ok(self.hits.iter().take(limit).cloned().collect())
    }

    async fn page(&self, title: &str) -> Result<PageLookup, ToolError> {
        self.pause().await;
        self.page_reads.fetch_add(1, Ordering::SeqCst);
        Ok(match self.pages.get(title) {
            Some(text) => PageLookup::Found(PageExtract {
                title: title.into(),
                text: text.clone(),
            }),
            None => PageLookup::Missing,
        })
    }
}

/// A sink that records everything it is asked to deliver.
#[derive(Clone, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<String>>>,
    progress: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn progress_events(&self) -> Vec<ProgressEvent> {
        self.progress.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn send(&self, text: &str) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn progress(&self, event: &ProgressEvent) -> Result<(), ChannelError> {
        self.progress.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Request context for conversation `conv-1`, asked by `user-42`.
pub fn context(sink: &RecordingSink) -> RequestContext {
    RequestContext::new(ConversationId::from("conv-1"), "user-42", Arc::new(sink.clone()))
}
