//! Tool execution for the research loop.
//!
//! The executor never fails: unknown tools, malformed arguments, backend
//! errors, timeouts and cancellation all come back as an `Error: ...`
//! result the model can read and react to.

use std::sync::Arc;
use std::time::{Duration, Instant};

use asklab_core::channel::{ProgressEvent, RequestContext};
use asklab_core::error::ToolError;
use asklab_core::event::{DomainEvent, EventBus};
use asklab_core::provider::ToolDefinition;
use asklab_core::text::{TRUNCATION_MARKER, truncate_with_marker};
use asklab_core::tool::{ToolCall, ToolName, ToolRegistry, ToolResult};
use asklab_core::turn::ToolCallRequest;
use chrono::Utc;
use tracing::{debug, warn};

use crate::state::ResearchLedger;

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    result_cap: usize,
    event_bus: Option<Arc<EventBus>>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(20),
            result_cap: 1800,
            event_bus: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_result_cap(mut self, cap: usize) -> Self {
        self.result_cap = cap;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn memory_enabled(&self) -> bool {
        self.registry.contains(ToolName::SearchMemory.as_str())
    }

    /// Execute one tool-call request.
    pub async fn execute(
        &self,
        request: &ToolCallRequest,
        ctx: &RequestContext,
        ledger: &mut ResearchLedger,
    ) -> ToolResult {
        let start = Instant::now();
        let mut result = self.dispatch(request, ctx, ledger).await;
        result.call_id = request.id.clone();
        result.output = truncate_with_marker(&result.output, self.result_cap, TRUNCATION_MARKER);

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            conversation_id = %ctx.conversation_id,
            tool = %request.name,
            status = ?result.status,
            duration_ms,
            "Tool executed"
        );
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolExecuted {
                tool_name: request.name.clone(),
                success: result.is_success(),
                duration_ms,
                timestamp: Utc::now(),
            });
        }
        result
    }

    async fn dispatch(
        &self,
        request: &ToolCallRequest,
        ctx: &RequestContext,
        ledger: &mut ResearchLedger,
    ) -> ToolResult {
        let Some(name) = ToolName::parse(&request.name).filter(|n| self.registry.contains(n.as_str())) else {
            return ToolResult::error("", format!("Error: Unknown tool '{}'", request.name));
        };

        let mut arguments = match parse_arguments(&request.arguments) {
            Ok(args) => args,
            Err(e) => return ToolResult::error("", format!("Error: {e}")),
        };

        let text_arg = |key: &str| arguments[key].as_str().unwrap_or_default().trim().to_string();
        let title = text_arg("title");
        match name {
            ToolName::Search => {
                notify(ctx, ProgressEvent::Searching { query: text_arg("query") }).await;
            }
            ToolName::SearchMemory => {
                notify(ctx, ProgressEvent::SearchingMemory { query: text_arg("query") }).await;
                arguments["scope"] = serde_json::Value::String(ctx.sender_id.clone());
            }
            ToolName::ReadPage if ledger.already_failed(&title) => {
                notify(ctx, ProgressEvent::SkippedDuplicate { title: title.clone() }).await;
                return ToolResult::empty("", format!("Already tried '{title}'."));
            }
            ToolName::ReadPage => {}
        }

        let call = ToolCall {
            id: request.id.clone(),
            name: name.as_str().to_string(),
            arguments,
        };

        let outcome = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return ToolResult::error("", "Error: request cancelled");
            }
            outcome = tokio::time::timeout(self.timeout, self.registry.execute(&call)) => outcome,
        };

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                ToolResult::error("", format!("Error: {e}"))
            }
            Err(_) => {
                let e = ToolError::Timeout {
                    tool_name: name.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                };
                warn!(tool = %name, "Tool timed out");
                ToolResult::error("", format!("Error: {e}"))
            }
        };

        if name == ToolName::ReadPage {
            match result.data.as_ref().filter(|_| result.is_success()) {
                Some(data) => {
                    let read_title = data["title"].as_str().unwrap_or(&title).to_string();
                    let url = data["url"].as_str().unwrap_or_default().to_string();
                    ledger.mark_read(&read_title, &url);
                    notify(ctx, ProgressEvent::Reading { title: read_title, url }).await;
                }
                None => ledger.mark_failed(&title),
            }
        }

        result
    }
}

/// Model-supplied arguments as a JSON object; an empty payload is `{}`.
fn parse_arguments(raw: &str) -> Result<serde_json::Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ToolError::InvalidArguments(format!("malformed JSON: {e}")))?;
    if !value.is_object() {
        return Err(ToolError::InvalidArguments("expected a JSON object".into()));
    }
    Ok(value)
}

async fn notify(ctx: &RequestContext, event: ProgressEvent) {
    if let Err(e) = ctx.sink.progress(&event).await {
        debug!(error = %e, "Progress update not delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordingSink, StubWiki, context};
    use asklab_core::memory::{MemoryBackend, MemoryEntry};
    use asklab_core::tool::ToolStatus;
    use asklab_memory::InMemoryBackend;
    use asklab_tools::{ToolSettings, research_registry};

    fn executor(wiki: StubWiki, memory: Option<Arc<dyn MemoryBackend>>) -> ToolExecutor {
        let registry = research_registry(Arc::new(wiki), memory, ToolSettings::default());
        ToolExecutor::new(Arc::new(registry)).with_result_cap(1800)
    }

    fn request(name: &str, args: &str) -> ToolCallRequest {
        ToolCallRequest::new("call_1", name, args)
    }

    #[tokio::test]
    async fn search_reports_progress() {
        let sink = RecordingSink::new();
        let ctx = context(&sink);
        let exec = executor(StubWiki::new().with_hit("Lima", "capital of Peru"), None);
        let mut ledger = ResearchLedger::default();

        let result = exec.execute(&request("search", r#"{"query":"Lima"}"#), &ctx, &mut ledger).await;
        assert_eq!(result.call_id, "call_1");
        assert_eq!(result.output, "- Lima: capital of Peru");
        assert_eq!(sink.progress_events(), vec![ProgressEvent::Searching { query: "Lima".into() }]);
    }

    #[tokio::test]
    async fn legacy_names_are_accepted() {
        let sink = RecordingSink::new();
        let exec = executor(StubWiki::new().with_page("Lima", "Lima is the capital of Peru."), None);
        let mut ledger = ResearchLedger::default();
        let result = exec
            .execute(&request("get_wikipedia_page", r#"{"title":"Lima"}"#), &context(&sink), &mut ledger)
            .await;
        assert!(result.is_success());
        assert_eq!(ledger.pages_read(), 1);
    }

    #[tokio::test]
    async fn malformed_arguments_become_error_results() {
        let sink = RecordingSink::new();
        let exec = executor(StubWiki::new(), None);
        let mut ledger = ResearchLedger::default();

        let result = exec.execute(&request("search", "{not json"), &context(&sink), &mut ledger).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.output.starts_with("Error: Invalid tool arguments"));

        let result = exec.execute(&request("search", "[1,2]"), &context(&sink), &mut ledger).await;
        assert_eq!(result.status, ToolStatus::Error);

        let result = exec.execute(&request("search", "{}"), &context(&sink), &mut ledger).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.output.contains("Missing 'query'"));
    }

    #[tokio::test]
    async fn unknown_tool_is_error_result() {
        let sink = RecordingSink::new();
        let exec = executor(StubWiki::new(), None);
        let mut ledger = ResearchLedger::default();
        let result = exec.execute(&request("shell", "{}"), &context(&sink), &mut ledger).await;
        assert_eq!(result.output, "Error: Unknown tool 'shell'");

        // memory search without a backend is not registered
        let result = exec
            .execute(&request("search_memory", r#"{"query":"Peru"}"#), &context(&sink), &mut ledger)
            .await;
        assert_eq!(result.status, ToolStatus::Error);
    }

    #[tokio::test]
    async fn read_records_sources() {
        let sink = RecordingSink::new();
        let exec = executor(StubWiki::new().with_page("Machu Picchu", "An Inca citadel."), None);
        let mut ledger = ResearchLedger::default();

        exec.execute(&request("read_page", r#"{"title":"Machu Picchu"}"#), &context(&sink), &mut ledger)
            .await;
        assert_eq!(ledger.sources.len(), 1);
        assert_eq!(
            sink.progress_events(),
            vec![ProgressEvent::Reading {
                title: "Machu Picchu".into(),
                url: "https://en.wikipedia.org/wiki/Machu_Picchu".into()
            }]
        );
    }

    #[tokio::test]
    async fn failed_page_is_not_fetched_twice() {
        let sink = RecordingSink::new();
        let wiki = StubWiki::new();
        let reads = wiki.page_reads();
        let exec = executor(wiki, None);
        let mut ledger = ResearchLedger::default();
        let req = request("read_page", r#"{"title":"Atlantis City"}"#);

        let first = exec.execute(&req, &context(&sink), &mut ledger).await;
        assert_eq!(first.output, "Page 'Atlantis City' not found.");
        let second = exec.execute(&req, &context(&sink), &mut ledger).await;
        assert_eq!(second.output, "Already tried 'Atlantis City'.");
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(sink
            .progress_events()
            .contains(&ProgressEvent::SkippedDuplicate { title: "Atlantis City".into() }));
    }

    #[tokio::test]
    async fn memory_search_is_scoped_to_sender() {
        let backend = InMemoryBackend::new();
        backend
            .store(MemoryEntry::new("User: Peru capital?\n\nAssistant: Lima.", Some("user-42".into())))
            .await
            .unwrap();
        backend
            .store(MemoryEntry::new("User: Peru president?", Some("someone-else".into())))
            .await
            .unwrap();
        let memory: Arc<dyn MemoryBackend> = Arc::new(backend);

        let sink = RecordingSink::new();
        let exec = executor(StubWiki::new(), Some(memory));
        let mut ledger = ResearchLedger::default();
        // a scope supplied by the model is overwritten
        let req = request("search_memory", r#"{"query":"Peru","scope":"someone-else"}"#);
        let result = exec.execute(&req, &context(&sink), &mut ledger).await;

        assert!(result.is_success());
        assert!(result.output.contains("Lima"));
        assert!(!result.output.contains("president"));
    }

    #[tokio::test]
    async fn long_results_are_capped() {
        let sink = RecordingSink::new();
        let wiki = StubWiki::new().with_page("Peru", &"Peru. ".repeat(2000));
        let registry = research_registry(
            Arc::new(wiki),
            None,
            ToolSettings {
                read_char_cap: 50_000,
                ..ToolSettings::default()
            },
        );
        let exec = ToolExecutor::new(Arc::new(registry)).with_result_cap(500);
        let mut ledger = ResearchLedger::default();
        let result = exec
            .execute(&request("read_page", r#"{"title":"Peru"}"#), &context(&sink), &mut ledger)
            .await;
        assert_eq!(result.output.chars().count(), 500);
        assert!(result.output.ends_with(TRUNCATION_MARKER));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tools_time_out() {
        let sink = RecordingSink::new();
        let wiki = StubWiki::new().with_delay(Duration::from_secs(60));
        let exec = executor(wiki, None).with_timeout(Duration::from_secs(20));
        let mut ledger = ResearchLedger::default();
        let result = exec
            .execute(&request("search", r#"{"query":"Lima"}"#), &context(&sink), &mut ledger)
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert_eq!(result.output, "Error: Tool timed out: search after 20s");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_tools() {
        let sink = RecordingSink::new();
        let ctx = context(&sink);
        let wiki = StubWiki::new().with_delay(Duration::from_secs(5));
        let exec = executor(wiki, None);
        let mut ledger = ResearchLedger::default();
        ctx.cancel.cancel();
        let result = exec.execute(&request("search", r#"{"query":"Lima"}"#), &ctx, &mut ledger).await;
        assert_eq!(result.output, "Error: request cancelled");
    }
}
