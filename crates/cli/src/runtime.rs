//! Wiring from configuration to a ready research loop.

use std::sync::Arc;
use std::time::Duration;

use asklab_agent::{LoopSettings, ResearchLoop, ToolExecutor};
use asklab_config::{AppConfig, MemoryBackendKind, SessionBackendKind};
use asklab_core::event::{DomainEvent, EventBus};
use asklab_core::memory::MemoryBackend;
use asklab_core::provider::Provider;
use asklab_core::session::SessionStore;
use asklab_memory::{FileSessionStore, InMemoryBackend, InMemorySessionStore, SupermemoryBackend};
use asklab_providers::{OpenAiCompatProvider, RetryProvider};
use asklab_tools::{ToolSettings, WikipediaClient, research_registry};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct Runtime {
    pub research: ResearchLoop,
    pub tool_names: Vec<String>,
}

impl Runtime {
    pub fn build(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let api_key = config.api_key.clone().ok_or("No API key configured")?;
        let http: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::new(
            provider_name(&config.api_url),
            config.api_url.clone(),
            api_key,
        ));
        let provider = Arc::new(
            RetryProvider::new(http, config.agent.model_retries)
                .with_delay(Duration::from_millis(config.agent.model_retry_delay_ms))
                .with_timeout(Duration::from_secs(config.agent.model_timeout_secs)),
        );

        let wiki = Arc::new(
            WikipediaClient::new(&config.wikipedia.base_url, config.wikipedia.user_agent.clone()).with_retries(
                config.wikipedia.retries,
                Duration::from_millis(config.wikipedia.retry_delay_ms),
            ),
        );

        let memory: Option<Arc<dyn MemoryBackend>> = match config.memory.backend {
            MemoryBackendKind::None => None,
            MemoryBackendKind::InMemory => Some(Arc::new(InMemoryBackend::new())),
            MemoryBackendKind::Supermemory => {
                let key = config
                    .memory
                    .api_key
                    .clone()
                    .ok_or("memory.backend = \"supermemory\" needs an API key")?;
                Some(Arc::new(SupermemoryBackend::new(config.memory.base_url.clone(), key)))
            }
        };

        let sessions = session_store(config);

        let tool_settings = ToolSettings {
            max_results: config.wikipedia.max_results,
            read_char_cap: config.wikipedia.read_char_cap,
            recall_limit: config.memory.recall_limit,
        };
        let registry = research_registry(wiki, memory.clone(), tool_settings);
        let tool_names = registry.names().into_iter().map(String::from).collect();

        let event_bus = Arc::new(EventBus::default());
        log_events(&event_bus);

        let executor = ToolExecutor::new(Arc::new(registry))
            .with_timeout(Duration::from_secs(config.agent.tool_timeout_secs))
            .with_result_cap(config.context.tool_result_cap)
            .with_event_bus(event_bus.clone());

        let mut research = ResearchLoop::new(provider, executor, sessions, LoopSettings::from_config(config))
            .with_event_bus(event_bus);
        if let Some(memory) = memory {
            research = research.with_memory(memory);
        }

        Ok(Self { research, tool_names })
    }
}

/// The session store named by `[session]`.
pub fn session_store(config: &AppConfig) -> Arc<dyn SessionStore> {
    match config.session.backend {
        SessionBackendKind::Memory => Arc::new(
            InMemorySessionStore::new(config.agent.history_turns)
                .with_max_conversations(config.session.max_conversations),
        ),
        SessionBackendKind::File => Arc::new(FileSessionStore::new(
            config.sessions_dir(),
            config.agent.history_turns,
        )),
    }
}

fn provider_name(api_url: &str) -> &'static str {
    if api_url.contains("groq.com") {
        "groq"
    } else if api_url.contains("openai.com") {
        "openai"
    } else if api_url.contains(":11434") {
        "ollama"
    } else {
        "openai_compat"
    }
}

/// Mirror domain events into the debug log.
fn log_events(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event.as_ref() {
                    DomainEvent::StuckLoopDetected { reason, iteration, .. } => {
                        debug!(%reason, iteration, "event: stuck loop")
                    }
                    DomainEvent::ToolExecuted {
                        tool_name,
                        success,
                        duration_ms,
                        ..
                    } => debug!(tool = %tool_name, success, duration_ms, "event: tool executed"),
                    other => debug!(event = ?other, "event"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Cancel `token` on the first Ctrl+C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_follow_the_endpoint() {
        assert_eq!(provider_name("https://api.groq.com/openai/v1"), "groq");
        assert_eq!(provider_name("https://api.openai.com/v1"), "openai");
        assert_eq!(provider_name("http://localhost:11434/v1"), "ollama");
        assert_eq!(provider_name("https://llm.internal/v1"), "openai_compat");
    }

    #[tokio::test]
    async fn build_requires_an_api_key() {
        let config = AppConfig::default();
        assert!(Runtime::build(&config).is_err());
    }

    #[tokio::test]
    async fn memory_backend_adds_the_memory_tool() {
        let mut config = AppConfig::default();
        config.api_key = Some("test-key".into());
        assert_eq!(Runtime::build(&config).unwrap().tool_names, vec!["read_page", "search"]);

        config.memory.backend = MemoryBackendKind::InMemory;
        let runtime = Runtime::build(&config).unwrap();
        assert_eq!(runtime.tool_names, vec!["read_page", "search", "search_memory"]);
    }
}
