//! Configuration loading, validation, and management for AskLab.
//!
//! Loads configuration from `~/.asklab/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.asklab/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Groq (or other OpenAI-compatible) API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the chat completions API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub wikipedia: WikipediaConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

fn default_api_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2-instruct-0905".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1500
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("context", &self.context)
            .field("wikipedia", &self.wikipedia)
            .field("memory", &self.memory)
            .field("session", &self.session)
            .finish()
    }
}

/// Which tuning profile the research loop runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSetting {
    /// Derive from the model name
    #[default]
    Auto,
    Standard,
    /// Smaller models that need earlier trimming and firmer nudges
    Constrained,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on model calls per question
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Prior turns of the conversation replayed to the model
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Distinct pages a research question must read before answering
    #[serde(default = "default_min_pages")]
    pub min_pages: usize,

    #[serde(default)]
    pub profile: ProfileSetting,

    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Attempts per model call, including the first
    #[serde(default = "default_model_retries")]
    pub model_retries: u32,

    #[serde(default = "default_model_retry_delay_ms")]
    pub model_retry_delay_ms: u64,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_max_iterations() -> u32 {
    15
}
fn default_history_turns() -> usize {
    6
}
fn default_min_pages() -> usize {
    2
}
fn default_model_timeout_secs() -> u64 {
    60
}
fn default_model_retries() -> u32 {
    3
}
fn default_model_retry_delay_ms() -> u64 {
    1000
}
fn default_tool_timeout_secs() -> u64 {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_turns: default_history_turns(),
            min_pages: default_min_pages(),
            profile: ProfileSetting::default(),
            model_timeout_secs: default_model_timeout_secs(),
            model_retries: default_model_retries(),
            model_retry_delay_ms: default_model_retry_delay_ms(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Hard ceiling on the serialized transcript sent to the model, in chars
    #[serde(default = "default_char_budget")]
    pub char_budget: usize,

    /// Longest single tool result kept verbatim, in chars
    #[serde(default = "default_tool_result_cap")]
    pub tool_result_cap: usize,
}

fn default_char_budget() -> usize {
    24_000
}
fn default_tool_result_cap() -> usize {
    1800
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            char_budget: default_char_budget(),
            tool_result_cap: default_tool_result_cap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaConfig {
    #[serde(default = "default_wikipedia_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Page extracts are cut at this many chars
    #[serde(default = "default_read_char_cap")]
    pub read_char_cap: usize,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_wiki_retries")]
    pub retries: u32,

    /// Base delay; attempt `n` waits `n * retry_delay_ms`
    #[serde(default = "default_wiki_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_wikipedia_url() -> String {
    "https://en.wikipedia.org".into()
}
fn default_user_agent() -> String {
    "AskLab-AI-Bot/1.0".into()
}
fn default_read_char_cap() -> usize {
    3000
}
fn default_max_results() -> usize {
    5
}
fn default_wiki_retries() -> u32 {
    3
}
fn default_wiki_retry_delay_ms() -> u64 {
    1000
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            base_url: default_wikipedia_url(),
            user_agent: default_user_agent(),
            read_char_cap: default_read_char_cap(),
            max_results: default_max_results(),
            retries: default_wiki_retries(),
            retry_delay_ms: default_wiki_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackendKind {
    #[default]
    None,
    InMemory,
    Supermemory,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub backend: MemoryBackendKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_memory_url")]
    pub base_url: String,

    /// Past exchanges recalled into the system prompt
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,
}

fn default_memory_url() -> String {
    "https://api.supermemory.ai".into()
}
fn default_recall_limit() -> usize {
    3
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackendKind::default(),
            api_key: None,
            base_url: default_memory_url(),
            recall_limit: default_recall_limit(),
        }
    }
}

impl std::fmt::Debug for MemoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConfig")
            .field("backend", &self.backend)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("recall_limit", &self.recall_limit)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackendKind,

    /// Directory for the file backend (defaults to `~/.asklab/sessions`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Conversations the memory backend holds before evicting the stalest
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
}

fn default_max_conversations() -> usize {
    1000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackendKind::default(),
            path: None,
            max_conversations: default_max_conversations(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location with env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("ASKLAB_API_KEY").or_else(|| lookup("GROQ_API_KEY"));
        }

        if let Some(model) = lookup("GROQ_MODEL") {
            self.model = model;
        }

        if let Some(raw) = lookup("GROQ_TEMPERATURE") {
            match raw.parse::<f32>() {
                Ok(t) => self.temperature = t,
                Err(_) => tracing::warn!(value = %raw, "Ignoring unparsable GROQ_TEMPERATURE"),
            }
        }

        if self.memory.api_key.is_none() {
            self.memory.api_key = lookup("SUPERMEMORY_API_KEY");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".asklab")
    }

    /// Where the file session backend writes when no path is configured.
    pub fn sessions_dir(&self) -> PathBuf {
        self.session
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("sessions"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations < 3 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 3".into(),
            ));
        }

        if self.agent.model_retries == 0 {
            return Err(ConfigError::ValidationError(
                "agent.model_retries must be at least 1".into(),
            ));
        }

        if self.context.char_budget < 512 {
            return Err(ConfigError::ValidationError(
                "context.char_budget must be at least 512".into(),
            ));
        }

        if self.context.tool_result_cap < 64 {
            return Err(ConfigError::ValidationError(
                "context.tool_result_cap must be at least 64".into(),
            ));
        }

        if self.session.max_conversations == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_conversations must be at least 1".into(),
            ));
        }

        if self.memory.backend == MemoryBackendKind::Supermemory && self.memory.api_key.is_none() {
            return Err(ConfigError::ValidationError(
                "memory.backend = \"supermemory\" requires memory.api_key or SUPERMEMORY_API_KEY".into(),
            ));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            context: ContextConfig::default(),
            wikipedia: WikipediaConfig::default(),
            memory: MemoryConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
