//! # AskLab Core
//!
//! Domain types, traits, and error definitions for the AskLab research
//! assistant. This crate has no HTTP or runtime dependencies beyond tokio's
//! sync primitives; it defines the model every other crate implements against.
//!
//! ## Layout
//!
//! - [`turn`]: the model-facing transcript (`Turn`, `Role`, `ToolCallRequest`)
//! - [`provider`]: the chat-model abstraction
//! - [`tool`]: research tools, their results and the registry
//! - [`memory`]: long-term, per-user memory
//! - [`session`]: rolling per-conversation history
//! - [`channel`]: the request context and the sink answers are written to
//! - [`event`]: domain events for observers
//! - [`text`]: truncation helpers

pub mod error;
pub mod turn;
pub mod provider;
pub mod channel;
pub mod tool;
pub mod memory;
pub mod session;
pub mod event;
pub mod text;

// Re-export key types at crate root for ergonomics
pub use error::{ChannelError, MemoryError, ProviderError, ToolError};
pub use turn::{ConversationId, Role, ToolCallRequest, Turn};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use channel::{Channel, ChatSink, ProgressEvent, RequestContext};
pub use tool::{Tool, ToolCall, ToolName, ToolRegistry, ToolResult, ToolStatus};
pub use memory::{MemoryBackend, MemoryEntry, MemoryQuery};
pub use session::SessionStore;
pub use event::{DomainEvent, EventBus};
