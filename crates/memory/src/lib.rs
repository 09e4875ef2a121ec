//! Memory and session storage for AskLab.
//!
//! Long-term memory ([`MemoryBackend`](asklab_core::MemoryBackend)):
//! - [`InMemoryBackend`] for tests and local runs
//! - [`SupermemoryBackend`] for the hosted service
//!
//! Rolling conversation history ([`SessionStore`](asklab_core::SessionStore)):
//! - [`InMemorySessionStore`], bounded per conversation
//! - [`FileSessionStore`], JSON-lines files on disk

pub mod in_memory;
pub mod supermemory;
pub mod session;
pub mod file_session;

pub use in_memory::InMemoryBackend;
pub use supermemory::SupermemoryBackend;
pub use session::InMemorySessionStore;
pub use file_session::FileSessionStore;
