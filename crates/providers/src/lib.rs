//! Chat model provider implementations for AskLab.
//!
//! All providers implement the `asklab_core::Provider` trait. The research
//! loop talks to an [`OpenAiCompatProvider`] wrapped in a [`RetryProvider`].

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;
