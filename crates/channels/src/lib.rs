//! Chat surfaces for AskLab.
//!
//! A surface has two halves: a [`Channel`](asklab_core::Channel) that
//! yields questions and a [`ChatSink`](asklab_core::ChatSink) the research
//! loop writes to.
//!
//! Available surfaces:
//! - **CLI**: interactive terminal chat (stdin/stdout)

pub mod cli;
pub mod console;

pub use cli::{ChatCommand, CliChannel};
pub use console::ConsoleSink;
