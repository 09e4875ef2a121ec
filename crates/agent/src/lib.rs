//! The research loop: the heart of AskLab.
//!
//! A question is answered by a **Think → Act → Observe** cycle:
//!
//! 1. **Receive** a question (from any chat surface)
//! 2. **Build context** (system prompt + history window + recalled memories)
//! 3. **Send to the model**, after stuck-loop checks and compaction
//! 4. **If tool calls**: execute them, append the results, loop back to step 3
//! 5. **If text**: scrub it, cite the pages read and deliver it in chunks
//!
//! The loop ends when an answer is accepted, the iteration budget runs
//! out, the model fails, or the request is cancelled.

pub mod citations;
pub mod compactor;
pub mod executor;
pub mod orchestrator;
pub mod output;
pub mod policy;
pub mod profile;
pub mod prompt;
pub mod size;
pub mod state;
pub mod stuck;
pub mod thought;

#[cfg(test)]
mod test_helpers;

pub use citations::{Source, SourceList};
pub use compactor::{Compaction, ContextCompactor, TrimLevel};
pub use executor::ToolExecutor;
pub use orchestrator::{LoopOutcome, LoopSettings, LoopStatus, MemoryStatus, ResearchLoop};
pub use output::{CHUNK_LIMIT, chunk_message};
pub use policy::{KeywordResearchPolicy, ResearchNeed, ResearchPolicy};
pub use profile::{ModelProfile, StuckThresholds, TrimBands};
pub use state::{LoopPhase, OrchestrationState, ResearchLedger};
pub use stuck::{StuckDetector, StuckReason};
pub use thought::{Theme, ThoughtRecord, ThoughtTracker};
