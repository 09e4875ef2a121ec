//! Per-loop state: counters the stuck detector reads and the research
//! ledger the executor writes.

use std::collections::HashSet;

use crate::citations::SourceList;
use crate::compactor::TrimLevel;
use crate::thought::{Theme, ThoughtRecord, ThoughtTracker};

/// Where a research loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    AwaitingModel,
    DispatchingTools,
    Finalized,
    Aborted,
    Failed,
    Cancelled,
}

/// Mutable state of one research loop. Private to that loop.
#[derive(Debug)]
pub struct OrchestrationState {
    pub iteration: u32,
    pub max_iterations: u32,
    pub phase: LoopPhase,
    pub thoughts: ThoughtTracker,
    /// Tool results appended so far
    pub tool_results: usize,
    /// Tool results at the last progress check
    pub progress_baseline: usize,
    pub iterations_since_progress: u32,
    /// Stuck corrections issued so far
    pub corrections: u32,
    pub last_trim: TrimLevel,
    pub ledger: ResearchLedger,
}

impl OrchestrationState {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            phase: LoopPhase::AwaitingModel,
            thoughts: ThoughtTracker::new(),
            tool_results: 0,
            progress_baseline: 0,
            iterations_since_progress: 0,
            corrections: 0,
            last_trim: TrimLevel::None,
            ledger: ResearchLedger::default(),
        }
    }

    pub fn remaining_iterations(&self) -> u32 {
        self.max_iterations.saturating_sub(self.iteration)
    }

    pub fn record_thought(&mut self, content: &str, has_tool_calls: bool) -> Option<ThoughtRecord> {
        self.thoughts.record(content, has_tool_calls, self.iteration)
    }

    pub fn record_tool_result(&mut self) {
        self.tool_results += 1;
        self.thoughts.tool_result_received();
    }

    pub fn themes(&self) -> Vec<Theme> {
        self.thoughts.themes()
    }

    pub fn thoughts_without_tools(&self) -> u32 {
        self.thoughts.thoughts_without_tools()
    }
}

/// What the loop has read so far.
#[derive(Debug, Default)]
pub struct ResearchLedger {
    /// Lowercased titles whose fetch failed
    failed_pages: HashSet<String>,
    /// Lowercased titles read successfully
    pages_read: HashSet<String>,
    pub sources: SourceList,
}

impl ResearchLedger {
    pub fn already_failed(&self, title: &str) -> bool {
        self.failed_pages.contains(&title.trim().to_lowercase())
    }

    pub fn mark_failed(&mut self, title: &str) {
        self.failed_pages.insert(title.trim().to_lowercase());
    }

    pub fn mark_read(&mut self, title: &str, url: &str) {
        self.pages_read.insert(title.trim().to_lowercase());
        self.sources.add(title, url);
    }

    /// Distinct pages read successfully.
    pub fn pages_read(&self) -> usize {
        self.pages_read.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_counts_distinct_pages() {
        let mut ledger = ResearchLedger::default();
        ledger.mark_read("Lima", "https://en.wikipedia.org/wiki/Lima");
        ledger.mark_read("lima ", "https://en.wikipedia.org/wiki/Lima");
        ledger.mark_read("Peru", "https://en.wikipedia.org/wiki/Peru");
        assert_eq!(ledger.pages_read(), 2);
        assert_eq!(ledger.sources.len(), 2);
    }

    #[test]
    fn failed_pages_match_case_insensitively() {
        let mut ledger = ResearchLedger::default();
        ledger.mark_failed("Atlantis City");
        assert!(ledger.already_failed("atlantis city"));
        assert!(!ledger.already_failed("Atlantis"));
    }

    #[test]
    fn tool_results_reset_thought_counter() {
        let mut state = OrchestrationState::new(15);
        state.iteration = 1;
        state.record_thought("thinking it through", false);
        assert_eq!(state.thoughts_without_tools(), 1);
        state.record_tool_result();
        assert_eq!(state.thoughts_without_tools(), 0);
        assert_eq!(state.tool_results, 1);
        assert_eq!(state.remaining_iterations(), 14);
    }
}
