//! Stuck-loop detection.
//!
//! Rules are evaluated in a fixed order and the first match wins, so the
//! same state always yields the same verdict.

use crate::profile::StuckThresholds;
use crate::state::OrchestrationState;

/// Why the loop was judged stuck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckReason {
    /// The last themes are identical planning or search intent.
    ThemeLoop,
    /// Too many turns in a row without a tool call.
    RepeatedPlanning,
    /// No new tool results for several iterations.
    NoProgress,
    /// Late in the loop with enough research gathered.
    SufficientResearch,
}

impl StuckReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThemeLoop => "theme_loop",
            Self::RepeatedPlanning => "repeated_planning",
            Self::NoProgress => "no_progress",
            Self::SufficientResearch => "sufficient_research",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Self::RepeatedPlanning => "Stop planning. Make tool calls NOW or provide your final answer.",
            Self::ThemeLoop => {
                "You are repeating the same reasoning. Take action immediately: call a tool or answer."
            }
            Self::NoProgress => {
                "No new progress for several iterations. Use the tools to gather new facts or give your final answer."
            }
            Self::SufficientResearch => {
                "You have gathered enough research. Stop researching and write your final answer now with citations."
            }
        }
    }
}

impl std::fmt::Display for StuckReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corrective instruction for the `nth` detection (1-based) in a loop.
pub fn correction(reason: StuckReason, nth: u32, remaining_iterations: u32) -> String {
    let instruction = reason.instruction();
    match nth {
        0 | 1 => instruction.to_string(),
        2 => format!("IMPORTANT: {instruction}"),
        _ => format!(
            "FINAL WARNING: {instruction} Only {remaining_iterations} iteration(s) remain."
        ),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StuckDetector {
    thresholds: StuckThresholds,
}

impl StuckDetector {
    pub fn new(thresholds: StuckThresholds) -> Self {
        Self { thresholds }
    }

    /// Update progress bookkeeping, then evaluate the rules.
    pub fn check(&self, state: &mut OrchestrationState) -> Option<StuckReason> {
        let t = &self.thresholds;

        if state.iteration >= t.no_progress_min_iteration && state.tool_results == state.progress_baseline {
            state.iterations_since_progress += 1;
        } else {
            state.iterations_since_progress = 0;
            state.progress_baseline = state.tool_results;
        }

        let themes = state.themes();
        if themes.len() >= 3 {
            let last = &themes[themes.len() - 3..];
            if last.iter().all(|t| *t == last[0]) && last[0].is_loop_prone() {
                return Some(StuckReason::ThemeLoop);
            }
        }

        if state.thoughts_without_tools() >= t.repeated_planning {
            return Some(StuckReason::RepeatedPlanning);
        }

        if state.iterations_since_progress >= t.no_progress {
            return Some(StuckReason::NoProgress);
        }

        if state.iteration > t.high_water_mark && state.tool_results >= t.min_research_results {
            return Some(StuckReason::SufficientResearch);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ModelProfile;

    fn detector() -> StuckDetector {
        StuckDetector::new(ModelProfile::Standard.stuck_thresholds())
    }

    #[test]
    fn three_planning_thoughts_is_theme_loop() {
        let detector = detector();
        let mut state = OrchestrationState::new(15);
        let mut verdicts = Vec::new();
        for i in 1..=3 {
            state.iteration = i;
            state.record_thought("<think>My plan: first I need to outline the approach</think>", false);
            verdicts.push(detector.check(&mut state));
        }
        assert_eq!(verdicts, vec![None, None, Some(StuckReason::ThemeLoop)]);
    }

    #[test]
    fn mixed_thoughts_without_tools_is_repeated_planning() {
        let detector = detector();
        let mut state = OrchestrationState::new(15);
        let thoughts = ["I should plan this", "Let me find the page", "Lima is in Peru"];
        let mut last = None;
        for (i, thought) in thoughts.iter().enumerate() {
            state.iteration = i as u32 + 1;
            state.record_thought(thought, false);
            last = detector.check(&mut state);
        }
        assert_eq!(last, Some(StuckReason::RepeatedPlanning));
    }

    #[test]
    fn synthesis_repeats_are_not_a_theme_loop() {
        let detector = StuckDetector::new(ModelProfile::Constrained.stuck_thresholds());
        let mut state = OrchestrationState::new(15);
        for i in 1..=3 {
            state.iteration = i;
            state.record_thought("Overall the summary is clear", false);
            assert_eq!(detector.check(&mut state), None);
        }
    }

    #[test]
    fn flat_tool_results_is_no_progress_at_eleven() {
        let detector = detector();
        let mut state = OrchestrationState::new(15);
        state.tool_results = 2;
        let mut fired = None;
        for i in 6..=11 {
            state.iteration = i;
            if let Some(reason) = detector.check(&mut state) {
                fired = Some((i, reason));
                break;
            }
        }
        assert_eq!(fired, Some((11, StuckReason::NoProgress)));
    }

    #[test]
    fn new_results_reset_progress() {
        let detector = detector();
        let mut state = OrchestrationState::new(15);
        for i in 6..=9 {
            state.iteration = i;
            detector.check(&mut state);
        }
        assert_eq!(state.iterations_since_progress, 4);
        state.iteration = 10;
        state.record_tool_result();
        assert_eq!(detector.check(&mut state), None);
        assert_eq!(state.iterations_since_progress, 0);
        assert_eq!(state.progress_baseline, 1);
    }

    #[test]
    fn late_with_enough_results_forces_answer() {
        let detector = detector();
        let mut state = OrchestrationState::new(20);
        state.iteration = 13;
        state.tool_results = 4;
        state.progress_baseline = 0;
        assert_eq!(detector.check(&mut state), Some(StuckReason::SufficientResearch));

        let mut early = OrchestrationState::new(20);
        early.iteration = 12;
        early.tool_results = 4;
        assert_eq!(detector.check(&mut early), None);
    }

    #[test]
    fn detection_is_deterministic() {
        let detector = detector();
        let build = || {
            let mut state = OrchestrationState::new(15);
            state.iteration = 2;
            state.record_thought("need to search", false);
            state.record_thought("need to search", false);
            state
        };
        let (mut a, mut b) = (build(), build());
        assert_eq!(detector.check(&mut a), detector.check(&mut b));
    }

    #[test]
    fn corrections_escalate() {
        let first = correction(StuckReason::RepeatedPlanning, 1, 9);
        assert_eq!(first, "Stop planning. Make tool calls NOW or provide your final answer.");
        assert!(correction(StuckReason::NoProgress, 2, 9).starts_with("IMPORTANT: "));
        let last = correction(StuckReason::ThemeLoop, 3, 2);
        assert!(last.starts_with("FINAL WARNING: "));
        assert!(last.contains("Only 2 iteration(s) remain."));
    }
}
