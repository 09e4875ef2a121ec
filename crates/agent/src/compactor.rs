//! Context compaction: the view of the transcript sent to the model.
//!
//! The loop's transcript is append-only; before every model call it is
//! compacted into a view that fits the model's context. The view is built
//! from *units*:
//!
//! | Unit       | Turns                                             |
//! |------------|---------------------------------------------------|
//! | system     | the leading system prompt                         |
//! | history    | one prior-conversation turn                       |
//! | user       | the question (last non-synthetic user turn)       |
//! | exchange   | an assistant turn with tool calls + its results   |
//! | reasoning  | an assistant turn without tool calls              |
//! | correction | a synthetic instruction from the loop             |
//!
//! Exchanges are kept or dropped whole, so every tool result in the view
//! still follows the request it answers.
//!
//! How much survives depends on the [`TrimLevel`] for the iteration. After
//! selection a size fallback drops and truncates until the view fits the
//! character budget. Compactor notes carry no state beyond the iteration,
//! so compacting a compacted view again at the same iteration changes
//! nothing.

use asklab_core::text::{TRUNCATION_MARKER, truncate_with_marker};
use asklab_core::turn::{Role, Turn};
use tracing::debug;

use crate::profile::TrimBands;
use crate::size::serialized_len;

/// Synthetic kind of compactor notes.
pub const COMPACTOR_NOTE: &str = "compactor_note";

/// Synthetic kind of loop corrections.
pub const CORRECTION: &str = "correction";

/// Smallest budget the compactor accepts.
pub const MIN_BUDGET: usize = 512;

/// Characters a tool result, the question or the system prompt keep
/// before the fallback cuts into anything else.
const SHRINK_FLOOR: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrimLevel {
    None,
    Light,
    Moderate,
    Aggressive,
    Emergency,
}

impl TrimLevel {
    pub fn for_iteration(iteration: u32, bands: &TrimBands) -> Self {
        if iteration >= bands.emergency {
            Self::Emergency
        } else if iteration >= bands.aggressive {
            Self::Aggressive
        } else if iteration >= bands.moderate {
            Self::Moderate
        } else if iteration >= bands.light {
            Self::Light
        } else {
            Self::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
            Self::Emergency => "emergency",
        }
    }

    /// How many units of each kind survive; `None` keeps all.
    fn retention(&self) -> Retention {
        match self {
            Self::None => Retention {
                history: None,
                reasoning: None,
                corrections: None,
                exchanges: None,
            },
            Self::Light => Retention {
                history: None,
                reasoning: Some(3),
                corrections: Some(1),
                exchanges: None,
            },
            Self::Moderate => Retention {
                history: Some(2),
                reasoning: Some(2),
                corrections: Some(1),
                exchanges: None,
            },
            Self::Aggressive => Retention {
                history: Some(0),
                reasoning: Some(0),
                corrections: Some(1),
                exchanges: None,
            },
            Self::Emergency => Retention {
                history: Some(0),
                reasoning: Some(0),
                corrections: Some(0),
                exchanges: Some(2),
            },
        }
    }
}

impl std::fmt::Display for TrimLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Retention {
    history: Option<usize>,
    reasoning: Option<usize>,
    corrections: Option<usize>,
    exchanges: Option<usize>,
}

/// A compacted view of the transcript.
#[derive(Debug, Clone)]
pub struct Compaction {
    pub turns: Vec<Turn>,
    pub level: TrimLevel,
    /// Transcript turns left out of the view (notes not counted)
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitKind {
    System,
    History,
    User,
    Exchange,
    Reasoning,
    Correction,
    Note,
}

impl UnitKind {
    fn is_work(&self) -> bool {
        matches!(self, Self::Exchange | Self::Reasoning | Self::Correction)
    }
}

#[derive(Debug, Clone)]
struct Unit {
    kind: UnitKind,
    turns: Vec<Turn>,
}

impl Unit {
    fn new(kind: UnitKind, turns: Vec<Turn>) -> Self {
        Self { kind, turns }
    }
}

fn total_len(units: &[Unit]) -> usize {
    units.iter().map(|u| serialized_len(&u.turns)).sum()
}

/// Split a transcript into units, returning old compactor notes separately.
fn parse(turns: &[Turn]) -> (Vec<Unit>, Vec<Turn>) {
    let (notes, body): (Vec<&Turn>, Vec<&Turn>) = turns
        .iter()
        .partition(|t| t.synthetic_kind() == Some(COMPACTOR_NOTE));

    let mut units = Vec::new();
    let mut rest = body.as_slice();

    if let Some(first) = rest.first() {
        if first.role == Role::System {
            units.push(Unit::new(UnitKind::System, vec![(*first).clone()]));
            rest = &rest[1..];
        }
    }

    let work = match rest.iter().rposition(|t| t.role == Role::User && !t.is_synthetic()) {
        Some(idx) => {
            for turn in &rest[..idx] {
                units.push(Unit::new(UnitKind::History, vec![(*turn).clone()]));
            }
            units.push(Unit::new(UnitKind::User, vec![rest[idx].clone()]));
            &rest[idx + 1..]
        }
        None => rest,
    };

    let mut i = 0;
    while i < work.len() {
        let turn = work[i];
        if turn.has_tool_calls() {
            let mut group = vec![turn.clone()];
            i += 1;
            while i < work.len() && work[i].role == Role::Tool {
                group.push(work[i].clone());
                i += 1;
            }
            units.push(Unit::new(UnitKind::Exchange, group));
            continue;
        }

        let kind = if turn.is_synthetic() {
            UnitKind::Correction
        } else if turn.role == Role::Tool {
            UnitKind::Exchange
        } else {
            UnitKind::Reasoning
        };
        units.push(Unit::new(kind, vec![turn.clone()]));
        i += 1;
    }

    (units, notes.into_iter().cloned().collect())
}

/// Keep the most recent `keep` units of `kind` (all when `keep` is `None`).
fn retain_recent(units: &mut Vec<Unit>, kind: UnitKind, keep: Option<usize>) {
    let Some(keep) = keep else {
        return;
    };
    let total = units.iter().filter(|u| u.kind == kind).count();
    let mut skip = total.saturating_sub(keep);
    units.retain(|u| {
        if u.kind == kind && skip > 0 {
            skip -= 1;
            return false;
        }
        true
    });
}

/// Cut the largest content among `eligible` turns toward `floor` until the
/// view fits or nothing is left to cut.
fn shrink(units: &mut [Unit], budget: usize, floor: usize, eligible: impl Fn(UnitKind, &Turn) -> bool) {
    loop {
        let total = total_len(units);
        if total <= budget {
            return;
        }
        let excess = total - budget;

        let largest = units
            .iter_mut()
            .flat_map(|u| {
                let kind = u.kind;
                u.turns.iter_mut().map(move |t| (kind, t))
            })
            .filter(|(kind, t)| eligible(*kind, t) && t.content.chars().count() > floor)
            .max_by_key(|(_, t)| t.content.chars().count());

        let Some((_, turn)) = largest else {
            return;
        };
        let len = turn.content.chars().count();
        let cap = len.saturating_sub(excess).max(floor);
        turn.content = truncate_with_marker(&turn.content, cap, TRUNCATION_MARKER);
    }
}

/// Builds the model-facing view of a transcript.
#[derive(Debug, Clone)]
pub struct ContextCompactor {
    bands: TrimBands,
    tool_result_cap: usize,
    max_iterations: u32,
}

impl ContextCompactor {
    pub fn new(bands: TrimBands, tool_result_cap: usize, max_iterations: u32) -> Self {
        Self {
            bands,
            tool_result_cap,
            max_iterations,
        }
    }

    pub fn level_for(&self, iteration: u32) -> TrimLevel {
        TrimLevel::for_iteration(iteration, &self.bands)
    }

    /// Compact at the trim level of `iteration`.
    pub fn compact(&self, turns: &[Turn], iteration: u32, budget: usize) -> Compaction {
        self.compact_at(turns, iteration, budget, self.level_for(iteration))
    }

    /// Compact at an explicit trim level.
    pub fn compact_at(&self, turns: &[Turn], iteration: u32, budget: usize, level: TrimLevel) -> Compaction {
        let budget = budget.max(MIN_BUDGET);
        let (mut units, old_notes) = parse(turns);
        let input_turns: usize = units.iter().map(|u| u.turns.len()).sum();

        let retention = level.retention();
        retain_recent(&mut units, UnitKind::History, retention.history);
        retain_recent(&mut units, UnitKind::Reasoning, retention.reasoning);
        retain_recent(&mut units, UnitKind::Correction, retention.corrections);
        retain_recent(&mut units, UnitKind::Exchange, retention.exchanges);

        for turn in units.iter_mut().flat_map(|u| u.turns.iter_mut()) {
            if turn.role == Role::Tool {
                turn.content = truncate_with_marker(&turn.content, self.tool_result_cap, TRUNCATION_MARKER);
            }
        }

        if let Some(text) = self.note_text(level, iteration) {
            // reuse an identical note so repeated compaction is a no-op
            let note = old_notes
                .into_iter()
                .find(|n| n.content == text)
                .unwrap_or_else(|| Turn::synthetic(COMPACTOR_NOTE, text));
            units.push(Unit::new(UnitKind::Note, vec![note]));
        }

        self.fit_budget(&mut units, budget);

        let turns: Vec<Turn> = units.into_iter().flat_map(|u| u.turns).collect();
        let kept = turns.iter().filter(|t| t.synthetic_kind() != Some(COMPACTOR_NOTE)).count();
        let dropped = input_turns.saturating_sub(kept);

        if dropped > 0 {
            debug!(level = %level, dropped, size = serialized_len(&turns), budget, "Context compacted");
        }

        Compaction { turns, level, dropped }
    }

    /// Drop, then truncate, until the view fits `budget`.
    fn fit_budget(&self, units: &mut Vec<Unit>, budget: usize) {
        // oldest history first, then working units except the most recent one
        while total_len(units) > budget {
            let last_work = units.iter().rposition(|u| u.kind.is_work());
            let victim = units
                .iter()
                .position(|u| u.kind == UnitKind::History)
                .or_else(|| (0..units.len()).find(|&i| units[i].kind.is_work() && Some(i) != last_work));
            match victim {
                Some(idx) => {
                    units.remove(idx);
                }
                None => break,
            }
        }

        shrink(units, budget, SHRINK_FLOOR, |_, t| t.role == Role::Tool);
        shrink(units, budget, SHRINK_FLOOR, |kind, _| kind == UnitKind::User);
        shrink(units, budget, SHRINK_FLOOR, |kind, _| kind == UnitKind::System);
        shrink(units, budget, 0, |kind, _| kind != UnitKind::Note);

        // tool-call payloads cannot be cut; give up the last working unit
        // and then the note
        while total_len(units) > budget {
            match units.iter().rposition(|u| u.kind.is_work() || u.kind == UnitKind::Note) {
                Some(idx) => {
                    units.remove(idx);
                }
                None => break,
            }
        }
    }

    fn note_text(&self, level: TrimLevel, iteration: u32) -> Option<String> {
        let remaining = self.max_iterations.saturating_sub(iteration);
        match level {
            TrimLevel::None => None,
            TrimLevel::Light | TrimLevel::Moderate => Some(format!(
                "Context note: older reasoning was trimmed to save space. This is iteration {iteration} of {}. \
                 Build on the tool results above and do not repeat earlier searches.",
                self.max_iterations
            )),
            TrimLevel::Aggressive => Some(format!(
                "URGENT: only {remaining} iteration(s) remain. Stop researching soon and write your final \
                 answer from the tool results above, with citations."
            )),
            TrimLevel::Emergency => Some(
                "EMERGENCY: the context limit is reached. Write your final answer NOW using only the \
                 information above. Do not call any more tools."
                    .to_string(),
            ),
        }
    }
}
