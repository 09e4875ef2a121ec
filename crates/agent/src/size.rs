//! Transcript size accounting.
//!
//! Sizes are counted in characters, not tokens: the budget only needs to be
//! a stable upper bound, and characters are exact where token estimates
//! are not.

use asklab_core::turn::Turn;

/// Per-turn allowance for role names and wire delimiters.
pub const TURN_OVERHEAD: usize = 8;

/// Serialized size of one turn.
pub fn turn_len(turn: &Turn) -> usize {
    let calls: usize = turn
        .tool_calls
        .iter()
        .map(|c| c.id.chars().count() + c.name.chars().count() + c.arguments.chars().count())
        .sum();
    TURN_OVERHEAD + turn.content.chars().count() + calls
}

/// Serialized size of a turn sequence.
pub fn serialized_len(turns: &[Turn]) -> usize {
    turns.iter().map(turn_len).sum()
}
