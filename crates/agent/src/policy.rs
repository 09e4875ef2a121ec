//! Research-completeness policy: how many pages a question needs before
//! the loop accepts an answer.

use crate::thought::normalize;

/// What a question requires before it may be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchNeed {
    /// Answer directly, no reading required.
    Conversational,
    /// Read at least `min_pages` distinct pages first.
    Research { min_pages: usize },
}

impl ResearchNeed {
    pub fn min_pages(&self) -> usize {
        match self {
            Self::Conversational => 0,
            Self::Research { min_pages } => *min_pages,
        }
    }
}

pub trait ResearchPolicy: Send + Sync {
    fn assess(&self, question: &str) -> ResearchNeed;
}

const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "yo", "hiya", "good morning", "good afternoon", "good evening",
];

const THANKS: &[&str] = &["thanks", "thank you", "thx", "ty", "cheers", "much appreciated"];

const SMALL_TALK: &[&str] = &[
    "how are you",
    "who are you",
    "what are you",
    "what can you do",
    "what's up",
    "whats up",
    "ok",
    "okay",
    "cool",
    "nice",
    "bye",
    "goodbye",
];

const COMPARISON_MARKERS: &[&str] = &["compare", " vs ", " vs. ", " versus ", "difference between"];

/// Keyword heuristics: greetings, thanks and small talk need no research;
/// comparisons need one page more than the base requirement.
#[derive(Debug, Clone)]
pub struct KeywordResearchPolicy {
    min_pages: usize,
}

impl KeywordResearchPolicy {
    pub fn new(min_pages: usize) -> Self {
        Self { min_pages }
    }

    fn is_conversational(text: &str) -> bool {
        let words: Vec<&str> = text.split(' ').collect();
        let starts_with_phrase = |phrases: &[&str]| {
            phrases.iter().any(|p| text == *p || text.starts_with(&format!("{p} ")))
        };

        if starts_with_phrase(THANKS) && words.len() <= 6 {
            return true;
        }
        if starts_with_phrase(GREETINGS) && words.len() <= 4 {
            return true;
        }
        SMALL_TALK.iter().any(|p| text == *p) || (starts_with_phrase(SMALL_TALK) && words.len() <= 5)
    }
}

impl Default for KeywordResearchPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

impl ResearchPolicy for KeywordResearchPolicy {
    fn assess(&self, question: &str) -> ResearchNeed {
        let text: String = normalize(question)
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '\'' | '.'))
            .collect();
        let text = text.trim_end_matches('.').trim().to_string();

        if text.is_empty() || Self::is_conversational(&text) {
            return ResearchNeed::Conversational;
        }

        let padded = format!(" {text} ");
        let extra = usize::from(COMPARISON_MARKERS.iter().any(|m| padded.contains(m)));
        ResearchNeed::Research {
            min_pages: self.min_pages + extra,
        }
    }
}
