//! Reasoning extraction, theme classification and answer scrubbing.
//!
//! Models wrap their reasoning in `<think>` or `<thinking>` blocks. The
//! grammar is deliberately small:
//!
//! - markers are matched case-insensitively and do not nest;
//! - when several complete blocks exist, the last one wins;
//! - an opening marker without a closing one runs to the end of the text.
//!
//! [`scrub`] applies the same grammar to remove reasoning from a candidate
//! answer, together with the other leftovers models tend to leak.

use regex_lite::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

use asklab_core::text::prefix_chars;

/// Characters of reasoning kept per thought record.
pub const THOUGHT_CAP: usize = 200;

/// Themes kept in the sliding window.
pub const THEME_WINDOW: usize = 3;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think(?:ing)?>(.*?)</think(?:ing)?>").unwrap());

static THINK_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<think(?:ing)?>").unwrap());

static BOLD_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*[^*]+\*\*").unwrap());

/// Scrub rules applied in order by [`scrub`].
const SCRUB_RULES: &[(&str, &str)] = &[
    // reasoning blocks, then an unterminated opening marker
    (r"(?is)<think(?:ing)?>.*?</think(?:ing)?>", ""),
    (r"(?is)<think(?:ing)?>.*", ""),
    // tool-call markup the model wrote as text instead of calling
    (r"(?is)<function_calls?>.*?</function_calls?>", ""),
    (r"(?is)<function=.*?</function>", ""),
    (r"(?is)<invoke.*?</invoke>", ""),
    (r"(?is)<result>.*?</result>", ""),
    (r"(?is)<parameter.*?</parameter>", ""),
    (r"(?i)\n\n(?:search|read_page|search_memory|search_wikipedia|get_wikipedia_page)\([^)]*\)", ""),
    // imitations of loop instructions
    (r"\[SYSTEM:[^\]]*\]", ""),
    // a bibliography the model wrote itself; the loop appends the real one
    (r"(?s)📚\s*\*\*Sources\*\*.*", ""),
    (r"(?i)</?answer>", ""),
    (r"\n{3,}", "\n\n"),
];

static SCRUB_TABLE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SCRUB_RULES
        .iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), *replacement))
        .collect()
});

/// The reasoning segment of a model turn, if any.
pub fn extract_reasoning(text: &str) -> Option<String> {
    if let Some(last) = THINK_BLOCK.captures_iter(text).last() {
        let inner = last.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        return (!inner.is_empty()).then(|| inner.to_string());
    }
    let open = THINK_OPEN.find_iter(text).last()?;
    let rest = text[open.end()..].trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

/// Reasoning for a turn that made no tool call: the marked segment, or the
/// whole trimmed content when the model used no markers.
pub fn reasoning_or_content(text: &str) -> Option<String> {
    extract_reasoning(text).or_else(|| {
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Strip reasoning and leaked markup from a candidate answer.
pub fn scrub(text: &str) -> String {
    let mut out = text.to_string();
    for (rule, replacement) in SCRUB_TABLE.iter() {
        out = rule.replace_all(&out, *replacement).into_owned();
    }
    out.trim().to_string()
}

/// Recover an answer the model wrote inside its reasoning, after a
/// `**Synthesizing**`-style header.
pub fn recover_synthesis(reasoning: &str) -> Option<String> {
    let idx = reasoning.find("**Synthesiz")?;
    // skip past the rest of the header itself
    let after = &reasoning[idx + 2..];
    let after = after.find("**").map(|end| &after[end + 2..]).unwrap_or(after);
    let answer = BOLD_HEADER.replace_all(after, "");
    let answer = answer.trim();
    (!answer.is_empty()).then(|| answer.to_string())
}

/// Lowercase and collapse runs of whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// What a piece of reasoning is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    Planning,
    Synthesis,
    SearchIntent,
    ReadIntent,
    General,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Synthesis => "synthesis",
            Self::SearchIntent => "search_intent",
            Self::ReadIntent => "read_intent",
            Self::General => "general",
        }
    }

    /// Themes that indicate the model is circling instead of acting.
    pub fn is_loop_prone(&self) -> bool {
        matches!(self, Self::Planning | Self::SearchIntent)
    }
}

const THEME_KEYWORDS: &[(Theme, &[&str])] = &[
    (Theme::Planning, &["plan", "strategy", "approach", "need to"]),
    (Theme::Synthesis, &["synthesiz", "combin", "overall", "summary"]),
    (Theme::SearchIntent, &["search", "find", "look for"]),
    (Theme::ReadIntent, &["read", "article", "page"]),
];

/// Classify reasoning text. The first matching theme in priority order wins.
pub fn classify(text: &str) -> Theme {
    let normalized = normalize(text);
    THEME_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| normalized.contains(k)))
        .map(|(theme, _)| *theme)
        .unwrap_or(Theme::General)
}

/// One observed piece of reasoning.
#[derive(Debug, Clone, PartialEq)]
pub struct ThoughtRecord {
    /// Reasoning text, capped at [`THOUGHT_CAP`] characters
    pub text: String,
    pub theme: Theme,
    pub iteration: u32,
}

/// Tracks reasoning across turns of one loop.
#[derive(Debug, Default)]
pub struct ThoughtTracker {
    themes: VecDeque<Theme>,
    thoughts_without_tools: u32,
}

impl ThoughtTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one model turn.
    ///
    /// A turn with tool calls resets the counter and the theme window. A
    /// turn without bumps the counter and pushes its theme when it carries
    /// reasoning.
    pub fn record(&mut self, content: &str, has_tool_calls: bool, iteration: u32) -> Option<ThoughtRecord> {
        let reasoning = if has_tool_calls {
            extract_reasoning(content)
        } else {
            reasoning_or_content(content)
        };

        let record = reasoning.map(|text| ThoughtRecord {
            theme: classify(&text),
            text: prefix_chars(&text, THOUGHT_CAP).to_string(),
            iteration,
        });

        if has_tool_calls {
            self.thoughts_without_tools = 0;
            self.themes.clear();
        } else {
            self.thoughts_without_tools += 1;
            if let Some(record) = &record {
                if self.themes.len() == THEME_WINDOW {
                    self.themes.pop_front();
                }
                self.themes.push_back(record.theme);
            }
        }

        record
    }

    /// A tool result arrived; the model is acting again.
    pub fn tool_result_received(&mut self) {
        self.thoughts_without_tools = 0;
    }

    pub fn thoughts_without_tools(&self) -> u32 {
        self.thoughts_without_tools
    }

    /// Window of recent themes, oldest first.
    pub fn themes(&self) -> Vec<Theme> {
        self.themes.iter().copied().collect()
    }
}
