//! Sources consulted during a loop and the bibliography appended to answers.

/// One consulted article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// Ordered, de-duplicated list of sources.
#[derive(Debug, Clone, Default)]
pub struct SourceList {
    sources: Vec<Source>,
}

impl SourceList {
    /// Add a source unless its URL is already listed.
    pub fn add(&mut self, title: &str, url: &str) {
        if self.sources.iter().any(|s| s.url == url) {
            return;
        }
        self.sources.push(Source {
            title: title.trim().to_string(),
            url: url.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    /// Numbered markdown bibliography, or an empty string with no sources.
    pub fn bibliography(&self) -> String {
        if self.sources.is_empty() {
            return String::new();
        }
        let lines: Vec<String> = self
            .sources
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. [{}]({})", i + 1, s.title, s.url))
            .collect();
        format!("📚 **Sources**\n{}", lines.join("\n"))
    }

    /// `answer` with the bibliography appended.
    pub fn append_to(&self, answer: &str) -> String {
        if self.sources.is_empty() {
            answer.to_string()
        } else {
            format!("{}\n\n{}", answer.trim_end(), self.bibliography())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bibliography_is_numbered_and_deduplicated() {
        let mut sources = SourceList::default();
        sources.add("Lima", "https://en.wikipedia.org/wiki/Lima");
        sources.add("Peru", "https://en.wikipedia.org/wiki/Peru");
        sources.add("Lima", "https://en.wikipedia.org/wiki/Lima");

        assert_eq!(
            sources.bibliography(),
            "📚 **Sources**\n1. [Lima](https://en.wikipedia.org/wiki/Lima)\n2. [Peru](https://en.wikipedia.org/wiki/Peru)"
        );
    }

    #[test]
    fn no_sources_leaves_answer_untouched() {
        let sources = SourceList::default();
        assert_eq!(sources.append_to("Hello!"), "Hello!");
        assert!(sources.bibliography().is_empty());
    }
}
