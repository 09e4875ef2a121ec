//! Splitting long answers for chat surfaces with a message size limit.

/// Largest chunk sent in one message.
pub const CHUNK_LIMIT: usize = 1990;

/// Split `text` into chunks of at most `limit` characters, breaking at the
/// last newline inside the window when there is one.
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        if rest.chars().count() <= limit {
            chunks.push(rest.to_string());
            break;
        }

        let window_end = rest.char_indices().nth(limit).map(|(i, _)| i).unwrap_or(rest.len());
        let window = &rest[..window_end];
        let split = match window.rfind('\n') {
            Some(i) if i > 0 => i,
            _ => window_end,
        };

        let chunk = rest[..split].trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        rest = rest[split..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_message("Lima is the capital.", CHUNK_LIMIT), vec!["Lima is the capital."]);
        assert!(chunk_message("   ", CHUNK_LIMIT).is_empty());
    }

    #[test]
    fn splits_on_newline() {
        let text = format!("{}\n{}", "a".repeat(1500), "b".repeat(1500));
        let chunks = chunk_message(&text, CHUNK_LIMIT);
        assert_eq!(chunks, vec!["a".repeat(1500), "b".repeat(1500)]);
    }

    #[test]
    fn hard_split_without_newline() {
        let text = "x".repeat(4500);
        let chunks = chunk_message(&text, CHUNK_LIMIT);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= CHUNK_LIMIT));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn multibyte_text_stays_within_limit() {
        let text = "é".repeat(5000);
        let chunks = chunk_message(&text, 100);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert_eq!(chunks.concat().chars().count(), 5000);
    }
}
