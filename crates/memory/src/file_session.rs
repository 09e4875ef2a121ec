//! File-based session store: conversation history that survives restarts.
//!
//! Each conversation is a JSON-lines file (one `Turn` per line) under a
//! sessions directory: `~/.asklab/sessions/<conversation>.jsonl` by default.
//! Files are rewritten on every append and trimmed to the last `max_turns`.
//!
//! Conversation ids are escaped into file names byte by byte: ASCII
//! alphanumerics and `-` pass through, everything else becomes `_xx` (lower
//! hex). Distinct ids therefore never share a file.

use async_trait::async_trait;
use asklab_core::error::MemoryError;
use asklab_core::session::SessionStore;
use asklab_core::turn::{ConversationId, Turn};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct FileSessionStore {
    dir: PathBuf,
    max_turns: usize,
    // Serialises read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(dir: PathBuf, max_turns: usize) -> Self {
        Self {
            dir,
            max_turns,
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, conversation: &ConversationId) -> PathBuf {
        self.dir.join(format!("{}.jsonl", file_stem(&conversation.0)))
    }

    async fn load(path: &Path) -> Vec<Turn> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(_) => return Vec::new(), // No history yet
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Turn>(line) {
                Ok(turn) => Some(turn),
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Skipping corrupted history line");
                    None
                }
            })
            .collect()
    }
}

fn file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{byte:02x}"));
        }
    }
    stem
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, conversation: &ConversationId) -> Result<Vec<Turn>, MemoryError> {
        let mut turns = Self::load(&self.path_for(conversation)).await;
        let excess = turns.len().saturating_sub(self.max_turns);
        turns.drain(..excess);
        Ok(turns)
    }

    async fn append(&self, conversation: &ConversationId, turns: Vec<Turn>) -> Result<(), MemoryError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(conversation);

        let mut history = Self::load(&path).await;
        history.extend(turns);
        let excess = history.len().saturating_sub(self.max_turns);
        history.drain(..excess);

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            MemoryError::Storage(format!("Failed to create sessions directory: {e}"))
        })?;

        let mut content = String::new();
        for turn in &history {
            let line = serde_json::to_string(turn)
                .map_err(|e| MemoryError::Storage(format!("Failed to serialize turn: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write history file: {e}")))?;

        debug!(path = %path.display(), turns = history.len(), "History saved");
        Ok(())
    }

    async fn clear(&self, conversation: &ConversationId) -> Result<(), MemoryError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(conversation)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MemoryError::Storage(format!("Failed to remove history file: {e}"))),
        }
    }
}
