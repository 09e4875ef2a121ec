//! CLI channel: interactive terminal-based chat.
//!
//! Reads questions from stdin, one per line. Used for `asklab chat`.

use async_trait::async_trait;
use asklab_core::channel::{Channel, ChannelMessage};
use asklab_core::error::ChannelError;
use asklab_core::turn::ConversationId;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// Interactive CLI channel for terminal-based chat.
///
/// Every line belongs to the same conversation, so history carries over
/// between questions of one session.
pub struct CliChannel {
    conversation_id: ConversationId,
    sender_id: String,
}

impl CliChannel {
    pub fn new(conversation_id: ConversationId, sender_id: impl Into<String>) -> Self {
        Self {
            conversation_id,
            sender_id: sender_id.into(),
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Turn one input line into a message; `None` for blank lines.
    fn message(&self, line: &str) -> Option<ChannelMessage> {
        let content = line.trim();
        if content.is_empty() {
            return None;
        }
        Some(ChannelMessage {
            conversation_id: self.conversation_id.clone(),
            sender_id: self.sender_id.clone(),
            sender_name: Some("User".into()),
            content: content.to_string(),
        })
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new(ConversationId::from("cli_session"), "local_user")
    }
}

pub fn is_exit_command(line: &str) -> bool {
    EXIT_COMMANDS.contains(&line.trim())
}

/// Chat commands handled by the host instead of the research loop.
///
/// Both `/name` and `!name` are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Forget this conversation's history
    Reset,
    /// Check that the model provider answers
    Ping,
    /// Long-term memory status
    Memory,
    /// Show the model, or switch to the named one
    Model(Option<String>),
    Help,
}

impl ChatCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let rest = line.strip_prefix('/').or_else(|| line.strip_prefix('!'))?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "reset" => Some(Self::Reset),
            "ping" => Some(Self::Ping),
            "memory" => Some(Self::Memory),
            "model" => Some(Self::Model((!arg.is_empty()).then(|| arg.to_string()))),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let template = CliChannel::new(self.conversation_id.clone(), self.sender_id.clone());

        tokio::spawn(async move {
            let mut lines = BufReader::new(io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if is_exit_command(&line) {
                            break;
                        }
                        let Some(msg) = template.message(&line) else {
                            continue;
                        };
                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_channel_properties() {
        let ch = CliChannel::default();
        assert_eq!(ch.name(), "cli");
        assert_eq!(ch.conversation_id().0, "cli_session");
    }

    #[test]
    fn lines_become_messages() {
        let ch = CliChannel::new(ConversationId::from("term-1"), "alice");
        let msg = ch.message("  Who founded Lima?  ").unwrap();
        assert_eq!(msg.content, "Who founded Lima?");
        assert_eq!(msg.sender_id, "alice");
        assert_eq!(msg.conversation_id.0, "term-1");
        assert!(ch.message("   ").is_none());
    }

    #[test]
    fn exit_commands() {
        assert!(is_exit_command("quit"));
        assert!(is_exit_command(" /exit "));
        assert!(!is_exit_command("exit strategy of the Roman army"));
    }

    #[test]
    fn chat_commands() {
        assert_eq!(ChatCommand::parse("/reset"), Some(ChatCommand::Reset));
        assert_eq!(ChatCommand::parse(" !RESET "), Some(ChatCommand::Reset));
        assert_eq!(ChatCommand::parse("/ping"), Some(ChatCommand::Ping));
        assert_eq!(ChatCommand::parse("/memory"), Some(ChatCommand::Memory));
        assert_eq!(ChatCommand::parse("/model"), Some(ChatCommand::Model(None)));
        assert_eq!(
            ChatCommand::parse("/model  llama-3.3-70b-versatile "),
            Some(ChatCommand::Model(Some("llama-3.3-70b-versatile".into())))
        );
    }

    #[test]
    fn questions_are_not_commands() {
        assert_eq!(ChatCommand::parse("reset the router?"), None);
        assert_eq!(ChatCommand::parse("/etc/passwd format"), None);
        assert_eq!(ChatCommand::parse("What is 3/4?"), None);
    }
}
