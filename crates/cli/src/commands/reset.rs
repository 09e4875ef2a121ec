//! `asklab reset`: forget a conversation's history.

use asklab_config::{AppConfig, SessionBackendKind};
use asklab_core::session::SessionStore;
use asklab_core::turn::ConversationId;
use tracing::info;

use crate::runtime::session_store;

pub async fn run(conversation: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.session.backend == SessionBackendKind::Memory {
        println!("  Sessions are kept in memory; nothing persists between runs.");
        return Ok(());
    }

    let conversation = ConversationId::from(&conversation);
    session_store(&config)
        .clear(&conversation)
        .await
        .map_err(|e| format!("Failed to clear history: {e}"))?;
    info!(conversation_id = %conversation, "Conversation history cleared");
    println!("  Conversation memory cleared for {conversation}.");
    Ok(())
}
