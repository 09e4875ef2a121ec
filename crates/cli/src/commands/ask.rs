//! `asklab ask`: answer one question.

use std::sync::Arc;

use asklab_agent::LoopStatus;
use asklab_channels::ConsoleSink;
use asklab_core::channel::RequestContext;
use asklab_core::turn::ConversationId;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::SessionArgs;
use crate::runtime::{Runtime, cancel_on_ctrl_c};

pub async fn run(
    question: String,
    conversation: Option<String>,
    session: SessionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let runtime = Runtime::build(&config)?;

    let conversation_id = conversation
        .map(|id| ConversationId::from(&id))
        .unwrap_or_default();
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let ctx = RequestContext::new(
        conversation_id.clone(),
        session.user,
        Arc::new(ConsoleSink::new(!session.quiet)),
    )
    .with_cancel(cancel);

    let outcome = runtime.research.run(&ctx, &question).await;
    info!(
        conversation_id = %conversation_id,
        iterations = outcome.iterations,
        sources = outcome.sources.len(),
        "Pass --conversation {conversation_id} to follow up"
    );

    match outcome.status {
        LoopStatus::Finalized | LoopStatus::Aborted => Ok(()),
        LoopStatus::Cancelled => Err("Cancelled".into()),
        LoopStatus::Failed => Err("The research loop failed. Run with -v for details.".into()),
    }
}
