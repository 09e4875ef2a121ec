//! `asklab chat`: interactive research chat.

use std::io::Write;
use std::sync::Arc;

use asklab_agent::ModelProfile;
use asklab_channels::{ChatCommand, CliChannel, ConsoleSink};
use asklab_config::AppConfig;
use asklab_core::channel::{Channel, RequestContext};
use asklab_core::turn::ConversationId;
use tokio_util::sync::CancellationToken;

use super::SessionArgs;
use crate::runtime::{Runtime, cancel_on_ctrl_c};

pub async fn run(session: SessionArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let mut runtime = Runtime::build(&config)?;
    let settings = runtime.research.settings();

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         AskLab — Interactive Research        ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", settings.model);
    println!("  Profile:   {}", settings.profile.as_str());
    println!("  Tools:     {}", runtime.tool_names.join(", "));
    println!("  Budget:    {} iterations per question", settings.max_iterations);
    println!();
    println!("  Ask a question and press Enter.");
    println!("  Type /help for commands, 'exit' or Ctrl+C to quit.");
    println!();

    // One conversation per session so follow-ups see the history
    let channel = CliChannel::new(ConversationId::new(), session.user.clone());
    let mut rx = channel.start().await.map_err(|e| format!("Channel error: {e}"))?;
    let sink = Arc::new(ConsoleSink::new(!session.quiet));
    let session_cancel = CancellationToken::new();
    cancel_on_ctrl_c(session_cancel.clone());

    prompt()?;
    loop {
        let received = tokio::select! {
            _ = session_cancel.cancelled() => break,
            received = rx.recv() => received,
        };
        let Some(result) = received else { break };

        match result {
            Ok(msg) => {
                if let Some(command) = ChatCommand::parse(&msg.content) {
                    handle_command(&mut runtime, &config, &msg.conversation_id, command).await;
                    prompt()?;
                    continue;
                }

                let ctx = RequestContext::new(msg.conversation_id, msg.sender_id, sink.clone())
                    .with_cancel(session_cancel.child_token());
                println!();
                runtime.research.run(&ctx, &msg.content).await;
                if session_cancel.is_cancelled() {
                    break;
                }
                println!();
                prompt()?;
            }
            Err(e) => {
                eprintln!("  [Channel Error] {e}");
                break;
            }
        }
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

async fn handle_command(
    runtime: &mut Runtime,
    config: &AppConfig,
    conversation: &ConversationId,
    command: ChatCommand,
) {
    match command {
        ChatCommand::Reset => match runtime.research.reset(conversation).await {
            Ok(()) => println!("  Conversation memory cleared for this session."),
            Err(e) => eprintln!("  [Error] Could not clear history: {e}"),
        },
        ChatCommand::Ping => match runtime.research.ping().await {
            Ok(true) => println!("  pong"),
            Ok(false) => println!("  The model provider answered with an error."),
            Err(e) => eprintln!("  [Error] Cannot reach the model provider: {e}"),
        },
        ChatCommand::Memory => println!("  {}", runtime.research.memory_status().await),
        ChatCommand::Model(None) => {
            let settings = runtime.research.settings();
            println!("  Model: {} ({})", settings.model, settings.profile.as_str());
        }
        ChatCommand::Model(Some(model)) => {
            let profile = ModelProfile::detect(&model, config.agent.profile);
            runtime.research.switch_model(model.clone(), profile);
            println!("  Now using {model} ({})", profile.as_str());
        }
        ChatCommand::Help => {
            println!("  /reset          Forget this conversation's history");
            println!("  /model [name]   Show or switch the model");
            println!("  /memory         Long-term memory status");
            println!("  /ping           Check the model provider");
            println!("  exit            Quit");
        }
    }
    println!();
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
