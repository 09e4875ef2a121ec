//! AskLab CLI: the main entry point.
//!
//! Commands:
//! - `init`: Write the default config
//! - `ask` : Answer a single question
//! - `chat`: Interactive research chat
//! - `reset`: Forget a stored conversation

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "asklab",
    about = "AskLab — a Wikipedia research assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Research a single question and print the answer
    Ask {
        /// The question to answer
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Continue an earlier conversation
        #[arg(short, long)]
        conversation: Option<String>,

        #[command(flatten)]
        session: commands::SessionArgs,
    },

    /// Interactive research chat
    Chat {
        #[command(flatten)]
        session: commands::SessionArgs,
    },

    /// Forget the stored history of a conversation
    Reset {
        /// The conversation to forget
        #[arg(short, long)]
        conversation: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so answers stay clean on stdout
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Ask {
            question,
            conversation,
            session,
        } => commands::ask::run(question.join(" "), conversation, session).await?,
        Commands::Chat { session } => commands::chat::run(session).await?,
        Commands::Reset { conversation } => commands::reset::run(conversation).await?,
    }

    Ok(())
}
