//! finchat - Terminal client for the finchat assistant
//!
//! Streams a conversation in the terminal and manages the conversation list.
//!
//! # Usage
//!
//! ```bash
//! # Chat in an existing conversation
//! finchat --token "$TOKEN" chat 6f1c...
//!
//! # Open a conversation whose first reply is already being generated
//! finchat chat 6f1c... --new
//!
//! # Sidebar operations
//! finchat list
//! finchat rename 6f1c... "Monthly budget"
//! finchat delete 6f1c...
//!
//! # Verbose logging (stderr)
//! RUST_LOG=finchat_core=debug finchat chat 6f1c...
//! ```
//!
//! # Environment Variables
//!
//! - `FINCHAT_TOKEN`: bearer token
//! - `FINCHAT_USER_ID`: account id stamped on local messages
//! - `FINCHAT_CONFIG`: configuration file path
//! - `FINCHAT_API_URL` and the other `FINCHAT_*` settings: see `finchat_core::config`

mod gate;
mod render;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::info;

use finchat_core::{
    config::{default_config_path, load_config_from_path, ConfigOverrides},
    connect, AccessToken, AuthSession, ChatBackend, ConnectOptions, ConversationId, HttpBackend,
    SessionContext, SubmitError,
};

use gate::InputGate;
use render::{Output, Renderer};

/// Command typed at the chat prompt to leave
const QUIT: &str = "/quit";

/// finchat - streaming assistant chat in the terminal
#[derive(Parser, Debug)]
#[command(name = "finchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bearer token for the backend
    #[arg(short = 't', long, env = "FINCHAT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Account id stamped on locally created messages
    #[arg(short = 'u', long, env = "FINCHAT_USER_ID", default_value = "")]
    user_id: String,

    /// Backend base URL (overrides config and environment)
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "FINCHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chat interactively in a conversation
    Chat {
        /// Conversation id
        conversation: String,

        /// The conversation was just created and its first reply is pending
        #[arg(long)]
        new: bool,
    },
    /// List conversations
    List,
    /// Rename a conversation
    Rename {
        /// Conversation id
        conversation: String,
        /// New title
        title: String,
    },
    /// Delete a conversation
    Delete {
        /// Conversation id
        conversation: String,
    },
}

/// Initialize logging to stderr
fn init_logging() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("finchat_core=info,finchat=info"))
        .context("Invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let mut config = load_config_from_path(args.config.clone().or_else(default_config_path))
        .context("Failed to load configuration")?;
    let mut overrides = ConfigOverrides::new();
    if let Some(ref url) = args.api_url {
        overrides = overrides.with_api_url(url.clone());
    }
    overrides
        .apply(&mut config)
        .context("Invalid command-line override")?;

    info!(source = %config.source(), "Configuration loaded");

    let api_url = config.api_base()?;
    let backend = Arc::new(
        HttpBackend::new(api_url.clone(), config.request_timeout)
            .context("Failed to build HTTP client")?,
    );
    match args.command {
        Command::Chat { conversation, new } => {
            let auth = args
                .token
                .map(|token| AuthSession::new(token, args.user_id));
            let context = SessionContext::new(ConversationId::new(conversation), auth);
            let options = ConnectOptions {
                api_url,
                session: config.session_config(),
                connect_timeout: config.request_timeout,
                new_conversation: new,
            };
            run_chat(backend, context, options).await
        }
        Command::List => {
            let token = require_token(args.token)?;
            let conversations = backend
                .list_conversations(&token)
                .await
                .context("Failed to list conversations")?;
            for conversation in conversations {
                println!("{}\t{}", conversation.id, conversation.title);
            }
            Ok(())
        }
        Command::Rename {
            conversation,
            title,
        } => {
            let token = require_token(args.token)?;
            backend
                .rename_conversation(&token, &ConversationId::new(conversation.clone()), &title)
                .await
                .context("Failed to rename conversation")?;
            println!("Renamed {conversation} to {title:?}");
            Ok(())
        }
        Command::Delete { conversation } => {
            let token = require_token(args.token)?;
            backend
                .delete_conversation(&token, &ConversationId::new(conversation.clone()))
                .await
                .context("Failed to delete conversation")?;
            println!("Deleted {conversation}");
            Ok(())
        }
    }
}

fn require_token(token: Option<String>) -> Result<AccessToken> {
    token
        .map(AccessToken::new)
        .context("A token is required (use --token or FINCHAT_TOKEN)")
}

/// Interactive chat loop
///
/// Stdin lines are submitted as messages, one turn at a time: the next line
/// is not read until the current reply has finished. On end of input the loop
/// waits for the pending reply before exiting, so piped input works.
async fn run_chat(
    backend: Arc<HttpBackend>,
    context: SessionContext,
    options: ConnectOptions,
) -> Result<()> {
    let conversation_id = context.conversation_id.clone();
    let mut gate = InputGate::new(options.new_conversation);
    let (handle, mut updates) = connect(backend, context, options)
        .await
        .with_context(|| format!("Failed to open conversation {conversation_id}"))?;

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut renderer = Renderer::new();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break };
                gate.observe(&update);
                if let Some(output) = renderer.render(&update) {
                    emit(&output)?;
                }
                if gate.finished() {
                    break;
                }
            }
            line = lines.next(), if gate.accepts_input() => {
                match line {
                    Some(Ok(line)) if line.trim() == QUIT => break,
                    Some(Ok(line)) => match handle.submit(line).await {
                        Ok(()) => gate.submitted(),
                        Err(SubmitError::EmptyMessage) => {}
                        Err(e) => eprintln!("[warning] {e}"),
                    },
                    Some(Err(e)) => return Err(e).context("Failed to read stdin"),
                    None => {
                        gate.stdin_closed();
                        if gate.finished() {
                            break;
                        }
                    }
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    handle.close().await;
    Ok(())
}

fn emit(output: &Output) -> Result<()> {
    match output {
        Output::Stdout(text) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
        Output::Stderr(text) => eprint!("{text}"),
    }
    Ok(())
}
