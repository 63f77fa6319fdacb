//! mail-thread-rs: forwarded-content extraction and threaded replies for a mailbox
//!
//! Command-line adapter over a mailbox API. It lists, searches, and reads
//! messages, composes and drafts threaded replies, and recovers original
//! messages from forwarded ones.
//!
//! # Architecture
//!
//! - [`main`]: Process entry point with env loading and CLI dispatch
//! - [`config`]: Environment-driven adapter settings
//! - [`errors`]: Application error model with stable error codes
//! - [`codec`]: Transport (URL-safe base64) and header-text (RFC 2047) encoding
//! - [`address`]: Mailbox address extraction from header values
//! - [`mime`]: Raw message parsing into headers, bodies, and attachments
//! - [`forward`]: Forwarded-content detection and unwinding
//! - [`compose`]: Outgoing message rendering and reply threading
//! - [`mailbox`]: Mailbox API trait and the directory-backed implementation
//! - [`query`]: Mailbox search query parsing and matching
//! - [`service`]: Operation handlers with validation and orchestration
//! - [`models`]: Input/output DTOs and the response envelope

mod address;
mod codec;
mod compose;
mod config;
mod errors;
mod forward;
mod mailbox;
mod mime;
mod models;
mod query;
mod service;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::forward::ExtractOptions;
use crate::mailbox::LocalMailbox;
use crate::models::{
    CreateDraftInput, DetailFormat, ExtractForwardedInput, FindAndDraftReplyInput,
    GetMessageInput, ListMessagesInput, ParsedMessageView, SearchMessagesInput, SendEmailInput,
};
use crate::service::MailService;

#[derive(Parser)]
#[command(name = "mail-thread", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Mailbox directory (overrides MAIL_THREAD_MAILBOX_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    mailbox_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List recent messages
    List {
        #[arg(long)]
        max_results: Option<usize>,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        include_spam_trash: bool,
    },
    /// Search messages
    Search {
        query: String,
        #[arg(long)]
        max_results: Option<usize>,
        #[arg(long)]
        include_spam_trash: bool,
    },
    /// Show one message
    Get {
        email_id: String,
        #[arg(long, value_enum, default_value_t = DetailFormat::Full)]
        format: DetailFormat,
    },
    /// Send a message immediately (requires MAIL_THREAD_ALLOW_DIRECT_SEND)
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
        #[arg(long)]
        cc: Option<String>,
        #[arg(long)]
        bcc: Option<String>,
    },
    /// Create a draft
    Draft {
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
        #[arg(long)]
        cc: Option<String>,
        #[arg(long)]
        bcc: Option<String>,
        #[arg(long)]
        thread_id: Option<String>,
        /// Message-ID of the message being answered
        #[arg(long)]
        in_reply_to: Option<String>,
    },
    /// Draft a threaded reply to the newest message from a sender
    Reply {
        sender_name: String,
        #[arg(long)]
        body: Option<String>,
    },
    /// Extract forwarded content from a mailbox message
    Extract {
        email_id: String,
        #[arg(long)]
        include_html: bool,
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Parse a local .eml file
    Parse { file: PathBuf },
    /// Extract forwarded content from a local .eml file
    ExtractFile {
        file: PathBuf,
        #[arg(long)]
        include_html: bool,
        #[arg(long)]
        max_depth: Option<usize>,
    },
}

/// Application entry point
///
/// Loads `.env`, initializes tracing to stderr, runs one command, and prints
/// its JSON result on stdout. Failures print an error envelope and exit 1.
///
/// # Example
///
/// ```no_run
/// MAIL_THREAD_MAILBOX_DIR=./mail cargo run -- extract 4f1c... --max-depth 5
/// ```
#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(code = e.code(), error = %e, "command failed");
            println!("{:#}", e.to_error_json());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<String> {
    let config = AppConfig::load_from_env()?;

    match &cli.command {
        Commands::Parse { file } => {
            let bytes = tokio::fs::read(file).await?;
            let parsed = mime::parse_raw(&bytes)?;
            return to_json(&ParsedMessageView::from(&parsed));
        }
        Commands::ExtractFile {
            file,
            include_html,
            max_depth,
        } => {
            let bytes = tokio::fs::read(file).await?;
            let options = ExtractOptions {
                max_depth: forward::clamp_depth(max_depth.unwrap_or(config.default_max_depth)),
                include_html: *include_html,
            };
            return to_json(&forward::extract_forwarded_raw(&bytes, options));
        }
        _ => {}
    }

    let root = cli
        .mailbox_dir
        .or_else(|| config.mailbox_dir.clone())
        .ok_or_else(|| {
            AppError::invalid("mailbox directory not set; use --mailbox-dir or MAIL_THREAD_MAILBOX_DIR")
        })?;
    let mailbox = LocalMailbox::open(root)?;
    info!(root = %mailbox.root().display(), "mailbox opened");
    let service = MailService::new(config, mailbox);

    match cli.command {
        Commands::List {
            max_results,
            query,
            include_spam_trash,
        } => to_json(
            &service
                .list_messages(ListMessagesInput {
                    max_results,
                    query,
                    include_spam_trash,
                })
                .await?,
        ),
        Commands::Search {
            query,
            max_results,
            include_spam_trash,
        } => to_json(
            &service
                .search_messages(SearchMessagesInput {
                    query,
                    max_results,
                    include_spam_trash,
                })
                .await?,
        ),
        Commands::Get { email_id, format } => to_json(
            &service
                .get_message(GetMessageInput { email_id, format })
                .await?,
        ),
        Commands::Send {
            to,
            subject,
            body,
            cc,
            bcc,
        } => to_json(
            &service
                .send_email(SendEmailInput {
                    to,
                    subject,
                    body,
                    cc,
                    bcc,
                })
                .await?,
        ),
        Commands::Draft {
            to,
            subject,
            body,
            cc,
            bcc,
            thread_id,
            in_reply_to,
        } => to_json(
            &service
                .create_draft(CreateDraftInput {
                    to,
                    subject,
                    body,
                    cc,
                    bcc,
                    thread_id,
                    in_reply_to_message_id: in_reply_to,
                })
                .await?,
        ),
        Commands::Reply { sender_name, body } => to_json(
            &service
                .find_and_draft_reply(FindAndDraftReplyInput {
                    sender_name,
                    reply_body: body,
                })
                .await?,
        ),
        Commands::Extract {
            email_id,
            include_html,
            max_depth,
        } => to_json(
            &service
                .extract_forwarded_content(ExtractForwardedInput {
                    email_id,
                    include_html,
                    max_depth,
                })
                .await?,
        ),
        Commands::Parse { .. } | Commands::ExtractFile { .. } => {
            Err(AppError::Internal("offline command reached mailbox dispatch".to_owned()))
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Internal(format!("serialization failure: {e}")))
}
