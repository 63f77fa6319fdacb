//! Input/output DTOs for adapter operations
//!
//! Inputs use the camelCase field names of the adapter's tool contract and
//! carry their defaults; outputs are wrapped in a [`ToolEnvelope`].

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::mailbox::MessageFormat;
use crate::mime::{self, ParsedMessage};

/// Metadata included in all operation responses
///
/// Provides timing information and current UTC timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    /// Current UTC timestamp in RFC 3339 format with milliseconds
    pub now_utc: String,
    /// Operation duration in milliseconds
    pub duration_ms: u64,
}

impl Meta {
    /// Create metadata populated with current time and elapsed duration
    pub fn now(duration_ms: u64) -> Self {
        Self {
            now_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            duration_ms,
        }
    }
}

/// Standard response envelope for all operations
///
/// Wraps operation-specific data with a human-readable summary and execution
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEnvelope<T> {
    /// Human-readable summary of the operation outcome
    pub summary: String,
    /// Operation-specific data payload
    pub data: T,
    /// Execution metadata (timestamp, duration)
    pub meta: Meta,
}

/// Detail level for `get_message`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DetailFormat {
    #[default]
    Full,
    Minimal,
    Metadata,
}

impl From<DetailFormat> for MessageFormat {
    fn from(format: DetailFormat) -> Self {
        match format {
            DetailFormat::Full => MessageFormat::Full,
            DetailFormat::Minimal => MessageFormat::Minimal,
            DetailFormat::Metadata => MessageFormat::Metadata,
        }
    }
}

/// Message summary for list/search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Mailbox message id
    pub id: String,
    /// Conversation id, when the mailbox tracks one
    pub thread_id: Option<String>,
    /// Subject, `(No subject)` when missing
    pub subject: String,
    /// From header, `Unknown` when missing
    pub from: String,
    pub to: Option<String>,
    /// Date header, empty when missing
    pub date: String,
    pub snippet: String,
    pub labels: Vec<String>,
}

/// Full message detail
///
/// Returned by `get_message`. `body` is only resolved for the `full` format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDetail {
    #[serde(flatten)]
    pub summary: MessageSummary,
    /// Curated headers (addressing and threading)
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Result of `send_email`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    pub id: String,
    pub thread_id: Option<String>,
    pub to: String,
    pub subject: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
}

/// How a new draft relates to an existing conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingStatus {
    /// Threading headers emitted; the draft joins the conversation
    Threaded,
    /// Only a thread id was supplied
    ThreadOnly,
    /// New conversation
    Standalone,
}

/// Result of `create_draft`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftResult {
    pub draft_id: String,
    pub message_id: String,
    pub thread_id: Option<String>,
    pub to: String,
    pub subject: String,
    pub threading: ThreadingStatus,
}

/// Snapshot of the message being replied to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginalSummary {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub date: String,
    pub message_id: Option<String>,
    pub preview: String,
}

/// Result of `find_and_draft_reply`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyDraftResult {
    pub draft_id: String,
    pub thread_id: Option<String>,
    pub to: String,
    pub subject: String,
    pub threading: ThreadingStatus,
    /// `false` when the placeholder template was used
    pub custom_body: bool,
    pub original: OriginalSummary,
}

/// Attachment metadata (content omitted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub content_type: String,
    pub filename: Option<String>,
    pub size_bytes: usize,
}

/// Serializable view of a parsed message, used by the offline `parse` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedMessageView {
    /// First value per lowercased header name
    pub headers: BTreeMap<String, String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub attachments: Vec<AttachmentInfo>,
}

impl From<&ParsedMessage> for ParsedMessageView {
    fn from(parsed: &ParsedMessage) -> Self {
        Self {
            headers: mime::to_header_index(&parsed.headers),
            text_body: parsed.text_body.clone(),
            html_body: parsed.html_body.clone(),
            attachments: parsed
                .attachments
                .iter()
                .map(|a| AttachmentInfo {
                    content_type: a.content_type.clone(),
                    filename: a.filename.clone(),
                    size_bytes: a.content.len(),
                })
                .collect(),
        }
    }
}

/// Input: list recent messages
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesInput {
    /// Maximum messages to return (1..100, configured default)
    pub max_results: Option<usize>,
    /// Mailbox search query (e.g. `from:alice has:attachment`)
    #[serde(default)]
    pub query: String,
    /// Include SPAM and TRASH folders
    #[serde(default)]
    pub include_spam_trash: bool,
}

/// Input: search messages
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMessagesInput {
    /// Mailbox search query (required, non-empty)
    pub query: String,
    pub max_results: Option<usize>,
    #[serde(default)]
    pub include_spam_trash: bool,
}

/// Input: get message details
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMessageInput {
    pub email_id: String,
    #[serde(default)]
    pub format: DetailFormat,
}

/// Input: send a message immediately
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailInput {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
}

/// Input: create a draft
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftInput {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    /// Conversation to attach the draft to
    pub thread_id: Option<String>,
    /// Message-ID to emit as `In-Reply-To` and `References`
    pub in_reply_to_message_id: Option<String>,
}

/// Input: find the latest message from a sender and draft a reply
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindAndDraftReplyInput {
    /// Sender name or address
    pub sender_name: String,
    /// Reply text; placeholder template when omitted
    pub reply_body: Option<String>,
}

/// Input: extract forwarded content
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractForwardedInput {
    pub email_id: String,
    /// Include the HTML body of the resolved message
    #[serde(default)]
    pub include_html: bool,
    /// Nesting levels to unwind (clamped to 1..10, configured default)
    pub max_depth: Option<usize>,
}
