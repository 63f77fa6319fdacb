//! Outgoing message composition
//!
//! Builds UTF-8 plain-text RFC 822 messages with CRLF header separators and
//! returns them transport-encoded, ready for `sendMessage`/`createDraft`.
//! Replies get a normalized `Re: ` subject and `In-Reply-To`/`References`
//! threading headers derived from the original message.

use tracing::warn;

use crate::codec::{encode_header_text, encode_transport};
use crate::errors::{AppError, AppResult};
use crate::mime::HeaderMap;

const REPLY_PREFIX: &str = "Re: ";
/// Body used when a reply is drafted without caller-supplied text
pub const REPLY_PLACEHOLDER: &str = "Hi,\n\n[Write your reply here]\n\nBest regards";

/// Fields of a new outgoing message
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: String,
    pub body: String,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}

/// Threading data carried from an original message into its reply
///
/// `thread_id` is mailbox transport metadata and never becomes a header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadingContext {
    pub existing_message_id: Option<String>,
    pub existing_references: Option<String>,
    pub thread_id: Option<String>,
}

impl ThreadingContext {
    /// Read `Message-ID` and `References` from the original's headers
    pub fn from_headers(headers: &HeaderMap, thread_id: Option<String>) -> Self {
        let non_empty = |name: &str| {
            headers
                .get(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        Self {
            existing_message_id: non_empty("Message-ID"),
            existing_references: non_empty("References"),
            thread_id,
        }
    }
}

/// A reply ready for submission
#[derive(Debug, Clone)]
pub struct ComposedReply {
    /// Transport-encoded message
    pub raw: String,
    pub to: String,
    pub subject: String,
    /// Whether `In-Reply-To` was emitted
    pub threaded: bool,
    /// Thread identifier to pass alongside the raw message
    pub thread_id: Option<String>,
}

/// Render a message to RFC 822 text
///
/// # Errors
///
/// Returns `InvalidInput` if any header value contains CR or LF.
pub fn render(message: &NewMessage) -> AppResult<String> {
    let mut lines = vec![
        "MIME-Version: 1.0".to_owned(),
        "Content-Type: text/plain; charset=UTF-8".to_owned(),
        "Content-Transfer-Encoding: 8bit".to_owned(),
        header_line("To", &message.to)?,
    ];
    if let Some(cc) = non_empty(message.cc.as_deref()) {
        lines.push(header_line("Cc", cc)?);
    }
    if let Some(bcc) = non_empty(message.bcc.as_deref()) {
        lines.push(header_line("Bcc", bcc)?);
    }
    lines.push(header_line("Subject", &encode_header_text(&message.subject))?);
    if let Some(id) = non_empty(message.in_reply_to.as_deref()) {
        lines.push(header_line("In-Reply-To", id)?);
    }
    if let Some(refs) = non_empty(message.references.as_deref()) {
        lines.push(header_line("References", refs)?);
    }
    lines.push(String::new());
    lines.push(message.body.clone());
    Ok(lines.join("\r\n"))
}

/// Render and transport-encode a message
pub fn compose(message: &NewMessage) -> AppResult<String> {
    Ok(encode_transport(render(message)?.as_bytes()))
}

/// Prefix `Re: ` unless the subject already carries it
pub fn reply_subject(original: &str) -> String {
    if original.starts_with(REPLY_PREFIX) {
        original.to_owned()
    } else {
        format!("{REPLY_PREFIX}{original}")
    }
}

/// Build the `References` value for a reply
///
/// Appends the original Message-ID to existing references; returns `None`
/// when the result would be empty.
pub fn references_chain(existing: Option<&str>, message_id: Option<&str>) -> Option<String> {
    let message_id = message_id.unwrap_or("");
    let value = match non_empty(existing) {
        Some(existing) => format!("{existing} {message_id}").trim().to_owned(),
        None => message_id.trim().to_owned(),
    };
    (!value.is_empty()).then_some(value)
}

/// Compose a threaded reply
///
/// `reply_to` must already be a resolved bare address. Missing threading
/// data drops the corresponding header rather than inventing one.
///
/// # Errors
///
/// - `AddressResolution` if `reply_to` is empty
/// - `InvalidInput` if a header value contains CR or LF
pub fn compose_reply(
    original_subject: &str,
    reply_to: &str,
    body: Option<&str>,
    threading: &ThreadingContext,
) -> AppResult<ComposedReply> {
    if reply_to.trim().is_empty() {
        return Err(AppError::AddressResolution(reply_to.to_owned()));
    }

    let message_id = non_empty(threading.existing_message_id.as_deref());
    if message_id.is_none() {
        warn!("original has no Message-ID; reply threading will be limited");
    }
    if threading.thread_id.is_none() {
        warn!("no thread id available; reply may not join the conversation");
    }

    let subject = reply_subject(original_subject);
    let message = NewMessage {
        to: reply_to.to_owned(),
        subject: subject.clone(),
        body: body.unwrap_or(REPLY_PLACEHOLDER).to_owned(),
        in_reply_to: message_id.map(str::to_owned),
        references: references_chain(threading.existing_references.as_deref(), message_id),
        ..NewMessage::default()
    };

    Ok(ComposedReply {
        raw: compose(&message)?,
        to: message.to,
        subject,
        threaded: message_id.is_some(),
        thread_id: threading.thread_id.clone(),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn header_line(name: &str, value: &str) -> AppResult<String> {
    if value.contains(['\r', '\n']) {
        return Err(AppError::InvalidInput(format!(
            "{name} header must not contain line breaks"
        )));
    }
    Ok(format!("{name}: {value}"))
}
