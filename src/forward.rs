//! Forwarded-content extraction
//!
//! Detects how a message was forwarded and recovers the original content:
//!
//! - **encapsulated**: a `message/rfc822` attachment ("forward as
//!   attachment"), unwound level by level up to `max_depth`
//! - **inline**: a quoted forward whose `From:`/`Date:`/`Subject:`/`To:` lines
//!   were pasted into the body text
//! - **unknown**: neither pattern matched; the top-level message is returned
//!   as a best effort with `success: false`
//!
//! Decode and parse failures at any level collapse into `{success: false,
//! error}` with no partial chain.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppResult;
use crate::mime::{self, ParsedMessage};

/// Lower bound for unwinding depth
pub const MIN_DEPTH: usize = 1;
/// Upper bound for unwinding depth
pub const MAX_DEPTH: usize = 10;
/// Characters of body text kept per chain entry
const PREVIEW_CHARS: usize = 200;
const UNDETECTED_MESSAGE: &str = "Could not confidently detect forwarded content";

/// Extraction options
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Requested unwinding depth; clamped to `MIN_DEPTH..=MAX_DEPTH`
    pub max_depth: usize,
    /// Whether to return the HTML body of the resolved level
    pub include_html: bool,
}

/// How the forwarded content was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardSource {
    Encapsulated,
    Inline,
    Unknown,
}

/// Header snapshot of one message level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl HeaderSnapshot {
    fn of(message: &ParsedMessage) -> Self {
        let get = |name: &str| message.header(name).map(str::to_owned);
        Self {
            from: get("From"),
            to: get("To"),
            subject: get("Subject").filter(|s| !s.is_empty()),
            date: get("Date"),
            message_id: get("Message-ID"),
        }
    }
}

/// Recovered body content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// One unwound level, outermost first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardChainEntry {
    pub headers: HeaderSnapshot,
    pub preview: String,
}

/// Extraction outcome
///
/// Field names are part of the output contract. Absent fields are omitted
/// from serialized output; a hard failure carries only `success` and `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedContentResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ForwardSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_headers: Option<HeaderSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_content: Option<OriginalContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<Vec<ForwardChainEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ForwardedContentResult {
    /// Hard failure: no structured fields, only the error message
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            source: None,
            depth: None,
            original_headers: None,
            original_content: None,
            chain: None,
            error: Some(error.into()),
        }
    }
}

/// Clamp a requested depth into the supported range
pub fn clamp_depth(requested: usize) -> usize {
    requested.clamp(MIN_DEPTH, MAX_DEPTH)
}

/// Extract forwarded content from a transport-encoded raw message
///
/// Never returns an error: failures are reported inside the result.
pub fn extract_forwarded(blob: &str, options: ExtractOptions) -> ForwardedContentResult {
    match mime::parse_transport(blob).and_then(|top| extract_from_parsed(&top, options)) {
        Ok(result) => result,
        Err(e) => {
            debug!(error = %e, "forwarded content extraction failed");
            ForwardedContentResult::failure(e.to_string())
        }
    }
}

/// Extract forwarded content from raw message bytes
pub fn extract_forwarded_raw(raw: &[u8], options: ExtractOptions) -> ForwardedContentResult {
    match mime::parse_raw(raw).and_then(|top| extract_from_parsed(&top, options)) {
        Ok(result) => result,
        Err(e) => {
            debug!(error = %e, "forwarded content extraction failed");
            ForwardedContentResult::failure(e.to_string())
        }
    }
}

/// Run detection against an already parsed top-level message
///
/// # Errors
///
/// - `Parse` if any encapsulated level fails to parse
pub fn extract_from_parsed(
    top: &ParsedMessage,
    options: ExtractOptions,
) -> AppResult<ForwardedContentResult> {
    let max_depth = clamp_depth(options.max_depth);

    if top.encapsulated().is_some() {
        return unwind_encapsulated(top, max_depth, options.include_html);
    }

    if let Some(inline) = top.text_body.as_deref().and_then(match_inline_forward) {
        debug!("inline forward detected");
        return Ok(ForwardedContentResult {
            success: true,
            source: Some(ForwardSource::Inline),
            depth: Some(1),
            original_headers: Some(inline.headers),
            original_content: Some(OriginalContent {
                text: Some(inline.body),
                html: None,
            }),
            chain: Some(Vec::new()),
            error: None,
        });
    }

    debug!("no forwarding pattern detected");
    Ok(ForwardedContentResult {
        success: false,
        source: Some(ForwardSource::Unknown),
        depth: Some(0),
        original_headers: Some(HeaderSnapshot::of(top)),
        original_content: Some(content_of(top, options.include_html)),
        chain: Some(Vec::new()),
        error: Some(UNDETECTED_MESSAGE.to_owned()),
    })
}

/// Follow the first `message/rfc822` attachment at each level
///
/// Iterative with an explicit level counter, so adversarial nesting cannot
/// exceed `max_depth` parses.
fn unwind_encapsulated(
    top: &ParsedMessage,
    max_depth: usize,
    include_html: bool,
) -> AppResult<ForwardedContentResult> {
    let mut chain = Vec::new();
    let mut current: Option<ParsedMessage> = None;

    while chain.len() < max_depth {
        let holder = current.as_ref().unwrap_or(top);
        let Some(attachment) = holder.encapsulated() else {
            break;
        };
        let nested = mime::parse_raw(&attachment.content)?;
        debug!(level = chain.len() + 1, "unwound encapsulated message");
        chain.push(ForwardChainEntry {
            headers: HeaderSnapshot::of(&nested),
            preview: mime::truncate_chars(nested.text_body.as_deref().unwrap_or(""), PREVIEW_CHARS),
        });
        current = Some(nested);
    }

    let deepest = current.as_ref().unwrap_or(top);
    Ok(ForwardedContentResult {
        success: true,
        source: Some(ForwardSource::Encapsulated),
        depth: Some(chain.len()),
        original_headers: Some(HeaderSnapshot::of(deepest)),
        original_content: Some(content_of(deepest, include_html)),
        chain: Some(chain),
        error: None,
    })
}

fn content_of(message: &ParsedMessage, include_html: bool) -> OriginalContent {
    OriginalContent {
        text: message.text_body.clone().filter(|t| !t.is_empty()),
        html: if include_html {
            message.html_body.clone().filter(|h| !h.is_empty())
        } else {
            None
        },
    }
}

struct InlineForward {
    headers: HeaderSnapshot,
    body: String,
}

/// Match the quoted-forward preamble: `From`, `Date`, `Subject`, `To` lines in
/// that exact order, a blank line, then the body
fn match_inline_forward(text: &str) -> Option<InlineForward> {
    let caps = inline_regex().captures(text)?;
    let field = |idx: usize| caps.get(idx).map(|m| m.as_str().trim().to_owned());
    Some(InlineForward {
        headers: HeaderSnapshot {
            from: field(1),
            date: field(2),
            subject: field(3),
            to: field(4),
            message_id: None,
        },
        body: field(5).unwrap_or_default(),
    })
}

fn inline_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"(?im)(?:^-+\s*Forwarded message\s*-+\s*$\n)?\s*From:\s*(.+)\nDate:\s*(.+)\nSubject:\s*(.+)\nTo:\s*(.+)\n\n([\s\S]*)",
        )
        .expect("valid inline forward regex")
    })
}
