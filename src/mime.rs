//! Raw message parsing and MIME handling
//!
//! Parses RFC 822 messages using `mailparse` into a header map, a plain-text
//! body, an optional HTML body, and an ordered attachment list. Encapsulated
//! `message/rfc822` parts stay attachments here; unwrapping them is the
//! forwarded-content extractor's job.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use mailparse::{DispositionType, MailHeader, ParsedMail};
use regex::Regex;

use crate::codec::decode_transport;
use crate::errors::{AppError, AppResult};

/// MIME type of a part carrying a complete embedded message
pub const ENCAPSULATED_TYPE: &str = "message/rfc822";

/// Ordered header list with case-insensitive, first-wins lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Build from `(name, decoded value)` pairs in message order
    pub fn from_pairs(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// First value for `name`, compared case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v.as_str()))
    }

    /// All headers in message order
    pub fn pairs(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Non-body MIME part in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Lowercased MIME type (e.g. `application/pdf`, `message/rfc822`)
    pub content_type: String,
    /// Filename from Content-Disposition or Content-Type `name`
    pub filename: Option<String>,
    /// Transfer-decoded bytes
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn is_encapsulated(&self) -> bool {
        self.content_type == ENCAPSULATED_TYPE
    }
}

/// Parsed message representation
///
/// When a message has no text/plain part but does have HTML, `text_body` is
/// synthesized from the HTML with tags stripped. A message with neither is
/// still valid; both bodies are then `None`.
#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    /// All headers with decoded values
    pub headers: HeaderMap,
    /// Plain text body, line endings normalized to `\n`
    pub text_body: Option<String>,
    /// Original HTML body, line endings untouched
    pub html_body: Option<String>,
    /// Every part not selected as a body, in document order
    pub attachments: Vec<Attachment>,
}

impl ParsedMessage {
    /// First value of a header, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// First `message/rfc822` attachment, if any
    pub fn encapsulated(&self) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.is_encapsulated())
    }
}

/// Decode a transport blob and parse the resulting message
///
/// # Errors
///
/// - `Decode` if the blob is not valid transport encoding
/// - `Parse` if the decoded bytes are not a structurally valid message
pub fn parse_transport(blob: &str) -> AppResult<ParsedMessage> {
    let raw = decode_transport(blob)?;
    parse_raw(&raw)
}

/// Parse RFC 822 message bytes into structured representation
///
/// Body selection, first match wins:
/// 1. A message without sub-parts is its own body (HTML if declared HTML).
/// 2. Otherwise the first inline `text/plain` leaf is the text body.
/// 3. The first inline `text/html` leaf is the HTML body; if no text body
///    was found it also supplies one with its tags stripped.
///
/// # Errors
///
/// - `Parse` if `mailparse` rejects the message or the header block is empty
pub fn parse_raw(raw: &[u8]) -> AppResult<ParsedMessage> {
    let parsed = mailparse::parse_mail(raw)
        .map_err(|e| AppError::Parse(format!("failed to parse RFC822 message: {e}")))?;

    let headers = HeaderMap::from_pairs(to_tuples(&parsed.headers));
    if headers.is_empty() {
        return Err(AppError::Parse("message has no header block".to_owned()));
    }

    let mut bodies = Bodies::default();
    let mut attachments = Vec::new();
    if parsed.subparts.is_empty() {
        read_single_part(&parsed, &mut bodies, &mut attachments)?;
    } else {
        walk_parts(&parsed, &mut bodies, &mut attachments)?;
    }

    let text_body = bodies
        .text
        .or_else(|| bodies.html.as_deref().map(|h| normalize_newlines(&strip_tags(h))));

    Ok(ParsedMessage {
        headers,
        text_body,
        html_body: bodies.html,
        attachments,
    })
}

#[derive(Default)]
struct Bodies {
    text: Option<String>,
    html: Option<String>,
}

/// Handle a message whose top level has no sub-parts
fn read_single_part(
    part: &ParsedMail<'_>,
    bodies: &mut Bodies,
    attachments: &mut Vec<Attachment>,
) -> AppResult<()> {
    let ctype = part.ctype.mimetype.to_ascii_lowercase();
    let (is_attachment, filename) = attachment_disposition(part);

    if !is_attachment && ctype == "text/html" {
        bodies.html = Some(decoded_body(part)?);
    } else if !is_attachment && (ctype.starts_with("text/") || ctype.is_empty()) {
        bodies.text = Some(normalize_newlines(&decoded_body(part)?));
    } else {
        attachments.push(to_attachment(part, ctype, filename)?);
    }
    Ok(())
}

/// Walk the multipart tree depth-first, visiting leaves in document order
fn walk_parts(
    part: &ParsedMail<'_>,
    bodies: &mut Bodies,
    attachments: &mut Vec<Attachment>,
) -> AppResult<()> {
    if part.subparts.is_empty() {
        let ctype = part.ctype.mimetype.to_ascii_lowercase();
        let (is_attachment, filename) = attachment_disposition(part);

        if !is_attachment && ctype == "text/plain" && bodies.text.is_none() {
            bodies.text = Some(normalize_newlines(&decoded_body(part)?));
        } else if !is_attachment && ctype == "text/html" && bodies.html.is_none() {
            bodies.html = Some(decoded_body(part)?);
        } else {
            attachments.push(to_attachment(part, ctype, filename)?);
        }
        return Ok(());
    }

    for sub in &part.subparts {
        walk_parts(sub, bodies, attachments)?;
    }
    Ok(())
}

/// Whether a part is marked as an attachment, plus its filename
///
/// Checks Content-Disposition parameter first, falls back to Content-Type
/// name parameter.
fn attachment_disposition(part: &ParsedMail<'_>) -> (bool, Option<String>) {
    let disp = part.get_content_disposition();
    let filename = disp
        .params
        .get("filename")
        .cloned()
        .or_else(|| part.ctype.params.get("name").cloned());
    let is_attachment = disp.disposition == DispositionType::Attachment || filename.is_some();
    (is_attachment, filename)
}

/// Charset- and transfer-decoded body text, line endings untouched
fn decoded_body(part: &ParsedMail<'_>) -> AppResult<String> {
    part.get_body()
        .map_err(|e| AppError::Parse(format!("failed decoding body part: {e}")))
}

fn to_attachment(
    part: &ParsedMail<'_>,
    content_type: String,
    filename: Option<String>,
) -> AppResult<Attachment> {
    let content = part
        .get_body_raw()
        .map_err(|e| AppError::Parse(format!("failed decoding attachment body: {e}")))?;
    Ok(Attachment {
        content_type,
        filename,
        content,
    })
}

/// Remove every `<...>` tag verbatim, leaving the text between them
pub fn strip_tags(html: &str) -> String {
    tag_regex().replace_all(html, "").into_owned()
}

fn tag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid HTML tag regex"))
}

fn normalize_newlines(input: &str) -> String {
    input.replace("\r\n", "\n")
}

/// Return headers, either curated or all
///
/// If `include_all=true`, returns all headers. Otherwise, returns only
/// the addressing and threading subset.
pub fn curated_headers(headers: &HeaderMap, include_all: bool) -> Vec<(String, String)> {
    if include_all {
        return headers.pairs().to_vec();
    }

    let allowed = [
        "date",
        "from",
        "to",
        "cc",
        "subject",
        "message-id",
        "in-reply-to",
        "references",
    ];
    headers
        .pairs()
        .iter()
        .filter(|(k, _)| allowed.contains(&k.to_ascii_lowercase().as_str()))
        .cloned()
        .collect()
}

/// Convert mailparse headers to tuples
fn to_tuples(headers: &[MailHeader<'_>]) -> Vec<(String, String)> {
    headers.iter().map(|h| (h.get_key(), h.get_value())).collect()
}

/// Convert header tuples to case-insensitive map
///
/// Returns first value for each header key (lowercased).
pub fn to_header_index(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for (k, v) in headers.pairs() {
        map.entry(k.to_ascii_lowercase()).or_insert_with(|| v.clone());
    }
    map
}

/// Truncate string to maximum characters (Unicode-aware)
///
/// Preserves complete characters, never splitting multi-byte sequences.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}
