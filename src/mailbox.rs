//! Mailbox API collaborator
//!
//! The adapter talks to its mailbox through [`MailboxApi`]: list, fetch,
//! send, and draft. Raw messages cross this boundary transport-encoded.
//!
//! [`LocalMailbox`] implements the trait over a directory tree with one
//! folder per label, each holding `<id>.eml` files:
//!
//! ```text
//! <root>/inbox/*.eml    INBOX
//! <root>/sent/*.eml     SENT
//! <root>/drafts/*.eml   DRAFT
//! <root>/spam/*.eml     SPAM
//! <root>/trash/*.eml    TRASH
//! ```
//!
//! A thread id supplied when a draft is created is kept in an `<id>.thread`
//! file next to the message and takes precedence over header-derived ids.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{decode_transport, encode_transport};
use crate::errors::{AppError, AppResult};
use crate::mime::{self, ParsedMessage};
use crate::query::{MailQuery, QueryTarget};

/// Characters of body text kept as a snippet
const SNIPPET_CHARS: usize = 200;

/// Folder name and label for every supported mailbox folder
const FOLDERS: [(&str, &str); 5] = [
    ("inbox", "INBOX"),
    ("sent", "SENT"),
    ("drafts", "DRAFT"),
    ("spam", "SPAM"),
    ("trash", "TRASH"),
];

/// How much of a message to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    /// Headers, labels, snippet, and resolved body text
    Full,
    /// Headers, labels, and snippet
    Metadata,
    /// Labels and snippet only
    Minimal,
    /// Transport-encoded RFC 822 source
    Raw,
}

/// Message handle returned by list/send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
    pub thread_id: Option<String>,
}

/// Draft handle returned by `create_draft`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRef {
    pub id: String,
    pub message: MessageRef,
}

/// Pre-structured message for non-raw formats
#[derive(Debug, Clone, Default)]
pub struct StructuredMessage {
    pub id: String,
    pub thread_id: Option<String>,
    pub label_ids: Vec<String>,
    pub snippet: String,
    /// Empty for `Minimal`
    pub headers: mime::HeaderMap,
    /// Resolved body text, `Full` only
    pub body_text: Option<String>,
}

/// Result of `get_message`
#[derive(Debug, Clone)]
pub enum FetchedMessage {
    Raw { reference: MessageRef, raw: String },
    Structured(StructuredMessage),
}

/// Remote mailbox capability
///
/// Implementations own their transport; retries and authentication live
/// behind this trait.
pub trait MailboxApi {
    /// Ids of messages matching `query`, newest first
    async fn list_messages(
        &self,
        query: &str,
        max_results: usize,
        include_spam_trash: bool,
    ) -> AppResult<Vec<MessageRef>>;

    /// Fetch a message in the requested format
    async fn get_message(&self, id: &str, format: MessageFormat) -> AppResult<FetchedMessage>;

    /// Submit a transport-encoded message for delivery
    async fn send_message(&self, raw: &str) -> AppResult<MessageRef>;

    /// Store a transport-encoded message as a draft, optionally in a thread
    async fn create_draft(&self, raw: &str, thread_id: Option<&str>) -> AppResult<DraftRef>;
}

/// Directory-backed mailbox
#[derive(Debug, Clone)]
pub struct LocalMailbox {
    root: PathBuf,
}

/// A message loaded from disk
struct StoredMessage {
    id: String,
    label: &'static str,
    /// Thread id recorded at creation time, if any
    thread_id: Option<String>,
    bytes: Vec<u8>,
    parsed: ParsedMessage,
}

impl LocalMailbox {
    /// Open a mailbox rooted at `root`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `root` is not an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(AppError::NotFound(format!(
                "mailbox directory '{}' does not exist",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder_path(&self, folder: &str) -> PathBuf {
        self.root.join(folder)
    }

    /// Load every parseable message in one folder
    async fn load_folder(&self, folder: &str, label: &'static str) -> AppResult<Vec<StoredMessage>> {
        let dir = self.folder_path(folder);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut messages = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("eml") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
                continue;
            };
            let bytes = fs::read(&path).await?;
            let thread_id = read_thread_file(&dir, &id).await?;
            match mime::parse_raw(&bytes) {
                Ok(parsed) => messages.push(StoredMessage {
                    id,
                    label,
                    thread_id,
                    bytes,
                    parsed,
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unparseable message"),
            }
        }
        Ok(messages)
    }

    /// Locate a message by id across all folders
    async fn find(&self, id: &str) -> AppResult<StoredMessage> {
        validate_id(id)?;
        for (folder, label) in FOLDERS {
            let dir = self.folder_path(folder);
            match fs::read(dir.join(format!("{id}.eml"))).await {
                Ok(bytes) => {
                    let parsed = mime::parse_raw(&bytes)?;
                    return Ok(StoredMessage {
                        id: id.to_owned(),
                        label,
                        thread_id: read_thread_file(&dir, id).await?,
                        bytes,
                        parsed,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::NotFound(format!("message '{id}' not found")))
    }

    /// Decode and persist a transport-encoded message into `folder`
    ///
    /// A non-empty `thread_id` is written to the `<id>.thread` sidecar.
    async fn store(
        &self,
        folder: &str,
        raw: &str,
        thread_id: Option<&str>,
    ) -> AppResult<(String, ParsedMessage)> {
        let bytes = decode_transport(raw)?;
        let parsed = mime::parse_raw(&bytes)?;
        let dir = self.folder_path(folder);
        fs::create_dir_all(&dir).await?;
        let id = Uuid::new_v4().simple().to_string();
        if let Some(thread_id) = thread_id.map(str::trim).filter(|t| !t.is_empty()) {
            fs::write(dir.join(format!("{id}.thread")), thread_id).await?;
        }
        fs::write(dir.join(format!("{id}.eml")), &bytes).await?;
        Ok((id, parsed))
    }
}

impl MailboxApi for LocalMailbox {
    async fn list_messages(
        &self,
        query: &str,
        max_results: usize,
        include_spam_trash: bool,
    ) -> AppResult<Vec<MessageRef>> {
        let query = MailQuery::parse(query);
        let mut hits: Vec<(i64, MessageRef)> = Vec::new();

        for (folder, label) in FOLDERS {
            if !include_spam_trash && matches!(label, "SPAM" | "TRASH") {
                continue;
            }
            for message in self.load_folder(folder, label).await? {
                if query.matches(&query_target(&message)) {
                    hits.push((timestamp(&message.parsed), reference(&message)));
                }
            }
        }

        hits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        hits.truncate(max_results);
        debug!(matched = hits.len(), "listed local messages");
        Ok(hits.into_iter().map(|(_, r)| r).collect())
    }

    async fn get_message(&self, id: &str, format: MessageFormat) -> AppResult<FetchedMessage> {
        let message = self.find(id).await?;
        let reference = reference(&message);
        if format == MessageFormat::Raw {
            return Ok(FetchedMessage::Raw {
                reference,
                raw: encode_transport(&message.bytes),
            });
        }

        let snippet = snippet(&message.parsed);
        let StoredMessage { label, parsed, .. } = message;
        let (headers, body_text) = match format {
            MessageFormat::Full => (parsed.headers, parsed.text_body),
            MessageFormat::Metadata => (parsed.headers, None),
            _ => (mime::HeaderMap::default(), None),
        };
        Ok(FetchedMessage::Structured(StructuredMessage {
            id: reference.id,
            thread_id: reference.thread_id,
            label_ids: vec![label.to_owned()],
            snippet,
            headers,
            body_text,
        }))
    }

    async fn send_message(&self, raw: &str) -> AppResult<MessageRef> {
        let (id, parsed) = self.store("sent", raw, None).await?;
        info!(id = %id, "message stored in sent folder");
        let thread_id = Some(thread_id_of(&parsed, &id));
        Ok(MessageRef { id, thread_id })
    }

    async fn create_draft(&self, raw: &str, thread_id: Option<&str>) -> AppResult<DraftRef> {
        let (id, parsed) = self.store("drafts", raw, thread_id).await?;
        info!(id = %id, thread_id = ?thread_id, "draft stored");
        let thread_id = thread_id
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| thread_id_of(&parsed, &id));
        Ok(DraftRef {
            id: format!("r-{id}"),
            message: MessageRef {
                id,
                thread_id: Some(thread_id),
            },
        })
    }
}

/// Reject ids that could escape the mailbox directory
fn validate_id(id: &str) -> AppResult<()> {
    if id.is_empty() || id.len() > 128 {
        return Err(AppError::invalid("message id must be 1..128 characters"));
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.')
        || id.starts_with('.')
    {
        return Err(AppError::invalid("message id must match [A-Za-z0-9_.-]+"));
    }
    Ok(())
}

fn reference(message: &StoredMessage) -> MessageRef {
    let thread_id = message
        .thread_id
        .clone()
        .unwrap_or_else(|| thread_id_of(&message.parsed, &message.id));
    MessageRef {
        id: message.id.clone(),
        thread_id: Some(thread_id),
    }
}

/// Read the `<id>.thread` sidecar, if present
async fn read_thread_file(dir: &Path, id: &str) -> AppResult<Option<String>> {
    match fs::read_to_string(dir.join(format!("{id}.thread"))).await {
        Ok(value) => {
            let value = value.trim();
            Ok((!value.is_empty()).then(|| value.to_owned()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Thread root: first `References` id, else `In-Reply-To`, else own `Message-ID`
fn thread_id_of(parsed: &ParsedMessage, fallback: &str) -> String {
    let first_id = |name: &str| {
        parsed
            .header(name)
            .and_then(|v| v.split_whitespace().next())
            .map(str::to_owned)
    };
    first_id("References")
        .or_else(|| first_id("In-Reply-To"))
        .or_else(|| first_id("Message-ID"))
        .unwrap_or_else(|| fallback.to_owned())
}

fn timestamp(parsed: &ParsedMessage) -> i64 {
    parsed
        .header("Date")
        .and_then(|d| mailparse::dateparse(d).ok())
        .unwrap_or(0)
}

fn snippet(parsed: &ParsedMessage) -> String {
    let text = parsed.text_body.as_deref().unwrap_or("");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    mime::truncate_chars(&collapsed, SNIPPET_CHARS)
}

fn query_target(message: &StoredMessage) -> QueryTarget<'_> {
    let header = |name: &str| message.parsed.header(name).unwrap_or("");
    QueryTarget {
        from: header("From"),
        to: header("To"),
        subject: header("Subject"),
        body: message.parsed.text_body.as_deref().unwrap_or(""),
        label: message.label,
        folder: FOLDERS
            .iter()
            .find(|(_, label)| *label == message.label)
            .map_or("", |(folder, _)| *folder),
        has_attachment: !message.parsed.attachments.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{FetchedMessage, LocalMailbox, MailboxApi, MessageFormat, validate_id};
    use crate::codec::{decode_transport, encode_transport};

    fn write(root: &Path, folder: &str, id: &str, raw: &str) {
        let dir = root.join(folder);
        std::fs::create_dir_all(&dir).expect("create folder");
        std::fs::write(dir.join(format!("{id}.eml")), raw).expect("write message");
    }

    fn message(from: &str, subject: &str, date: &str) -> String {
        format!(
            "From: {from}\r\nTo: me@example.com\r\nSubject: {subject}\r\nDate: {date}\r\nMessage-ID: <{subject}@example.com>\r\n\r\nBody of {subject}\r\n"
        )
    }

    fn seeded() -> (tempfile::TempDir, LocalMailbox) {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "inbox",
            "old",
            &message("Jane <jane@example.com>", "Old", "Mon, 6 Jan 2025 09:00:00 +0000"),
        );
        write(
            dir.path(),
            "inbox",
            "new",
            &message("Jane <jane@example.com>", "New", "Tue, 7 Jan 2025 09:00:00 +0000"),
        );
        write(
            dir.path(),
            "sent",
            "mine",
            &message("me@example.com", "Mine", "Wed, 8 Jan 2025 09:00:00 +0000"),
        );
        write(
            dir.path(),
            "spam",
            "junk",
            &message("spam@example.com", "Junk", "Thu, 9 Jan 2025 09:00:00 +0000"),
        );
        let mailbox = LocalMailbox::open(dir.path()).expect("open mailbox");
        (dir, mailbox)
    }

    #[test]
    fn open_rejects_missing_directory() {
        let err = LocalMailbox::open("/definitely/not/here").expect_err("must fail");
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn lists_newest_first_and_skips_spam() {
        let (_dir, mailbox) = seeded();
        let refs = mailbox.list_messages("", 10, false).await.expect("list");
        let ids: Vec<_> = refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["mine", "new", "old"]);

        let refs = mailbox.list_messages("", 10, true).await.expect("list");
        assert_eq!(refs[0].id, "junk");
    }

    #[tokio::test]
    async fn list_applies_query_and_limit() {
        let (_dir, mailbox) = seeded();
        let refs = mailbox
            .list_messages("from:jane -in:sent", 1, false)
            .await
            .expect("list");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id, "new");
        assert_eq!(refs[0].thread_id.as_deref(), Some("<New@example.com>"));
    }

    #[tokio::test]
    async fn fetches_raw_and_structured_formats() {
        let (_dir, mailbox) = seeded();
        let FetchedMessage::Raw { reference, raw } = mailbox
            .get_message("old", MessageFormat::Raw)
            .await
            .expect("fetch raw")
        else {
            panic!("expected raw message");
        };
        assert_eq!(reference.id, "old");
        let bytes = decode_transport(&raw).expect("decodes");
        assert!(bytes.starts_with(b"From: Jane"));

        let FetchedMessage::Structured(full) = mailbox
            .get_message("old", MessageFormat::Full)
            .await
            .expect("fetch full")
        else {
            panic!("expected structured message");
        };
        assert_eq!(full.label_ids, ["INBOX"]);
        assert_eq!(full.headers.get("subject"), Some("Old"));
        assert_eq!(full.snippet, "Body of Old");
        assert!(full.body_text.is_some());

        let FetchedMessage::Structured(minimal) = mailbox
            .get_message("old", MessageFormat::Minimal)
            .await
            .expect("fetch minimal")
        else {
            panic!("expected structured message");
        };
        assert!(minimal.headers.is_empty());
        assert!(minimal.body_text.is_none());
    }

    #[tokio::test]
    async fn missing_message_is_not_found() {
        let (_dir, mailbox) = seeded();
        let err = mailbox
            .get_message("nope", MessageFormat::Full)
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn send_and_draft_persist_messages() {
        let (dir, mailbox) = seeded();
        let raw = encode_transport(
            b"To: x@example.com\r\nSubject: Hi\r\nIn-Reply-To: <root@example.com>\r\n\r\nhello",
        );

        let sent = mailbox.send_message(&raw).await.expect("send");
        assert!(dir.path().join("sent").join(format!("{}.eml", sent.id)).exists());
        assert_eq!(sent.thread_id.as_deref(), Some("<root@example.com>"));

        let draft = mailbox
            .create_draft(&raw, Some("thread-9"))
            .await
            .expect("draft");
        assert_eq!(draft.message.thread_id.as_deref(), Some("thread-9"));
        let stored = mailbox
            .get_message(&draft.message.id, MessageFormat::Metadata)
            .await
            .expect("draft readable");
        let FetchedMessage::Structured(stored) = stored else {
            panic!("expected structured message");
        };
        assert_eq!(stored.label_ids, ["DRAFT"]);
    }

    #[tokio::test]
    async fn draft_thread_id_survives_later_reads() {
        let (dir, mailbox) = seeded();
        let raw = encode_transport(b"To: x@example.com\r\nSubject: Standalone\r\n\r\nhello");

        let draft = mailbox
            .create_draft(&raw, Some("thread-7"))
            .await
            .expect("draft");
        assert_eq!(draft.message.thread_id.as_deref(), Some("thread-7"));
        assert!(
            dir.path()
                .join("drafts")
                .join(format!("{}.thread", draft.message.id))
                .exists()
        );

        let FetchedMessage::Structured(stored) = mailbox
            .get_message(&draft.message.id, MessageFormat::Metadata)
            .await
            .expect("draft readable")
        else {
            panic!("expected structured message");
        };
        assert_eq!(stored.thread_id.as_deref(), Some("thread-7"));

        let refs = mailbox
            .list_messages("in:drafts", 10, false)
            .await
            .expect("list");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].thread_id.as_deref(), Some("thread-7"));

        let untracked = mailbox.create_draft(&raw, None).await.expect("draft");
        assert!(
            !dir.path()
                .join("drafts")
                .join(format!("{}.thread", untracked.message.id))
                .exists()
        );
        assert_eq!(
            untracked.message.thread_id.as_deref(),
            Some(untracked.message.id.as_str())
        );
    }

    #[tokio::test]
    async fn send_rejects_undecodable_payload() {
        let (_dir, mailbox) = seeded();
        let err = mailbox.send_message("%%%").await.expect_err("must fail");
        assert_eq!(err.code(), "decode_error");
    }

    #[test]
    fn rejects_path_like_ids() {
        validate_id("abc-123_x.y").expect("plain id is valid");
        validate_id("../etc/passwd").expect_err("traversal must fail");
        validate_id(".hidden").expect_err("dot prefix must fail");
        validate_id("").expect_err("empty must fail");
    }
}
