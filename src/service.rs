//! Adapter operations over a [`MailboxApi`]
//!
//! Each public method validates its typed input, orchestrates the mailbox
//! calls and the codec/parser/composer layers, and returns a
//! [`ToolEnvelope`] carrying a summary line plus timing metadata.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::address::{extract_address, is_valid_address};
use crate::compose::{self, NewMessage, ThreadingContext};
use crate::config::{AppConfig, MAX_RESULTS_LIMIT};
use crate::errors::{AppError, AppResult};
use crate::forward::{self, ExtractOptions, ForwardSource, ForwardedContentResult};
use crate::mailbox::{FetchedMessage, MailboxApi, MessageFormat, StructuredMessage};
use crate::mime;
use crate::models::{
    CreateDraftInput, DraftResult, ExtractForwardedInput, FindAndDraftReplyInput,
    GetMessageInput, ListMessagesInput, MessageDetail, MessageSummary, Meta, OriginalSummary,
    ReplyDraftResult, SearchMessagesInput, SendEmailInput, SendResult, ThreadingStatus,
    ToolEnvelope,
};

const NO_SUBJECT: &str = "(No subject)";
const UNKNOWN_SENDER: &str = "Unknown";
const NO_READABLE_CONTENT: &str = "No readable content found";
/// Characters of snippet shown for the message being replied to
const REPLY_PREVIEW_CHARS: usize = 150;

/// Adapter service
///
/// Holds shared configuration and the mailbox collaborator.
#[derive(Clone)]
pub struct MailService<M> {
    config: Arc<AppConfig>,
    mailbox: M,
}

impl<M: MailboxApi> MailService<M> {
    pub fn new(config: AppConfig, mailbox: M) -> Self {
        Self {
            config: Arc::new(config),
            mailbox,
        }
    }

    /// List recent messages, optionally filtered by a mailbox query
    pub async fn list_messages(
        &self,
        input: ListMessagesInput,
    ) -> AppResult<ToolEnvelope<Vec<MessageSummary>>> {
        let started = Instant::now();
        let result = self
            .collect_summaries(&input.query, input.max_results, input.include_spam_trash)
            .await
            .map(|data| (format!("{} message(s) returned", data.len()), data));
        finalize(started, result)
    }

    /// Search messages; the query is required
    pub async fn search_messages(
        &self,
        input: SearchMessagesInput,
    ) -> AppResult<ToolEnvelope<Vec<MessageSummary>>> {
        let started = Instant::now();
        let result = self.search_messages_impl(input).await;
        finalize(started, result)
    }

    /// Fetch one message with headers and, for `full`, a resolved body
    pub async fn get_message(&self, input: GetMessageInput) -> AppResult<ToolEnvelope<MessageDetail>> {
        let started = Instant::now();
        finalize(
            started,
            self.get_message_impl(input)
                .await
                .map(|data| ("Message retrieved".to_owned(), data)),
        )
    }

    /// Compose and deliver a message immediately
    ///
    /// Disabled unless `MAIL_THREAD_ALLOW_DIRECT_SEND=true`.
    pub async fn send_email(&self, input: SendEmailInput) -> AppResult<ToolEnvelope<SendResult>> {
        let started = Instant::now();
        finalize(
            started,
            self.send_email_impl(input)
                .await
                .map(|data| (format!("Message sent to {}", data.to), data)),
        )
    }

    /// Store a draft, optionally threaded into an existing conversation
    pub async fn create_draft(&self, input: CreateDraftInput) -> AppResult<ToolEnvelope<DraftResult>> {
        let started = Instant::now();
        finalize(
            started,
            self.create_draft_impl(input)
                .await
                .map(|data| (format!("Draft {} created", data.draft_id), data)),
        )
    }

    /// Find the newest message from a sender and draft a threaded reply
    pub async fn find_and_draft_reply(
        &self,
        input: FindAndDraftReplyInput,
    ) -> AppResult<ToolEnvelope<ReplyDraftResult>> {
        let started = Instant::now();
        finalize(
            started,
            self.find_and_draft_reply_impl(input).await.map(|data| {
                (
                    format!("Reply draft {} created for {}", data.draft_id, data.to),
                    data,
                )
            }),
        )
    }

    /// Recover the original message from a forwarded one
    ///
    /// Never fails: fetch and parse problems are reported as
    /// `success: false` inside the result.
    pub async fn extract_forwarded_content(
        &self,
        input: ExtractForwardedInput,
    ) -> AppResult<ToolEnvelope<ForwardedContentResult>> {
        let started = Instant::now();
        let data = match self.extract_forwarded_impl(&input).await {
            Ok(result) => result,
            Err(e) => {
                warn!(email_id = %input.email_id, error = %e, "forwarded content fetch failed");
                ForwardedContentResult::failure(e.to_string())
            }
        };
        let summary = extraction_summary(&data);
        finalize(started, Ok((summary, data)))
    }

    async fn collect_summaries(
        &self,
        query: &str,
        max_results: Option<usize>,
        include_spam_trash: bool,
    ) -> AppResult<Vec<MessageSummary>> {
        let max_results = self.resolve_max_results(max_results)?;
        validate_no_controls(query, "query")?;

        let refs = self
            .mailbox
            .list_messages(query.trim(), max_results, include_spam_trash)
            .await?;
        debug!(count = refs.len(), query = %query, "listed message refs");

        let mut summaries = Vec::with_capacity(refs.len());
        for reference in refs {
            let message = self
                .fetch_structured(&reference.id, MessageFormat::Metadata)
                .await?;
            summaries.push(summarize(&message));
        }
        Ok(summaries)
    }

    async fn search_messages_impl(
        &self,
        input: SearchMessagesInput,
    ) -> AppResult<(String, Vec<MessageSummary>)> {
        let query = input.query.trim();
        if query.is_empty() {
            return Err(AppError::invalid("query must not be empty"));
        }
        let data = self
            .collect_summaries(query, input.max_results, input.include_spam_trash)
            .await?;
        Ok((format!("{} message(s) matched '{query}'", data.len()), data))
    }

    async fn get_message_impl(&self, input: GetMessageInput) -> AppResult<MessageDetail> {
        validate_email_id(&input.email_id)?;
        let format = MessageFormat::from(input.format);
        let message = self.fetch_structured(&input.email_id, format).await?;

        let body = (format == MessageFormat::Full).then(|| {
            message
                .body_text
                .as_deref()
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .unwrap_or(NO_READABLE_CONTENT)
                .to_owned()
        });
        Ok(MessageDetail {
            summary: summarize(&message),
            headers: mime::curated_headers(&message.headers, false),
            body,
        })
    }

    async fn send_email_impl(&self, input: SendEmailInput) -> AppResult<SendResult> {
        require_direct_send(&self.config)?;
        validate_recipient(&input.to)?;

        let raw = compose::compose(&NewMessage {
            to: input.to.clone(),
            cc: input.cc.clone(),
            bcc: input.bcc.clone(),
            subject: input.subject.clone(),
            body: input.body,
            ..NewMessage::default()
        })?;
        let sent = self.mailbox.send_message(&raw).await?;
        info!(id = %sent.id, "message sent");

        Ok(SendResult {
            id: sent.id,
            thread_id: sent.thread_id,
            to: input.to,
            subject: input.subject,
            cc: input.cc,
            bcc: input.bcc,
        })
    }

    async fn create_draft_impl(&self, input: CreateDraftInput) -> AppResult<DraftResult> {
        validate_recipient(&input.to)?;
        let in_reply_to = non_empty(input.in_reply_to_message_id);
        let thread_id = non_empty(input.thread_id);
        if let Some(id) = thread_id.as_deref() {
            validate_no_controls(id, "threadId")?;
        }

        let threading = match (&in_reply_to, &thread_id) {
            (Some(_), _) => ThreadingStatus::Threaded,
            (None, Some(_)) => ThreadingStatus::ThreadOnly,
            (None, None) => ThreadingStatus::Standalone,
        };

        let raw = compose::compose(&NewMessage {
            to: input.to.clone(),
            cc: input.cc,
            bcc: input.bcc,
            subject: input.subject.clone(),
            body: input.body,
            in_reply_to: in_reply_to.clone(),
            references: in_reply_to,
        })?;
        let draft = self.mailbox.create_draft(&raw, thread_id.as_deref()).await?;
        info!(draft_id = %draft.id, threading = ?threading, "draft created");

        Ok(DraftResult {
            draft_id: draft.id,
            message_id: draft.message.id,
            thread_id: draft.message.thread_id,
            to: input.to,
            subject: input.subject,
            threading,
        })
    }

    async fn find_and_draft_reply_impl(
        &self,
        input: FindAndDraftReplyInput,
    ) -> AppResult<ReplyDraftResult> {
        let sender = input.sender_name.trim();
        if sender.is_empty() {
            return Err(AppError::invalid("senderName must not be empty"));
        }
        validate_no_controls(sender, "senderName")?;

        let query = format!("from:{} -in:sent", quote_query_value(sender));
        let refs = self.mailbox.list_messages(&query, 1, false).await?;
        let Some(latest) = refs.into_iter().next() else {
            return Err(AppError::NotFound(format!("no messages found from '{sender}'")));
        };

        let original = self.fetch_structured(&latest.id, MessageFormat::Full).await?;
        let subject = header_or(&original, "Subject", NO_SUBJECT);
        let from = header_or(&original, "From", UNKNOWN_SENDER);

        let reply_to = extract_address(&from);
        if reply_to.is_empty() {
            return Err(AppError::AddressResolution(from));
        }

        let thread_id = original.thread_id.clone().or(latest.thread_id);
        let threading = ThreadingContext::from_headers(&original.headers, thread_id);
        let body = input.reply_body.as_deref().filter(|b| !b.is_empty());
        let reply = compose::compose_reply(&subject, &reply_to, body, &threading)?;

        let draft = self
            .mailbox
            .create_draft(&reply.raw, reply.thread_id.as_deref())
            .await?;
        info!(draft_id = %draft.id, original = %original.id, "reply draft created");

        let threading_status = match (reply.threaded, &reply.thread_id) {
            (true, _) => ThreadingStatus::Threaded,
            (false, Some(_)) => ThreadingStatus::ThreadOnly,
            (false, None) => ThreadingStatus::Standalone,
        };

        Ok(ReplyDraftResult {
            draft_id: draft.id,
            thread_id: draft.message.thread_id,
            to: reply.to,
            subject: reply.subject,
            threading: threading_status,
            custom_body: body.is_some(),
            original: OriginalSummary {
                id: original.id.clone(),
                from,
                subject,
                date: header_or(&original, "Date", ""),
                message_id: threading.existing_message_id,
                preview: preview(&original.snippet),
            },
        })
    }

    async fn extract_forwarded_impl(
        &self,
        input: &ExtractForwardedInput,
    ) -> AppResult<ForwardedContentResult> {
        validate_email_id(&input.email_id)?;
        let options = ExtractOptions {
            max_depth: forward::clamp_depth(input.max_depth.unwrap_or(self.config.default_max_depth)),
            include_html: input.include_html,
        };

        let raw = match self
            .mailbox
            .get_message(&input.email_id, MessageFormat::Raw)
            .await?
        {
            FetchedMessage::Raw { reference, raw } if !raw.is_empty() => {
                debug!(id = %reference.id, thread_id = ?reference.thread_id, "fetched raw message");
                raw
            }
            _ => {
                return Err(AppError::Internal(format!(
                    "no raw content returned for message '{}'",
                    input.email_id
                )));
            }
        };
        Ok(forward::extract_forwarded(&raw, options))
    }

    /// Fetch a message in a structured (non-raw) format
    async fn fetch_structured(&self, id: &str, format: MessageFormat) -> AppResult<StructuredMessage> {
        match self.mailbox.get_message(id, format).await? {
            FetchedMessage::Structured(message) => Ok(message),
            FetchedMessage::Raw { .. } => Err(AppError::Internal(format!(
                "mailbox returned raw content for '{id}' when {format:?} was requested"
            ))),
        }
    }

    fn resolve_max_results(&self, requested: Option<usize>) -> AppResult<usize> {
        let value = requested.unwrap_or(self.config.default_max_results);
        validate_range(value, 1, MAX_RESULTS_LIMIT, "maxResults")?;
        Ok(value)
    }
}

/// Calculate elapsed milliseconds
fn duration_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

/// Wrap business logic output in the standard response envelope
fn finalize<T>(started: Instant, result: AppResult<(String, T)>) -> AppResult<ToolEnvelope<T>> {
    let (summary, data) = result?;
    Ok(ToolEnvelope {
        summary,
        data,
        meta: Meta::now(duration_ms(started)),
    })
}

fn extraction_summary(result: &ForwardedContentResult) -> String {
    match (result.success, result.source, result.depth) {
        (true, Some(ForwardSource::Encapsulated), Some(depth)) => {
            format!("Forwarded content extracted from {depth} encapsulated level(s)")
        }
        (true, Some(ForwardSource::Inline), _) => "Inline forwarded content extracted".to_owned(),
        _ => result
            .error
            .clone()
            .unwrap_or_else(|| "Forwarded content not detected".to_owned()),
    }
}

fn summarize(message: &StructuredMessage) -> MessageSummary {
    MessageSummary {
        id: message.id.clone(),
        thread_id: message.thread_id.clone(),
        subject: header_or(message, "Subject", NO_SUBJECT),
        from: header_or(message, "From", UNKNOWN_SENDER),
        to: message.headers.get("To").map(str::to_owned),
        date: header_or(message, "Date", ""),
        snippet: message.snippet.clone(),
        labels: message.label_ids.clone(),
    }
}

/// Header value, or `default` when missing or blank
fn header_or(message: &StructuredMessage, name: &str, default: &str) -> String {
    message
        .headers
        .get(name)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
        .to_owned()
}

fn preview(snippet: &str) -> String {
    if snippet.chars().count() > REPLY_PREVIEW_CHARS {
        format!("{}...", mime::truncate_chars(snippet, REPLY_PREVIEW_CHARS))
    } else {
        snippet.to_owned()
    }
}

/// Quote a query value containing whitespace so it stays one term
fn quote_query_value(value: &str) -> String {
    if value.contains(char::is_whitespace) {
        format!("\"{}\"", value.replace('"', ""))
    } else {
        value.to_owned()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Check if direct delivery is enabled
fn require_direct_send(config: &AppConfig) -> AppResult<()> {
    if !config.allow_direct_send {
        return Err(AppError::Forbidden(
            "direct send is disabled; create a draft or set MAIL_THREAD_ALLOW_DIRECT_SEND=true"
                .to_owned(),
        ));
    }
    Ok(())
}

fn validate_recipient(to: &str) -> AppResult<()> {
    if !is_valid_address(to.trim()) {
        return Err(AppError::InvalidInput(format!(
            "'{to}' is not a valid email address"
        )));
    }
    Ok(())
}

fn validate_email_id(id: &str) -> AppResult<()> {
    if id.trim().is_empty() {
        return Err(AppError::invalid("emailId must not be empty"));
    }
    validate_no_controls(id, "emailId")
}

/// Reject control characters in user-provided values
fn validate_no_controls(value: &str, field: &str) -> AppResult<()> {
    if value.chars().any(|ch| ch.is_ascii_control()) {
        return Err(AppError::InvalidInput(format!(
            "{field} must not contain control characters"
        )));
    }
    Ok(())
}

/// Validate numeric value in range
fn validate_range(value: usize, min: usize, max: usize, field: &str) -> AppResult<()> {
    if value < min || value > max {
        return Err(AppError::InvalidInput(format!(
            "{field} must be in range {min}..{max}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{MailService, preview, quote_query_value, validate_no_controls};
    use crate::codec::decode_transport;
    use crate::config::AppConfig;
    use crate::forward::ForwardSource;
    use crate::mailbox::{FetchedMessage, LocalMailbox, MailboxApi, MessageFormat};
    use crate::models::{
        CreateDraftInput, DetailFormat, ExtractForwardedInput, FindAndDraftReplyInput,
        GetMessageInput, ListMessagesInput, SearchMessagesInput, SendEmailInput,
        ThreadingStatus,
    };

    const ORIGINAL: &str = concat!(
        "From: Jane Doe <jane@example.com>\r\n",
        "To: me@example.com\r\n",
        "Subject: Project plan\r\n",
        "Date: Tue, 7 Jan 2025 09:00:00 +0000\r\n",
        "Message-ID: <plan@example.com>\r\n",
        "References: <kickoff@example.com>\r\n",
        "\r\n",
        "Here is the plan.\r\n",
    );

    const FORWARDED: &str = concat!(
        "From: me@example.com\r\n",
        "To: team@example.com\r\n",
        "Subject: Fwd: Invoice\r\n",
        "Date: Wed, 8 Jan 2025 09:00:00 +0000\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"b1\"\r\n",
        "\r\n",
        "--b1\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "See below.\r\n",
        "--b1\r\n",
        "Content-Type: message/rfc822\r\n",
        "\r\n",
        "From: billing@vendor.example\r\n",
        "Subject: Invoice 42\r\n",
        "Message-ID: <inv42@vendor.example>\r\n",
        "\r\n",
        "Amount due: 100\r\n",
        "--b1--\r\n",
    );

    fn write(root: &Path, folder: &str, id: &str, raw: &str) {
        let dir = root.join(folder);
        std::fs::create_dir_all(&dir).expect("create folder");
        std::fs::write(dir.join(format!("{id}.eml")), raw).expect("write message");
    }

    fn service(config: AppConfig) -> (tempfile::TempDir, MailService<LocalMailbox>) {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "inbox", "plan", ORIGINAL);
        write(dir.path(), "inbox", "fwd", FORWARDED);
        let mailbox = LocalMailbox::open(dir.path()).expect("open mailbox");
        (dir, MailService::new(config, mailbox))
    }

    async fn draft_text(service: &MailService<LocalMailbox>, message_id: &str) -> String {
        let FetchedMessage::Raw { raw, .. } = service
            .mailbox
            .get_message(message_id, MessageFormat::Raw)
            .await
            .expect("draft readable")
        else {
            panic!("expected raw message");
        };
        String::from_utf8(decode_transport(&raw).expect("decodes")).expect("utf-8 draft")
    }

    #[tokio::test]
    async fn list_returns_summaries_with_defaults() {
        let (_dir, service) = service(AppConfig::default());
        let envelope = service
            .list_messages(ListMessagesInput::default())
            .await
            .expect("list");
        assert_eq!(envelope.data.len(), 2);
        assert_eq!(envelope.data[0].id, "fwd");
        assert_eq!(envelope.data[1].subject, "Project plan");
        assert_eq!(envelope.data[1].labels, ["INBOX"]);
        assert_eq!(envelope.summary, "2 message(s) returned");
    }

    #[tokio::test]
    async fn list_rejects_out_of_range_max_results() {
        let (_dir, service) = service(AppConfig::default());
        let err = service
            .list_messages(ListMessagesInput {
                max_results: Some(101),
                ..ListMessagesInput::default()
            })
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), "invalid_input");
    }

    #[tokio::test]
    async fn search_requires_query() {
        let (_dir, service) = service(AppConfig::default());
        let err = service
            .search_messages(SearchMessagesInput::default())
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), "invalid_input");

        let envelope = service
            .search_messages(SearchMessagesInput {
                query: "subject:invoice".to_owned(),
                ..SearchMessagesInput::default()
            })
            .await
            .expect("search");
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data[0].id, "fwd");
    }

    #[tokio::test]
    async fn get_message_full_resolves_body() {
        let (_dir, service) = service(AppConfig::default());
        let envelope = service
            .get_message(GetMessageInput {
                email_id: "plan".to_owned(),
                format: DetailFormat::Full,
            })
            .await
            .expect("get");
        assert_eq!(envelope.data.body.as_deref(), Some("Here is the plan."));
        assert!(
            envelope
                .data
                .headers
                .iter()
                .any(|(k, v)| k == "Message-ID" && v == "<plan@example.com>")
        );

        let envelope = service
            .get_message(GetMessageInput {
                email_id: "plan".to_owned(),
                format: DetailFormat::Metadata,
            })
            .await
            .expect("get");
        assert!(envelope.data.body.is_none());
    }

    #[tokio::test]
    async fn send_is_forbidden_by_default() {
        let (_dir, service) = service(AppConfig::default());
        let err = service
            .send_email(SendEmailInput {
                to: "bob@example.com".to_owned(),
                subject: "Hi".to_owned(),
                body: "Hello".to_owned(),
                ..SendEmailInput::default()
            })
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), "forbidden");
    }

    #[tokio::test]
    async fn send_validates_recipient_and_delivers() {
        let config = AppConfig {
            allow_direct_send: true,
            ..AppConfig::default()
        };
        let (dir, service) = service(config);

        let err = service
            .send_email(SendEmailInput {
                to: "not-an-address".to_owned(),
                ..SendEmailInput::default()
            })
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), "invalid_input");

        let envelope = service
            .send_email(SendEmailInput {
                to: "bob@example.com".to_owned(),
                subject: "Grüße".to_owned(),
                body: "Hello".to_owned(),
                ..SendEmailInput::default()
            })
            .await
            .expect("send");
        let stored = dir.path().join("sent").join(format!("{}.eml", envelope.data.id));
        let raw = std::fs::read_to_string(stored).expect("stored message");
        assert!(raw.contains("Subject: =?UTF-8?B?"));
    }

    #[tokio::test]
    async fn create_draft_reports_threading_status() {
        let (_dir, service) = service(AppConfig::default());

        let envelope = service
            .create_draft(CreateDraftInput {
                to: "bob@example.com".to_owned(),
                subject: "Re: Plan".to_owned(),
                body: "Sounds good".to_owned(),
                thread_id: Some("thread-7".to_owned()),
                in_reply_to_message_id: Some("<plan@example.com>".to_owned()),
                ..CreateDraftInput::default()
            })
            .await
            .expect("draft");
        assert_eq!(envelope.data.threading, ThreadingStatus::Threaded);
        assert_eq!(envelope.data.thread_id.as_deref(), Some("thread-7"));
        let text = draft_text(&service, &envelope.data.message_id).await;
        assert!(text.contains("In-Reply-To: <plan@example.com>\r\n"));
        assert!(text.contains("References: <plan@example.com>\r\n"));

        let envelope = service
            .create_draft(CreateDraftInput {
                to: "bob@example.com".to_owned(),
                subject: "Hello".to_owned(),
                thread_id: Some("thread-7".to_owned()),
                ..CreateDraftInput::default()
            })
            .await
            .expect("draft");
        assert_eq!(envelope.data.threading, ThreadingStatus::ThreadOnly);

        let envelope = service
            .create_draft(CreateDraftInput {
                to: "bob@example.com".to_owned(),
                subject: "Hello".to_owned(),
                ..CreateDraftInput::default()
            })
            .await
            .expect("draft");
        assert_eq!(envelope.data.threading, ThreadingStatus::Standalone);
    }

    #[tokio::test]
    async fn find_and_draft_reply_threads_into_conversation() {
        let (_dir, service) = service(AppConfig::default());
        let envelope = service
            .find_and_draft_reply(FindAndDraftReplyInput {
                sender_name: "Jane".to_owned(),
                reply_body: None,
            })
            .await
            .expect("reply");
        let data = envelope.data;
        assert_eq!(data.to, "jane@example.com");
        assert_eq!(data.subject, "Re: Project plan");
        assert_eq!(data.threading, ThreadingStatus::Threaded);
        assert_eq!(data.thread_id.as_deref(), Some("<kickoff@example.com>"));
        assert!(!data.custom_body);
        assert_eq!(data.original.id, "plan");

        let message_id = data
            .draft_id
            .strip_prefix("r-")
            .expect("draft id prefix")
            .to_owned();
        let text = draft_text(&service, &message_id).await;
        assert!(text.contains("In-Reply-To: <plan@example.com>\r\n"));
        assert!(text.contains("References: <kickoff@example.com> <plan@example.com>\r\n"));
        assert!(text.contains("[Write your reply here]"));
    }

    #[tokio::test]
    async fn find_and_draft_reply_reports_missing_sender() {
        let (_dir, service) = service(AppConfig::default());
        let err = service
            .find_and_draft_reply(FindAndDraftReplyInput {
                sender_name: "nobody".to_owned(),
                reply_body: Some("hi".to_owned()),
            })
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), "not_found");

        let err = service
            .find_and_draft_reply(FindAndDraftReplyInput::default())
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), "invalid_input");
    }

    #[tokio::test]
    async fn extract_unwraps_encapsulated_forward() {
        let (_dir, service) = service(AppConfig::default());
        let envelope = service
            .extract_forwarded_content(ExtractForwardedInput {
                email_id: "fwd".to_owned(),
                ..ExtractForwardedInput::default()
            })
            .await
            .expect("extract never fails");
        let data = envelope.data;
        assert!(data.success);
        assert_eq!(data.source, Some(ForwardSource::Encapsulated));
        assert_eq!(data.depth, Some(1));
        let headers = data.original_headers.expect("headers present");
        assert_eq!(headers.subject.as_deref(), Some("Invoice 42"));
    }

    #[tokio::test]
    async fn extract_reports_fetch_failure_in_result() {
        let (_dir, service) = service(AppConfig::default());
        let envelope = service
            .extract_forwarded_content(ExtractForwardedInput {
                email_id: "missing".to_owned(),
                ..ExtractForwardedInput::default()
            })
            .await
            .expect("extract never fails");
        assert!(!envelope.data.success);
        assert!(envelope.data.source.is_none());
        assert!(envelope.data.error.is_some());
    }

    #[test]
    fn preview_truncates_long_snippets() {
        let long = "x".repeat(200);
        let p = preview(&long);
        assert_eq!(p.chars().count(), 153);
        assert!(p.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn sender_with_spaces_is_quoted() {
        assert_eq!(quote_query_value("Jane Doe"), "\"Jane Doe\"");
        assert_eq!(quote_query_value("jane@example.com"), "jane@example.com");
    }

    #[test]
    fn rejects_control_chars() {
        let err = validate_no_controls("a\r\nb", "query").expect_err("must fail");
        assert!(err.to_string().contains("control characters"));
    }
}
