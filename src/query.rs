//! Mailbox search query parsing and matching
//!
//! Supports the subset of mailbox search syntax the adapter itself emits and
//! that users commonly type:
//!
//! - `from:alice`, `to:bob@example.com`, `subject:"two words"`
//! - `in:inbox`, `-in:sent` (label filter)
//! - `has:attachment`
//! - bare words, matched against subject and body
//! - `-term` negates any term
//!
//! Terms combine with AND. Matching is case-insensitive substring.

/// Field a term applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryField {
    From,
    To,
    Subject,
    Label,
    HasAttachment,
    /// Subject or body
    Text,
}

/// A single parsed term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTerm {
    pub field: QueryField,
    /// Lowercased needle (empty for `has:attachment`)
    pub value: String,
    pub negated: bool,
}

/// Parsed query; an empty term list matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailQuery {
    pub terms: Vec<QueryTerm>,
}

/// The message facets a query is evaluated against
#[derive(Debug, Clone, Default)]
pub struct QueryTarget<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    /// Mailbox label, e.g. `DRAFT`
    pub label: &'a str,
    /// Folder the label is stored under, e.g. `drafts`
    pub folder: &'a str,
    pub has_attachment: bool,
}

impl MailQuery {
    /// Parse a query string
    ///
    /// Never fails; unknown `key:value` tokens are treated as plain text.
    pub fn parse(input: &str) -> Self {
        let terms = tokenize(input.trim())
            .iter()
            .filter_map(|token| parse_term(token))
            .collect();
        Self { terms }
    }

    /// Whether every term holds for `target`
    pub fn matches(&self, target: &QueryTarget<'_>) -> bool {
        self.terms.iter().all(|term| term.matches(target))
    }
}

impl QueryTerm {
    fn matches(&self, target: &QueryTarget<'_>) -> bool {
        let hit = match self.field {
            QueryField::From => contains(target.from, &self.value),
            QueryField::To => contains(target.to, &self.value),
            QueryField::Subject => contains(target.subject, &self.value),
            QueryField::Label => {
                target.label.eq_ignore_ascii_case(&self.value)
                    || target.folder.eq_ignore_ascii_case(&self.value)
            }
            QueryField::HasAttachment => target.has_attachment,
            QueryField::Text => {
                contains(target.subject, &self.value) || contains(target.body, &self.value)
            }
        };
        hit != self.negated
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn parse_term(token: &str) -> Option<QueryTerm> {
    let (negated, token) = match token.strip_prefix('-') {
        Some(rest) if !rest.is_empty() => (true, rest),
        _ => (false, token),
    };

    let (field, value) = if let Some(v) = token.strip_prefix("from:") {
        (QueryField::From, v)
    } else if let Some(v) = token.strip_prefix("to:") {
        (QueryField::To, v)
    } else if let Some(v) = token.strip_prefix("subject:") {
        (QueryField::Subject, v)
    } else if let Some(v) = token.strip_prefix("in:") {
        (QueryField::Label, v)
    } else if let Some(v) = token.strip_prefix("has:") {
        if !matches!(v, "attachment" | "attachments") {
            return None;
        }
        (QueryField::HasAttachment, "")
    } else {
        (QueryField::Text, token)
    };

    let value = unquote(value).to_lowercase();
    if value.is_empty() && field != QueryField::HasAttachment {
        return None;
    }
    Some(QueryTerm {
        field,
        value,
        negated,
    })
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(value)
}

/// Tokenize input respecting quoted strings
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
            current.push(ch);
        } else if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
