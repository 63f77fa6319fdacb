//! Mailbox address extraction from free-form header values

use std::sync::OnceLock;

use regex::Regex;

/// Extract a bare mailbox address from a `From`/`To` style header value
///
/// Tries, in order: an angle-bracketed token containing `@`, the first bare
/// `local@domain` token, and finally the whole trimmed input when it already
/// looks like `local@domain.tld`. Returns an empty string when nothing
/// matches; callers must treat that as a resolution failure.
pub fn extract_address(header_value: &str) -> String {
    if let Some(caps) = angle_regex().captures(header_value) {
        return caps[1].to_owned();
    }
    if let Some(m) = bare_regex().find(header_value) {
        return m.as_str().to_owned();
    }
    let trimmed = header_value.trim();
    if is_valid_address(trimmed) {
        trimmed.to_owned()
    } else {
        String::new()
    }
}

/// Check the simple `local@domain.tld` shape with no whitespace
pub fn is_valid_address(value: &str) -> bool {
    shape_regex().is_match(value)
}

fn angle_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"<([^<>]+@[^<>]+)>").expect("valid angle address regex"))
}

fn bare_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[^\s<>]+@[^\s<>]+").expect("valid bare address regex"))
}

fn shape_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid address shape regex"))
}
