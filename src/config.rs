//! Configuration loaded from environment variables
//!
//! All keys use the `MAIL_THREAD_` prefix. A `.env` file is loaded by `main`
//! before this module reads the environment.

use std::env;
use std::env::VarError;
use std::path::PathBuf;

use crate::errors::{AppError, AppResult};
use crate::forward;

/// Default nesting levels unwound by forwarded-content extraction
const DEFAULT_MAX_DEPTH: usize = 3;
/// Default page size for list/search
const DEFAULT_MAX_RESULTS: usize = 10;
/// Upper bound accepted for list/search page size
pub const MAX_RESULTS_LIMIT: usize = 100;

/// Adapter-wide configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root of the local mailbox directory, if configured
    pub mailbox_dir: Option<PathBuf>,
    /// Whether `send_email` may deliver without a draft step
    pub allow_direct_send: bool,
    /// Extraction depth used when a request omits `maxDepth`
    pub default_max_depth: usize,
    /// Page size used when list/search omit `maxResults`
    pub default_max_results: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mailbox_dir: None,
            allow_direct_send: false,
            default_max_depth: DEFAULT_MAX_DEPTH,
            default_max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl AppConfig {
    /// Load all configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a variable is set to a malformed value.
    ///
    /// # Example Environment
    ///
    /// ```text
    /// MAIL_THREAD_MAILBOX_DIR=/var/mail/me
    /// MAIL_THREAD_ALLOW_DIRECT_SEND=false
    /// MAIL_THREAD_DEFAULT_MAX_DEPTH=3
    /// MAIL_THREAD_DEFAULT_MAX_RESULTS=10
    /// ```
    pub fn load_from_env() -> AppResult<Self> {
        let mailbox_dir = optional_env("MAIL_THREAD_MAILBOX_DIR")?.map(PathBuf::from);
        let default_max_depth = forward::clamp_depth(parse_usize_env(
            "MAIL_THREAD_DEFAULT_MAX_DEPTH",
            DEFAULT_MAX_DEPTH,
        )?);
        let default_max_results =
            parse_usize_env("MAIL_THREAD_DEFAULT_MAX_RESULTS", DEFAULT_MAX_RESULTS)?;
        if !(1..=MAX_RESULTS_LIMIT).contains(&default_max_results) {
            return Err(AppError::InvalidInput(format!(
                "MAIL_THREAD_DEFAULT_MAX_RESULTS must be in range 1..{MAX_RESULTS_LIMIT}"
            )));
        }

        Ok(Self {
            mailbox_dir,
            allow_direct_send: parse_bool_env("MAIL_THREAD_ALLOW_DIRECT_SEND", false)?,
            default_max_depth,
            default_max_results,
        })
    }
}

/// Read an optional environment variable, treating blank values as unset
fn optional_env(key: &str) -> AppResult<Option<String>> {
    match env::var(key) {
        Ok(v) if v.trim().is_empty() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

/// Parse a boolean environment variable with flexible values
///
/// Accepts: `1`, `true`, `yes`, `y`, `on` (truthy) or `0`, `false`, `no`,
/// `n`, `off` (falsy). Case-insensitive. Returns `default` if unset.
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set to an unrecognized value.
fn parse_bool_env(key: &str, default: bool) -> AppResult<bool> {
    match optional_env(key)? {
        Some(v) => parse_bool_value(&v).ok_or_else(|| {
            AppError::InvalidInput(format!("invalid boolean environment variable {key}: '{v}'"))
        }),
        None => Ok(default),
    }
}

fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `usize` environment variable with default fallback
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but not a valid `usize`.
fn parse_usize_env(key: &str, default: usize) -> AppResult<usize> {
    match optional_env(key)? {
        Some(v) => v.trim().parse::<usize>().map_err(|_| {
            AppError::InvalidInput(format!("invalid usize environment variable {key}: '{v}'"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, parse_bool_value};

    #[test]
    fn parse_bool_value_accepts_common_truthy_and_falsy_values() {
        for truthy in ["1", "true", "TRUE", " yes ", "Y", "on"] {
            assert_eq!(parse_bool_value(truthy), Some(true));
        }

        for falsy in ["0", "false", "FALSE", " no ", "N", "off"] {
            assert_eq!(parse_bool_value(falsy), Some(false));
        }
    }

    #[test]
    fn parse_bool_value_rejects_unrecognized_values() {
        for invalid in ["", "2", "maybe", "enabled", "disabled"] {
            assert_eq!(parse_bool_value(invalid), None);
        }
    }

    #[test]
    fn defaults_are_safe() {
        let config = AppConfig::default();
        assert!(!config.allow_direct_send);
        assert_eq!(config.default_max_depth, 3);
        assert_eq!(config.default_max_results, 10);
        assert!(config.mailbox_dir.is_none());
    }
}
