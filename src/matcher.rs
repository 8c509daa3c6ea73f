//! Verification code extraction from message text.
//!
//! This module provides the [`Matcher`] trait, a few building blocks, and the
//! [`CodeExtractor`]: an ordered cascade of matchers applied to each message's
//! `subject + " " + bodyPreview`.
//!
//! # Cascade
//!
//! For every message, in list order, the first rule that matches wins and the
//! whole extraction stops:
//!
//! 1. a standalone 6-digit run
//! 2. a standalone 4 to 8 digit run
//! 3. the first standalone 4 to 10 character `[A-Z0-9]` run, if it contains a digit
//! 4. a dash-separated three segment token such as `ABC-123-XYZ`
//! 5. up to 15 `[A-Za-z0-9-]` characters after a keyword (`code`, `verify`, `otp`, `验证码`, ...)
//!
//! Word boundaries are ASCII boundaries, so `验证码123456` still yields `123456`.
//!
//! # Example
//!
//! ```
//! use mailbox_otp::matcher::{CodeExtractor, Matcher};
//!
//! let extractor = CodeExtractor::new();
//! assert_eq!(extractor.find_match("Your code is 482913").as_deref(), Some("482913"));
//! assert_eq!(extractor.find_match("Ref ABC-123-XYZ, code 654321").as_deref(), Some("654321"));
//! ```

use crate::mail::Message;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::debug;

/// Trait for matching and extracting content from message text.
///
/// Implement this trait to add rules to a [`CodeExtractor`].
///
/// # Example
///
/// ```
/// use mailbox_otp::matcher::Matcher;
/// use std::borrow::Cow;
///
/// struct PrefixMatcher;
///
/// impl Matcher for PrefixMatcher {
///     fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
///         text.strip_prefix("CODE:").map(|rest| Cow::Borrowed(rest.trim()))
///     }
///
///     fn description(&self) -> &str {
///         "CODE: prefix"
///     }
/// }
/// ```
pub trait Matcher: Send + Sync {
    /// Attempts to find and extract matching content from the text.
    ///
    /// Returns `Some(matched_value)` if found, `None` otherwise.
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>>;

    /// Returns a human-readable description of what this matcher looks for.
    ///
    /// Used in logging.
    fn description(&self) -> &str;
}

/// Regex-based matcher that extracts the first capture group.
///
/// # Example
///
/// ```
/// use mailbox_otp::matcher::{RegexMatcher, Matcher};
///
/// let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
/// assert_eq!(matcher.find_match("Your code: 42"), Some("42".into()));
/// ```
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    description: String,
}

impl RegexMatcher {
    /// Creates a new regex matcher.
    ///
    /// The first capture group is extracted as the match result.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Self::with_description(pattern, format!("regex pattern: {pattern}"))
    }

    /// Creates a new regex matcher with a custom description.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn with_description(
        pattern: &str,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            description: description.into(),
        })
    }

    fn from_static(regex: &Regex, description: &str) -> Self {
        Self {
            regex: regex.clone(),
            description: description.to_string(),
        }
    }
}

impl Matcher for RegexMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| Cow::Borrowed(m.as_str()))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Matcher using a closure for custom matching logic.
///
/// # Example
///
/// ```
/// use mailbox_otp::matcher::{ClosureMatcher, Matcher};
/// use std::borrow::Cow;
///
/// let matcher = ClosureMatcher::new(
///     |text| {
///         text.lines()
///             .find(|line| line.starts_with("Code:"))
///             .map(|line| Cow::Owned(line.trim_start_matches("Code:").trim().to_string()))
///     },
///     "code line extractor"
/// );
///
/// let text = "Hello\nCode: ABC123\nThanks";
/// assert_eq!(matcher.find_match(text).as_deref(), Some("ABC123"));
/// ```
pub struct ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    matcher_fn: F,
    description: String,
}

impl<F> ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    /// Creates a new closure-based matcher.
    #[must_use]
    pub fn new(matcher_fn: F, description: impl Into<String>) -> Self {
        Self {
            matcher_fn,
            description: description.into(),
        }
    }
}

impl<F> Matcher for ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        (self.matcher_fn)(text)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<F> std::fmt::Debug for ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureMatcher")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

static SIX_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)([0-9]{6})(?-u:\b)").expect("valid regex"));

static FOUR_TO_EIGHT_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)([0-9]{4,8})(?-u:\b)").expect("valid regex"));

static UPPER_ALNUM_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)[A-Z0-9]{4,10}(?-u:\b)").expect("valid regex"));

static DASHED_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\b)([A-Za-z0-9]+-[A-Za-z0-9]+-[A-Za-z0-9]+)(?-u:\b)").expect("valid regex")
});

static KEYWORD_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:code|verification|verify|otp|验证码|код|pin)[:\s]*([A-Za-z0-9-]{4,15})")
        .expect("valid regex")
});

/// Only the first run is considered; a digit-free first run fails the rule.
fn first_alnum_run_with_digit(text: &str) -> Option<Cow<'_, str>> {
    UPPER_ALNUM_RUN
        .find(text)
        .map(|m| m.as_str())
        .filter(|run| run.bytes().any(|b| b.is_ascii_digit()))
        .map(Cow::Borrowed)
}

/// Ordered cascade of matchers that pulls a verification code out of messages.
///
/// Rule order and message order both decide the result for ambiguous input,
/// so rules are kept as an ordered list and applied strictly in sequence.
pub struct CodeExtractor {
    rules: Vec<Box<dyn Matcher>>,
}

impl CodeExtractor {
    /// Creates the standard five-rule cascade.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(vec![
            Box::new(RegexMatcher::from_static(&SIX_DIGITS, "6-digit code")),
            Box::new(RegexMatcher::from_static(&FOUR_TO_EIGHT_DIGITS, "4-8 digit code")),
            Box::new(ClosureMatcher::new(first_alnum_run_with_digit, "alphanumeric code")),
            Box::new(RegexMatcher::from_static(&DASHED_TOKEN, "dashed token")),
            Box::new(RegexMatcher::from_static(&KEYWORD_CODE, "code after keyword")),
        ])
    }

    /// Creates a cascade from custom rules, applied in the given order.
    #[must_use]
    pub fn with_rules(rules: Vec<Box<dyn Matcher>>) -> Self {
        Self { rules }
    }

    /// Returns the first code found across `messages`, in list order.
    #[must_use]
    pub fn extract(&self, messages: &[Message]) -> Option<String> {
        for message in messages {
            let text = format!("{} {}", message.subject, message.body_preview);
            if let Some(code) = self.find_match(&text) {
                debug!(message_id = %message.id, folder = %message.folder, "Code found in message");
                return Some(code.into_owned());
            }
        }

        debug!(checked = messages.len(), "No verification code found");
        None
    }
}

impl Default for CodeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher for CodeExtractor {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.rules.iter().find_map(|rule| {
            let found = rule.find_match(text)?;
            debug!(rule = rule.description(), "Cascade rule matched");
            Some(found)
        })
    }

    fn description(&self) -> &str {
        "verification code cascade"
    }
}

impl std::fmt::Debug for CodeExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| rule.description()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::Folder;

    fn message(id: &str, subject: &str, preview: &str) -> Message {
        Message {
            id: id.to_string(),
            subject: subject.to_string(),
            from: "sender@example.com".to_string(),
            body_preview: preview.to_string(),
            received_date_time: String::new(),
            received_at: None,
            folder: Folder::Inbox,
            body: None,
            body_type: None,
        }
    }

    fn code(text: &str) -> Option<String> {
        CodeExtractor::new().find_match(text).map(Cow::into_owned)
    }

    #[test]
    fn test_six_digit_subject() {
        let messages = vec![message("1", "Your code is 482913", "")];
        assert_eq!(
            CodeExtractor::new().extract(&messages).as_deref(),
            Some("482913")
        );
    }

    #[test]
    fn test_six_digits_beat_dashed_token() {
        assert_eq!(
            code("Ref ABC-123-XYZ then 123456").as_deref(),
            Some("123456")
        );
    }

    #[test]
    fn test_six_digits_beat_earlier_shorter_run() {
        // Rule 1 scans the whole text before rule 2 is tried.
        assert_eq!(code("Order 1234, code 987654").as_deref(), Some("987654"));
    }

    #[test]
    fn test_four_to_eight_digits() {
        assert_eq!(code("PIN 4821").as_deref(), Some("4821"));
        assert_eq!(code("Code 12345678").as_deref(), Some("12345678"));
        // Nine digits skip rules 1 and 2 and fall through to the alphanumeric rule.
        assert_eq!(code("Serial 123456789 only").as_deref(), Some("123456789"));
    }

    #[test]
    fn test_alphanumeric_requires_digit_in_first_run() {
        assert_eq!(code("Use K7Q2ZP to continue").as_deref(), Some("K7Q2ZP"));
        // First uppercase run has no digit, so the rule does not look further.
        assert_eq!(code("HELLO there A1B2C"), None);
    }

    #[test]
    fn test_dashed_token_case_insensitive() {
        assert_eq!(
            code("Your token: abc-def-ghi").as_deref(),
            Some("abc-def-ghi")
        );
    }

    #[test]
    fn test_keyword_code() {
        assert_eq!(code("Login pin: ab-cd").as_deref(), Some("ab-cd"));
        assert_eq!(code("otp:zyxw").as_deref(), Some("zyxw"));
    }

    #[test]
    fn test_ascii_word_boundaries_around_cjk() {
        assert_eq!(code("您的验证码123456").as_deref(), Some("123456"));
    }

    #[test]
    fn test_no_code() {
        let messages = vec![message("1", "Welcome aboard", "Thanks for joining us")];
        assert_eq!(CodeExtractor::new().extract(&messages), None);
        assert_eq!(CodeExtractor::new().extract(&[]), None);
    }

    #[test]
    fn test_message_order_wins_over_rule_strength() {
        let messages = vec![
            message("1", "Your PIN 4321", ""),
            message("2", "Your code is 482913", ""),
        ];
        assert_eq!(
            CodeExtractor::new().extract(&messages).as_deref(),
            Some("4321")
        );
    }

    #[test]
    fn test_subject_and_preview_are_joined() {
        let messages = vec![message("1", "Sign in", "Enter 556677 to continue")];
        assert_eq!(
            CodeExtractor::new().extract(&messages).as_deref(),
            Some("556677")
        );
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let messages = vec![
            message("1", "Hi", "nothing"),
            message("2", "ABC-123-XYZ", "verify: QQ11"),
        ];
        let extractor = CodeExtractor::new();
        let first = extractor.extract(&messages);
        for _ in 0..10 {
            assert_eq!(extractor.extract(&messages), first);
        }
    }

    #[test]
    fn test_custom_rules() {
        let rule = RegexMatcher::new(r"token=([a-f0-9]+)").unwrap();
        let extractor = CodeExtractor::with_rules(vec![Box::new(rule)]);
        assert_eq!(
            extractor.find_match("/verify?token=beef").as_deref(),
            Some("beef")
        );
        assert_eq!(extractor.find_match("123456"), None);
    }

    #[test]
    fn test_regex_matcher_returns_borrowed() {
        let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
        let result = matcher.find_match("Your code: 12345");
        assert!(matches!(result, Some(Cow::Borrowed(_))));
    }
}
