use std::{fmt, sync::Arc};

use regex::Regex;
use serde_json::Value;

/// Decides whether a registration applies to an envelope payload.
///
/// String fields are addressed with JSON pointers (`/text`, `/actions/0/action_id`).
/// A missing or non-string field is a reject.
#[derive(Clone)]
pub enum Matcher {
    Exact { pointer: String, value: String },
    Pattern { pointer: String, regex: Regex },
    Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
    All(Vec<Matcher>),
}

impl Matcher {
    pub fn exact(pointer: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Exact { pointer: pointer.into(), value: value.into() }
    }

    pub fn pattern(pointer: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Pattern { pointer: pointer.into(), regex: Regex::new(pattern)? })
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    pub fn all(matchers: impl IntoIterator<Item = Matcher>) -> Self {
        Self::All(matchers.into_iter().collect())
    }

    /// Message text equal to `value`.
    pub fn text(value: impl Into<String>) -> Self {
        Self::exact("/text", value)
    }

    pub fn text_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Self::pattern("/text", pattern)
    }

    /// Accepts when the payload has any value at `pointer`.
    pub fn has_field(pointer: &'static str) -> Self {
        Self::predicate(move |payload| {
            payload.pointer(pointer).is_some_and(|value| !value.is_null())
        })
    }

    /// Rejects messages posted by bots, this app included.
    pub fn not_from_bot() -> Self {
        Self::predicate(|payload| {
            payload.get("bot_id").is_none()
                && payload.get("subtype").and_then(Value::as_str) != Some("bot_message")
        })
    }

    /// Returns the capture groups on acceptance (group 0 is the whole match),
    /// an empty list when the matcher does not capture, and `None` on reject.
    pub fn evaluate(&self, payload: &Value) -> Option<Vec<String>> {
        match self {
            Self::Exact { pointer, value } => {
                let field = payload.pointer(pointer).and_then(Value::as_str)?;
                (field == value).then(Vec::new)
            }
            Self::Pattern { pointer, regex } => {
                let field = payload.pointer(pointer).and_then(Value::as_str)?;
                let captures = regex.captures(field)?;
                Some(
                    captures
                        .iter()
                        .map(|group| group.map(|m| m.as_str().to_owned()).unwrap_or_default())
                        .collect(),
                )
            }
            Self::Predicate(predicate) => predicate(payload).then(Vec::new),
            Self::All(matchers) => {
                let mut matches = Vec::new();
                for matcher in matchers {
                    let captured = matcher.evaluate(payload)?;
                    if matches.is_empty() {
                        matches = captured;
                    }
                }
                Some(matches)
            }
        }
    }

    pub fn accepts(&self, payload: &Value) -> bool {
        self.evaluate(payload).is_some()
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact { pointer, value } => {
                f.debug_struct("Exact").field("pointer", pointer).field("value", value).finish()
            }
            Self::Pattern { pointer, regex } => f
                .debug_struct("Pattern")
                .field("pointer", pointer)
                .field("regex", &regex.as_str())
                .finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::All(matchers) => f.debug_tuple("All").field(matchers).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Matcher;

    #[test]
    fn exact_text_matches_whole_string_only() {
        let matcher = Matcher::text("hello");

        assert!(matcher.accepts(&json!({ "text": "hello" })));
        assert!(!matcher.accepts(&json!({ "text": "hello there" })));
        assert!(!matcher.accepts(&json!({ "text": "Hello" })));
    }

    #[test]
    fn missing_or_non_string_field_is_a_reject() {
        let matcher = Matcher::text("hello");

        assert!(!matcher.accepts(&json!({})));
        assert!(!matcher.accepts(&json!({ "text": 42 })));
    }

    #[test]
    fn pattern_exposes_capture_groups() {
        let matcher = Matcher::text_pattern("^(hi|hello|hey|:wave:).*").expect("valid regex");

        let matches = matcher.evaluate(&json!({ "text": "hey team" })).expect("accepted");

        assert_eq!(matches, vec!["hey team".to_owned(), "hey".to_owned()]);
        assert!(matcher.evaluate(&json!({ "text": "good morning" })).is_none());
    }

    #[test]
    fn bot_posts_are_rejected() {
        let matcher = Matcher::not_from_bot();

        assert!(matcher.accepts(&json!({ "user": "U1", "text": "hello" })));
        assert!(!matcher.accepts(&json!({ "bot_id": "B1", "text": "hello" })));
        assert!(!matcher.accepts(&json!({ "subtype": "bot_message", "text": "hello" })));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(Matcher::text_pattern("(unclosed").is_err());
    }

    #[test]
    fn all_requires_every_member_and_keeps_first_captures() {
        let matcher = Matcher::all([
            Matcher::exact("/actions/0/action_id", "button_abc"),
            Matcher::has_field("/view/id"),
        ]);

        assert!(matcher.accepts(&json!({
            "actions": [{ "action_id": "button_abc" }],
            "view": { "id": "V1" }
        })));
        assert!(!matcher.accepts(&json!({
            "actions": [{ "action_id": "button_abc" }],
            "message": { "ts": "1.0" }
        })));
    }

    #[test]
    fn predicate_wraps_arbitrary_logic() {
        let matcher = Matcher::predicate(|payload| payload["count"].as_u64() == Some(3));

        assert!(matcher.accepts(&json!({ "count": 3 })));
        assert!(!matcher.accepts(&json!({ "count": 4 })));
    }

    #[test]
    fn debug_output_names_the_pattern() {
        let matcher = Matcher::text_pattern("^knock").expect("valid regex");
        assert!(format!("{matcher:?}").contains("^knock"));
    }
}
