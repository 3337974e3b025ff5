//! Best-effort extraction of JSON from model output
//!
//! Model replies are supposed to hold a single JSON object or array but
//! usually arrive wrapped in prose, code fences or escaped newlines.
//! Extraction never fails: anything unparseable degrades to an empty
//! default so one bad turn cannot break the conversation.
//!
//! Grammar (applied to arbitrary surrounding text):
//! - object: first `{` up to the LAST `}` after it
//! - array:  first `[` up to the FIRST `]` after it (top-level arrays are
//!   assumed not to nest, so `[[1],[2]]` does not parse)
//! - a missing closing delimiter is appended
//! - escaped `\n` sequences turn into spaces, then backslashes and raw
//!   newlines are removed from the slice before parsing

use crate::models::{AgentState, JsonMap};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::OnceLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Object,
    Array,
}

impl Delimiter {
    fn open(self) -> char {
        match self {
            Delimiter::Object => '{',
            Delimiter::Array => '[',
        }
    }

    fn close(self) -> char {
        match self {
            Delimiter::Object => '}',
            Delimiter::Array => ']',
        }
    }

    fn empty_literal(self) -> &'static str {
        match self {
            Delimiter::Object => "{}",
            Delimiter::Array => "[]",
        }
    }

    /// Candidate slice, or `None` when the text has no opening delimiter.
    fn locate(self, text: &str) -> Option<Cow<'_, str>> {
        let start = text.find(self.open())?;
        let rest = &text[start..];

        let end = match self {
            Delimiter::Object => rest.rfind(self.close()),
            Delimiter::Array => rest.find(self.close()),
        };

        Some(match end {
            Some(end) => Cow::Borrowed(&rest[..=end]),
            None => Cow::Owned(format!("{}{}", rest, self.close())),
        })
    }
}

/// Escaped `\n` sequences become spaces; other backslashes and raw newlines are dropped.
fn strip_escapes(slice: &str) -> String {
    slice
        .replace("\\n", " ")
        .chars()
        .filter(|c| *c != '\\' && *c != '\n')
        .collect()
}

fn extract(text: Option<&str>, delimiter: Delimiter) -> Option<Value> {
    let text = text?;
    if text.is_empty() || text == delimiter.empty_literal() {
        return None;
    }

    let Some(slice) = delimiter.locate(text) else {
        debug!(?delimiter, "No JSON delimiter found in model output");
        return None;
    };

    match serde_json::from_str::<Value>(&strip_escapes(&slice)) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, raw = %text, "Failed to extract JSON from model output");
            None
        }
    }
}

/// Extract a JSON object from `text`, or `{}`.
pub fn extract_object<'a>(text: impl Into<Option<&'a str>>) -> JsonMap {
    match extract(text.into(), Delimiter::Object) {
        Some(Value::Object(map)) => map,
        _ => JsonMap::new(),
    }
}

/// Extract a JSON array from `text`, or `[]`.
pub fn extract_array<'a>(text: impl Into<Option<&'a str>>) -> Vec<Value> {
    match extract(text.into(), Delimiter::Array) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@(\w+)").expect("static regex is valid"))
}

/// Every `@name` mention in `content`, in order of appearance.
pub fn at_mentions(content: &str) -> Vec<String> {
    mention_pattern()
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Text of the last message, or `""` for an empty conversation.
pub fn latest_message_content(state: &AgentState) -> String {
    state
        .latest_message()
        .map(|message| message.text())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use serde_json::json;

    #[test]
    fn test_object_embedded_in_prose() {
        let result = extract_object("here: {\"a\": 1}\nthanks");
        assert_eq!(Value::Object(result), json!({"a": 1}));
    }

    #[test]
    fn test_object_with_escaped_newline_noise() {
        let noisy = r#"Result:\n```json\n{\n  \"signal\": \"bullish\",\n  \"confidence\": 80\n}\n```"#;
        let result = extract_object(noisy);
        assert_eq!(Value::Object(result), json!({"signal": "bullish", "confidence": 80}));
    }

    #[test]
    fn test_nested_object_uses_last_brace() {
        let result = extract_object("x {\"a\": {\"b\": [1, 2]}} y");
        assert_eq!(Value::Object(result), json!({"a": {"b": [1, 2]}}));
    }

    #[test]
    fn test_empty_inputs_give_empty_defaults() {
        assert!(extract_object("").is_empty());
        assert!(extract_object(None).is_empty());
        assert!(extract_object("{}").is_empty());

        assert!(extract_array("").is_empty());
        assert!(extract_array(None).is_empty());
        assert!(extract_array("[]").is_empty());
    }

    #[test]
    fn test_unparseable_input_fails_soft() {
        assert!(extract_object("{not json").is_empty());
        assert!(extract_array("{not json").is_empty());
        assert!(extract_array("[not, json").is_empty());
        assert!(extract_object("no braces at all").is_empty());
    }

    #[test]
    fn test_array_embedded_in_prose() {
        let result = extract_array("Sure! [\"What is AAPL's P/E?\", \"Compare with MSFT\"] hope it helps");
        assert_eq!(
            Value::Array(result),
            json!(["What is AAPL's P/E?", "Compare with MSFT"])
        );
    }

    #[test]
    fn test_array_of_objects() {
        let result = extract_array(
            "```json\n[{\"short_name\": \"Apple\", \"en_name\": \"Apple Inc.\", \"symbol\": \"AAPL\"}]\n```",
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["symbol"], "AAPL");
    }

    #[test]
    fn test_unclosed_array_gets_closing_bracket() {
        let result = extract_array("[\"a\", \"b\"");
        assert_eq!(Value::Array(result), json!(["a", "b"]));
    }

    #[test]
    fn test_nested_array_stops_at_first_bracket() {
        assert!(extract_array("[[1, 2], [3]]").is_empty());
    }

    #[test]
    fn test_non_object_value_is_rejected() {
        assert!(extract_object("[1, 2]").is_empty());
    }

    #[test]
    fn test_at_mentions() {
        assert_eq!(
            at_mentions("analyze AAPL with @warren_buffett and @information_query please"),
            vec!["warren_buffett".to_string(), "information_query".to_string()]
        );
        assert!(at_mentions("no mentions").is_empty());
    }

    #[test]
    fn test_latest_message_content() {
        let empty = AgentState::default();
        assert_eq!(latest_message_content(&empty), "");

        let state = AgentState::with_messages(vec![Message::user("one"), Message::user("two")]);
        assert_eq!(latest_message_content(&state), "two");
    }
}
