//! Recovery parser for language-model output
//!
//! Turns free text into a JSON object without ever failing. Strategies run
//! cheapest first and the first success wins:
//!
//! 1. Already-structured input is returned unchanged
//! 2. Strict decode of the trimmed text
//! 3. Strict decode of the first fenced code block (its inner text becomes
//!    the working text if that fails)
//! 4. Cut the working text at its first `{`
//! 5. Close unmatched `{` then unmatched `[` (output truncated by token limits)
//! 6. Single quotes not preceded by a backslash become double quotes
//! 7. Trailing commas before `}` / `]` are dropped
//! 8. Strict decode of the repaired text
//!
//! When every strategy fails the caller receives a diagnostic envelope
//! (`{raw, error, status: "parse_failed"}`) instead of an error.
//!
//! # Example
//! ```
//! use voxlens_ai::parser::recover;
//!
//! let parsed = recover("Here's the analysis: {'score': 85, 'level': 'high',}");
//! assert_eq!(parsed["score"], 85);
//! assert_eq!(parsed["level"], "high");
//! ```

use crate::types::Mapping;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Maximum characters of the offending text kept in a diagnostic envelope
pub const RAW_PREVIEW_LIMIT: usize = 500;

/// `status` value of a diagnostic envelope
pub const STATUS_PARSE_FAILED: &str = "parse_failed";

/// `status` value of the envelope for a missing response
pub const STATUS_FAILED: &str = "failed";

/// Error text when the input contains no `{` at all
pub const NO_OBJECT_FOUND: &str = "No JSON object found";

/// First fenced block, optional language tag (```json, ```JSON, ```)
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```[A-Za-z0-9_+\-]*\s*([\s\S]*?)\s*```").expect("fenced block pattern is valid")
});

/// Comma followed only by whitespace before a closing brace/bracket
static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("trailing comma pattern is valid"));

/// Parser input: model text, an already-structured value, or no response at all
#[derive(Debug, Clone, PartialEq)]
pub enum ParseInput {
    /// Already structured, returned unchanged
    Mapping(Mapping),
    /// Free text from the model
    Text(String),
    /// Model produced no response
    Missing,
}

impl From<&str> for ParseInput {
    fn from(text: &str) -> Self {
        ParseInput::Text(text.to_string())
    }
}

impl From<String> for ParseInput {
    fn from(text: String) -> Self {
        ParseInput::Text(text)
    }
}

impl From<Mapping> for ParseInput {
    fn from(mapping: Mapping) -> Self {
        ParseInput::Mapping(mapping)
    }
}

impl From<Option<String>> for ParseInput {
    fn from(text: Option<String>) -> Self {
        text.map_or(ParseInput::Missing, ParseInput::Text)
    }
}

impl From<Value> for ParseInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mapping) => ParseInput::Mapping(mapping),
            Value::String(text) => ParseInput::Text(text),
            Value::Null => ParseInput::Missing,
            other => ParseInput::Text(other.to_string()),
        }
    }
}

/// Recover a JSON object from model output. Never fails.
pub fn recover(input: impl Into<ParseInput>) -> Mapping {
    match input.into() {
        ParseInput::Mapping(mapping) => mapping,
        ParseInput::Missing => {
            warn!("Received no model response to parse");
            object(json!({ "error": "no response", "status": STATUS_FAILED }))
        }
        ParseInput::Text(text) => recover_text(&text),
    }
}

/// True when `mapping` is a diagnostic envelope produced by [`recover`]
pub fn is_parse_failure(mapping: &Mapping) -> bool {
    mapping.get("status").and_then(Value::as_str) == Some(STATUS_PARSE_FAILED)
}

/// True for either envelope [`recover`] produces instead of model data
pub fn is_recovery_envelope(mapping: &Mapping) -> bool {
    is_parse_failure(mapping)
        || mapping.get("status").and_then(Value::as_str) == Some(STATUS_FAILED)
}

fn recover_text(text: &str) -> Mapping {
    let trimmed = text.trim();

    if let Some(mapping) = decode_object(trimmed) {
        debug!("Parsed model output directly");
        return mapping;
    }
    debug!("Direct parse failed, trying recovery strategies");

    let mut working = trimmed;
    if let Some(inner) = FENCED_BLOCK
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
    {
        if let Some(mapping) = decode_object(inner) {
            debug!("Parsed model output from fenced code block");
            return mapping;
        }
        debug!("Fenced block found but not valid JSON, continuing with its contents");
        working = inner;
    }

    let Some(start) = working.find('{') else {
        warn!("No JSON object found in model output");
        return diagnostic_envelope(working, NO_OBJECT_FOUND.to_string());
    };

    let repaired = repair(&working[start..]);

    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(mapping)) => {
            info!("Parsed model output after recovery");
            mapping
        }
        Ok(other) => {
            // A candidate starting with '{' only decodes to an object; kept for totality
            warn!("Recovered JSON is not an object");
            diagnostic_envelope(
                &repaired,
                format!("JSON parse failed after recovery: expected object, found {}", other),
            )
        }
        Err(e) => {
            warn!(error = %e, "JSON parse failed after all recovery attempts");
            diagnostic_envelope(&repaired, format!("JSON parse failed after recovery: {}", e))
        }
    }
}

/// Strict decode that only accepts a JSON object
fn decode_object(text: &str) -> Option<Mapping> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mapping)) => Some(mapping),
        _ => None,
    }
}

/// Apply the textual repairs in order: bracket balancing, quote style, trailing commas
fn repair(candidate: &str) -> String {
    let balanced = balance_brackets(candidate);
    let quoted = replace_single_quotes(&balanced);
    TRAILING_COMMA.replace_all(&quoted, "$1").into_owned()
}

/// Append one `}` per unmatched `{`, then one `]` per unmatched `[`
fn balance_brackets(text: &str) -> String {
    let missing_curly = text.matches('{').count().saturating_sub(text.matches('}').count());
    let missing_square = text.matches('[').count().saturating_sub(text.matches(']').count());

    let mut balanced = String::with_capacity(text.len() + missing_curly + missing_square);
    balanced.push_str(text);
    balanced.extend(std::iter::repeat('}').take(missing_curly));
    balanced.extend(std::iter::repeat(']').take(missing_square));
    balanced
}

/// Python-style dict literals: `'` becomes `"` unless escaped
fn replace_single_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    for c in text.chars() {
        if c == '\'' && previous != Some('\\') {
            out.push('"');
        } else {
            out.push(c);
        }
        previous = Some(c);
    }
    out
}

fn diagnostic_envelope(raw: &str, error: String) -> Mapping {
    let preview: String = raw.chars().take(RAW_PREVIEW_LIMIT).collect();
    object(json!({
        "raw": preview,
        "error": error,
        "status": STATUS_PARSE_FAILED,
    }))
}

fn object(value: Value) -> Mapping {
    match value {
        Value::Object(mapping) => mapping,
        _ => Mapping::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_brackets_appends_curly_before_square() {
        assert_eq!(balance_brackets(r#"{"a": {"b": 1"#), r#"{"a": {"b": 1}}"#);
        assert_eq!(balance_brackets(r#"{"a": [1"#), r#"{"a": [1}]"#);
        assert_eq!(balance_brackets("{}"), "{}");
    }

    #[test]
    fn test_escaped_single_quote_is_kept() {
        assert_eq!(replace_single_quotes(r"{'a': 'it\'s'}"), r#"{"a": "it\'s"}"#);
    }

    #[test]
    fn test_trailing_commas_removed() {
        assert_eq!(repair("{\"a\": [1, 2,\n], \"b\": 3 ,\t}"), "{\"a\": [1, 2], \"b\": 3 }");
    }

    #[test]
    fn test_non_object_json_is_not_accepted() {
        let parsed = recover("[1, 2, 3]");
        assert!(is_parse_failure(&parsed));
        assert_eq!(parsed["error"], NO_OBJECT_FOUND);
    }

    #[test]
    fn test_missing_response() {
        let parsed = recover(None::<String>);
        assert_eq!(parsed["error"], "no response");
        assert_eq!(parsed["status"], "failed");
        assert!(!is_parse_failure(&parsed));
    }

    #[test]
    fn test_value_input_dispatch() {
        let parsed = recover(json!({"score": 1}));
        assert_eq!(parsed["score"], 1);

        let parsed = recover(json!("{\"score\": 2}"));
        assert_eq!(parsed["score"], 2);

        let parsed = recover(Value::Null);
        assert_eq!(parsed["status"], "failed");
    }

    #[test]
    fn test_fence_without_language_tag() {
        let parsed = recover("Result:\n```\n{\"score\": 70}\n```\nDone.");
        assert_eq!(parsed["score"], 70);
    }

    #[test]
    fn test_invalid_fence_contents_become_working_text() {
        // Prose outside the fence contains a brace that must be ignored
        let parsed = recover("Note {ignored\n```python\n{'score': 64,}\n```");
        assert_eq!(parsed["score"], 64);
    }
}
