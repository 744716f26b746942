//! Defensive parse ladder for untrusted generation output.
//!
//! An ordered list of pure recovery stages, each `&str -> Result<Value>`,
//! tried in sequence. New stages slot in by appending to [`STAGES`]
//! without touching existing ones.

use serde_json::Value;
use tracing::debug;

use prospector_shared::{ProspectorError, Result};

/// A single recovery stage. Returns a parse failure message on miss.
type ParseStage = fn(&str) -> std::result::Result<Value, String>;

/// Recovery stages in attempt order.
const STAGES: &[(&str, ParseStage)] = &[
    ("direct", parse_direct),
    ("fenced-block", parse_fenced),
    ("brace-span", parse_first_object),
];

/// Run the ladder over raw generation text.
///
/// Returns the first stage's parsed value, or `Unparseable` carrying a
/// diagnostic snippet once every stage has failed.
pub fn extract_json(raw: &str) -> Result<Value> {
    for (name, stage) in STAGES {
        match stage(raw) {
            Ok(value) => {
                debug!(stage = name, "generation output parsed");
                return Ok(value);
            }
            Err(reason) => {
                debug!(stage = name, %reason, "parse stage missed");
            }
        }
    }
    Err(ProspectorError::unparseable(raw))
}

/// Stage 1: the raw text is already JSON.
fn parse_direct(raw: &str) -> std::result::Result<Value, String> {
    serde_json::from_str(raw.trim()).map_err(|e| e.to_string())
}

/// Stage 2: a fenced code block (with optional language tag) holds JSON.
fn parse_fenced(raw: &str) -> std::result::Result<Value, String> {
    let start = raw.find("```").ok_or("no fence found")?;
    let after_fence = &raw[start + 3..];

    // Skip an optional language tag up to the end of the fence line.
    let body_start = after_fence
        .find('\n')
        .map(|i| i + 1)
        .ok_or("fence has no body")?;
    let body = &after_fence[body_start..];

    let end = body.find("```").ok_or("fence never closes")?;
    serde_json::from_str(body[..end].trim()).map_err(|e| e.to_string())
}

/// Stage 3: the first top-level brace-delimited span, honoring strings and
/// escape sequences so braces inside values do not truncate the span.
fn parse_first_object(raw: &str) -> std::result::Result<Value, String> {
    let start = raw.find('{').ok_or("no opening brace")?;
    let bytes = raw.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let span = &raw[start..=start + offset];
                    return serde_json::from_str(span).map_err(|e| e.to_string());
                }
            }
            _ => {}
        }
    }

    Err("brace span never closes".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CLEAN: &str = r#"{"subject": "Quick question", "rank": 7}"#;

    #[test]
    fn clean_json_parses_directly() {
        let value = extract_json(CLEAN).expect("parse");
        assert_eq!(value["rank"], json!(7));
    }

    #[test]
    fn fenced_json_with_leading_prose_parses() {
        let raw = format!(
            "Here is the requested output:\n```json\n{CLEAN}\n```\nLet me know if you need changes."
        );
        let value = extract_json(&raw).expect("parse");
        assert_eq!(value["subject"], json!("Quick question"));
    }

    #[test]
    fn bare_fence_without_language_tag_parses() {
        let raw = format!("```\n{CLEAN}\n```");
        let value = extract_json(&raw).expect("parse");
        assert_eq!(value["rank"], json!(7));
    }

    #[test]
    fn brace_span_inside_prose_parses() {
        let raw = format!("Sure! The answer is {CLEAN} — hope that helps.");
        let value = extract_json(&raw).expect("parse");
        assert_eq!(value["rank"], json!(7));
    }

    #[test]
    fn braces_inside_string_values_do_not_truncate() {
        let raw = r#"Output: {"body": "use {braces} and \"quotes\"", "rank": 3} done"#;
        let value = extract_json(raw).expect("parse");
        assert_eq!(value["body"], json!("use {braces} and \"quotes\""));
    }

    #[test]
    fn malformed_text_raises_unparseable() {
        let result = extract_json("I could not produce the requested structure, sorry.");
        match result {
            Err(ProspectorError::Unparseable { snippet }) => {
                assert!(snippet.contains("could not produce"));
            }
            other => panic!("expected Unparseable, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_brace_span_raises_unparseable() {
        let result = extract_json(r#"{"subject": "never closes"#);
        assert!(matches!(result, Err(ProspectorError::Unparseable { .. })));
    }
}
