//! Parsing provider reply text into an [`ExpertResult`]
//!
//! Replies are untrusted. They are decoded, never interpreted; the invariant
//! checks live in [`ExpertResult::validate`].

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::model::ExpertResult;

/// Opening code fence with an optional language tag
static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*\s*\n").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("reply contains no JSON object")]
    NoJsonObject,

    #[error("reply does not match the expert result schema: {0}")]
    SchemaMismatch(String),
}

/// Locate the JSON object in a reply.
///
/// Accepts a bare object or one wrapped in a Markdown code fence, and ignores
/// prose before the first `{` and after the last `}`.
#[must_use]
pub fn extract_json(raw: &str) -> Option<&str> {
    let mut text = raw.trim();

    if let Some(found) = FENCE_OPEN.find(text) {
        text = &text[found.end()..];
        if let Some(close) = text.rfind("```") {
            text = &text[..close];
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Decode a reply for the expert `expected_key`.
///
/// A mismatched `expert` field is rewritten to `expected_key` with a warning.
pub fn parse_reply(raw: &str, expected_key: &str) -> Result<ExpertResult, ReplyError> {
    let json = extract_json(raw).ok_or(ReplyError::NoJsonObject)?;
    let mut result: ExpertResult =
        serde_json::from_str(json).map_err(|e| ReplyError::SchemaMismatch(e.to_string()))?;

    if result.expert != expected_key {
        warn!(
            expected = expected_key,
            reported = %result.expert,
            "Reply named a different expert; using the consulted key"
        );
        result.expert = expected_key.to_string();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"expert":"backend","analysis":"fine","files":[{"path":"main.ext","content":"X"}]}"#;

    #[test]
    fn test_bare_object() {
        let result = parse_reply(BODY, "backend").unwrap();
        assert_eq!(result.files[0].content, "X");
    }

    #[test]
    fn test_fenced_object() {
        let raw = format!("Here you go:\n```json\n{BODY}\n```\nGood luck!");
        assert_eq!(extract_json(&raw), Some(BODY));

        let raw = format!("```\n{BODY}\n```");
        assert_eq!(extract_json(&raw), Some(BODY));
    }

    #[test]
    fn test_braces_inside_content_survive() {
        let body = r#"{"expert":"frontend","analysis":"a","files":[{"path":"a.js","content":"function f() { return {}; }"}]}"#;
        let result = parse_reply(body, "frontend").unwrap();
        assert_eq!(result.files[0].content, "function f() { return {}; }");
    }

    #[test]
    fn test_expert_key_normalized() {
        let body = r#"{"expert":"Backend Expert","analysis":"a"}"#;
        assert_eq!(parse_reply(body, "backend").unwrap().expert, "backend");
    }

    #[test]
    fn test_failures() {
        assert_eq!(parse_reply("I cannot help", "ux"), Err(ReplyError::NoJsonObject));
        assert!(matches!(
            parse_reply(r#"{"analysis": 5}"#, "ux"),
            Err(ReplyError::SchemaMismatch(_))
        ));
        assert!(matches!(
            parse_reply("{not json}", "ux"),
            Err(ReplyError::SchemaMismatch(_))
        ));
    }
}
