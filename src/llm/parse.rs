//! Response parsing
//!
//! Model responses arrive in whatever shape the model felt like: a JSON
//! envelope, a fenced code block, or bare code. Everything is parsed once,
//! here, into a tagged [`FixOutcome`] so the rest of the pipeline never
//! touches duck-typed JSON.

use serde_json::Value;

/// Structured facts extracted from a successful fix response.
#[derive(Debug, Clone, PartialEq)]
pub struct FixPayload {
    /// The proposed new file content
    pub fixed_code: String,
    /// The response claimed the fix worked
    pub self_reported_success: bool,
    /// Self-reported confidence, if the response carried one
    pub self_reported_confidence: Option<f64>,
    pub explanation: Option<String>,
    /// Itemized list of changes; `None` when the response had no list at all
    pub changes: Option<Vec<String>>,
}

/// Parsed model response: either a usable fix candidate or a reason there
/// is none. An unparseable response is never an error; the fallback
/// sequencer just advances to the next candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum FixOutcome {
    Success(FixPayload),
    Failure { error: String, raw: String },
}

/// Strip markdown code fences from a response
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if trimmed.starts_with("```json") {
        trimmed.strip_prefix("```json").unwrap_or(trimmed)
    } else if trimmed.starts_with("```") {
        trimmed.strip_prefix("```").unwrap_or(trimmed)
    } else {
        trimmed
    };
    let clean = if clean.ends_with("```") {
        clean.strip_suffix("```").unwrap_or(clean)
    } else {
        clean
    };
    clean.trim()
}

/// Extract the first fenced code block, dropping the language tag line.
fn extract_fenced_code(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    let code = &body[..end];
    if code.trim().is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

fn string_field(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(|v| v.as_str()))
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}

/// Parse a raw model response into a tagged outcome.
///
/// Precedence: JSON envelope with a code field, then any fenced code
/// block, then the whole response when it looks like bare code.
pub fn parse_fix_response(raw: &str) -> FixOutcome {
    if raw.trim().is_empty() {
        return FixOutcome::Failure {
            error: "empty response".to_string(),
            raw: raw.to_string(),
        };
    }

    let clean = strip_markdown_fences(raw);

    if let Ok(obj) = serde_json::from_str::<Value>(clean) {
        if obj.is_object() {
            return parse_json_envelope(&obj, raw);
        }
    }

    // Not a JSON envelope: treat fenced block (or the whole response) as
    // the fix candidate with no self-reported metadata.
    let fixed_code = match extract_fenced_code(raw) {
        Some(code) => code,
        None => raw.trim_end().to_string() + "\n",
    };

    FixOutcome::Success(FixPayload {
        fixed_code,
        self_reported_success: false,
        self_reported_confidence: None,
        explanation: None,
        changes: None,
    })
}

fn parse_json_envelope(obj: &Value, raw: &str) -> FixOutcome {
    if let Some(error) = string_field(obj, &["error"]) {
        return FixOutcome::Failure {
            error,
            raw: raw.to_string(),
        };
    }

    let fixed_code = string_field(obj, &["fixed_code", "fixed_content", "code", "content"])
        .or_else(|| extract_fenced_code(raw));

    let Some(fixed_code) = fixed_code else {
        return FixOutcome::Failure {
            error: "response carried no code".to_string(),
            raw: raw.to_string(),
        };
    };

    let self_reported_success = obj
        .get("success")
        .and_then(|v| v.as_bool())
        .or_else(|| {
            // Models sometimes stringify booleans
            obj.get("success")
                .and_then(|v| v.as_str())
                .map(|s| s.eq_ignore_ascii_case("true"))
        })
        .unwrap_or(false);

    let self_reported_confidence = obj
        .get("confidence")
        .and_then(|v| v.as_f64())
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0));

    let explanation = string_field(obj, &["explanation", "description", "reasoning"]);

    let changes = obj.get("changes").and_then(|v| v.as_array()).map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect::<Vec<String>>()
    });

    FixOutcome::Success(FixPayload {
        fixed_code,
        self_reported_success,
        self_reported_confidence,
        explanation,
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_envelope_is_parsed() {
        let raw = r#"{"success": true, "confidence": 0.9, "fixed_code": "x = 1\n", "explanation": "renamed", "changes": ["renamed x"]}"#;
        match parse_fix_response(raw) {
            FixOutcome::Success(p) => {
                assert_eq!(p.fixed_code, "x = 1\n");
                assert!(p.self_reported_success);
                assert_eq!(p.self_reported_confidence, Some(0.9));
                assert_eq!(p.changes.as_deref(), Some(&["renamed x".to_string()][..]));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_fenced_block_fallback() {
        let raw = "Here is the fix:\n```python\nx = 1\n```\nDone.";
        match parse_fix_response(raw) {
            FixOutcome::Success(p) => {
                assert_eq!(p.fixed_code, "x = 1\n");
                assert!(!p.self_reported_success);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_code_uses_whole_response() {
        match parse_fix_response("x = 1") {
            FixOutcome::Success(p) => assert_eq!(p.fixed_code, "x = 1\n"),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_response_fails() {
        assert!(matches!(
            parse_fix_response("   "),
            FixOutcome::Failure { .. }
        ));
    }

    #[test]
    fn test_json_error_field_fails() {
        let raw = r#"{"error": "model refused"}"#;
        match parse_fix_response(raw) {
            FixOutcome::Failure { error, .. } => assert_eq!(error, "model refused"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_json_without_code_fails() {
        let raw = r#"{"success": true, "confidence": 0.4}"#;
        assert!(matches!(
            parse_fix_response(raw),
            FixOutcome::Failure { .. }
        ));
    }

    #[test]
    fn test_stringified_success_flag() {
        let raw = r#"{"success": "true", "code": "y = 2\n"}"#;
        match parse_fix_response(raw) {
            FixOutcome::Success(p) => assert!(p.self_reported_success),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_confidence_is_clamped_at_parse_time() {
        let raw = r#"{"confidence": 7.5, "code": "z = 3\n"}"#;
        match parse_fix_response(raw) {
            FixOutcome::Success(p) => assert_eq!(p.self_reported_confidence, Some(1.0)),
            other => panic!("expected success, got {:?}", other),
        }
    }
}
