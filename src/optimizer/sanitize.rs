// optimizer/sanitize.rs — Pull a JSON object out of a chatty LLM reply

use regex::Regex;
use std::sync::OnceLock;

fn fence_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("valid fence regex"))
}

fn fence_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r?\n?```\s*$").expect("valid fence regex"))
}

/// Best-effort extraction of the JSON object in `response`.
///
/// Strips a surrounding markdown fence. If what remains does not start with
/// `{`, returns the span from the first `{` to the last `}`. Braces are not
/// depth-matched, so a stray `}` in trailing prose widens the span. Never
/// fails; the decoder decides whether the result is usable.
pub fn clean_json_response(response: &str) -> String {
    let trimmed = response.trim();
    let unfenced = fence_open().replace(trimmed, "");
    let unfenced = fence_close().replace(&unfenced, "");
    let cleaned = unfenced.trim();

    if cleaned.starts_with('{') {
        return cleaned.to_string();
    }

    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => cleaned[start..=end].to_string(),
        _ => cleaned.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_json_unchanged() {
        let json = r#"{"a":1,"b":{"c":[1,2]}}"#;
        assert_eq!(clean_json_response(json), json);
    }

    #[test]
    fn test_strips_json_fence() {
        assert_eq!(clean_json_response("```json\n{\"a\":1}\n```"), r#"{"a":1}"#);
    }

    #[test]
    fn test_strips_bare_fence() {
        assert_eq!(clean_json_response("```\n{\"a\":1}\n```\n"), r#"{"a":1}"#);
    }

    #[test]
    fn test_extracts_from_prose() {
        let response =
            "Sure! Here is the assessment:\n{\"score\": 12}\nLet me know if you need more.";
        assert_eq!(clean_json_response(response), r#"{"score": 12}"#);
    }

    #[test]
    fn test_stray_closing_brace_widens_span() {
        let response = "Result: {\"a\":1} and a stray } here";
        assert_eq!(clean_json_response(response), "{\"a\":1} and a stray }");
        assert!(serde_json::from_str::<serde_json::Value>(&clean_json_response(response)).is_err());
    }

    #[test]
    fn test_no_braces_returns_trimmed_text() {
        assert_eq!(clean_json_response("  no json here  "), "no json here");
        assert_eq!(clean_json_response("} backwards {"), "} backwards {");
    }
}
