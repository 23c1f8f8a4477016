//! Tolerant JSON extraction from model output.
//!
//! Completions routinely wrap the requested JSON in prose or markdown
//! fences. This scans for the first balanced top-level object and parses
//! that, ignoring braces inside string literals.

use serde_json::Value;

/// Extract and parse the first balanced JSON object in `text`. Returns
/// `None` when no parseable object is present.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

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
                    let candidate = &text[start..start + offset + 1];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_object() {
        let value = extract_json_object(r#"{"a": 1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_fenced_object_with_prose() {
        let text = "Sure, here you go:\n```json\n{\"clients\": [\"Acme\"]}\n```\nDone.";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value, json!({"clients": ["Acme"]}));
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"{"note": "use {curly} braces", "n": 2}"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["n"], 2);
    }

    #[test]
    fn test_nested_objects() {
        let text = r#"prefix {"a": {"b": {"c": 3}}} suffix"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["a"]["b"]["c"], 3);
    }

    #[test]
    fn test_no_object() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{truncated").is_none());
    }
}
