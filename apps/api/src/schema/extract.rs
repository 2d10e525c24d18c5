//! Stage one of the model-output pipeline: free text → JSON candidate.
//!
//! Models are asked for exactly one JSON object but routinely wrap it in prose
//! or code fences. This stage only finds and parses the first top-level object;
//! it knows nothing about the expected shape.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("JSON object is not well-formed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Extracts and parses the first balanced top-level `{...}` block in `text`.
pub fn extract_json_object(text: &str) -> Result<Value, ExtractError> {
    let text = strip_json_fences(text);
    let block = first_object_span(text).ok_or(ExtractError::NoJsonObject)?;
    Ok(serde_json::from_str(block)?)
}

/// Returns the slice spanning the first balanced `{...}`, honouring string
/// literals and escapes so braces inside strings do not count.
fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extracts_object_surrounded_by_prose() {
        let text = "Sure! Here is the result:\n{\"intent\": \"find_jobs\", \"confidence\": 0.9}\nHope that helps.";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["intent"], "find_jobs");
    }

    #[test]
    fn test_takes_first_of_two_objects() {
        let text = r#"{"a": 1} and later {"b": 2}"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["a"], 1);
        assert!(value.get("b").is_none());
    }

    #[test]
    fn test_nested_objects_and_braces_in_strings() {
        let text = r#"prefix {"outer": {"inner": "has } and { inside"}, "quote": "say \"}\""} suffix"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["outer"]["inner"], "has } and { inside");
        assert_eq!(value["quote"], "say \"}\"");
    }

    #[test]
    fn test_fenced_object() {
        let text = "```json\n{\"content\": \"Dear team\", \"warnings\": []}\n```";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["content"], "Dear team");
    }

    #[test]
    fn test_no_json_is_recoverable_error() {
        let err = extract_json_object("I cannot help with that.").unwrap_err();
        assert!(matches!(err, ExtractError::NoJsonObject));
    }

    #[test]
    fn test_unbalanced_object_is_not_found() {
        let err = extract_json_object("{\"intent\": \"find_jobs\"").unwrap_err();
        assert!(matches!(err, ExtractError::NoJsonObject));
    }

    #[test]
    fn test_malformed_object() {
        let err = extract_json_object("{intent: find_jobs}").unwrap_err();
        assert!(matches!(err, ExtractError::Malformed(_)));
    }
}
