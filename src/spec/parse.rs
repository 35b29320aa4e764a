//! Turning raw collaborator text into a validated specification

use super::model::ArtifactSpecification;
use crate::error::Result;

/// Remove markdown fences and chatter around a JSON document.
///
/// Handles a fenced block anywhere in the text (with or without a
/// language tag) and otherwise falls back to the outermost braces.
pub fn strip_formatting(raw: &str) -> &str {
    let text = raw.trim();

    if let Some(open) = text.find("```") {
        let after = &text[open + 3..];
        // Skip the language tag line
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(after.len());
        let body = &after[body_start..];
        let body = match body.find("```") {
            Some(close) => &body[..close],
            None => body,
        };
        let body = body.trim();
        if !body.is_empty() {
            return body;
        }
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Parse and validate in one step
pub fn parse_spec(raw: &str, stage_count: usize) -> Result<ArtifactSpecification> {
    let spec = ArtifactSpecification::from_json(strip_formatting(raw))?;
    spec.validate(stage_count)?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, FactoryError};

    #[test]
    fn test_strip_json_fence() {
        let raw = "Sure! Here it is:\n```json\n{\"a\": 1}\n```\nEnjoy.";
        assert_eq!(strip_formatting(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_bare_fence() {
        assert_eq!(strip_formatting("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_surrounding_prose() {
        assert_eq!(strip_formatting("The spec: {\"a\": {\"b\": 2}} done"), "{\"a\": {\"b\": 2}}");
        assert_eq!(strip_formatting("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_spec_validates() {
        let spec = ArtifactSpecification::default_spec(10);
        let raw = format!("```json\n{}\n```", spec.to_json().unwrap());
        assert_eq!(parse_spec(&raw, 10).unwrap(), spec);

        let err = parse_spec(&raw, 12).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SPEC_STAGE_COUNT);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = parse_spec("I cannot help with that.", 10).unwrap_err();
        assert!(matches!(err, FactoryError::Parse { .. }));
    }
}
