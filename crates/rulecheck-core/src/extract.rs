//! Tolerant extraction of `<json>...</json>` blocks from model output.
//!
//! Grading models are asked to wrap their structured answer in `<json>` tags,
//! but they do not always emit strict JSON. Each block gets exactly two
//! attempts:
//! 1. strict JSON parsing;
//! 2. the same text with every `'` replaced by `"`.
//!
//! A block that fails both is a hard error. Text with no tags at all is not an
//! error: it simply yields no blocks.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

lazy_static! {
    /// Non-greedy, case-insensitive, spanning newlines.
    static ref JSON_BLOCK_PATTERN: Regex = Regex::new(r"(?is)<json>(.*?)</json>").unwrap();
}

/// Errors from reading structured data out of a model response.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to parse JSON block: {source}\nBlock:\n{block}")]
    MalformedBlock {
        #[source]
        source: serde_json::Error,
        block: String,
    },

    #[error("Expected a JSON object in the first <json> block, found {found}")]
    UnexpectedShape { found: String },

    #[error("Field '{field}' has an unusable value: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Raw contents of every `<json>` block, in order of appearance.
pub fn json_blocks(text: &str) -> Vec<&str> {
    JSON_BLOCK_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Parse every non-blank `<json>` block in `text`.
///
/// Blocks that are empty after trimming are skipped. The first block that
/// cannot be parsed, even after quote repair, aborts extraction with
/// [`ParseError::MalformedBlock`] carrying the strict parser's error.
pub fn extract_json_blocks(text: &str) -> Result<Vec<Value>, ParseError> {
    let mut parsed = Vec::new();

    for raw in json_blocks(text) {
        let block = raw.trim();
        if block.is_empty() {
            continue;
        }

        parsed.push(parse_block(block)?);
    }

    tracing::debug!(blocks = parsed.len(), "Extracted JSON blocks from response");
    Ok(parsed)
}

fn parse_block(block: &str) -> Result<Value, ParseError> {
    let strict_error = match serde_json::from_str(block) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    match serde_json::from_str(&block.replace('\'', "\"")) {
        Ok(value) => {
            tracing::warn!(error = %strict_error, "Repaired single-quoted JSON block");
            Ok(value)
        }
        Err(_) => Err(ParseError::MalformedBlock {
            source: strict_error,
            block: block.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_block() {
        let text = r#"Analysis done.
<json>{"violation_count": 2, "violations": ["rule A", "rule B"]}</json>"#;
        let blocks = extract_json_blocks(text).unwrap();
        assert_eq!(
            blocks,
            vec![json!({"violation_count": 2, "violations": ["rule A", "rule B"]})]
        );
    }

    #[test]
    fn test_tag_is_case_insensitive_and_multiline() {
        let text = "<JSON>\n{\n  \"violation_count\": 0,\n  \"violations\": []\n}\n</Json>";
        let blocks = extract_json_blocks(text).unwrap();
        assert_eq!(blocks, vec![json!({"violation_count": 0, "violations": []})]);
    }

    #[test]
    fn test_multiple_blocks_in_order() {
        let text = "<json>{\"n\": 1}</json> then <json>[2]</json> and <json>\"three\"</json>";
        let blocks = extract_json_blocks(text).unwrap();
        assert_eq!(blocks, vec![json!({"n": 1}), json!([2]), json!("three")]);
    }

    #[test]
    fn test_single_quote_repair() {
        let text = "<json>{'violation_count': 1, 'violations': ['rule A']}</json>";
        let blocks = extract_json_blocks(text).unwrap();
        assert_eq!(blocks, vec![json!({"violation_count": 1, "violations": ["rule A"]})]);
    }

    #[test]
    fn test_unrepairable_block_is_an_error() {
        let text = "<json>{\"violation_count\": 1, \"violations\": [</json>";
        let err = extract_json_blocks(text).unwrap_err();

        match &err {
            ParseError::MalformedBlock { block, .. } => {
                assert_eq!(block, "{\"violation_count\": 1, \"violations\": [");
            }
            other => panic!("Expected MalformedBlock, got {:?}", other),
        }
        assert!(err.to_string().starts_with("Failed to parse JSON block:"));
    }

    #[test]
    fn test_apostrophe_inside_valid_json_is_untouched() {
        let text = r#"<json>{"violations": ["Didn't confirm the order id"]}</json>"#;
        let blocks = extract_json_blocks(text).unwrap();
        assert_eq!(blocks[0]["violations"][0], "Didn't confirm the order id");
    }

    #[test]
    fn test_blank_blocks_are_skipped() {
        let text = "<json>   </json><json>\n</json><json>{\"a\": 1}</json>";
        let blocks = extract_json_blocks(text).unwrap();
        assert_eq!(blocks, vec![json!({"a": 1})]);
    }

    #[test]
    fn test_no_tags_is_empty() {
        assert!(extract_json_blocks("No violations found.").unwrap().is_empty());
        assert!(extract_json_blocks("<json>{\"a\": 1}").unwrap().is_empty());
    }

    #[test]
    fn test_later_malformed_block_fails_whole_extraction() {
        let text = "<json>{\"a\": 1}</json><json>{oops}</json>";
        assert!(extract_json_blocks(text).is_err());
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        for literal in ["NaN", "Infinity", "-Infinity"] {
            let text = format!(
                "<json>{{\"violation_count\": 0, \"violations\": [], \"confidence\": {}}}</json>",
                literal
            );
            let err = extract_json_blocks(&text).unwrap_err();
            assert!(matches!(err, ParseError::MalformedBlock { .. }), "{}", literal);
        }
    }
}
