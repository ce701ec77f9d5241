//! Strict decoding of reasoning-service answers into typed values.
//!
//! Anything outside the expected shape becomes `OracleError::Malformed`; no
//! decoder guesses.

use std::sync::LazyLock;

use jsonschema::{Validator, validator_for};
use regex::Regex;
use serde_json::{Value, json};

use crate::oracle::{Capability, OracleError, OracleResult};

static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?(?:\d+(?:\.\d*)?|\.\d+)").unwrap());

static QUOTED_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)""#).unwrap()
});

static SUBTASK_LIST_SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    validator_for(&json!({
        "type": "array",
        "items": { "type": "string" }
    }))
    .expect("subtask list schema should be valid")
});

/// Strip whitespace and one pair of wrapping quotes.
fn unquote(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['"', '\'', '`'] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.trim();
        }
    }
    trimmed
}

/// `true`/`yes` or `false`/`no`, case-insensitive.
pub fn parse_bool(capability: Capability, raw: &str) -> OracleResult<bool> {
    let word = raw.trim();
    let word = unquote(word.strip_suffix('.').unwrap_or(word));
    match word.to_ascii_lowercase().as_str() {
        "true" | "yes" => Ok(true),
        "false" | "no" => Ok(false),
        _ => Err(OracleError::malformed(capability, raw)),
    }
}

/// First number in the answer; must lie in `[0, 1]`.
pub fn parse_score(capability: Capability, raw: &str) -> OracleResult<f64> {
    let score = SCORE_RE
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or_else(|| OracleError::malformed(capability, raw))?;
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(OracleError::malformed(capability, raw))
    }
}

/// A bracketed list of task names: a JSON array of strings, or a list of
/// single- or double-quoted items. Blank items are dropped.
pub fn parse_subtasks(capability: Capability, raw: &str) -> OracleResult<Vec<String>> {
    let malformed = || OracleError::malformed(capability, raw);
    let start = raw.find('[').ok_or_else(malformed)?;
    let end = raw.rfind(']').ok_or_else(malformed)?;
    if end < start {
        return Err(malformed());
    }
    let list = &raw[start..=end];

    let items = match serde_json::from_str::<Value>(list) {
        Ok(value) => {
            if !SUBTASK_LIST_SCHEMA.is_valid(&value) {
                return Err(malformed());
            }
            serde_json::from_value::<Vec<String>>(value).map_err(|_| malformed())?
        }
        Err(_) => parse_quoted_list(&list[1..list.len() - 1]).ok_or_else(malformed)?,
    };

    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

/// Items of `'a', "b"`; `None` if anything but separators sits between them.
fn parse_quoted_list(inner: &str) -> Option<Vec<String>> {
    let mut items = Vec::new();
    let mut cursor = 0;
    for caps in QUOTED_ITEM_RE.captures_iter(inner) {
        let whole = caps.get(0)?;
        if !is_separator(&inner[cursor..whole.start()], !items.is_empty()) {
            return None;
        }
        let item = caps.get(1).or_else(|| caps.get(2))?.as_str();
        items.push(item.replace("\\'", "'").replace("\\\"", "\""));
        cursor = whole.end();
    }
    let tail = inner[cursor..].trim();
    if !(tail.is_empty() || tail == ",") {
        return None;
    }
    Some(items)
}

fn is_separator(gap: &str, needs_comma: bool) -> bool {
    let gap = gap.trim();
    if needs_comma { gap == "," } else { gap.is_empty() }
}

/// Trimmed, non-empty free text.
pub fn parse_text(capability: Capability, raw: &str) -> OracleResult<String> {
    let text = unquote(raw);
    if text.is_empty() {
        return Err(OracleError::malformed(capability, raw));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: Capability = Capability::SubtaskGenerator;

    #[test]
    fn booleans_accept_common_spellings() {
        assert_eq!(parse_bool(CAP, "True"), Ok(true));
        assert_eq!(parse_bool(CAP, " yes.\n"), Ok(true));
        assert_eq!(parse_bool(CAP, "'False'"), Ok(false));
        assert_eq!(parse_bool(CAP, "NO"), Ok(false));
    }

    #[test]
    fn booleans_reject_prose() {
        let err = parse_bool(CAP, "I think so").expect_err("malformed");
        assert!(err.is_malformed());
        assert!(parse_bool(CAP, "").is_err());
    }

    #[test]
    fn scores_are_extracted_and_range_checked() {
        assert_eq!(parse_score(CAP, "0.87654321"), Ok(0.876_543_21));
        assert_eq!(parse_score(CAP, "Score: 1"), Ok(1.0));
        assert_eq!(parse_score(CAP, ".5"), Ok(0.5));
        assert!(parse_score(CAP, "1.2").is_err());
        assert!(parse_score(CAP, "-0.3").is_err());
        assert!(parse_score(CAP, "high").is_err());
    }

    #[test]
    fn json_subtask_lists_parse() {
        let items = parse_subtasks(CAP, r#"["grab cup", " pour water ", ""]"#).expect("parse");
        assert_eq!(items, vec!["grab cup", "pour water"]);
    }

    #[test]
    fn quoted_lists_parse_with_surrounding_text() {
        let raw = "Here you go: ['locate the kettle', \"fill it with water\", 'don\\'t spill']";
        let items = parse_subtasks(CAP, raw).expect("parse");
        assert_eq!(
            items,
            vec!["locate the kettle", "fill it with water", "don't spill"]
        );
    }

    #[test]
    fn empty_list_is_legal() {
        assert_eq!(parse_subtasks(CAP, "[]"), Ok(Vec::new()));
        assert_eq!(parse_subtasks(CAP, "[ ]"), Ok(Vec::new()));
    }

    #[test]
    fn non_string_or_unquoted_lists_are_malformed() {
        assert!(parse_subtasks(CAP, "[1, 2, 3]").expect_err("numbers").is_malformed());
        assert!(parse_subtasks(CAP, "[grab cup, pour]").is_err());
        assert!(parse_subtasks(CAP, "['a' 'b']").is_err());
        assert!(parse_subtasks(CAP, "grab the cup").is_err());
        assert!(parse_subtasks(CAP, "] oops [").is_err());
    }

    #[test]
    fn text_keeps_sentence_punctuation() {
        assert_eq!(
            parse_text(CAP, "The kettle is full.\n"),
            Ok("The kettle is full.".to_string())
        );
    }

    #[test]
    fn text_is_trimmed_and_required() {
        assert_eq!(
            parse_text(CAP, "  \"grab(cup)\"\n"),
            Ok("grab(cup)".to_string())
        );
        assert!(parse_text(CAP, "   ").is_err());
    }
}
