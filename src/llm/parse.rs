//! Best-effort parsing of collaborator replies.
//!
//! Models are asked for bare JSON but sometimes wrap it in prose or a code
//! fence. The JSON span is located by bracket scan (first opening bracket to
//! the last matching closing one) and then decoded; nothing is assumed to be
//! well formed.

use miette::Diagnostic;
use thiserror::Error;

use crate::model::{MentionRecord, MergedRecord};

/// Longest reply prefix quoted in errors and logs.
const EXCERPT_CHARS: usize = 200;

/// Why a collaborator reply could not be turned into records.
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("no JSON {expected} found in reply: {excerpt}")]
    #[diagnostic(code(lexicon::parse::no_json))]
    NoJson {
        expected: &'static str,
        excerpt: String,
    },

    #[error("invalid JSON in reply: {message}")]
    #[diagnostic(code(lexicon::parse::invalid_json))]
    InvalidJson { message: String, excerpt: String },

    #[error("reply has the wrong shape: {message}")]
    #[diagnostic(code(lexicon::parse::shape))]
    Shape { message: String },
}

/// First `chars` characters of `text`, for diagnostics.
pub fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

/// Slice from the first `open` to the last `close`, inclusive.
pub fn json_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a mention-source reply into mention records.
///
/// An empty reply means "no mentions". Records that lack a name or carry an
/// unknown entity type are dropped with a warning; the rest are kept.
pub fn parse_mentions(reply: &str) -> Result<Vec<MentionRecord>, ParseError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let span = json_span(trimmed, '[', ']').ok_or_else(|| ParseError::NoJson {
        expected: "array",
        excerpt: excerpt(trimmed),
    })?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(span).map_err(|e| ParseError::InvalidJson {
            message: e.to_string(),
            excerpt: excerpt(span),
        })?;

    let mut records = Vec::with_capacity(values.len());
    for (i, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<MentionRecord>(value) {
            Ok(mut record) => {
                record.name = record.name.trim().to_string();
                if record.name.is_empty() {
                    tracing::warn!(index = i, "dropping mention without a name");
                    continue;
                }
                records.push(record);
            }
            Err(e) => tracing::warn!(index = i, error = %e, "dropping malformed mention"),
        }
    }
    Ok(records)
}

/// Parse a merge-collaborator reply into one merged field set.
pub fn parse_merged(reply: &str) -> Result<MergedRecord, ParseError> {
    let trimmed = reply.trim();
    let span = json_span(trimmed, '{', '}').ok_or_else(|| ParseError::NoJson {
        expected: "object",
        excerpt: excerpt(trimmed),
    })?;
    let value: serde_json::Value =
        serde_json::from_str(span).map_err(|e| ParseError::InvalidJson {
            message: e.to_string(),
            excerpt: excerpt(span),
        })?;
    let mut merged: MergedRecord =
        serde_json::from_value(value).map_err(|e| ParseError::Shape {
            message: e.to_string(),
        })?;

    merged.name = merged.name.trim().to_string();
    if merged.name.is_empty() {
        return Err(ParseError::Shape {
            message: "merged record has an empty name".into(),
        });
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, Gender, Religion};

    #[test]
    fn bare_array() {
        let reply = r#"[{"name":"Атех","aliases":["принцесса Атех"],"type":"mythical",
            "epoch":"IX век","gender":"female","religion":"хазарская вера",
            "description":"Хазарская принцесса.","quote":"Атех писала стихи."}]"#;
        let records = parse_mentions(reply).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.name, "Атех");
        assert!(r.aliases.contains("принцесса Атех"));
        assert_eq!(r.epoch.as_deref(), Some("IX век"));
        assert_eq!(r.gender, Gender::Female);
        assert_eq!(r.religion, Religion::Known("хазарская вера".into()));
    }

    #[test]
    fn fenced_array_with_prose() {
        let reply = "Вот результат:\n```json\n[{\"name\":\"Каган\",\"type\":\"historical\"}]\n```";
        let records = parse_mentions(reply).unwrap();
        assert_eq!(records[0].kind, EntityKind::Historical);
    }

    #[test]
    fn empty_reply_means_no_mentions() {
        assert!(parse_mentions("   ").unwrap().is_empty());
        assert!(parse_mentions("[]").unwrap().is_empty());
    }

    #[test]
    fn bad_records_are_dropped_individually() {
        let reply = r#"[{"name":"Атех","type":"person"},
                        {"name":"  ","type":"person"},
                        {"name":"Робот","type":"machine"},
                        {"type":"concept"}]"#;
        let records = parse_mentions(reply).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Атех");
    }

    #[test]
    fn null_text_fields_keep_the_mention() {
        let reply = r#"[{"name":"Атех","type":"person","description":null,"quote":"q"},
                        {"name":"Каган","type":"historical","epoch":null,"quote":null}]"#;
        let records = parse_mentions(reply).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].description, "");
        assert_eq!(records[1].quote, "");

        let merged = parse_merged(r#"{"name":"Атех","type":"person","description":null}"#).unwrap();
        assert_eq!(merged.description, "");
    }

    #[test]
    fn prose_only_is_no_json() {
        let err = parse_mentions("Персонажей не найдено.").unwrap_err();
        assert!(matches!(err, ParseError::NoJson { expected: "array", .. }));
    }

    #[test]
    fn truncated_array_is_invalid_json() {
        let err = parse_mentions(r#"[{"name":"Атех"}, {"name": ]"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson { .. }));
    }

    #[test]
    fn merged_object_in_fence() {
        let reply = "```\n{\"name\":\" Атех \",\"aliases\":[],\"type\":\"person\",\
                     \"epoch\":\"\",\"gender\":\"female\",\"religion\":\"unknown\",\
                     \"description\":\"d\"}\n```";
        let merged = parse_merged(reply).unwrap();
        assert_eq!(merged.name, "Атех");
        assert_eq!(merged.epoch, None);
        assert_eq!(merged.religion, Religion::Unknown);
    }

    #[test]
    fn merged_without_name_is_shape_error() {
        let err = parse_merged(r#"{"type":"person"}"#).unwrap_err();
        assert!(matches!(err, ParseError::Shape { .. }));
        let err = parse_merged(r#"{"name":"","type":"person"}"#).unwrap_err();
        assert!(matches!(err, ParseError::Shape { .. }));
    }

    #[test]
    fn merged_empty_reply_is_no_json() {
        assert!(matches!(parse_merged(""), Err(ParseError::NoJson { .. })));
    }

    #[test]
    fn excerpt_is_bounded() {
        let long = "я".repeat(1000);
        assert_eq!(excerpt(&long).chars().count(), 200);
    }
}
