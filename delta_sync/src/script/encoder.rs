//! SQL literal encoding
//!
//! Renders a typed cell value into a literal that, substituted into an
//! INSERT or UPDATE and executed against a MySQL-compatible server,
//! reproduces the original value on re-read.

use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::snapshot::types::Value;

/// Verbose date form with a GMT offset, e.g.
/// `Mon Jul 01 2024 12:34:56 GMT+0800 (China Standard Time)`.
static VERBOSE_GMT_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{3} [A-Za-z]{3} \d{2} \d{4} \d{2}:\d{2}:\d{2} GMT[+-]\d{4}").unwrap()
});

/// Encode one value as a SQL literal for a column of the given declared type.
pub fn encode(value: &Value, column_type: &str) -> String {
    if value.is_null() {
        return "NULL".to_string();
    }
    if column_type.contains("json") {
        return encode_json_column(value);
    }
    encode_plain(value)
}

fn encode_plain(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::DateTime(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S")),
        Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        Value::Text(s) => match reparse_verbose_date(s) {
            Some(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S")),
            None => quote(s),
        },
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.clone(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Bytes(b) => quote(&String::from_utf8_lossy(b)),
        Value::Json(doc) => quote(&doc.to_string()),
    }
}

/// A json column takes serialized documents; a string that fails to parse as
/// JSON is still emitted quoted, with a warning, rather than aborting.
fn encode_json_column(value: &Value) -> String {
    match value {
        Value::Json(doc) => quote(&doc.to_string()),
        Value::Text(s) => {
            if serde_json::from_str::<serde_json::Value>(s).is_err() {
                tracing::warn!("Value in a json column is not valid JSON; emitting as-is");
            }
            quote(s)
        }
        other => encode_plain(other),
    }
}

/// Reparse a verbose GMT-offset date string into a UTC timestamp.
fn reparse_verbose_date(text: &str) -> Option<NaiveDateTime> {
    let matched = VERBOSE_GMT_DATE.find(text)?;
    DateTime::parse_from_str(matched.as_str(), "%a %b %d %Y %H:%M:%S GMT%z")
        .ok()
        .map(|ts| ts.naive_utc())
}

/// Quote a string literal. Backslashes are doubled before quotes so the
/// doubled quotes are not escaped a second time.
fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    /// Inverse of `quote`, for round-trip checks: what a MySQL server would
    /// read back from the emitted literal.
    fn unquote(literal: &str) -> String {
        assert!(literal.starts_with('\'') && literal.ends_with('\''));
        literal[1..literal.len() - 1]
            .replace("''", "'")
            .replace("\\\\", "\\")
    }

    #[test]
    fn null_encodes_as_null_for_every_type() {
        for column_type in ["int(11)", "varchar(255)", "json", "datetime", "tinyint(1)"] {
            assert_eq!(encode(&Value::Null, column_type), "NULL");
        }
    }

    #[test]
    fn string_literals_round_trip() {
        for text in [
            "plain",
            "it's quoted",
            r"back\slash",
            r"mixed '\' both",
            "unicode — 电影 🎬",
            "",
        ] {
            let literal = encode(&Value::Text(text.to_string()), "varchar(255)");
            assert_eq!(unquote(&literal), text);
        }
    }

    #[test]
    fn escaping_order_does_not_double_escape() {
        // A lone backslash before a quote must become \\ then '' — not \\''
        // re-escaped into something longer.
        let literal = encode(&Value::Text(r"a\'b".to_string()), "text");
        assert_eq!(literal, r"'a\\''b'");
    }

    #[test]
    fn numbers_are_unquoted() {
        assert_eq!(encode(&Value::Int(-42), "int(11)"), "-42");
        assert_eq!(encode(&Value::UInt(42), "int unsigned"), "42");
        assert_eq!(encode(&Value::Float(1.5), "double"), "1.5");
        assert_eq!(
            encode(&Value::Decimal("12.340".to_string()), "decimal(10,3)"),
            "12.340"
        );
    }

    #[test]
    fn booleans_encode_as_bits() {
        assert_eq!(encode(&Value::Bool(true), "tinyint(1)"), "1");
        assert_eq!(encode(&Value::Bool(false), "tinyint(1)"), "0");
    }

    #[test]
    fn datetime_is_second_precision_without_timezone() {
        let ts = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(12, 34, 56)
            .unwrap();
        assert_eq!(
            encode(&Value::DateTime(ts), "datetime"),
            "'2024-07-01 12:34:56'"
        );
    }

    #[test]
    fn verbose_gmt_string_reparses_to_utc() {
        let text = "Mon Jul 01 2024 12:34:56 GMT+0800 (China Standard Time)";
        assert_eq!(
            encode(&Value::Text(text.to_string()), "datetime"),
            "'2024-07-01 04:34:56'"
        );
    }

    #[test]
    fn near_miss_date_string_falls_through_to_quoting() {
        let text = "Mon Jul 01 2024";
        assert_eq!(
            encode(&Value::Text(text.to_string()), "varchar(64)"),
            "'Mon Jul 01 2024'"
        );
    }

    #[test]
    fn json_document_serializes_compact() {
        let doc = serde_json::json!({"genre": "noir", "year": 1946});
        assert_eq!(
            encode(&Value::Json(doc), "json"),
            r#"'{"genre":"noir","year":1946}'"#
        );
    }

    #[test]
    fn json_column_accepts_invalid_string_without_aborting() {
        let literal = encode(&Value::Text("not json".to_string()), "json");
        assert_eq!(literal, "'not json'");
    }

    #[test]
    fn json_column_quotes_embedded_quotes_in_document() {
        let doc = serde_json::json!({"title": "it's"});
        assert_eq!(encode(&Value::Json(doc), "json"), r#"'{"title":"it''s"}'"#);
    }
}
