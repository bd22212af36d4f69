//! Keyed row extraction from pre-rendered scripts
//!
//! Recovers `{table, key, statement}` records from the INSERT statements of
//! a stored script, so an incremental deploy can skip rows the target
//! already has without re-reading the source database.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::script::{Statement, StatementKind};
use crate::snapshot::types::RowKey;

/// One INSERT recovered from a script, keyed for presence checks.
#[derive(Debug, Clone)]
pub struct KeyedInsert {
    pub table: String,
    pub key: RowKey,
    pub statement: String,
}

static INSERT_HEAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^INSERT\s+(?:IGNORE\s+)?INTO\s+`?([^`\s(]+)`?\s*(?:\(([^)]*)\))?\s*VALUES\s*(.*)$",
    )
    .unwrap()
});

/// Recover keyed inserts from a tokenized script.
///
/// Row identity defaults to the leading value of the first tuple, which must
/// be numeric; a per-table key column configured in [`SyncConfig`] is located
/// in the statement's column list instead and may be a string. A table whose
/// key cannot be recovered is a typed error, not a silent skip.
pub fn extract_keyed_inserts(
    statements: &[Statement],
    config: &SyncConfig,
) -> Result<Vec<KeyedInsert>> {
    let mut inserts = Vec::new();

    for statement in statements {
        if statement.kind != StatementKind::Dml {
            continue;
        }
        let text = statement.text.trim();
        if !text.to_uppercase().starts_with("INSERT") {
            continue;
        }

        let caps = INSERT_HEAD_RE.captures(text).ok_or_else(|| {
            Error::MalformedScriptError(format!("Unparseable INSERT statement: {}", excerpt(text)))
        })?;
        let table = caps[1].to_string();
        let override_key = config.key_columns.get(&table);

        let key_index = match override_key {
            Some(key_column) => {
                let columns = caps
                    .get(2)
                    .map(|m| parse_column_list(m.as_str()))
                    .ok_or_else(|| Error::KeyExtractionError {
                        table: table.clone(),
                        reason: format!(
                            "statement lists no columns, cannot locate `{}`",
                            key_column
                        ),
                    })?;
                columns
                    .iter()
                    .position(|c| c == key_column)
                    .ok_or_else(|| Error::KeyExtractionError {
                        table: table.clone(),
                        reason: format!("key column `{}` is not in the column list", key_column),
                    })?
            }
            None => 0,
        };

        let values = caps
            .get(3)
            .map(|m| m.as_str())
            .unwrap_or_default();
        let fields = first_tuple(values).ok_or_else(|| {
            Error::MalformedScriptError(format!("Unparseable VALUES clause: {}", excerpt(text)))
        })?;
        let field = fields.get(key_index).ok_or_else(|| Error::KeyExtractionError {
            table: table.clone(),
            reason: format!("tuple has no value at position {}", key_index),
        })?;

        let key = parse_key(field).ok_or_else(|| Error::KeyExtractionError {
            table: table.clone(),
            reason: format!("value `{}` is not a usable scalar key", field),
        })?;

        // Without an explicit key column the leading value must be numeric;
        // anything else means the table needs configuration.
        if override_key.is_none() && matches!(key, RowKey::Text(_)) {
            return Err(Error::KeyExtractionError {
                table,
                reason: "leading value is not numeric; configure a key column".to_string(),
            });
        }

        inserts.push(KeyedInsert {
            table,
            key,
            statement: text.to_string(),
        });
    }

    Ok(inserts)
}

fn excerpt(text: &str) -> String {
    text.chars().take(60).collect()
}

fn parse_column_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|c| c.trim().trim_matches('`').to_string())
        .collect()
}

/// Split the first parenthesized tuple into raw field texts, honoring quoted
/// literals and nested parentheses.
fn first_tuple(text: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut depth = 0usize;
    let mut open: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match open {
            Some(q) => {
                field.push(c);
                if c == '\\' && q != '`' {
                    if let Some(escaped) = chars.next() {
                        field.push(escaped);
                    }
                } else if c == q {
                    if chars.peek() == Some(&q) {
                        field.push(chars.next().unwrap_or(q));
                    } else {
                        open = None;
                    }
                }
            }
            None => match c {
                '(' => {
                    depth += 1;
                    if depth > 1 {
                        field.push(c);
                    }
                }
                ')' => {
                    if depth == 0 {
                        return None;
                    }
                    depth -= 1;
                    if depth == 0 {
                        fields.push(field.trim().to_string());
                        return Some(fields);
                    }
                    field.push(c);
                }
                ',' if depth == 1 => {
                    fields.push(field.trim().to_string());
                    field.clear();
                }
                '\'' | '"' | '`' if depth >= 1 => {
                    open = Some(c);
                    field.push(c);
                }
                _ => {
                    if depth >= 1 {
                        field.push(c);
                    }
                }
            },
        }
    }

    None
}

/// Interpret one raw field as a row key: a plain integer or a quoted string.
fn parse_key(field: &str) -> Option<RowKey> {
    let trimmed = field.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(RowKey::Int(i));
    }
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let unescaped = inner
            .replace("\\\\", "\\")
            .replace("''", "'")
            .replace("\\'", "'");
        return Some(RowKey::Text(unescaped));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dml(text: &str) -> Statement {
        Statement::new(StatementKind::Dml, text)
    }

    #[test]
    fn extracts_leading_numeric_key() {
        let statements = vec![dml(
            "INSERT INTO `movies` (`id`, `title`) VALUES (7, 'Heat');",
        )];
        let inserts = extract_keyed_inserts(&statements, &SyncConfig::default()).unwrap();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].table, "movies");
        assert_eq!(inserts[0].key, RowKey::Int(7));
    }

    #[test]
    fn batched_insert_is_keyed_by_its_first_tuple() {
        let statements = vec![dml(
            "INSERT INTO `movies` (`id`, `title`) VALUES\n(1, 'Heat'),\n(2, 'Ronin');",
        )];
        let inserts = extract_keyed_inserts(&statements, &SyncConfig::default()).unwrap();
        assert_eq!(inserts[0].key, RowKey::Int(1));
    }

    #[test]
    fn configured_key_column_is_located_in_the_column_list() {
        let mut config = SyncConfig::default();
        config
            .key_columns
            .insert("settings".to_string(), "name".to_string());
        let statements = vec![dml(
            "INSERT INTO `settings` (`name`, `value`) VALUES ('locale', 'en');",
        )];
        let inserts = extract_keyed_inserts(&statements, &config).unwrap();
        assert_eq!(inserts[0].key, RowKey::Text("locale".to_string()));
    }

    #[test]
    fn string_leading_value_without_configuration_is_rejected() {
        let statements = vec![dml(
            "INSERT INTO `settings` (`name`, `value`) VALUES ('locale', 'en');",
        )];
        let err = extract_keyed_inserts(&statements, &SyncConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::KeyExtractionError { ref table, .. } if table == "settings"
        ));
    }

    #[test]
    fn quoted_comma_does_not_split_the_tuple() {
        let statements = vec![dml(
            "INSERT INTO `movies` (`id`, `title`) VALUES (3, 'Eats, Shoots');",
        )];
        let inserts = extract_keyed_inserts(&statements, &SyncConfig::default()).unwrap();
        assert_eq!(inserts[0].key, RowKey::Int(3));
    }

    #[test]
    fn ignores_non_insert_statements() {
        let statements = vec![
            Statement::new(StatementKind::Ddl, "CREATE TABLE a (id INT);"),
            dml("UPDATE a SET x = 1 WHERE id = 2;"),
        ];
        let inserts = extract_keyed_inserts(&statements, &SyncConfig::default()).unwrap();
        assert!(inserts.is_empty());
    }

    #[test]
    fn insert_ignore_form_is_accepted() {
        let statements = vec![dml("INSERT IGNORE INTO `movies` (`id`) VALUES (9);")];
        let inserts = extract_keyed_inserts(&statements, &SyncConfig::default()).unwrap();
        assert_eq!(inserts[0].key, RowKey::Int(9));
    }
}
