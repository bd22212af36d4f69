//! Statement tokenizer
//!
//! Splits raw script text into discrete, individually executable statements
//! and rewrites them into idempotent forms safe to replay over a partially
//! applied run.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Statement, StatementKind};

/// Keywords that open a new statement when they begin a line.
const STATEMENT_STARTS: &[&str] = &[
    "CREATE TABLE",
    "INSERT INTO",
    "DROP TABLE",
    "ALTER TABLE",
    "UPDATE",
    "DELETE FROM",
    "CREATE DATABASE",
    "USE ",
    "SET ",
];

fn starts_statement(line: &str) -> bool {
    let upper = line.to_uppercase();
    STATEMENT_STARTS.iter().any(|kw| upper.starts_with(kw))
}

fn classify(text: &str) -> StatementKind {
    let upper = text.trim_start().to_uppercase();
    if upper.starts_with("INSERT") || upper.starts_with("UPDATE") || upper.starts_with("DELETE") {
        StatementKind::Dml
    } else {
        StatementKind::Ddl
    }
}

/// Tracks whether the scanner is inside a quoted literal across lines, so a
/// semicolon or keyword embedded in a string is never taken as structure.
#[derive(Default)]
struct QuoteState {
    open: Option<char>,
}

impl QuoteState {
    fn in_string(&self) -> bool {
        self.open.is_some()
    }

    /// Scan one line, returning the last non-whitespace character seen
    /// outside any quoted literal. Honors backslash escapes and doubled
    /// quotes inside literals, and stops at a `--` comment.
    fn scan(&mut self, line: &str) -> Option<char> {
        let mut last = None;
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match self.open {
                Some(q) => {
                    if c == '\\' && q != '`' {
                        chars.next();
                    } else if c == q {
                        if chars.peek() == Some(&q) {
                            chars.next(); // doubled quote stays inside
                        } else {
                            self.open = None;
                        }
                    }
                }
                None => {
                    if c == '\'' || c == '"' || c == '`' {
                        self.open = Some(c);
                    } else if c == '-' && chars.peek() == Some(&'-') {
                        break;
                    } else if !c.is_whitespace() {
                        last = Some(c);
                    }
                }
            }
        }
        last
    }
}

/// Split raw script text into an ordered statement sequence.
///
/// Line-oriented: a recognized keyword at the start of a line closes any
/// statement accumulated so far; a statement closes when a line ends with a
/// `;` outside any quoted literal. Comment and blank lines between
/// statements are skipped. Trailing text without a terminator is discarded
/// with a warning, never silently executed.
pub fn tokenize(script: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = QuoteState::default();

    for line in script.lines() {
        let trimmed = line.trim();

        if !state.in_string() {
            if trimmed.is_empty() && current.trim().is_empty() {
                continue;
            }
            if trimmed.starts_with("--") {
                continue;
            }
            if starts_statement(trimmed) && !current.trim().is_empty() {
                push_statement(&mut statements, &mut current);
                state = QuoteState::default();
            }
        }

        let last = state.scan(line);
        current.push_str(line);
        current.push('\n');

        if !state.in_string() && last == Some(';') {
            push_statement(&mut statements, &mut current);
        }
    }

    if !current.trim().is_empty() {
        tracing::warn!(
            text = current.trim(),
            "Discarding unterminated trailing statement"
        );
    }

    statements
}

fn push_statement(statements: &mut Vec<Statement>, current: &mut String) {
    let text = current.trim().to_string();
    if !text.is_empty() {
        statements.push(Statement::new(classify(&text), text));
    }
    current.clear();
}

static CREATE_TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^CREATE TABLE\s+(`[^`]+`|[^\s(]+)").unwrap());
static INSERT_INTO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^INSERT INTO\s+(`[^`]+`|[^\s(]+)").unwrap());
static DROP_TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^DROP TABLE\s+(`[^`]+`|[^\s(]+)").unwrap());

/// Rewrite one statement into its idempotent form: `CREATE TABLE IF NOT
/// EXISTS`, `INSERT IGNORE INTO`, `DROP TABLE IF EXISTS`. Applying the
/// rewrite to its own output is a no-op.
pub fn harden(statement: &Statement) -> Statement {
    let text = statement.text.trim();
    let upper = text.to_uppercase();

    let rewritten = if upper.starts_with("CREATE TABLE") && !upper.starts_with("CREATE TABLE IF NOT EXISTS")
    {
        CREATE_TABLE_RE
            .replace(text, |caps: &regex::Captures| {
                format!("CREATE TABLE IF NOT EXISTS {}", &caps[1])
            })
            .into_owned()
    } else if upper.starts_with("INSERT INTO") {
        INSERT_INTO_RE
            .replace(text, |caps: &regex::Captures| {
                format!("INSERT IGNORE INTO {}", &caps[1])
            })
            .into_owned()
    } else if upper.starts_with("DROP TABLE") && !upper.starts_with("DROP TABLE IF EXISTS") {
        DROP_TABLE_RE
            .replace(text, |caps: &regex::Captures| {
                format!("DROP TABLE IF EXISTS {}", &caps[1])
            })
            .into_owned()
    } else {
        text.to_string()
    };

    Statement::new(statement.kind, rewritten)
}

/// Harden a whole statement sequence.
pub fn harden_script(statements: &[Statement]) -> Vec<Statement> {
    statements.iter().map(harden).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_two_single_line_statements() {
        let script = "CREATE TABLE a (id INT);\nINSERT INTO a VALUES (1);\n";
        let statements = tokenize(script);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].text.ends_with(';'));
        assert!(statements[1].text.ends_with(';'));
        assert_eq!(statements[0].kind, StatementKind::Ddl);
        assert_eq!(statements[1].kind, StatementKind::Dml);
    }

    #[test]
    fn multi_line_statement_closes_on_terminator() {
        let script = "CREATE TABLE movies (\n  id INT,\n  title VARCHAR(255)\n);\n";
        let statements = tokenize(script);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].text.contains("title VARCHAR(255)"));
    }

    #[test]
    fn comment_and_blank_lines_between_statements_are_skipped() {
        let script = "-- header\n\nUSE movies;\n\n-- data\nINSERT INTO a VALUES (1);\n";
        let statements = tokenize(script);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].text, "USE movies;");
    }

    #[test]
    fn semicolon_inside_string_literal_does_not_split() {
        let script = "INSERT INTO a (note) VALUES ('first; second');\n";
        let statements = tokenize(script);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].text.contains("'first; second'"));
    }

    #[test]
    fn string_literal_spanning_lines_keeps_one_statement() {
        let script = "INSERT INTO a (note) VALUES ('line one;\nline two');\n";
        let statements = tokenize(script);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].text.contains("line two"));
    }

    #[test]
    fn keyword_line_closes_unterminated_statement() {
        let script = "UPDATE a SET x = 1\nDELETE FROM a WHERE id = 2;\n";
        let statements = tokenize(script);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].text, "UPDATE a SET x = 1");
    }

    #[test]
    fn unterminated_trailing_text_is_discarded() {
        let script = "INSERT INTO a VALUES (1);\nINSERT INTO a VALUES (2\n";
        let statements = tokenize(script);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn harden_rewrites_all_three_forms() {
        let create = harden(&Statement::new(
            StatementKind::Ddl,
            "CREATE TABLE `a` (id INT);",
        ));
        assert_eq!(create.text, "CREATE TABLE IF NOT EXISTS `a` (id INT);");

        let insert = harden(&Statement::new(
            StatementKind::Dml,
            "INSERT INTO `a` VALUES (1);",
        ));
        assert_eq!(insert.text, "INSERT IGNORE INTO `a` VALUES (1);");

        let drop = harden(&Statement::new(StatementKind::Ddl, "DROP TABLE `a`;"));
        assert_eq!(drop.text, "DROP TABLE IF EXISTS `a`;");
    }

    #[test]
    fn harden_twice_is_a_no_op() {
        let statements = vec![
            Statement::new(StatementKind::Ddl, "CREATE TABLE `a` (id INT);"),
            Statement::new(StatementKind::Dml, "INSERT INTO `a` VALUES (1);"),
            Statement::new(StatementKind::Ddl, "DROP TABLE `a`;"),
        ];
        let once = harden_script(&statements);
        let twice = harden_script(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn harden_leaves_unquoted_table_names_intact() {
        let drop = harden(&Statement::new(StatementKind::Ddl, "DROP TABLE movies;"));
        assert_eq!(drop.text, "DROP TABLE IF EXISTS movies;");
    }

    #[test]
    fn harden_does_not_touch_other_statements() {
        let update = Statement::new(StatementKind::Dml, "UPDATE a SET x = 1;");
        assert_eq!(harden(&update), update);
    }
}
