//! Parameter binding utilities for database queries.
//!
//! This module binds `QueryParam` values to database-specific query objects
//! and rewrites `:name` placeholders into the positional form the drivers
//! understand.

use crate::error::ErrorInfo;
use crate::models::{DatabaseType, QueryParam};
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Postgres, Sqlite};

/// SQLSTATE for a parameter that does not match any placeholder.
pub const SQLSTATE_INVALID_PARAMETER: &str = "HY093";

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// SQL with `:name` placeholders replaced by positional ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenSql {
    pub sql: String,
    /// Placeholder names in order of appearance; a name appears once per use.
    pub names: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
    /// PostgreSQL `$tag$ ... $tag$` body; the tag is `chars[start..start + len]`.
    DollarQuoted { start: usize, len: usize },
}

/// Replace `:name` placeholders with `?` (MySQL, SQLite) or `$n` (PostgreSQL).
///
/// String literals, quoted identifiers, comments and PostgreSQL dollar-quoted
/// bodies are copied unchanged. `::` casts and a `:` directly after an
/// identifier or `]` (array slices such as `arr[lo:hi]`) are not
/// placeholders.
pub fn rewrite_named_placeholders(sql: &str, db: DatabaseType) -> RewrittenSql {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut names = Vec::new();
    let mut state = ScanState::Code;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let after_word = i > 0 && (is_name_char(chars[i - 1]) || chars[i - 1] == ']');
        match state {
            ScanState::Code => match c {
                '\'' | '"' | '`' => {
                    state = ScanState::Quoted(c);
                    out.push(c);
                }
                '-' if next == Some('-') => {
                    state = ScanState::LineComment;
                    out.push(c);
                }
                '#' if db == DatabaseType::MySQL => {
                    state = ScanState::LineComment;
                    out.push(c);
                }
                '/' if next == Some('*') => {
                    state = ScanState::BlockComment;
                    out.push_str("/*");
                    i += 1;
                }
                ':' if next == Some(':') => {
                    out.push_str("::");
                    i += 1;
                }
                '$' if db == DatabaseType::PostgreSQL && !after_word => {
                    match dollar_tag_len(&chars, i) {
                        Some(len) => {
                            out.extend(&chars[i..i + len]);
                            state = ScanState::DollarQuoted { start: i, len };
                            i += len;
                            continue;
                        }
                        None => out.push(c),
                    }
                }
                ':' if next.is_some_and(is_name_start) && !after_word => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && is_name_char(chars[end]) {
                        end += 1;
                    }
                    names.push(chars[start..end].iter().collect());
                    match db {
                        DatabaseType::PostgreSQL => out.push_str(&format!("${}", names.len())),
                        DatabaseType::MySQL | DatabaseType::SQLite => out.push('?'),
                    }
                    i = end;
                    continue;
                }
                _ => out.push(c),
            },
            ScanState::Quoted(q) => {
                out.push(c);
                if c == '\\' && q != '`' && db == DatabaseType::MySQL {
                    if let Some(escaped) = next {
                        out.push(escaped);
                        i += 1;
                    }
                } else if c == q {
                    // a doubled quote stays inside the literal
                    if next == Some(q) {
                        out.push(q);
                        i += 1;
                    } else {
                        state = ScanState::Code;
                    }
                }
            }
            ScanState::LineComment => {
                out.push(c);
                if c == '\n' {
                    state = ScanState::Code;
                }
            }
            ScanState::BlockComment => {
                if c == '*' && next == Some('/') {
                    out.push_str("*/");
                    i += 1;
                    state = ScanState::Code;
                } else {
                    out.push(c);
                }
            }
            ScanState::DollarQuoted { start, len } => {
                if chars.get(i..i + len) == Some(&chars[start..start + len]) {
                    out.extend(&chars[i..i + len]);
                    state = ScanState::Code;
                    i += len;
                    continue;
                }
                out.push(c);
            }
        }
        i += 1;
    }

    RewrittenSql { sql: out, names }
}

/// Length of the dollar-quote tag (`$$` or `$name$`) starting at `start`.
fn dollar_tag_len(chars: &[char], start: usize) -> Option<usize> {
    let mut end = start + 1;
    while let Some(&c) = chars.get(end) {
        if c == '$' {
            return Some(end - start + 1);
        }
        let valid = if end == start + 1 {
            is_name_start(c)
        } else {
            is_name_char(c)
        };
        if !valid {
            return None;
        }
        end += 1;
    }
    None
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Order named values to match the placeholders of a rewritten statement.
///
/// Fails with `HY093` when a placeholder has no value or a value has no
/// placeholder.
pub fn resolve_named(
    names: &[String],
    values: &[(String, QueryParam)],
) -> Result<Vec<QueryParam>, ErrorInfo> {
    let mut ordered = Vec::with_capacity(names.len());
    for name in names {
        let value = values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| invalid_parameter(format!("parameter :{} was not defined", name)))?;
        ordered.push(value);
    }
    if let Some((unused, _)) = values.iter().find(|(k, _)| !names.contains(k)) {
        return Err(invalid_parameter(format!(
            "parameter :{} does not match any placeholder",
            unused
        )));
    }
    Ok(ordered)
}

fn invalid_parameter(detail: String) -> ErrorInfo {
    ErrorInfo {
        sql_state: SQLSTATE_INVALID_PARAMETER.to_string(),
        driver_code: None,
        message: Some(format!("Invalid parameter number: {}", detail)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_mysql() {
        let r = rewrite_named_placeholders(
            "SELECT * FROM admin WHERE admin_id = :id AND admin_type = :type",
            DatabaseType::MySQL,
        );
        assert_eq!(
            r.sql,
            "SELECT * FROM admin WHERE admin_id = ? AND admin_type = ?"
        );
        assert_eq!(r.names, vec!["id", "type"]);
    }

    #[test]
    fn test_rewrite_postgres_numbers_placeholders() {
        let r = rewrite_named_placeholders(
            "UPDATE admin SET admin_pass = :pass WHERE admin_id = :id",
            DatabaseType::PostgreSQL,
        );
        assert_eq!(r.sql, "UPDATE admin SET admin_pass = $1 WHERE admin_id = $2");
    }

    #[test]
    fn test_rewrite_skips_casts_literals_and_comments() {
        let r = rewrite_named_placeholders(
            "SELECT ':not', x::text, `:col` -- :comment\n/* :block */ FROM t WHERE a = :a",
            DatabaseType::PostgreSQL,
        );
        assert_eq!(
            r.sql,
            "SELECT ':not', x::text, `:col` -- :comment\n/* :block */ FROM t WHERE a = $1"
        );
        assert_eq!(r.names, vec!["a"]);
    }

    #[test]
    fn test_rewrite_skips_array_slices() {
        let r = rewrite_named_placeholders(
            "SELECT arr[lo:hi], arr[1:2], arr[1][lo:hi] FROM t WHERE id = :id",
            DatabaseType::PostgreSQL,
        );
        assert_eq!(
            r.sql,
            "SELECT arr[lo:hi], arr[1:2], arr[1][lo:hi] FROM t WHERE id = $1"
        );
        assert_eq!(r.names, vec!["id"]);
    }

    #[test]
    fn test_rewrite_skips_dollar_quoted_bodies() {
        let r = rewrite_named_placeholders(
            "SELECT $$ a :x $$, $fn$ :y $$ :z $fn$, :w, $1",
            DatabaseType::PostgreSQL,
        );
        assert_eq!(r.sql, "SELECT $$ a :x $$, $fn$ :y $$ :z $fn$, $1, $1");
        assert_eq!(r.names, vec!["w"]);

        // MySQL has no dollar quoting
        let r = rewrite_named_placeholders("SELECT '$$', $$ :x $$", DatabaseType::MySQL);
        assert_eq!(r.names, vec!["x"]);
    }

    #[test]
    fn test_rewrite_handles_escaped_quotes() {
        let r = rewrite_named_placeholders(
            "SELECT 'it''s :x', 'a\\':y' , :z",
            DatabaseType::MySQL,
        );
        assert_eq!(r.names, vec!["z"]);
        assert!(r.sql.ends_with(", ?"));
    }

    #[test]
    fn test_rewrite_repeated_name() {
        let r = rewrite_named_placeholders("SELECT :a, :a", DatabaseType::SQLite);
        assert_eq!(r.sql, "SELECT ?, ?");
        assert_eq!(r.names, vec!["a", "a"]);
    }

    #[test]
    fn test_rewrite_without_placeholders_is_identity() {
        let sql = "SELECT @v := 1, '12:30'";
        let r = rewrite_named_placeholders(sql, DatabaseType::MySQL);
        assert_eq!(r.sql, sql);
        assert!(r.names.is_empty());
    }

    #[test]
    fn test_resolve_named_orders_values() {
        let names = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        let values = vec![
            ("a".to_string(), QueryParam::Int(1)),
            ("b".to_string(), QueryParam::Int(2)),
        ];
        let ordered = resolve_named(&names, &values).unwrap();
        assert_eq!(
            ordered,
            vec![QueryParam::Int(2), QueryParam::Int(1), QueryParam::Int(2)]
        );
    }

    #[test]
    fn test_resolve_named_missing_value() {
        let names = vec!["id".to_string()];
        let err = resolve_named(&names, &[]).unwrap_err();
        assert_eq!(err.sql_state, SQLSTATE_INVALID_PARAMETER);
        assert!(err.message.unwrap().contains(":id"));
    }

    #[test]
    fn test_resolve_named_unused_value() {
        let values = vec![("extra".to_string(), QueryParam::Null)];
        let err = resolve_named(&[], &values).unwrap_err();
        assert_eq!(err.sql_state, SQLSTATE_INVALID_PARAMETER);
    }
}
