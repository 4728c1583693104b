//! Identifier and literal quoting.
//!
//! Bound parameters are the normal way to pass values; these helpers exist
//! for the places where SQL text has to be assembled by hand (dynamic table
//! names, legacy statements built by string concatenation).

use crate::models::{DatabaseType, QueryParam};

/// Wrap `identifier` in `quote`, doubling any embedded quote characters.
pub fn quote_identifier(identifier: &str, quote: char) -> String {
    let mut out = String::with_capacity(identifier.len() + 2);
    out.push(quote);
    for c in identifier.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// Render `value` as an SQL literal for the given database.
pub fn quote_literal(value: &QueryParam, db: DatabaseType) -> String {
    match value {
        QueryParam::Null => "NULL".to_string(),
        QueryParam::Bool(b) => match db {
            DatabaseType::PostgreSQL => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            DatabaseType::MySQL | DatabaseType::SQLite => (if *b { "1" } else { "0" }).to_string(),
        },
        QueryParam::Int(v) => v.to_string(),
        QueryParam::Float(v) if v.is_finite() => v.to_string(),
        // NaN and infinities have no portable literal form
        QueryParam::Float(v) => quote_string(&v.to_string(), db),
        QueryParam::String(s) => quote_string(s, db),
        QueryParam::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            match db {
                DatabaseType::PostgreSQL => format!("'\\x{}'::bytea", hex),
                DatabaseType::MySQL | DatabaseType::SQLite => format!("X'{}'", hex),
            }
        }
    }
}

/// Quote a string literal.
///
/// MySQL treats backslash as an escape character inside literals, so the
/// characters escaped by `mysql_real_escape_string` are escaped there.
fn quote_string(s: &str, db: DatabaseType) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match (db, c) {
            (_, '\'') => out.push_str("''"),
            (DatabaseType::MySQL, '\\') => out.push_str("\\\\"),
            (DatabaseType::MySQL, '\0') => out.push_str("\\0"),
            (DatabaseType::MySQL, '\n') => out.push_str("\\n"),
            (DatabaseType::MySQL, '\r') => out.push_str("\\r"),
            (DatabaseType::MySQL, '\u{1a}') => out.push_str("\\Z"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}
