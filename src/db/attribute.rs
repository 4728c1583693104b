//! Connection attributes readable at runtime.

use std::fmt;

/// Attribute of an open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Driver name as written in the panel configuration. Read-only.
    DriverName,
    /// Server version reported at connect time. Read-only.
    ServerVersion,
    /// Character used by `quote_identifier`. Writable.
    QuoteChar,
    /// False while a transaction is open. Read-only.
    Autocommit,
    /// Number of statements held in the driver's statement cache. Read-only.
    CachedStatements,
}

impl Attribute {
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::QuoteChar)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DriverName => "driver_name",
            Self::ServerVersion => "server_version",
            Self::QuoteChar => "quote_char",
            Self::Autocommit => "autocommit",
            Self::CachedStatements => "cached_statements",
        };
        f.write_str(name)
    }
}

/// Value of a connection attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Bool(bool),
    Char(char),
    Count(usize),
    Text(String),
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<char> for AttributeValue {
    fn from(v: char) -> Self {
        Self::Char(v)
    }
}

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        Self::Count(v)
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_quote_char_is_writable() {
        assert!(Attribute::QuoteChar.is_writable());
        for attribute in [
            Attribute::DriverName,
            Attribute::ServerVersion,
            Attribute::Autocommit,
            Attribute::CachedStatements,
        ] {
            assert!(!attribute.is_writable(), "{} should be read-only", attribute);
        }
    }

    #[test]
    fn test_attribute_value_conversions() {
        assert_eq!(AttributeValue::from('`'), AttributeValue::Char('`'));
        assert_eq!(AttributeValue::from(true), AttributeValue::Bool(true));
        assert_eq!(
            AttributeValue::from("sqlite"),
            AttributeValue::Text("sqlite".to_string())
        );
    }
}
