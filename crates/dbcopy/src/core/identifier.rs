//! Identifier validation, quoting and literal escaping.
//!
//! Every identifier that ends up inside generated DDL passes through one of
//! these functions. Catalog names cannot be bound as statement parameters, so
//! they are validated and quoted here instead of being spliced in raw.
//!
//! Quoting rules:
//! - PostgreSQL: `"name"`, embedded `"` doubled
//! - SQL Server: `[name]`, embedded `]` doubled
//! - string literals (both dialects): `'text'`, embedded `'` doubled

use crate::error::{MigrateError, Result};

/// Maximum identifier length.
/// - PostgreSQL: 63 bytes
/// - SQL Server: 128 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier before it is embedded in SQL.
///
/// Rejects empty names, names containing a NUL byte and names longer than
/// [`MAX_IDENTIFIER_LENGTH`] bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::InvalidIdentifier(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::InvalidIdentifier(format!(
            "identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// ```ignore
/// assert_eq!(quote_pg("users")?, "\"users\"");
/// assert_eq!(quote_pg("table\"name")?, "\"table\"\"name\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a SQL Server identifier using brackets.
///
/// ```ignore
/// assert_eq!(quote_mssql("users")?, "[users]");
/// assert_eq!(quote_mssql("table]name")?, "[table]]name]");
/// ```
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Quote a string literal. Both dialects escape `'` by doubling it.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Remove quoting characters (`"`, `[`, `]`) and surrounding whitespace.
///
/// Used when a name is derived from other identifiers, e.g. synthesized
/// index names.
pub fn strip_quotes(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '"' | '[' | ']'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("orders").is_ok());
        assert!(validate_identifier("Order Lines").is_ok());
        assert!(validate_identifier("日本語").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let err = validate_identifier("").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let err = validate_identifier("ord\0ers").unwrap_err();
        assert!(err.to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_length_limit() {
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
        let err = validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)).unwrap_err();
        assert!(err.to_string().contains("maximum length"));
    }

    #[test]
    fn test_quote_pg() {
        assert_eq!(quote_pg("orders").unwrap(), "\"orders\"");
        assert_eq!(quote_pg("a\"b").unwrap(), "\"a\"\"b\"");
        assert_eq!(
            quote_pg("x\"); DROP TABLE t;--").unwrap(),
            "\"x\"\"); DROP TABLE t;--\""
        );
    }

    #[test]
    fn test_quote_mssql() {
        assert_eq!(quote_mssql("orders").unwrap(), "[orders]");
        assert_eq!(quote_mssql("a]b").unwrap(), "[a]]b]");
        assert!(quote_mssql("").is_err());
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("dbo.orders"), "'dbo.orders'");
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"Order Id\""), "Order Id");
        assert_eq!(strip_quotes(" [LineNo] "), "LineNo");
    }
}
