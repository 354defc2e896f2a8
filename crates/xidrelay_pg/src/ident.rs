//! SQL identifier checks.
//!
//! Table, view and sequence names are spliced into DDL text, so every name
//! that comes from configuration is checked here first.

use crate::error::{PgError, PgResult};

/// Checks that `name` is an optionally schema-qualified unquoted identifier.
///
/// Each dot separated part must match `[A-Za-z_][A-Za-z0-9_]*`.
///
/// # Errors
///
/// Returns [`PgError::InvalidIdentifier`] otherwise.
pub fn validate_identifier(name: &str) -> PgResult<()> {
    if name.split('.').all(is_plain_identifier) {
        Ok(())
    } else {
        Err(PgError::invalid_identifier(name))
    }
}

/// Splits `schema.name` into its parts. Unqualified names have no schema.
#[must_use]
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((schema, rest)) => (Some(schema), rest),
        None => (None, name),
    }
}

fn is_plain_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_qualified_names() {
        assert!(validate_identifier("currentlog").is_ok());
        assert!(validate_identifier("bruce.transactionlog_12").is_ok());
        assert!(validate_identifier("_x.y_1").is_ok());
    }

    #[test]
    fn rejects_unsafe_names() {
        for name in ["", "bruce.", ".log", "1abc", "bruce.log; drop table x", "a-b", "a..b"] {
            assert!(validate_identifier(name).is_err(), "{name:?} accepted");
        }
    }

    #[test]
    fn split_names() {
        assert_eq!(split_qualified("bruce.currentlog"), (Some("bruce"), "currentlog"));
        assert_eq!(split_qualified("currentlog"), (None, "currentlog"));
    }
}
