//! Debian Control File (DCF) parser for descriptor blocks.
//!
//! A block is a sequence of `Key: value` lines. Lines that start with a space
//! or tab continue the previous field, and lines whose first non-blank
//! character is `#` are comments. Callers split multi-block files on blank
//! lines before handing each block to [`parse`].

use std::collections::BTreeMap;

/// Parsed fields of one DCF block, keyed by field name (case preserved).
pub type DcfFields = BTreeMap<String, String>;

/// Errors from parsing a DCF block. Line numbers are 1-based within the block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DcfError {
    #[error("line {line}: expected `Key: value`, found no ':' separator")]
    MissingSeparator { line: usize },

    #[error("line {line}: continuation line does not follow a field")]
    OrphanContinuation { line: usize },

    #[error("line {line}: field name is empty")]
    EmptyKey { line: usize },
}

/// Parse a single DCF block into its fields.
///
/// Continuation lines are trimmed and joined to the previous value with `\n`.
/// A repeated key overwrites the earlier value.
pub fn parse(text: &str) -> Result<DcfFields, DcfError> {
    let mut fields = DcfFields::new();
    let mut current: Option<String> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;

        if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
            continue;
        }

        if raw.starts_with(' ') || raw.starts_with('\t') {
            let key = current
                .as_ref()
                .ok_or(DcfError::OrphanContinuation { line })?;
            if let Some(value) = fields.get_mut(key) {
                if !value.is_empty() {
                    value.push('\n');
                }
                value.push_str(raw.trim());
            }
            continue;
        }

        let (key, value) = raw
            .split_once(':')
            .ok_or(DcfError::MissingSeparator { line })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(DcfError::EmptyKey { line });
        }

        fields.insert(key.to_string(), value.trim().to_string());
        current = Some(key.to_string());
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_single_field() {
        let fields = parse("Name: PostgreSQL\n").unwrap();
        assert_eq!(fields.get("Name").map(String::as_str), Some("PostgreSQL"));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_parse_multiple_fields() {
        let text = "Name: Spark\nHelp: https://spark.rstudio.com\nShinyApp: connectionApp\n";
        let fields = parse(text).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["Help"], "https://spark.rstudio.com");
        assert_eq!(fields["ShinyApp"], "connectionApp");
    }

    #[test]
    fn test_value_may_contain_colons() {
        let fields = parse("Help: https://example.com:8080/docs\n").unwrap();
        assert_eq!(fields["Help"], "https://example.com:8080/docs");
    }

    #[test]
    fn test_continuation_lines_fold_into_previous_field() {
        let text = "Name: odbc\nDescription: Connect to\n  any ODBC\n\tdatabase\n";
        let fields = parse(text).unwrap();
        assert_eq!(fields["Description"], "Connect to\nany ODBC\ndatabase");
    }

    #[test]
    fn test_continuation_after_empty_value() {
        let fields = parse("Description:\n  spans lines\n").unwrap();
        assert_eq!(fields["Description"], "spans lines");
    }

    #[test]
    fn test_comments_are_ignored() {
        let text = "# generated\nName: pg\n  # indented comment\n";
        let fields = parse(text).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["Name"], "pg");
    }

    #[test]
    fn test_key_case_is_preserved() {
        let fields = parse("name: lower\nName: upper\n").unwrap();
        assert_eq!(fields["name"], "lower");
        assert_eq!(fields["Name"], "upper");
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let fields = parse("Name: first\nName: second\n").unwrap();
        assert_eq!(fields["Name"], "second");
    }

    #[test]
    fn test_empty_block_has_no_fields() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n   \n").unwrap().is_empty());
    }

    #[test]
    fn test_missing_separator_is_an_error() {
        let err = parse("Name: pg\nnot a field\n").unwrap_err();
        assert_eq!(err, DcfError::MissingSeparator { line: 2 });
    }

    #[test]
    fn test_orphan_continuation_is_an_error() {
        let err = parse("  dangling\nName: pg\n").unwrap_err();
        assert_eq!(err, DcfError::OrphanContinuation { line: 1 });
    }

    #[test]
    fn test_empty_key_is_an_error() {
        let err = parse(": value\n").unwrap_err();
        assert_eq!(err, DcfError::EmptyKey { line: 1 });
    }

    #[test]
    fn test_error_display_mentions_line() {
        let err = DcfError::MissingSeparator { line: 7 };
        assert!(err.to_string().starts_with("line 7:"));
    }
}
