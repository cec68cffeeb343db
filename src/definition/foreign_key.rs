//! Foreign key constraint definition scanner

use super::lexer::{keyword_at, lexemes};
use super::{split_column_list, DefinitionError, MalformedReason};

/// Columns and referenced table extracted from a foreign key definition
///
/// `origin_columns[i]` references `destination_columns[i]`; both lists have the
/// same length and are never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedForeignKeySpec {
    pub origin_columns: Vec<String>,
    /// Referenced table as rendered (schema-qualified when not on the search path)
    pub destination_table: String,
    pub destination_columns: Vec<String>,
}

impl ParsedForeignKeySpec {
    /// Positional `(origin, destination)` column pairs
    pub fn column_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.origin_columns
            .iter()
            .map(String::as_str)
            .zip(self.destination_columns.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForeignKeyScanState {
    SeekOriginList,
    InOriginList { start: usize, depth: usize },
    SeekReferences { depth: usize },
    InDestinationTable { start: usize },
    InDestinationList { start: usize, depth: usize },
    /// `ON DELETE ...`, `MATCH FULL`, `DEFERRABLE`, `NOT VALID`
    Trailing { depth: usize },
}

/// Parse a `FOREIGN KEY (<cols>) REFERENCES <table>(<cols>) ...` definition
///
/// # Errors
///
/// Returns [`DefinitionError::Malformed`] when a landmark is missing, the
/// parentheses are unbalanced, or the two column lists differ in length.
///
/// # Examples
///
/// ```
/// use indexguard::definition::parse_foreign_key_definition;
///
/// let spec = parse_foreign_key_definition(
///     "FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE",
/// )?;
/// assert_eq!(spec.origin_columns, vec!["user_id"]);
/// assert_eq!(spec.destination_table, "users");
/// assert_eq!(spec.destination_columns, vec!["id"]);
/// # Ok::<(), indexguard::definition::DefinitionError>(())
/// ```
pub fn parse_foreign_key_definition(definition: &str) -> Result<ParsedForeignKeySpec, DefinitionError> {
    let malformed = |reason| DefinitionError::malformed(definition, reason);
    let unbalanced = || malformed(MalformedReason::UnbalancedParentheses);

    let mut state = ForeignKeyScanState::SeekOriginList;
    let mut origin: Option<&str> = None;
    let mut table: Option<&str> = None;
    let mut destination: Option<&str> = None;

    for lexeme in lexemes(definition) {
        state = match state {
            ForeignKeyScanState::SeekOriginList => {
                if lexeme.is_code('(') {
                    ForeignKeyScanState::InOriginList {
                        start: lexeme.offset + 1,
                        depth: 1,
                    }
                } else if lexeme.is_code(')') {
                    return Err(unbalanced());
                } else {
                    state
                }
            }
            ForeignKeyScanState::InOriginList { start, depth } => {
                if lexeme.is_code('(') {
                    ForeignKeyScanState::InOriginList {
                        start,
                        depth: depth + 1,
                    }
                } else if lexeme.is_code(')') && depth == 1 {
                    origin = Some(&definition[start..lexeme.offset]);
                    ForeignKeyScanState::SeekReferences { depth: 0 }
                } else if lexeme.is_code(')') {
                    ForeignKeyScanState::InOriginList {
                        start,
                        depth: depth - 1,
                    }
                } else {
                    state
                }
            }
            ForeignKeyScanState::SeekReferences { depth } => {
                if lexeme.is_code('(') {
                    ForeignKeyScanState::SeekReferences { depth: depth + 1 }
                } else if lexeme.is_code(')') {
                    ForeignKeyScanState::SeekReferences {
                        depth: depth.checked_sub(1).ok_or_else(unbalanced)?,
                    }
                } else if depth == 0 && lexeme.code && keyword_at(definition, lexeme.offset, "REFERENCES") {
                    ForeignKeyScanState::InDestinationTable {
                        start: lexeme.offset + "REFERENCES".len(),
                    }
                } else {
                    state
                }
            }
            ForeignKeyScanState::InDestinationTable { start } => {
                if lexeme.is_code('(') {
                    let name = definition[start..lexeme.offset].trim();
                    if name.is_empty() {
                        return Err(malformed(MalformedReason::MissingDestinationTable));
                    }
                    table = Some(name);
                    ForeignKeyScanState::InDestinationList {
                        start: lexeme.offset + 1,
                        depth: 1,
                    }
                } else if lexeme.is_code(')') {
                    return Err(unbalanced());
                } else {
                    state
                }
            }
            ForeignKeyScanState::InDestinationList { start, depth } => {
                if lexeme.is_code('(') {
                    ForeignKeyScanState::InDestinationList {
                        start,
                        depth: depth + 1,
                    }
                } else if lexeme.is_code(')') && depth == 1 {
                    destination = Some(&definition[start..lexeme.offset]);
                    ForeignKeyScanState::Trailing { depth: 0 }
                } else if lexeme.is_code(')') {
                    ForeignKeyScanState::InDestinationList {
                        start,
                        depth: depth - 1,
                    }
                } else {
                    state
                }
            }
            ForeignKeyScanState::Trailing { depth } => {
                if lexeme.is_code('(') {
                    ForeignKeyScanState::Trailing { depth: depth + 1 }
                } else if lexeme.is_code(')') {
                    ForeignKeyScanState::Trailing {
                        depth: depth.checked_sub(1).ok_or_else(unbalanced)?,
                    }
                } else {
                    state
                }
            }
        };
    }

    match state {
        ForeignKeyScanState::Trailing { depth: 0 } => {}
        ForeignKeyScanState::SeekOriginList => return Err(malformed(MalformedReason::MissingColumnList)),
        ForeignKeyScanState::SeekReferences { depth: 0 } => {
            return Err(malformed(MalformedReason::MissingReferences));
        }
        ForeignKeyScanState::InDestinationTable { .. } => {
            return Err(malformed(MalformedReason::MissingDestinationColumns));
        }
        ForeignKeyScanState::InOriginList { .. }
        | ForeignKeyScanState::SeekReferences { .. }
        | ForeignKeyScanState::InDestinationList { .. }
        | ForeignKeyScanState::Trailing { .. } => return Err(unbalanced()),
    }

    let (Some(origin), Some(table), Some(destination)) = (origin, table, destination) else {
        return Err(unbalanced());
    };

    let origin_columns = split_column_list(definition, origin)?;
    let destination_columns = split_column_list(definition, destination)?;
    if origin_columns.len() != destination_columns.len() {
        return Err(malformed(MalformedReason::ColumnCountMismatch {
            origin: origin_columns.len(),
            destination: destination_columns.len(),
        }));
    }

    Ok(ParsedForeignKeySpec {
        origin_columns,
        destination_table: table.to_string(),
        destination_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_column_foreign_key() {
        let spec = parse_foreign_key_definition("FOREIGN KEY (a, b) REFERENCES other_table(x, y)").unwrap();
        assert_eq!(spec.origin_columns, vec!["a", "b"]);
        assert_eq!(spec.destination_table, "other_table");
        assert_eq!(spec.destination_columns, vec!["x", "y"]);
        assert_eq!(
            spec.column_pairs().collect::<Vec<_>>(),
            vec![("a", "x"), ("b", "y")]
        );
    }

    #[test]
    fn test_schema_qualified_destination_with_actions() {
        let spec = parse_foreign_key_definition(
            "FOREIGN KEY (user_id) REFERENCES billing.users(id) ON UPDATE CASCADE ON DELETE SET NULL DEFERRABLE",
        )
        .unwrap();
        assert_eq!(spec.destination_table, "billing.users");
        assert_eq!(spec.destination_columns, vec!["id"]);
    }

    #[test]
    fn test_on_delete_set_null_column_list() {
        // PostgreSQL 15 renders `ON DELETE SET NULL (col)`
        let spec = parse_foreign_key_definition(
            "FOREIGN KEY (tenant_id, author_id) REFERENCES users(tenant_id, id) ON DELETE SET NULL (author_id)",
        )
        .unwrap();
        assert_eq!(spec.destination_columns, vec!["tenant_id", "id"]);
    }

    #[test]
    fn test_lowercase_references_and_quoted_names() {
        let spec = parse_foreign_key_definition(
            r#"foreign key ("Owner Id") references "Weird (Table)"("Id") not valid"#,
        )
        .unwrap();
        assert_eq!(spec.origin_columns, vec![r#""Owner Id""#]);
        assert_eq!(spec.destination_table, r#""Weird (Table)""#);
        assert_eq!(spec.destination_columns, vec![r#""Id""#]);
    }

    #[test]
    fn test_missing_references() {
        let err = parse_foreign_key_definition("FOREIGN KEY (a) users(id)").unwrap_err();
        assert_eq!(err.reason(), &MalformedReason::MissingReferences);
    }

    #[test]
    fn test_missing_destination_columns() {
        let err = parse_foreign_key_definition("FOREIGN KEY (a) REFERENCES users").unwrap_err();
        assert_eq!(err.reason(), &MalformedReason::MissingDestinationColumns);
    }

    #[test]
    fn test_missing_destination_table() {
        let err = parse_foreign_key_definition("FOREIGN KEY (a) REFERENCES (id)").unwrap_err();
        assert_eq!(err.reason(), &MalformedReason::MissingDestinationTable);
    }

    #[test]
    fn test_column_count_mismatch() {
        let err = parse_foreign_key_definition("FOREIGN KEY (a, b) REFERENCES t(x)").unwrap_err();
        assert_eq!(
            err.reason(),
            &MalformedReason::ColumnCountMismatch {
                origin: 2,
                destination: 1
            }
        );
    }

    #[test]
    fn test_unbalanced_foreign_keys() {
        for definition in [
            "FOREIGN KEY (a REFERENCES t(x)",
            "FOREIGN KEY (a) REFERENCES t(x",
            "FOREIGN KEY (a) REFERENCES t(x))",
            "FOREIGN KEY a) REFERENCES t(x)",
        ] {
            let err = parse_foreign_key_definition(definition).unwrap_err();
            assert_eq!(
                err.reason(),
                &MalformedReason::UnbalancedParentheses,
                "{definition}"
            );
        }
    }

    #[test]
    fn test_missing_origin_list() {
        let err = parse_foreign_key_definition("FOREIGN KEY a REFERENCES t").unwrap_err();
        assert_eq!(err.reason(), &MalformedReason::MissingColumnList);
    }
}
