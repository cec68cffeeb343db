//! Parsers for engine-rendered object definitions
//!
//! PostgreSQL renders index and constraint definitions (`pg_get_indexdef`,
//! `pg_get_constraintdef`) in a narrow, predictable grammar. These scanners
//! only locate the landmarks the verifiers need; they are not SQL parsers.
//!
//! - [`parse_index_definition`] → [`ParsedIndexSpec`]
//! - [`strip_operator_classes`] → plain projection / `ORDER BY` list
//! - [`parse_foreign_key_definition`] → [`ParsedForeignKeySpec`]

mod foreign_key;
mod index;
mod lexer;
mod opclass;

pub use foreign_key::{parse_foreign_key_definition, ParsedForeignKeySpec};
pub use index::{parse_index_definition, ParsedIndexSpec};
pub use opclass::strip_operator_classes;

/// Why a definition did not match the expected landmarks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedReason {
    #[error("unbalanced parentheses")]
    UnbalancedParentheses,
    #[error("no parenthesized column list found")]
    MissingColumnList,
    #[error("empty column or expression in column list")]
    EmptyColumnList,
    #[error("REFERENCES keyword not found")]
    MissingReferences,
    #[error("no table name between REFERENCES and the referenced column list")]
    MissingDestinationTable,
    #[error("referenced column list not found")]
    MissingDestinationColumns,
    #[error("{origin} referencing column(s) but {destination} referenced column(s)")]
    ColumnCountMismatch { origin: usize, destination: usize },
}

/// Definition parsing error
///
/// Never retryable: it means the definition was rendered in a form this tool
/// does not understand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("malformed definition ({reason}): {definition}")]
    Malformed {
        definition: String,
        reason: MalformedReason,
    },
}

impl DefinitionError {
    pub(crate) fn malformed(definition: &str, reason: MalformedReason) -> Self {
        DefinitionError::Malformed {
            definition: definition.to_string(),
            reason,
        }
    }

    pub fn reason(&self) -> &MalformedReason {
        match self {
            DefinitionError::Malformed { reason, .. } => reason,
        }
    }
}

/// Split a column list on top-level commas, rejecting unbalanced or empty elements.
fn split_column_list(definition: &str, list: &str) -> Result<Vec<String>, DefinitionError> {
    let pieces = lexer::split_top_level(list)
        .ok_or_else(|| DefinitionError::malformed(definition, MalformedReason::UnbalancedParentheses))?;
    if pieces.iter().any(|p| p.is_empty()) {
        return Err(DefinitionError::malformed(definition, MalformedReason::EmptyColumnList));
    }
    Ok(pieces.into_iter().map(str::to_string).collect())
}
