//! Index definition scanner

use super::lexer::{keyword_at, lexemes};
use super::opclass::strip_operator_classes;
use super::{split_column_list, DefinitionError, MalformedReason};

/// Columns and predicate extracted from an index definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIndexSpec {
    /// Key expressions with operator classes and sort modifiers removed (never empty)
    pub column_expressions: Vec<String>,
    /// `WHERE <predicate>` for partial indexes, empty otherwise
    pub filter_predicate: String,
    /// The key list exactly as rendered, between the outer parentheses
    pub raw_column_definition: String,
    /// `NULLS NOT DISTINCT` follows the key list: unique indexes treat NULL keys as equal
    pub nulls_not_distinct: bool,
}

impl ParsedIndexSpec {
    /// Comma-separated key expressions, usable as a projection or `ORDER BY` list
    #[must_use]
    pub fn column_list(&self) -> String {
        self.column_expressions.join(", ")
    }

    /// The predicate without its `WHERE` keyword
    #[must_use]
    pub fn predicate(&self) -> Option<&str> {
        self.filter_predicate
            .get(PREDICATE_PREFIX.len()..)
            .filter(|p| !p.is_empty())
    }
}

const PREDICATE_PREFIX: &str = "WHERE ";
const NULLS_NOT_DISTINCT: &str = "NULLS NOT DISTINCT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexScanState {
    /// Before the key list (`CREATE INDEX name ON table USING btree `)
    SeekOpenParen,
    /// Inside the top-level key list
    InExpressionList { start: usize, depth: usize },
    /// After the key list; `INCLUDE (...)` and `WITH (...)` may still open groups
    SeekWhere { depth: usize },
    /// Everything after ` WHERE ` belongs to the predicate
    InPredicate { start: usize, depth: usize },
}

/// Parse a `CREATE [UNIQUE] INDEX ... ON table (<expr-list>) [WHERE <predicate>]` definition
///
/// The first balanced top-level parenthesized group is the key list. ` WHERE `
/// is only recognized at depth 0 once the key list is closed.
///
/// # Errors
///
/// Returns [`DefinitionError::Malformed`] when the parentheses are unbalanced,
/// no key list is present, or an element of the key list is empty.
///
/// # Examples
///
/// ```
/// use indexguard::definition::parse_index_definition;
///
/// let spec = parse_index_definition(
///     "CREATE INDEX idx ON public.users USING btree (lower(email) text_pattern_ops, id DESC) WHERE (active)",
/// )?;
/// assert_eq!(spec.column_expressions, vec!["lower(email)", "id"]);
/// assert_eq!(spec.filter_predicate, "WHERE (active)");
/// # Ok::<(), indexguard::definition::DefinitionError>(())
/// ```
pub fn parse_index_definition(definition: &str) -> Result<ParsedIndexSpec, DefinitionError> {
    let unbalanced = || DefinitionError::malformed(definition, MalformedReason::UnbalancedParentheses);

    let mut state = IndexScanState::SeekOpenParen;
    let mut raw: Option<&str> = None;
    let mut nulls_not_distinct = false;

    for lexeme in lexemes(definition) {
        state = match state {
            IndexScanState::SeekOpenParen => {
                if lexeme.is_code('(') {
                    IndexScanState::InExpressionList {
                        start: lexeme.offset + 1,
                        depth: 1,
                    }
                } else if lexeme.is_code(')') {
                    return Err(unbalanced());
                } else {
                    state
                }
            }
            IndexScanState::InExpressionList { start, depth } => {
                if lexeme.is_code('(') {
                    IndexScanState::InExpressionList {
                        start,
                        depth: depth + 1,
                    }
                } else if lexeme.is_code(')') && depth == 1 {
                    raw = Some(&definition[start..lexeme.offset]);
                    IndexScanState::SeekWhere { depth: 0 }
                } else if lexeme.is_code(')') {
                    IndexScanState::InExpressionList {
                        start,
                        depth: depth - 1,
                    }
                } else {
                    state
                }
            }
            IndexScanState::SeekWhere { depth } => {
                if lexeme.is_code('(') {
                    IndexScanState::SeekWhere { depth: depth + 1 }
                } else if lexeme.is_code(')') {
                    IndexScanState::SeekWhere {
                        depth: depth.checked_sub(1).ok_or_else(unbalanced)?,
                    }
                } else if depth == 0
                    && lexeme.is_code_whitespace()
                    && keyword_at(definition, lexeme.offset + lexeme.ch.len_utf8(), "WHERE")
                {
                    IndexScanState::InPredicate {
                        start: lexeme.offset + lexeme.ch.len_utf8() + "WHERE".len(),
                        depth: 0,
                    }
                } else if depth == 0
                    && lexeme.is_code_whitespace()
                    && keyword_at(definition, lexeme.offset + lexeme.ch.len_utf8(), NULLS_NOT_DISTINCT)
                {
                    nulls_not_distinct = true;
                    state
                } else {
                    state
                }
            }
            IndexScanState::InPredicate { start, depth } => {
                if lexeme.is_code('(') {
                    IndexScanState::InPredicate {
                        start,
                        depth: depth + 1,
                    }
                } else if lexeme.is_code(')') {
                    IndexScanState::InPredicate {
                        start,
                        depth: depth.checked_sub(1).ok_or_else(unbalanced)?,
                    }
                } else {
                    state
                }
            }
        };
    }

    let predicate = match state {
        IndexScanState::SeekOpenParen => {
            return Err(DefinitionError::malformed(definition, MalformedReason::MissingColumnList));
        }
        IndexScanState::InExpressionList { .. } => return Err(unbalanced()),
        IndexScanState::SeekWhere { depth: 0 } => None,
        IndexScanState::InPredicate { start, depth: 0 } => Some(definition[start..].trim()),
        IndexScanState::SeekWhere { .. } | IndexScanState::InPredicate { .. } => {
            return Err(unbalanced());
        }
    };

    // SeekWhere/InPredicate are only reachable after the key list closed
    let raw = raw.ok_or_else(unbalanced)?;
    let column_expressions = split_column_list(definition, &strip_operator_classes(raw))?;

    let filter_predicate = match predicate {
        Some(p) if !p.is_empty() => format!("{PREDICATE_PREFIX}{p}"),
        _ => String::new(),
    };

    Ok(ParsedIndexSpec {
        column_expressions,
        filter_predicate,
        raw_column_definition: raw.to_string(),
        nulls_not_distinct,
    })
}
