//! Operator class stripping for index key lists.
//!
//! Each top-level element of a rendered key list is `<expr> [COLLATE c] [opclass] [ASC|DESC] [NULLS FIRST|LAST]`.
//! PostgreSQL parenthesizes every key expression that is not a bare column or
//! function call, so whitespace outside parentheses only ever separates the
//! expression from its modifiers.

use super::lexer::lexemes;

/// Remove operator classes and ordering modifiers from a key list
///
/// Only the first top-level word of every comma-separated element is kept,
/// plus a directly following `COLLATE <name>`. Anything inside parentheses or
/// quotes is copied through untouched. Lists without modifiers come back
/// unchanged.
///
/// # Examples
///
/// ```
/// use indexguard::definition::strip_operator_classes;
///
/// assert_eq!(strip_operator_classes("a text_pattern_ops, b DESC"), "a, b");
/// assert_eq!(strip_operator_classes("lower(email), id"), "lower(email), id");
/// ```
#[must_use]
pub fn strip_operator_classes(list: &str) -> String {
    let mut out = String::with_capacity(list.len());
    let mut depth: usize = 0;
    let mut element_start = 0;
    let mut word_start: Option<usize> = None;
    // byte spans of the depth-0 words of the current element
    let mut words: Vec<(usize, usize)> = Vec::new();

    for lexeme in lexemes(list) {
        let top_level = depth == 0;

        if top_level && lexeme.is_code(',') {
            if let Some(start) = word_start.take() {
                words.push((start, lexeme.offset));
            }
            push_element(&mut out, list, element_start, lexeme.offset, &words);
            out.push(',');
            element_start = lexeme.offset + 1;
            words.clear();
            continue;
        }

        if top_level && lexeme.is_code_whitespace() {
            if let Some(start) = word_start.take() {
                words.push((start, lexeme.offset));
            }
        } else if top_level && word_start.is_none() {
            word_start = Some(lexeme.offset);
        }

        if lexeme.is_code('(') {
            depth += 1;
        } else if lexeme.is_code(')') {
            depth = depth.saturating_sub(1);
        }
    }

    if let Some(start) = word_start {
        words.push((start, list.len()));
    }
    push_element(&mut out, list, element_start, list.len(), &words);
    out
}

fn push_element(out: &mut String, list: &str, start: usize, end: usize, words: &[(usize, usize)]) {
    let Some(&(_, first_end)) = words.first() else {
        out.push_str(&list[start..end]);
        return;
    };
    let keep_end = match words {
        [_, (c_start, c_end), (_, collation_end), ..]
            if list[*c_start..*c_end].eq_ignore_ascii_case("COLLATE") =>
        {
            *collation_end
        }
        _ => first_end,
    };
    out.push_str(&list[start..keep_end]);
}
