//! Quote-aware character stream shared by the definition scanners.
//!
//! Parentheses and commas only carry structure outside of double-quoted
//! identifiers (`"weird(name"`) and single-quoted literals (`'a,b'`). Doubled
//! quotes inside either form are escapes, not terminators.

use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Code,
    Identifier,
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lexeme {
    /// Byte offset of `ch` in the scanned text
    pub offset: usize,
    pub ch: char,
    /// False for characters inside (or delimiting) a quoted identifier or literal
    pub code: bool,
}

impl Lexeme {
    pub fn is_code(&self, ch: char) -> bool {
        self.code && self.ch == ch
    }

    pub fn is_code_whitespace(&self) -> bool {
        self.code && self.ch.is_whitespace()
    }
}

pub(crate) struct Lexemes<'a> {
    chars: Peekable<CharIndices<'a>>,
    region: Region,
}

pub(crate) fn lexemes(text: &str) -> Lexemes<'_> {
    Lexemes {
        chars: text.char_indices().peekable(),
        region: Region::Code,
    }
}

impl Iterator for Lexemes<'_> {
    type Item = Lexeme;

    fn next(&mut self) -> Option<Lexeme> {
        let (offset, ch) = self.chars.next()?;
        let code = match (self.region, ch) {
            (Region::Code, '"') => {
                self.region = Region::Identifier;
                false
            }
            (Region::Code, '\'') => {
                self.region = Region::Literal;
                false
            }
            (Region::Code, _) => true,
            (Region::Identifier, '"') | (Region::Literal, '\'') => {
                if self.chars.peek().is_some_and(|&(_, next)| next == ch) {
                    // doubled quote: stays inside the quoted region
                    self.chars.next();
                } else {
                    self.region = Region::Code;
                }
                false
            }
            (Region::Identifier | Region::Literal, _) => false,
        };
        Some(Lexeme { offset, ch, code })
    }
}

/// Split `text` on commas outside of any parentheses or quotes, trimming each piece.
///
/// Returns `None` when the parentheses are unbalanced.
pub(crate) fn split_top_level(text: &str) -> Option<Vec<&str>> {
    let mut pieces = Vec::new();
    let mut depth: usize = 0;
    let mut start = 0;
    for lexeme in lexemes(text) {
        if lexeme.is_code('(') {
            depth += 1;
        } else if lexeme.is_code(')') {
            depth = depth.checked_sub(1)?;
        } else if lexeme.is_code(',') && depth == 0 {
            pieces.push(text[start..lexeme.offset].trim());
            start = lexeme.offset + 1;
        }
    }
    if depth != 0 {
        return None;
    }
    pieces.push(text[start..].trim());
    Some(pieces)
}

/// Case-insensitive keyword test at a byte offset, requiring word boundaries on both sides.
pub(crate) fn keyword_at(text: &str, offset: usize, keyword: &str) -> bool {
    let Some(candidate) = text.get(offset..offset + keyword.len()) else {
        return false;
    };
    if !candidate.eq_ignore_ascii_case(keyword) {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    let before_ok = text[..offset].chars().next_back().map_or(true, |c| !is_word(c));
    let after_ok = text[offset + keyword.len()..]
        .chars()
        .next()
        .map_or(true, |c| !is_word(c));
    before_ok && after_ok
}
