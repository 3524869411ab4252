//! Parse error type with source positions.

use thiserror::Error;

/// A syntax error at a specific position in the source.
///
/// In lenient mode these are collected while the parser recovers by skipping
/// to the next entry opening; in strict mode the first one aborts parsing.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {row}:{col}: \"{context}\"")]
pub struct ParserError {
    pub message: String,
    /// Byte offset into the source where the error occurred.
    pub pos: usize,
    /// 1-indexed line number.
    pub row: usize,
    /// 1-indexed column number.
    pub col: usize,
    /// The offending region, from the enclosing entry boundary to just past
    /// the error position.
    pub context: String,
}

impl ParserError {
    pub(crate) fn new(source: &str, pos: usize, message: String) -> Self {
        let (row, col) = position(source, pos);
        ParserError {
            message,
            pos,
            row,
            col,
            context: snippet(source, pos),
        }
    }
}

/// Calculate a 1-indexed line and column from a byte offset.
fn position(source: &str, pos: usize) -> (usize, usize) {
    let consumed = &source[..pos.min(source.len())];
    let row = consumed.chars().filter(|&c| c == '\n').count() + 1;
    let col = match consumed.rfind('\n') {
        Some(newline) => consumed.len() - newline,
        None => consumed.len() + 1,
    };
    (row, col)
}

/// Slice out the offending region: from the last entry boundary (`<` or `>`)
/// before the error to ten bytes past it.
fn snippet(source: &str, pos: usize) -> String {
    let pos = pos.min(source.len());
    let before = &source[..pos];
    let open = before.rfind('<');
    let close = before.rfind('>');
    let start = match (open, close) {
        (Some(o), Some(c)) => {
            if c > o {
                c + 1
            } else {
                o
            }
        }
        (Some(o), None) => o,
        (None, Some(c)) => c + 1,
        (None, None) => 0,
    };
    let mut end = (pos + 10).min(source.len());
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    source[start..end].to_string()
}
