//! The complex-string sub-grammar.
//!
//! String literals are kept raw at parse time. This module processes them on
//! first resolution: unescape `\\`, `\"` and `\'`, then scan for
//! `{{ expression }}` placeables with the strict expression parser. A `\{{`
//! stays literal text.

use std::mem;

use super::ast::Expr;
use super::entries::{render, skip_ws};
use super::error::ParserError;
use super::expression::expression;

/// Placeable cap per string literal.
pub const MAX_PLACEABLES: usize = 100;

/// A processed string literal body.
#[derive(Debug, Clone, PartialEq)]
pub enum StringBody {
    /// No placeables; the content is fully unescaped.
    Plain(String),
    /// Alternating literal and placeable segments.
    Complex(Vec<Segment>),
}

/// One segment of a complex string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Placeable(Expr),
}

/// Process a raw string literal into its body.
///
/// Positions in the returned error are relative to the unescaped content.
pub fn parse_string(raw: &str) -> Result<StringBody, ParserError> {
    let unescaped = unescape(raw);
    let source = unescaped.as_str();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = source;
    let mut placeables = 0;
    loop {
        let Some(pos) = rest.find("{{") else {
            literal.push_str(rest);
            break;
        };
        // a placeable opening preceded by a backslash is literal text
        if pos > 0 && rest.as_bytes()[pos - 1] == b'\\' {
            literal.push_str(&rest[..pos - 1]);
            literal.push_str("{{");
            rest = &rest[pos + 2..];
            continue;
        }
        literal.push_str(&rest[..pos]);
        if placeables >= MAX_PLACEABLES {
            return Err(ParserError::new(
                source,
                source.len() - rest.len() + pos,
                format!("too many placeables, maximum allowed is {MAX_PLACEABLES}"),
            ));
        }
        let mut cursor = &rest[pos + 2..];
        skip_ws(&mut cursor);
        let expr = match expression(&mut cursor) {
            Ok(expr) => expr,
            Err(err) => {
                return Err(ParserError::new(
                    source,
                    source.len() - cursor.len(),
                    render(&err),
                ));
            }
        };
        skip_ws(&mut cursor);
        if !cursor.starts_with("}}") {
            return Err(ParserError::new(
                source,
                source.len() - cursor.len(),
                "expected \"}}\"".to_string(),
            ));
        }
        cursor = &cursor[2..];
        if !literal.is_empty() {
            segments.push(Segment::Literal(mem::take(&mut literal)));
        }
        segments.push(Segment::Placeable(expr));
        placeables += 1;
        rest = cursor;
    }
    if segments.is_empty() {
        return Ok(StringBody::Plain(literal));
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(StringBody::Complex(segments))
}

/// Drop the backslash from `\\`, `\"` and `\'`; leave everything else as is.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let mut lookahead = chars.clone();
            match lookahead.next() {
                Some(next @ ('"' | '\'' | '\\')) => {
                    out.push(next);
                    chars = lookahead;
                }
                _ => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string_is_unescaped() {
        let body = parse_string(r#"say \"hi\""#).unwrap();
        assert_eq!(body, StringBody::Plain(r#"say "hi""#.to_string()));
    }

    #[test]
    fn escaped_placeable_stays_literal() {
        let body = parse_string(r"\{{ not an expr }}").unwrap();
        assert_eq!(body, StringBody::Plain("{{ not an expr }}".to_string()));
    }

    #[test]
    fn placeable_splits_segments() {
        let body = parse_string("Hello {{ user }}!").unwrap();
        let StringBody::Complex(segments) = body else {
            panic!("expected a complex body");
        };
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Literal("Hello ".to_string()));
        assert!(matches!(&segments[1], Segment::Placeable(Expr::Identifier(id)) if id == "user"));
        assert_eq!(segments[2], Segment::Literal("!".to_string()));
    }

    #[test]
    fn unterminated_placeable_is_an_error() {
        let err = parse_string("broken {{ user").unwrap_err();
        assert!(err.message.contains("}}"));
    }

    #[test]
    fn placeable_cap() {
        let over: String = (0..=MAX_PLACEABLES).map(|_| "{{ a }}").collect();
        let err = parse_string(&over).unwrap_err();
        assert!(err.message.contains("too many placeables"));

        let at_cap: String = (0..MAX_PLACEABLES).map(|_| "{{ a }}").collect();
        assert!(parse_string(&at_cap).is_ok());
    }
}
