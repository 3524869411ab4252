//! Entry-level grammar and the lenient recovery driver.

use winnow::combinator::{cut_err, fail};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;

use super::ast::{Ast, AttrDef, Entry, EntityDef, Expr, HashItem, MacroDef};
use super::error::ParserError;
use super::expression::expression;

/// Parse a whole document, recovering from syntax errors.
///
/// On a syntax error the parser records it, scans forward to the next `<`
/// (the closest candidate entry opening) and resumes from there; everything
/// skipped becomes one [`Entry::Junk`]. This bounds error cascades to one
/// error per skipped region.
pub fn parse(source: &str) -> (Ast, Vec<ParserError>) {
    let mut input = source;
    let mut body = Vec::new();
    let mut errors = Vec::new();
    skip_ws(&mut input);
    while !input.is_empty() {
        match entry(&mut input) {
            Ok(parsed) => body.push(parsed),
            Err(err) => {
                let pos = source.len() - input.len();
                errors.push(ParserError::new(source, pos, render(&err)));
                let (junk, rest) = junk_region(input);
                body.push(Entry::Junk(junk.to_string()));
                input = rest;
            }
        }
        skip_ws(&mut input);
    }
    (Ast { body }, errors)
}

/// Parse a whole document, failing on the first syntax error.
pub fn parse_strict(source: &str) -> Result<Ast, ParserError> {
    let mut input = source;
    let mut body = Vec::new();
    skip_ws(&mut input);
    while !input.is_empty() {
        match entry(&mut input) {
            Ok(parsed) => body.push(parsed),
            Err(err) => {
                let pos = source.len() - input.len();
                return Err(ParserError::new(source, pos, render(&err)));
            }
        }
        skip_ws(&mut input);
    }
    Ok(Ast { body })
}

/// Split the junk before the closest entry opening off.
///
/// The `<` the failed entry itself may have consumed is behind the input by
/// now; if the error landed exactly on a `<`, search past it so recovery
/// always makes progress.
fn junk_region(input: &str) -> (&str, &str) {
    let search_from = usize::from(input.starts_with('<'));
    match input[search_from..].find('<') {
        Some(offset) => input.split_at(offset + search_from),
        None => (input, ""),
    }
}

/// Render a winnow error into a message for [`ParserError`].
pub(super) fn render(err: &ErrMode<ContextError>) -> String {
    let context = match err {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e,
        ErrMode::Incomplete(_) => return "unexpected end of input".to_string(),
    };
    let mut labels = Vec::new();
    let mut expected = Vec::new();
    for c in context.context() {
        match c {
            StrContext::Label(l) => labels.push(*l),
            StrContext::Expected(v) => expected.push(v.to_string()),
            _ => {}
        }
    }
    if !expected.is_empty() {
        format!("expected {}", expected.join(" or "))
    } else if let Some(label) = labels.first() {
        (*label).to_string()
    } else {
        "invalid syntax".to_string()
    }
}

pub(super) fn label(text: &'static str) -> StrContext {
    StrContext::Label(text)
}

pub(super) fn expected_char(c: char) -> StrContext {
    StrContext::Expected(StrContextValue::CharLiteral(c))
}

pub(super) fn expected_desc(desc: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(desc))
}

/// Parse a single entry: `<entity>`, `<macro(...)>`, a comment, or an import.
fn entry(input: &mut &str) -> ModalResult<Entry> {
    if input.starts_with("/*") {
        return comment(input);
    }
    if input.starts_with("import") {
        return import_statement(input);
    }
    if input.starts_with('<') {
        *input = &input[1..];
        let id = identifier(input)?;
        if input.starts_with('(') {
            return macro_def(input, id);
        }
        let index = if input.starts_with('[') {
            *input = &input[1..];
            item_list(input, expression, ']')?
        } else {
            Vec::new()
        };
        return entity(input, id, index);
    }
    cut_err(fail::<_, Entry, _>.context(label("invalid entry"))).parse_next(input)
}

/// Parse a comment: `/* ... */`.
fn comment(input: &mut &str) -> ModalResult<Entry> {
    let s = *input;
    let Some(end) = s[2..].find("*/") else {
        *input = &s[2..];
        return cut_err(fail::<_, Entry, _>.context(label("comment without closing tag")))
            .parse_next(input);
    };
    let content = s[2..2 + end].to_string();
    *input = &s[2 + end + 2..];
    Ok(Entry::Comment(content))
}

/// Parse an import statement: `import("uri")`.
fn import_statement(input: &mut &str) -> ModalResult<Entry> {
    *input = &input["import".len()..];
    cut_err('(').context(expected_char('(')).parse_next(input)?;
    skip_ws(input);
    let (uri, _) = quoted_string(input)?;
    skip_ws(input);
    cut_err(')').context(expected_char(')')).parse_next(input)?;
    Ok(Entry::Import(uri))
}

/// Parse an entity body after its identifier and optional index.
fn entity(input: &mut &str, id: String, index: Vec<Expr>) -> ModalResult<Entry> {
    if !required_ws(input) {
        return cut_err(fail::<_, Entry, _>.context(expected_desc("whitespace"))).parse_next(input);
    }
    let entity_value = opt_value(input)?;
    let mut attrs = Vec::new();
    match &entity_value {
        None => {
            if input.starts_with('>') {
                return cut_err(fail::<_, Entry, _>.context(expected_desc("value or attributes")))
                    .parse_next(input);
            }
            attrs = attributes(input)?;
        }
        Some(_) => {
            let ws = required_ws(input);
            if !input.starts_with('>') {
                if !ws {
                    return cut_err(fail::<_, Entry, _>.context(expected_char('>')))
                        .parse_next(input);
                }
                attrs = attributes(input)?;
            }
        }
    }
    *input = &input[1..];
    let local = id.starts_with('_');
    Ok(Entry::Entity(Box::new(EntityDef {
        id,
        local,
        index,
        value: entity_value,
        attrs,
    })))
}

/// Parse a macro body after its identifier: `($a, $b) { expr }>`.
fn macro_def(input: &mut &str, id: String) -> ModalResult<Entry> {
    if id.starts_with('_') {
        return cut_err(
            fail::<_, Entry, _>.context(label("macro identifier cannot start with \"_\"")),
        )
        .parse_next(input);
    }
    *input = &input[1..];
    let args = item_list(input, parameter, ')')?;
    skip_ws(input);
    cut_err('{').context(expected_char('{')).parse_next(input)?;
    skip_ws(input);
    let expr = expression(input)?;
    skip_ws(input);
    cut_err('}').context(expected_char('}')).parse_next(input)?;
    skip_ws(input);
    cut_err('>').context(expected_char('>')).parse_next(input)?;
    Ok(Entry::Macro(Box::new(MacroDef { id, args, expr })))
}

/// Parse a `$name` macro parameter, returning the name without the `$`.
fn parameter(input: &mut &str) -> ModalResult<String> {
    cut_err('$').context(expected_char('$')).parse_next(input)?;
    identifier(input)
}

/// Parse the attribute list of an entity, up to (not including) the `>`.
fn attributes(input: &mut &str) -> ModalResult<Vec<AttrDef>> {
    let mut attrs = Vec::new();
    loop {
        attrs.push(attribute(input)?);
        let ws = required_ws(input);
        if input.starts_with('>') {
            break;
        }
        if !ws {
            return cut_err(fail::<_, Vec<AttrDef>, _>.context(expected_char('>')))
                .parse_next(input);
        }
    }
    Ok(attrs)
}

/// Parse a `key[index]: value` attribute.
fn attribute(input: &mut &str) -> ModalResult<AttrDef> {
    let key = identifier(input)?;
    let index = if input.starts_with('[') {
        *input = &input[1..];
        item_list(input, expression, ']')?
    } else {
        Vec::new()
    };
    skip_ws(input);
    cut_err(':').context(expected_char(':')).parse_next(input)?;
    skip_ws(input);
    let local = key.starts_with('_');
    Ok(AttrDef {
        key,
        local,
        index,
        value: value(input)?,
    })
}

/// Parse a value (string or hash literal), if one starts here.
fn opt_value(input: &mut &str) -> ModalResult<Option<Expr>> {
    match input.chars().next() {
        Some('"' | '\'') => {
            let (content, is_complex) = quoted_string(input)?;
            Ok(Some(Expr::Str {
                content,
                is_complex,
            }))
        }
        Some('{') => Ok(Some(hash(input)?)),
        _ => Ok(None),
    }
}

/// Parse a required value.
pub(super) fn value(input: &mut &str) -> ModalResult<Expr> {
    match opt_value(input)? {
        Some(parsed) => Ok(parsed),
        None => cut_err(fail::<_, Expr, _>.context(expected_desc("value"))).parse_next(input),
    }
}

/// Parse a hash literal: `{ *key: value, ... }`.
fn hash(input: &mut &str) -> ModalResult<Expr> {
    *input = &input[1..];
    skip_ws(input);
    if input.starts_with('}') {
        *input = &input[1..];
        return Ok(Expr::Hash(Vec::new()));
    }
    let mut items = Vec::new();
    let mut has_default = false;
    loop {
        let mut default = false;
        if input.starts_with('*') {
            *input = &input[1..];
            if has_default {
                return cut_err(
                    fail::<_, Expr, _>.context(label("default item redefinition forbidden")),
                )
                .parse_next(input);
            }
            default = true;
            has_default = true;
        }
        let (key, item_value) = kvp(input)?;
        items.push(HashItem {
            key,
            value: item_value,
            default,
        });
        skip_ws(input);
        let comma = input.starts_with(',');
        if comma {
            *input = &input[1..];
            skip_ws(input);
        }
        if input.starts_with('}') {
            *input = &input[1..];
            break;
        }
        if !comma {
            return cut_err(fail::<_, Expr, _>.context(expected_char('}'))).parse_next(input);
        }
    }
    Ok(Expr::Hash(items))
}

/// Parse a `key: value` pair.
fn kvp(input: &mut &str) -> ModalResult<(String, Expr)> {
    let key = identifier(input)?;
    skip_ws(input);
    cut_err(':').context(expected_char(':')).parse_next(input)?;
    skip_ws(input);
    Ok((key, value(input)?))
}

/// Parse a quoted string literal, returning its raw content and whether it
/// contains a `{{` token.
///
/// Single, double, and triple quotes are supported. Escape sequences are left
/// in place; the complex-string parser processes them lazily.
pub(super) fn quoted_string(input: &mut &str) -> ModalResult<(String, bool)> {
    let s = *input;
    let bytes = s.as_bytes();
    let quote = match bytes.first() {
        Some(b'"') => b'"',
        Some(b'\'') => b'\'',
        _ => {
            return cut_err(fail::<_, (String, bool), _>.context(expected_desc("string")))
                .parse_next(input);
        }
    };
    let len = if bytes.len() >= 3 && bytes[1] == quote && bytes[2] == quote {
        3
    } else {
        1
    };
    let opchar = &s[..len];
    let mut search = len;
    let close = loop {
        match s[search..].find(opchar) {
            None => break None,
            Some(offset) => {
                let at = search + offset;
                // a closing quote preceded by a lone backslash is escaped
                if at >= 1 && bytes[at - 1] == b'\\' && !(at >= 2 && bytes[at - 2] == b'\\') {
                    search = at + 1;
                } else {
                    break Some(at);
                }
            }
        }
    };
    let Some(close) = close else {
        return cut_err(fail::<_, (String, bool), _>.context(label("unclosed string literal")))
            .parse_next(input);
    };
    let content = s[len..close].to_string();
    let is_complex = content.contains("{{");
    *input = &s[close + len..];
    Ok((content, is_complex))
}

/// Parse an identifier: `[a-zA-Z_][a-zA-Z0-9_]*`.
pub(super) fn identifier(input: &mut &str) -> ModalResult<String> {
    let s = *input;
    let bytes = s.as_bytes();
    let leads = bytes
        .first()
        .is_some_and(|&b| b.is_ascii_alphabetic() || b == b'_');
    if !leads {
        return cut_err(fail::<_, String, _>.context(expected_desc("identifier")))
            .parse_next(input);
    }
    let end = bytes
        .iter()
        .position(|&b| !(b.is_ascii_alphanumeric() || b == b'_'))
        .unwrap_or(bytes.len());
    *input = &s[end..];
    Ok(s[..end].to_string())
}

/// Parse a comma-separated list up to a closing delimiter.
pub(super) fn item_list<T>(
    input: &mut &str,
    mut item: impl FnMut(&mut &str) -> ModalResult<T>,
    close: char,
) -> ModalResult<Vec<T>> {
    skip_ws(input);
    if input.starts_with(close) {
        *input = &input[close.len_utf8()..];
        return Ok(Vec::new());
    }
    let mut items = Vec::new();
    loop {
        items.push(item(input)?);
        skip_ws(input);
        if input.starts_with(',') {
            *input = &input[1..];
            skip_ws(input);
        } else if input.starts_with(close) {
            *input = &input[close.len_utf8()..];
            break;
        } else {
            return cut_err(
                fail::<_, Vec<T>, _>
                    .context(expected_char(','))
                    .context(expected_char(close)),
            )
            .parse_next(input);
        }
    }
    Ok(items)
}

/// Skip whitespace (space, tab, newline, carriage return).
pub(super) fn skip_ws(input: &mut &str) {
    *input = input.trim_start_matches([' ', '\t', '\n', '\r']);
}

/// Skip whitespace, reporting whether any was present.
pub(super) fn required_ws(input: &mut &str) -> bool {
    let before = input.len();
    skip_ws(input);
    input.len() != before
}
