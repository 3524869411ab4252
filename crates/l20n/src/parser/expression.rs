//! Expression grammar, lowest to highest precedence.
//!
//! The chain is: conditional → logical-or → logical-and → equality →
//! relational → additive → modulo → multiplicative → divisive → unary →
//! member access → primary. Member access tokens must follow their operand
//! without intervening whitespace.

use winnow::combinator::{cut_err, fail};
use winnow::prelude::*;

use super::ast::{Access, BinaryOp, Expr, LogicalOp, UnaryOp};
use super::entries::{expected_char, expected_desc, identifier, item_list, label, skip_ws, value};

pub(super) fn expression(input: &mut &str) -> ModalResult<Expr> {
    conditional(input)
}

/// `test ? consequent : alternate`
fn conditional(input: &mut &str) -> ModalResult<Expr> {
    let test = logical_or(input)?;
    skip_ws(input);
    if !input.starts_with('?') {
        return Ok(test);
    }
    *input = &input[1..];
    skip_ws(input);
    let consequent = expression(input)?;
    skip_ws(input);
    cut_err(':').context(expected_char(':')).parse_next(input)?;
    skip_ws(input);
    let alternate = expression(input)?;
    Ok(Expr::Conditional {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    })
}

fn logical_or(input: &mut &str) -> ModalResult<Expr> {
    let mut exp = logical_and(input)?;
    loop {
        skip_ws(input);
        if !input.starts_with("||") {
            break;
        }
        *input = &input[2..];
        skip_ws(input);
        let right = logical_and(input)?;
        exp = Expr::Logical {
            op: LogicalOp::Or,
            left: Box::new(exp),
            right: Box::new(right),
        };
    }
    Ok(exp)
}

fn logical_and(input: &mut &str) -> ModalResult<Expr> {
    let mut exp = equality(input)?;
    loop {
        skip_ws(input);
        if !input.starts_with("&&") {
            break;
        }
        *input = &input[2..];
        skip_ws(input);
        let right = equality(input)?;
        exp = Expr::Logical {
            op: LogicalOp::And,
            left: Box::new(exp),
            right: Box::new(right),
        };
    }
    Ok(exp)
}

fn equality(input: &mut &str) -> ModalResult<Expr> {
    binary_level(input, &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)], relational)
}

fn relational(input: &mut &str) -> ModalResult<Expr> {
    binary_level(
        input,
        &[
            ("<=", BinaryOp::Le),
            (">=", BinaryOp::Ge),
            ("<", BinaryOp::Lt),
            (">", BinaryOp::Gt),
        ],
        additive,
    )
}

fn additive(input: &mut &str) -> ModalResult<Expr> {
    binary_level(input, &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], modulo)
}

fn modulo(input: &mut &str) -> ModalResult<Expr> {
    binary_level(input, &[("%", BinaryOp::Mod)], multiplicative)
}

fn multiplicative(input: &mut &str) -> ModalResult<Expr> {
    binary_level(input, &[("*", BinaryOp::Mul)], divisive)
}

fn divisive(input: &mut &str) -> ModalResult<Expr> {
    binary_level(input, &[("/", BinaryOp::Div)], unary)
}

/// Parse one left-associative binary precedence level.
fn binary_level(
    input: &mut &str,
    ops: &[(&'static str, BinaryOp)],
    next: fn(&mut &str) -> ModalResult<Expr>,
) -> ModalResult<Expr> {
    let mut exp = next(input)?;
    loop {
        skip_ws(input);
        let Some((token, op)) = ops.iter().find(|(token, _)| input.starts_with(token)) else {
            break;
        };
        *input = &input[token.len()..];
        skip_ws(input);
        let right = next(input)?;
        exp = Expr::Binary {
            op: *op,
            left: Box::new(exp),
            right: Box::new(right),
        };
    }
    Ok(exp)
}

/// Prefix `+`, `-`, and `!`, right-associative.
fn unary(input: &mut &str) -> ModalResult<Expr> {
    let op = match input.chars().next() {
        Some('+') => UnaryOp::Plus,
        Some('-') => UnaryOp::Minus,
        Some('!') => UnaryOp::Not,
        _ => return member(input),
    };
    *input = &input[1..];
    skip_ws(input);
    let arg = unary(input)?;
    Ok(Expr::Unary {
        op,
        arg: Box::new(arg),
    })
}

/// Member access: `.name`, `[computed]`, `::attr`, `::[computed]`, `(args)`.
fn member(input: &mut &str) -> ModalResult<Expr> {
    let mut exp = parenthesis(input)?;
    loop {
        if input.starts_with("::") {
            *input = &input[2..];
            if !matches!(exp, Expr::Identifier(_) | Expr::This | Expr::Paren(_)) {
                return cut_err(fail::<_, Expr, _>.context(label(
                    "attribute access requires an identifier, \"~\", or a parenthesized \
                     expression on the left",
                )))
                .parse_next(input);
            }
            let access = if input.starts_with('[') {
                *input = &input[1..];
                skip_ws(input);
                let computed = expression(input)?;
                skip_ws(input);
                cut_err(']').context(expected_char(']')).parse_next(input)?;
                Access::Computed(Box::new(computed))
            } else {
                Access::Named(identifier(input)?)
            };
            exp = Expr::Attribute {
                expr: Box::new(exp),
                access,
            };
        } else if input.starts_with('.') {
            *input = &input[1..];
            exp = Expr::Property {
                expr: Box::new(exp),
                access: Access::Named(identifier(input)?),
            };
        } else if input.starts_with('[') {
            *input = &input[1..];
            skip_ws(input);
            let computed = expression(input)?;
            skip_ws(input);
            cut_err(']').context(expected_char(']')).parse_next(input)?;
            exp = Expr::Property {
                expr: Box::new(exp),
                access: Access::Computed(Box::new(computed)),
            };
        } else if input.starts_with('(') {
            *input = &input[1..];
            let args = item_list(input, expression, ')')?;
            exp = Expr::Call {
                callee: Box::new(exp),
                args,
            };
        } else {
            break;
        }
    }
    Ok(exp)
}

fn parenthesis(input: &mut &str) -> ModalResult<Expr> {
    if input.starts_with('(') {
        *input = &input[1..];
        skip_ws(input);
        let inner = expression(input)?;
        skip_ws(input);
        cut_err(')').context(expected_char(')')).parse_next(input)?;
        return Ok(Expr::Paren(Box::new(inner)));
    }
    primary(input)
}

/// Number, value literal, `$var`, `@global`, `~`, or identifier.
fn primary(input: &mut &str) -> ModalResult<Expr> {
    let digits = input.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits > 0 {
        let (num, rest) = input.split_at(digits);
        let Ok(parsed) = num.parse::<f64>() else {
            return cut_err(fail::<_, Expr, _>.context(expected_desc("number"))).parse_next(input);
        };
        *input = rest;
        return Ok(Expr::Number(parsed));
    }
    match input.chars().next() {
        Some('"' | '\'' | '{') => value(input),
        Some('$') => {
            *input = &input[1..];
            Ok(Expr::Variable(identifier(input)?))
        }
        Some('@') => {
            *input = &input[1..];
            Ok(Expr::Global(identifier(input)?))
        }
        Some('~') => {
            *input = &input[1..];
            Ok(Expr::This)
        }
        _ => Ok(Expr::Identifier(identifier(input)?)),
    }
}
