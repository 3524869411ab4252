//! Compiled expressions and the evaluation engine.
//!
//! Every compiled expression is evaluated against a [`Scope`] and a set of
//! [`Locals`], producing a new set of locals and a [`Value`]. *Evaluating*
//! calls an expression once and may yield a non-primitive reference (an
//! entity, an attribute, a macro, a deferred hash member). *Resolving*
//! repeatedly evaluates until a primitive is produced.
//!
//! Looking up an identifier replaces the locals with a fresh set whose
//! `this` points at the referenced entry. The new locals travel with the
//! returned value, so `~` inside a referenced entity's own value keeps
//! meaning that entity even when the reference came from another entity's
//! placeable, without leaking into sibling branches.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::compiler::entries::{Attribute, CompiledValue, Entity, Entry, MacroEntry};
use crate::compiler::error::{IndexError, RuntimeError, ValueError};
use crate::compiler::scope::{ReentrancyGuard, Scope};
use crate::parser::ast::{self, Access as AstAccess, BinaryOp, LogicalOp, UnaryOp};
use crate::parser::{Segment, StringBody, parse_string};
use crate::types::Data;

/// Maximum length, in characters, of a value a placeable may produce.
pub(crate) const MAX_PLACEABLE_LENGTH: usize = 2500;

/// A primitive evaluation result.
#[derive(Debug, Clone, PartialEq)]
pub enum Prim {
    Null,
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Prim {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Prim::Null => "null",
            Prim::Str(_) => "string",
            Prim::Num(_) => "number",
            Prim::Bool(_) => "boolean",
        }
    }

    pub(crate) fn display(&self) -> String {
        match self {
            Prim::Null => "null".to_string(),
            Prim::Str(text) => text.clone(),
            Prim::Num(n) => fmt_num(*n),
            Prim::Bool(b) => b.to_string(),
        }
    }

    pub(crate) fn into_value<'e>(self) -> Value<'e> {
        match self {
            Prim::Null => Value::Null,
            Prim::Str(text) => Value::Str(text),
            Prim::Num(n) => Value::Num(n),
            Prim::Bool(b) => Value::Bool(b),
        }
    }
}

/// The result of evaluating an expression once.
#[derive(Clone)]
pub(crate) enum Value<'e> {
    Null,
    Str(String),
    Num(f64),
    Bool(bool),
    /// A reference to a compiled entity.
    Entity(&'e Entity),
    /// A reference to one of an entity's attributes.
    Attr(&'e Attribute),
    /// A reference to a macro; resolving it uncalled is an error.
    Macro(&'e MacroEntry),
    /// A deferred expression, e.g. a hash member.
    Expr(&'e Expr),
    /// A non-primitive value from caller-supplied data or a global.
    Data(DataRef<'e>),
}

impl<'e> Value<'e> {
    pub(crate) fn from_data(data: &'e Data) -> Value<'e> {
        match data {
            Data::Null => Value::Null,
            Data::Bool(b) => Value::Bool(*b),
            Data::Num(n) => Value::Num(*n),
            Data::Str(text) => Value::Str(text.clone()),
            Data::List(_) | Data::Map(_) => Value::Data(DataRef::Borrowed(data)),
        }
    }

    pub(crate) fn from_owned_data(data: Data) -> Value<'e> {
        match data {
            Data::Null => Value::Null,
            Data::Bool(b) => Value::Bool(b),
            Data::Num(n) => Value::Num(n),
            Data::Str(text) => Value::Str(text),
            other @ (Data::List(_) | Data::Map(_)) => Value::Data(DataRef::Owned(Rc::new(other))),
        }
    }
}

/// A non-primitive data value, borrowed from the call's data map or owned
/// when it came from a global.
#[derive(Clone)]
pub(crate) enum DataRef<'e> {
    Borrowed(&'e Data),
    Owned(Rc<Data>),
}

impl DataRef<'_> {
    fn kind(&self) -> &'static str {
        match self {
            DataRef::Borrowed(data) => data.kind(),
            DataRef::Owned(data) => data.kind(),
        }
    }
}

/// The locals carried through one evaluation: the entity (or macro)
/// currently being resolved, and macro arguments when inside a macro body.
///
/// Each bound argument keeps the locals it was evaluated under, so a
/// parameter reference restores the context its value came from.
#[derive(Clone, Default)]
pub(crate) struct Locals<'e> {
    pub this: Option<EntryRef<'e>>,
    pub args: Option<Rc<BTreeMap<String, (Locals<'e>, Value<'e>)>>>,
}

#[derive(Clone, Copy)]
pub(crate) enum EntryRef<'e> {
    Entity(&'e Entity),
    Macro(&'e MacroEntry),
}

pub(crate) type EvalResult<'e> = Result<(Locals<'e>, Value<'e>), RuntimeError>;

/// A compiled expression node.
#[derive(Debug)]
pub(crate) enum Expr {
    Number(f64),
    Str(StringLit),
    Hash(HashLit),
    Identifier(String),
    Variable(String),
    Global(String),
    This,
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Property {
        expr: Box<Expr>,
        access: Access,
    },
    Attribute {
        expr: Box<Expr>,
        access: Access,
    },
}

#[derive(Debug)]
pub(crate) enum Access {
    Named(String),
    Computed(Box<Expr>),
}

/// Compile an AST expression for the entry named by `entry`.
///
/// `index` is the list of index expressions still unconsumed at this nesting
/// depth; each hash literal takes the first slot and passes the rest to its
/// members. Only hash members inherit the list — every other composite node
/// compiles its children without one.
pub(crate) fn compile_expr(node: &ast::Expr, entry: &Rc<str>, index: &[Rc<IndexExpr>]) -> Expr {
    match node {
        ast::Expr::Number(n) => Expr::Number(*n),
        ast::Expr::Str { content, .. } => {
            Expr::Str(StringLit::new(content.clone(), entry.clone()))
        }
        ast::Expr::Hash(items) => {
            let slot = index.first().cloned();
            let rest = index.get(1..).unwrap_or(&[]);
            let mut content = Vec::with_capacity(items.len());
            let mut default_key = None;
            for item in items {
                if item.default {
                    default_key = Some(item.key.clone());
                }
                content.push((item.key.clone(), compile_expr(&item.value, entry, rest)));
            }
            Expr::Hash(HashLit {
                content,
                default_key,
                index: slot,
                entry: entry.clone(),
            })
        }
        ast::Expr::Identifier(name) => Expr::Identifier(name.clone()),
        ast::Expr::Variable(name) => Expr::Variable(name.clone()),
        ast::Expr::Global(name) => Expr::Global(name.clone()),
        ast::Expr::This => Expr::This,
        ast::Expr::Paren(inner) => compile_expr(inner, entry, &[]),
        ast::Expr::Unary { op, arg } => Expr::Unary {
            op: *op,
            arg: Box::new(compile_expr(arg, entry, &[])),
        },
        ast::Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(compile_expr(left, entry, &[])),
            right: Box::new(compile_expr(right, entry, &[])),
        },
        ast::Expr::Logical { op, left, right } => Expr::Logical {
            op: *op,
            left: Box::new(compile_expr(left, entry, &[])),
            right: Box::new(compile_expr(right, entry, &[])),
        },
        ast::Expr::Conditional {
            test,
            consequent,
            alternate,
        } => Expr::Conditional {
            test: Box::new(compile_expr(test, entry, &[])),
            consequent: Box::new(compile_expr(consequent, entry, &[])),
            alternate: Box::new(compile_expr(alternate, entry, &[])),
        },
        ast::Expr::Call { callee, args } => Expr::Call {
            callee: Box::new(compile_expr(callee, entry, &[])),
            args: args
                .iter()
                .map(|arg| compile_expr(arg, entry, &[]))
                .collect(),
        },
        ast::Expr::Property { expr, access } => Expr::Property {
            expr: Box::new(compile_expr(expr, entry, &[])),
            access: compile_access(access, entry),
        },
        ast::Expr::Attribute { expr, access } => Expr::Attribute {
            expr: Box::new(compile_expr(expr, entry, &[])),
            access: compile_access(access, entry),
        },
    }
}

fn compile_access(access: &AstAccess, entry: &Rc<str>) -> Access {
    match access {
        AstAccess::Named(name) => Access::Named(name.clone()),
        AstAccess::Computed(expr) => Access::Computed(Box::new(compile_expr(expr, entry, &[]))),
    }
}

/// Repeatedly evaluate until a primitive (or null) is produced.
///
/// Unwraps entity → value, attribute → value, and deferred expression →
/// result. Resolving an uncalled macro or a non-primitive caller value is an
/// error.
pub(crate) fn resolve<'e>(
    scope: &Scope<'e>,
    mut locals: Locals<'e>,
    mut value: Value<'e>,
) -> Result<Prim, RuntimeError> {
    loop {
        match value {
            Value::Null => return Ok(Prim::Null),
            Value::Str(text) => return Ok(Prim::Str(text)),
            Value::Num(n) => return Ok(Prim::Num(n)),
            Value::Bool(b) => return Ok(Prim::Bool(b)),
            Value::Entity(entity) => match &entity.value {
                None => return Ok(Prim::Null),
                Some(CompiledValue::Const(text)) => return Ok(Prim::Str(text.clone())),
                Some(CompiledValue::Expr(expr)) => value = Value::Expr(expr),
            },
            Value::Attr(attr) => match &attr.value {
                CompiledValue::Const(text) => return Ok(Prim::Str(text.clone())),
                CompiledValue::Expr(expr) => value = Value::Expr(expr),
            },
            Value::Expr(expr) => (locals, value) = expr.eval(scope, locals, None)?,
            Value::Macro(entry) => {
                return Err(RuntimeError::UncalledMacro {
                    id: entry.id.to_string(),
                });
            }
            Value::Data(data) => {
                return Err(RuntimeError::Unresolvable { kind: data.kind() });
            }
        }
    }
}

/// Resolve a sub-expression without consuming the caller's locals.
fn resolve_expr<'e>(
    scope: &Scope<'e>,
    locals: &Locals<'e>,
    expr: &'e Expr,
) -> Result<Prim, RuntimeError> {
    resolve(scope, locals.clone(), Value::Expr(expr))
}

impl Expr {
    /// Evaluate this expression once.
    ///
    /// `prop` is a key passed down by an enclosing property access; only
    /// string and hash literals react to it (strings by erroring, hashes by
    /// selecting a member). Other node kinds ignore it.
    pub(crate) fn eval<'e>(
        &'e self,
        scope: &Scope<'e>,
        locals: Locals<'e>,
        prop: Option<&Prim>,
    ) -> EvalResult<'e> {
        match self {
            Expr::Number(n) => Ok((locals, Value::Num(*n))),
            Expr::Str(lit) => lit.eval(scope, locals, prop),
            Expr::Hash(hash) => hash.lookup(scope, locals, prop),
            Expr::Identifier(name) => match scope.entry(name) {
                None => Err(RuntimeError::UnknownEntry {
                    name: name.clone(),
                    suggestions: scope.suggestions_for(name),
                }),
                Some(entry) => {
                    // the new `this` replaces the locals wholesale; macro
                    // arguments never leak into the referenced entry
                    let (this, value) = match entry {
                        Entry::Entity(entity) => (EntryRef::Entity(entity), Value::Entity(entity)),
                        Entry::Macro(entry) => (EntryRef::Macro(entry), Value::Macro(entry)),
                    };
                    Ok((
                        Locals {
                            this: Some(this),
                            args: None,
                        },
                        value,
                    ))
                }
            },
            Expr::Variable(name) => {
                if let Some(args) = &locals.args
                    && let Some((arg_locals, value)) = args.get(name)
                {
                    return Ok((arg_locals.clone(), value.clone()));
                }
                match scope.data_value(name) {
                    Some(data) => Ok((locals, Value::from_data(data))),
                    None => Err(RuntimeError::UnknownVariable { name: name.clone() }),
                }
            }
            Expr::Global(name) => {
                let data = scope.global_value(name)?;
                Ok((locals, Value::from_owned_data(data)))
            }
            Expr::This => {
                let value = match locals.this {
                    Some(EntryRef::Entity(entity)) => Value::Entity(entity),
                    Some(EntryRef::Macro(entry)) => Value::Macro(entry),
                    None => Value::Null,
                };
                Ok((locals, value))
            }
            Expr::Unary { op, arg } => {
                let value = apply_unary(*op, resolve_expr(scope, &locals, arg)?)?;
                Ok((locals, value.into_value()))
            }
            Expr::Binary { op, left, right } => {
                let left = resolve_expr(scope, &locals, left)?;
                let right = resolve_expr(scope, &locals, right)?;
                Ok((locals, apply_binary(*op, left, right)?.into_value()))
            }
            Expr::Logical { op, left, right } => {
                let left = resolve_expr(scope, &locals, left)?;
                let right = resolve_expr(scope, &locals, right)?;
                Ok((locals, apply_logical(*op, left, right)?.into_value()))
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let Prim::Bool(tested) = resolve_expr(scope, &locals, test)? else {
                    return Err(RuntimeError::ConditionalType);
                };
                if tested {
                    consequent.eval(scope, locals, None)
                } else {
                    alternate.eval(scope, locals, None)
                }
            }
            Expr::Call { callee, args } => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(arg.eval(scope, locals.clone(), None)?);
                }
                let (_, callee_value) = callee.eval(scope, locals, None)?;
                let Value::Macro(entry) = callee_value else {
                    return Err(RuntimeError::NotCallable);
                };
                entry.call(scope, evaluated)
            }
            Expr::Property { expr, access } => {
                let key = match access {
                    Access::Named(name) => Prim::Str(name.clone()),
                    Access::Computed(computed) => resolve_expr(scope, &locals, computed)?,
                };
                let (after, parent) = expr.eval(scope, locals, None)?;
                eval_property(scope, after, parent, &key)
            }
            Expr::Attribute { expr, access } => {
                let key = match access {
                    Access::Named(name) => Prim::Str(name.clone()),
                    Access::Computed(computed) => resolve_expr(scope, &locals, computed)?,
                };
                let attr = match key {
                    Prim::Str(name) => name,
                    other => {
                        return Err(RuntimeError::AttributeOfNonEntity {
                            attr: other.display(),
                        });
                    }
                };
                let (after, parent) = expr.eval(scope, locals, None)?;
                match parent {
                    Value::Entity(entity) => match entity.attribute(&attr) {
                        Some(attribute) => Ok((after, Value::Attr(attribute))),
                        None => Err(RuntimeError::NoAttribute {
                            id: entity.id.to_string(),
                            attr,
                        }),
                    },
                    _ => Err(RuntimeError::AttributeOfNonEntity { attr }),
                }
            }
        }
    }
}

/// Dereference `parent` by `key`, per the kind of value `parent` is.
fn eval_property<'e>(
    scope: &Scope<'e>,
    locals: Locals<'e>,
    parent: Value<'e>,
    key: &Prim,
) -> EvalResult<'e> {
    match parent {
        Value::Entity(entity) => match &entity.value {
            None => Err(RuntimeError::PropertyOf {
                kind: "entity without a value",
                prop: key.display(),
            }),
            Some(CompiledValue::Const(_)) => Err(RuntimeError::PropertyOf {
                kind: "string",
                prop: key.display(),
            }),
            Some(CompiledValue::Expr(expr)) => expr.eval(scope, locals, Some(key)),
        },
        Value::Attr(attr) => match &attr.value {
            CompiledValue::Const(_) => Err(RuntimeError::PropertyOf {
                kind: "string",
                prop: key.display(),
            }),
            CompiledValue::Expr(expr) => expr.eval(scope, locals, Some(key)),
        },
        Value::Expr(expr) => expr.eval(scope, locals, Some(key)),
        Value::Macro(_) => Err(RuntimeError::PropertyOf {
            kind: "macro",
            prop: key.display(),
        }),
        Value::Data(data) => {
            let member = match key {
                Prim::Str(name) => name.clone(),
                Prim::Num(n) => fmt_num(*n),
                other => {
                    return Err(RuntimeError::PropertyOf {
                        kind: "object",
                        prop: other.display(),
                    });
                }
            };
            match data {
                DataRef::Borrowed(outer) => match outer {
                    Data::Map(map) => match map.get(&member) {
                        Some(child) => Ok((locals, Value::from_data(child))),
                        None => Err(RuntimeError::NotDefined { prop: member }),
                    },
                    other => Err(RuntimeError::PropertyOf {
                        kind: other.kind(),
                        prop: member,
                    }),
                },
                DataRef::Owned(owned) => match owned.as_ref() {
                    Data::Map(map) => match map.get(&member) {
                        Some(child) => Ok((locals, Value::from_owned_data(child.clone()))),
                        None => Err(RuntimeError::NotDefined { prop: member }),
                    },
                    other => Err(RuntimeError::PropertyOf {
                        kind: other.kind(),
                        prop: member,
                    }),
                },
            }
        }
        Value::Str(_) => Err(RuntimeError::PropertyOf {
            kind: "string",
            prop: key.display(),
        }),
        Value::Num(_) => Err(RuntimeError::PropertyOf {
            kind: "number",
            prop: key.display(),
        }),
        Value::Bool(_) => Err(RuntimeError::PropertyOf {
            kind: "boolean",
            prop: key.display(),
        }),
        Value::Null => Err(RuntimeError::PropertyOf {
            kind: "null",
            prop: key.display(),
        }),
    }
}

/// A string literal, processed lazily on first resolution.
///
/// Literals flagged non-complex at parse time never reach this type as an
/// entity value — the compiler stores them as constants — but they still
/// occur as hash members and inside expressions.
#[derive(Debug)]
pub(crate) struct StringLit {
    source: String,
    entry: Rc<str>,
    compiled: OnceCell<Result<Body, ValueError>>,
}

#[derive(Debug)]
enum Body {
    Plain(String),
    Complex(ComplexString),
}

impl StringLit {
    pub(crate) fn new(source: String, entry: Rc<str>) -> Self {
        StringLit {
            source,
            entry,
            compiled: OnceCell::new(),
        }
    }

    fn eval<'e>(
        &'e self,
        scope: &Scope<'e>,
        locals: Locals<'e>,
        prop: Option<&Prim>,
    ) -> EvalResult<'e> {
        if let Some(prop) = prop {
            return Err(RuntimeError::PropertyOf {
                kind: "string",
                prop: prop.display(),
            });
        }
        match self.compiled.get_or_init(|| self.build()) {
            Err(err) => Err(RuntimeError::Value(err.clone())),
            Ok(Body::Plain(content)) => Ok((locals, Value::Str(content.clone()))),
            Ok(Body::Complex(complex)) => match complex.resolve(scope, locals.clone()) {
                Ok(text) => Ok((locals, Value::Str(text))),
                // carry this literal's raw source so the caller can still
                // display something; emission is left to the context
                Err(err) => Err(RuntimeError::Value(ValueError {
                    entry: self.entry.to_string(),
                    source: self.source.clone(),
                    message: err.to_string(),
                })),
            },
        }
    }

    fn build(&self) -> Result<Body, ValueError> {
        match parse_string(&self.source) {
            Err(err) => Err(ValueError {
                entry: self.entry.to_string(),
                source: self.source.clone(),
                message: format!("malformed string: {err}"),
            }),
            Ok(StringBody::Plain(content)) => Ok(Body::Plain(content)),
            Ok(StringBody::Complex(segments)) => {
                let parts = segments
                    .into_iter()
                    .map(|segment| match segment {
                        Segment::Literal(text) => Part::Literal(text),
                        Segment::Placeable(expr) => {
                            Part::Placeable(compile_expr(&expr, &self.entry, &[]))
                        }
                    })
                    .collect();
                Ok(Body::Complex(ComplexString {
                    parts,
                    guard: ReentrancyGuard::default(),
                }))
            }
        }
    }
}

/// A string with placeables. Owns the re-entrancy guard that detects cyclic
/// references through its placeables.
#[derive(Debug)]
struct ComplexString {
    parts: Vec<Part>,
    guard: ReentrancyGuard,
}

#[derive(Debug)]
enum Part {
    Literal(String),
    Placeable(Expr),
}

impl ComplexString {
    fn resolve<'e>(&'e self, scope: &Scope<'e>, locals: Locals<'e>) -> Result<String, RuntimeError> {
        let _token = self.guard.enter()?;
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Placeable(expr) => {
                    match resolve(scope, locals.clone(), Value::Expr(expr))? {
                        Prim::Str(text) => {
                            if text.chars().count() > MAX_PLACEABLE_LENGTH {
                                return Err(RuntimeError::PlaceableLength {
                                    max: MAX_PLACEABLE_LENGTH,
                                });
                            }
                            out.push_str(&text);
                        }
                        Prim::Num(n) => out.push_str(&fmt_num(n)),
                        Prim::Null | Prim::Bool(_) => return Err(RuntimeError::PlaceableType),
                    }
                }
            }
        }
        Ok(out)
    }
}

/// A hash literal with its branch-selection state.
#[derive(Debug)]
pub(crate) struct HashLit {
    content: Vec<(String, Expr)>,
    default_key: Option<String>,
    /// The index expression consumed from the owning entry at this nesting
    /// depth, shared with the entry that declared it.
    index: Option<Rc<IndexExpr>>,
    entry: Rc<str>,
}

impl HashLit {
    /// Select a member. Key order: the explicit `prop` from an enclosing
    /// property access, then the owning entry's index expression for this
    /// depth, then the hash's own `*` default.
    fn lookup<'e>(
        &'e self,
        scope: &Scope<'e>,
        locals: Locals<'e>,
        prop: Option<&Prim>,
    ) -> EvalResult<'e> {
        let mut tried = Vec::new();
        for slot in 0..3 {
            let candidate = match slot {
                0 => prop.cloned(),
                1 => match &self.index {
                    Some(index) => Some(index.resolve(scope, locals.clone())?),
                    None => None,
                },
                _ => self.default_key.clone().map(Prim::Str),
            };
            let Some(candidate) = candidate else {
                continue;
            };
            let Prim::Str(key) = candidate else {
                return Err(RuntimeError::Index(IndexError {
                    entry: self.entry.to_string(),
                    message: "index must be a string".to_string(),
                }));
            };
            tried.push(key.clone());
            if let Some((_, member)) = self.content.iter().find(|(name, _)| *name == key) {
                return Ok((locals, Value::Expr(member)));
            }
        }
        let message = if tried.is_empty() {
            "hash key lookup failed".to_string()
        } else {
            format!("hash key lookup failed (tried \"{}\")", tried.join("\", \""))
        };
        Err(RuntimeError::Index(IndexError {
            entry: self.entry.to_string(),
            message,
        }))
    }
}

/// An index expression owned by an entity or attribute, shared with the hash
/// level that consumes it. Guarded against cyclic selection.
#[derive(Debug)]
pub(crate) struct IndexExpr {
    expr: Expr,
    guard: ReentrancyGuard,
    entry: Rc<str>,
}

impl IndexExpr {
    pub(crate) fn new(expr: Expr, entry: Rc<str>) -> Self {
        IndexExpr {
            expr,
            guard: ReentrancyGuard::default(),
            entry,
        }
    }

    /// Resolve the selector to a primitive. Any failure other than a nested
    /// index failure (already attributed to its own hash) becomes an
    /// [`IndexError`] for this entry; a cycle on this very selector stays a
    /// plain runtime error.
    fn resolve<'e>(&'e self, scope: &Scope<'e>, locals: Locals<'e>) -> Result<Prim, RuntimeError> {
        let _token = self.guard.enter()?;
        match resolve(scope, locals, Value::Expr(&self.expr)) {
            Ok(prim) => Ok(prim),
            Err(err @ RuntimeError::Index(_)) => Err(err),
            Err(err) => Err(RuntimeError::Index(IndexError {
                entry: self.entry.to_string(),
                message: err.to_string(),
            })),
        }
    }
}

fn apply_unary(op: UnaryOp, arg: Prim) -> Result<Prim, RuntimeError> {
    match op {
        UnaryOp::Minus => match arg {
            Prim::Num(n) => Ok(Prim::Num(-n)),
            _ => Err(RuntimeError::OperandType {
                op: "unary -",
                expected: "a number",
            }),
        },
        UnaryOp::Plus => match arg {
            Prim::Num(n) => Ok(Prim::Num(n)),
            _ => Err(RuntimeError::OperandType {
                op: "unary +",
                expected: "a number",
            }),
        },
        UnaryOp::Not => match arg {
            Prim::Bool(b) => Ok(Prim::Bool(!b)),
            _ => Err(RuntimeError::OperandType {
                op: "!",
                expected: "a boolean",
            }),
        },
    }
}

fn apply_binary(op: BinaryOp, left: Prim, right: Prim) -> Result<Prim, RuntimeError> {
    match op {
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = match (&left, &right) {
                (Prim::Num(a), Prim::Num(b)) => a == b,
                (Prim::Str(a), Prim::Str(b)) => a == b,
                _ => {
                    return Err(RuntimeError::OperandType {
                        op: op.token(),
                        expected: "two numbers or two strings",
                    });
                }
            };
            Ok(Prim::Bool(if matches!(op, BinaryOp::Eq) {
                equal
            } else {
                !equal
            }))
        }
        BinaryOp::Add => match (left, right) {
            (Prim::Num(a), Prim::Num(b)) => Ok(Prim::Num(a + b)),
            (Prim::Str(a), Prim::Str(b)) => Ok(Prim::Str(a + &b)),
            _ => Err(RuntimeError::OperandType {
                op: "+",
                expected: "two numbers or two strings",
            }),
        },
        _ => {
            let (Prim::Num(a), Prim::Num(b)) = (left, right) else {
                return Err(RuntimeError::OperandType {
                    op: op.token(),
                    expected: "two numbers",
                });
            };
            match op {
                BinaryOp::Sub => Ok(Prim::Num(a - b)),
                BinaryOp::Mul => Ok(Prim::Num(a * b)),
                BinaryOp::Div => {
                    if b == 0.0 {
                        Err(RuntimeError::DivisionByZero)
                    } else {
                        Ok(Prim::Num(a / b))
                    }
                }
                BinaryOp::Mod => {
                    if b == 0.0 {
                        Err(RuntimeError::ModuloZero)
                    } else {
                        Ok(Prim::Num(a % b))
                    }
                }
                BinaryOp::Lt => Ok(Prim::Bool(a < b)),
                BinaryOp::Le => Ok(Prim::Bool(a <= b)),
                BinaryOp::Gt => Ok(Prim::Bool(a > b)),
                BinaryOp::Ge => Ok(Prim::Bool(a >= b)),
                BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Add => unreachable!("handled above"),
            }
        }
    }
}

fn apply_logical(op: LogicalOp, left: Prim, right: Prim) -> Result<Prim, RuntimeError> {
    let (Prim::Bool(a), Prim::Bool(b)) = (left, right) else {
        return Err(RuntimeError::OperandType {
            op: op.token(),
            expected: "two booleans",
        });
    };
    Ok(Prim::Bool(match op {
        LogicalOp::And => a && b,
        LogicalOp::Or => a || b,
    }))
}

/// Format a number the way it reads in a composed string: integral values
/// without a fractional part.
pub(crate) fn fmt_num(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 9.007_199_254_740_992e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
