//! Compiled entities, attributes, and macros.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::compiler::error::{CompilationError, RuntimeError};
use crate::compiler::expr::{
    EntryRef, Expr, IndexExpr, Locals, Prim, Value, compile_expr, fmt_num, resolve,
};
use crate::compiler::plural::plural_category;
use crate::compiler::scope::Scope;
use crate::parser::ast;

/// The compiled entries of one locale, keyed by identifier.
#[derive(Debug, Default)]
pub struct Env {
    entries: BTreeMap<String, Entry>,
}

/// A compiled top-level entry.
#[derive(Debug)]
pub enum Entry {
    Entity(Entity),
    Macro(MacroEntry),
}

impl Env {
    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inject the CLDR-backed `plural` macro for a language, unless the
    /// document defines its own `plural`. Locales do this automatically
    /// when they compile; call it directly when compiling raw documents.
    pub fn add_builtin_plural(&mut self, lang: &str) {
        if self.entries.contains_key("plural") {
            return;
        }
        let lang = lang.to_string();
        let body = MacroBody::Native(Box::new(move |args: &[Prim]| {
            let Some(Prim::Num(n)) = args.first() else {
                return Err(RuntimeError::OperandType {
                    op: "plural()",
                    expected: "a number",
                });
            };
            Ok(Prim::Str(plural_category(&lang, *n as i64).to_string()))
        }));
        self.entries.insert(
            "plural".to_string(),
            Entry::Macro(MacroEntry {
                id: Rc::from("plural"),
                local: false,
                params: vec!["n".to_string()],
                body,
            }),
        );
    }
}

/// Compile a document into an [`Env`].
///
/// A failed entry is reported and dropped; every other entry still compiles.
/// Later entries overwrite earlier ones with the same identifier. Comments,
/// imports (already flattened by the resource builder), and junk regions are
/// skipped.
pub fn compile(ast: &ast::Ast) -> (Env, Vec<CompilationError>) {
    let mut entries = BTreeMap::new();
    let mut errors = Vec::new();
    for entry in &ast.body {
        match entry {
            ast::Entry::Entity(def) => {
                entries.insert(def.id.clone(), Entry::Entity(compile_entity(def)));
            }
            ast::Entry::Macro(def) => match compile_macro(def) {
                Ok(compiled) => {
                    entries.insert(def.id.clone(), Entry::Macro(compiled));
                }
                Err(err) => errors.push(err),
            },
            ast::Entry::Comment(_) | ast::Entry::Import(_) | ast::Entry::Junk(_) => {}
        }
    }
    (Env { entries }, errors)
}

fn compile_entity(def: &ast::EntityDef) -> Entity {
    let id: Rc<str> = Rc::from(def.id.as_str());
    let index: Vec<Rc<IndexExpr>> = def
        .index
        .iter()
        .map(|expr| Rc::new(IndexExpr::new(compile_expr(expr, &id, &[]), id.clone())))
        .collect();
    let mut attrs = BTreeMap::new();
    let mut public_attrs = Vec::new();
    for attr in &def.attrs {
        let attr_index: Vec<Rc<IndexExpr>> = attr
            .index
            .iter()
            .map(|expr| Rc::new(IndexExpr::new(compile_expr(expr, &id, &[]), id.clone())))
            .collect();
        attrs.insert(
            attr.key.clone(),
            Attribute {
                key: attr.key.clone(),
                local: attr.local,
                value: compile_value(&attr.value, &id, &attr_index),
            },
        );
        if !attr.local {
            public_attrs.push(attr.key.clone());
        }
    }
    let value = def
        .value
        .as_ref()
        .map(|node| compile_value(node, &id, &index));
    Entity {
        id,
        local: def.local,
        value,
        attrs,
        public_attrs,
    }
}

/// Compile an entity or attribute value, taking the constant fast path for
/// literals with no `{{` token.
fn compile_value(node: &ast::Expr, entry: &Rc<str>, index: &[Rc<IndexExpr>]) -> CompiledValue {
    if let ast::Expr::Str {
        content,
        is_complex: false,
    } = node
    {
        return CompiledValue::Const(content.clone());
    }
    CompiledValue::Expr(compile_expr(node, entry, index))
}

fn compile_macro(def: &ast::MacroDef) -> Result<MacroEntry, CompilationError> {
    let mut seen = BTreeSet::new();
    for param in &def.args {
        if !seen.insert(param.as_str()) {
            return Err(CompilationError {
                entry: def.id.clone(),
                message: format!("duplicate macro parameter: ${param}"),
            });
        }
    }
    let id: Rc<str> = Rc::from(def.id.as_str());
    let body = MacroBody::Expr(compile_expr(&def.expr, &id, &[]));
    Ok(MacroEntry {
        id,
        local: false,
        params: def.args.clone(),
        body,
    })
}

/// A compiled value: a constant string (non-complex literal fast path) or a
/// compiled expression.
#[derive(Debug)]
pub(crate) enum CompiledValue {
    Const(String),
    Expr(Expr),
}

/// A compiled, lazily evaluated entity.
#[derive(Debug)]
pub struct Entity {
    pub id: Rc<str>,
    /// Private entities (`_`-prefixed) are excluded from external attribute
    /// enumeration but still addressable within their locale.
    pub local: bool,
    pub(crate) value: Option<CompiledValue>,
    attrs: BTreeMap<String, Attribute>,
    public_attrs: Vec<String>,
}

impl Entity {
    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attrs.get(key)
    }

    pub fn public_attribute_keys(&self) -> impl Iterator<Item = &str> {
        self.public_attrs.iter().map(String::as_str)
    }

    /// Resolve this entity's value to a string.
    ///
    /// Constant values are returned as written, unresolved; an entity with
    /// no value yields `None`.
    pub fn get_string<'e>(&'e self, scope: &Scope<'e>) -> Result<Option<String>, RuntimeError> {
        let locals = Locals {
            this: Some(EntryRef::Entity(self)),
            args: None,
        };
        match &self.value {
            None => Ok(None),
            Some(CompiledValue::Const(text)) => Ok(Some(text.clone())),
            Some(CompiledValue::Expr(expr)) => {
                let prim = resolve(scope, locals, Value::Expr(expr))?;
                Ok(prim_to_text(prim))
            }
        }
    }

    /// Resolve this entity's value and every public attribute, snapshotting
    /// the dynamic globals referenced along the way.
    ///
    /// The snapshot is rebuilt on every call; it is what drives
    /// retranslation bookkeeping.
    pub fn get<'e>(&'e self, scope: &Scope<'e>) -> Result<EntityValue, RuntimeError> {
        scope.clear_referenced();
        let value = self.get_string(scope)?;
        let mut attributes = BTreeMap::new();
        for key in &self.public_attrs {
            if let Some(attr) = self.attrs.get(key) {
                attributes.insert(key.clone(), attr.get_string(self, scope)?);
            }
        }
        Ok(EntityValue {
            value,
            attributes,
            globals: scope.referenced(),
            locale: None,
        })
    }
}

/// A compiled attribute of an entity.
#[derive(Debug)]
pub struct Attribute {
    pub key: String,
    pub local: bool,
    pub(crate) value: CompiledValue,
}

impl Attribute {
    /// Resolve this attribute against its owning entity.
    pub fn get_string<'e>(
        &'e self,
        entity: &'e Entity,
        scope: &Scope<'e>,
    ) -> Result<String, RuntimeError> {
        let locals = Locals {
            this: Some(EntryRef::Entity(entity)),
            args: None,
        };
        match &self.value {
            CompiledValue::Const(text) => Ok(text.clone()),
            CompiledValue::Expr(expr) => {
                let prim = resolve(scope, locals, Value::Expr(expr))?;
                Ok(prim_to_text(prim).unwrap_or_default())
            }
        }
    }
}

/// A compiled macro.
#[derive(Debug)]
pub struct MacroEntry {
    pub id: Rc<str>,
    pub local: bool,
    pub params: Vec<String>,
    pub(crate) body: MacroBody,
}

pub(crate) enum MacroBody {
    Expr(Expr),
    /// A macro provided by the runtime rather than source text.
    Native(NativeFn),
}

pub(crate) type NativeFn = Box<dyn Fn(&[Prim]) -> Result<Prim, RuntimeError>>;

impl fmt::Debug for MacroBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroBody::Expr(expr) => f.debug_tuple("Expr").field(expr).finish(),
            MacroBody::Native(_) => f.write_str("Native(..)"),
        }
    }
}

impl MacroEntry {
    /// Invoke this macro. Argument count must equal the declared parameter
    /// count exactly; arguments arrive already evaluated in the caller's
    /// context and are bound positionally into fresh locals.
    pub(crate) fn call<'e>(
        &'e self,
        scope: &Scope<'e>,
        args: Vec<(Locals<'e>, Value<'e>)>,
    ) -> Result<(Locals<'e>, Value<'e>), RuntimeError> {
        if self.params.len() != args.len() {
            return Err(RuntimeError::Arity {
                id: self.id.to_string(),
                expected: self.params.len(),
                got: args.len(),
            });
        }
        match &self.body {
            MacroBody::Expr(expr) => {
                let mut bound = BTreeMap::new();
                for (name, pair) in self.params.iter().zip(args) {
                    bound.insert(name.clone(), pair);
                }
                let locals = Locals {
                    this: Some(EntryRef::Macro(self)),
                    args: Some(Rc::new(bound)),
                };
                let (after, value) = expr.eval(scope, locals, None)?;
                let prim = resolve(scope, after.clone(), value)?;
                Ok((after, prim.into_value()))
            }
            MacroBody::Native(native) => {
                let mut prims = Vec::with_capacity(args.len());
                for (arg_locals, value) in args {
                    prims.push(resolve(scope, arg_locals, value)?);
                }
                let result = native(&prims)?;
                Ok((
                    Locals {
                        this: Some(EntryRef::Macro(self)),
                        args: None,
                    },
                    result.into_value(),
                ))
            }
        }
    }
}

/// The resolved form of an entity: its value, its public attributes, the
/// globals referenced during this resolution, and the locale that produced
/// it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityValue {
    pub value: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub globals: BTreeSet<String>,
    pub locale: Option<String>,
}

fn prim_to_text(prim: Prim) -> Option<String> {
    match prim {
        Prim::Null => None,
        Prim::Str(text) => Some(text),
        Prim::Num(n) => Some(fmt_num(n)),
        Prim::Bool(b) => Some(b.to_string()),
    }
}
