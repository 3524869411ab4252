//! Context-level operational errors and the error event payload.

use std::fmt;

use thiserror::Error;

use crate::compiler::{CompilationError, RuntimeError};
use crate::loader::IoError;
use crate::parser::ParserError;

/// Misuse of the context lifecycle, or a fatal build failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context not ready")]
    NotReady,
    #[error("context is frozen")]
    Frozen,
    #[error("context has no resources")]
    NoResources,
    #[error("too many nested imports")]
    TooManyNestedImports,
    #[error("no registered locales")]
    NoRegisteredLocales,
}

/// An entity could not be resolved in one particular locale; resolution
/// continues with the next locale in the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{id}: {message}", locale_prefix(locale.as_deref()))]
pub struct EntityError {
    pub message: String,
    pub id: String,
    pub locale: Option<String>,
}

fn locale_prefix(locale: Option<&str>) -> String {
    match locale {
        Some(code) => format!("[{code}] "),
        None => String::new(),
    }
}

/// An entity could not be resolved in any registered locale.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{id}: {message}{}", tried_suffix(tried))]
pub struct GetError {
    pub message: String,
    pub id: String,
    pub tried: Vec<String>,
}

fn tried_suffix(tried: &[String]) -> String {
    if tried.is_empty() {
        String::new()
    } else {
        format!("; tried {}", tried.join(", "))
    }
}

/// A diagnostic delivered on the context's error channel.
///
/// Resolution-path failures are reported here and degraded values returned
/// in their place; nothing is swallowed without an emission.
#[derive(Debug)]
pub enum ErrorEvent {
    Parser(ParserError),
    Compilation(CompilationError),
    Runtime(RuntimeError),
    Entity(EntityError),
    Get(GetError),
    Io(IoError),
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorEvent::Parser(err) => fmt::Display::fmt(err, f),
            ErrorEvent::Compilation(err) => fmt::Display::fmt(err, f),
            ErrorEvent::Runtime(err) => fmt::Display::fmt(err, f),
            ErrorEvent::Entity(err) => fmt::Display::fmt(err, f),
            ErrorEvent::Get(err) => fmt::Display::fmt(err, f),
            ErrorEvent::Io(err) => fmt::Display::fmt(err, f),
        }
    }
}
