//! Compiler and evaluation error types.

use std::cmp::Ordering;

use thiserror::Error;

/// A single entry failed to compile. The entry is dropped; other entries in
/// the same document still compile.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{entry}: {message}")]
pub struct CompilationError {
    pub entry: String,
    pub message: String,
}

/// An error raised while evaluating a compiled expression.
///
/// Runtime errors are always caught at the entity resolution boundary; the
/// context reports them and falls back to the next locale.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("reference to an unknown entry: {name}{}", format_suggestions(suggestions))]
    UnknownEntry {
        name: String,
        suggestions: Vec<String>,
    },
    #[error("reference to an unknown variable: {name}")]
    UnknownVariable { name: String },
    #[error("no globals set (tried @{name})")]
    NoGlobals { name: String },
    #[error("reference to an unknown global: {name}")]
    UnknownGlobal { name: String },
    #[error("cannot evaluate global {name}")]
    GlobalFailed { name: String },
    #[error("the {op} operator takes {expected}")]
    OperandType {
        op: &'static str,
        expected: &'static str,
    },
    #[error("division by zero not allowed")]
    DivisionByZero,
    #[error("modulo zero not allowed")]
    ModuloZero,
    #[error("conditional expressions must test a boolean")]
    ConditionalType,
    #[error("{id}() takes exactly {expected} argument(s) ({got} given)")]
    Arity {
        id: String,
        expected: usize,
        got: usize,
    },
    #[error("cyclic reference detected")]
    CyclicReference,
    #[error("uncalled macro: {id}")]
    UncalledMacro { id: String },
    #[error("expected a macro, got a non-callable")]
    NotCallable,
    #[error("placeables must be strings or numbers")]
    PlaceableType,
    #[error("placeable has too many characters, maximum allowed is {max}")]
    PlaceableLength { max: usize },
    #[error("cannot get property of a {kind}: {prop}")]
    PropertyOf {
        kind: &'static str,
        prop: String,
    },
    #[error("{prop} is not defined on the object")]
    NotDefined { prop: String },
    #[error("cannot get attribute of a non-entity: {attr}")]
    AttributeOfNonEntity { attr: String },
    #[error("{id} has no attribute {attr}")]
    NoAttribute { id: String, attr: String },
    #[error("cannot resolve data of type {kind}")]
    Unresolvable { kind: &'static str },
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl RuntimeError {
    /// The raw source text to fall back to, when this error carries one.
    pub fn value_source(&self) -> Option<&str> {
        match self {
            RuntimeError::Value(err) => Some(&err.source),
            _ => None,
        }
    }
}

/// A runtime error raised while composing an entity's own string value.
///
/// Carries the raw (unresolved) source text so a caller can still display
/// something plausible. Easier to recover from than an [`IndexError`]: at
/// least the right variant of the entity was selected.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueError {
    pub entry: String,
    pub source: String,
    pub message: String,
}

// A manual `Display`/`Error` impl is used instead of `#[derive(Error)]`:
// thiserror treats a field named `source` as the error's `source()`, but here
// `source` holds raw fallback text, not an underlying error.
impl core::fmt::Display for ValueError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}] {}", self.entry, self.message)
    }
}

impl std::error::Error for ValueError {}

/// A runtime error raised while selecting a hash branch.
///
/// More severe than a [`ValueError`]: the wrong variant may have been shown
/// rather than just a missing sub-string, so callers should not recover from
/// it too hard.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{entry}] {message}")]
pub struct IndexError {
    pub entry: String,
    pub message: String,
}

/// Find close matches for an unknown name among known candidates.
///
/// Returns up to three candidates with Jaro similarity of at least 0.7,
/// best first.
pub fn compute_suggestions<'a>(
    target: &str,
    candidates: impl Iterator<Item = &'a str>,
) -> Vec<String> {
    let mut scored: Vec<(f64, String)> = candidates
        .filter_map(|candidate| {
            let score = strsim::jaro(target, candidate);
            (score >= 0.7).then(|| (score, candidate.to_string()))
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(3);
    scored.into_iter().map(|(_, candidate)| candidate).collect()
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", suggestions.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestions_rank_closest_first() {
        let known = ["brandName", "brandShort", "about"];
        let result = compute_suggestions("brandNane", known.iter().copied());
        assert_eq!(result.first().map(String::as_str), Some("brandName"));
    }

    #[test]
    fn unrelated_names_are_not_suggested() {
        let known = ["viewport", "hour"];
        assert!(compute_suggestions("zzzzz", known.iter().copied()).is_empty());
    }

    #[test]
    fn unknown_entry_message_includes_suggestions() {
        let err = RuntimeError::UnknownEntry {
            name: "brandNane".to_string(),
            suggestions: vec!["brandName".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "reference to an unknown entry: brandNane (did you mean brandName?)"
        );
    }
}
