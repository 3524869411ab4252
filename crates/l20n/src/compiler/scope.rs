//! Evaluation scope and re-entrancy guards.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use crate::compiler::entries::{Entry, Env};
use crate::compiler::error::{RuntimeError, compute_suggestions};
use crate::global::GlobalRegistry;
use crate::types::Data;

/// Everything a single resolution call can reach: the compiled entries of
/// one locale, the merged context data, and the globals registry.
///
/// A scope also records which globals were read during the current call;
/// the snapshot feeds retranslation bookkeeping.
pub struct Scope<'e> {
    env: &'e Env,
    data: &'e BTreeMap<String, Data>,
    globals: Option<&'e GlobalRegistry>,
    referenced: RefCell<BTreeSet<String>>,
}

impl<'e> Scope<'e> {
    pub fn new(
        env: &'e Env,
        data: &'e BTreeMap<String, Data>,
        globals: Option<&'e GlobalRegistry>,
    ) -> Self {
        Scope {
            env,
            data,
            globals,
            referenced: RefCell::new(BTreeSet::new()),
        }
    }

    pub(crate) fn entry(&self, name: &str) -> Option<&'e Entry> {
        self.env.get(name)
    }

    pub(crate) fn data_value(&self, name: &str) -> Option<&'e Data> {
        self.data.get(name)
    }

    /// Read a global's current value, recording the reference on success.
    pub(crate) fn global_value(&self, name: &str) -> Result<Data, RuntimeError> {
        let Some(registry) = self.globals else {
            return Err(RuntimeError::NoGlobals {
                name: name.to_string(),
            });
        };
        match registry.value(name) {
            None => Err(RuntimeError::UnknownGlobal {
                name: name.to_string(),
            }),
            Some(Err(_)) => Err(RuntimeError::GlobalFailed {
                name: name.to_string(),
            }),
            Some(Ok(value)) => {
                self.referenced.borrow_mut().insert(name.to_string());
                Ok(value)
            }
        }
    }

    pub(crate) fn clear_referenced(&self) {
        self.referenced.borrow_mut().clear();
    }

    /// Snapshot of the globals read since the last [`Scope::clear_referenced`].
    pub fn referenced(&self) -> BTreeSet<String> {
        self.referenced.borrow().clone()
    }

    pub(crate) fn suggestions_for(&self, name: &str) -> Vec<String> {
        compute_suggestions(name, self.env.ids())
    }
}

/// Marks an expression instance as being evaluated; re-entry means a cycle.
///
/// The flag clears when the token drops, whether the evaluation succeeded or
/// failed, so a caught cycle does not poison later independent resolutions.
#[derive(Debug, Default)]
pub(crate) struct ReentrancyGuard {
    busy: Cell<bool>,
}

impl ReentrancyGuard {
    pub fn enter(&self) -> Result<GuardToken<'_>, RuntimeError> {
        if self.busy.get() {
            return Err(RuntimeError::CyclicReference);
        }
        self.busy.set(true);
        Ok(GuardToken { guard: self })
    }
}

pub(crate) struct GuardToken<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.busy.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_detects_reentry_and_clears_on_drop() {
        let guard = ReentrancyGuard::default();
        {
            let _token = guard.enter().unwrap();
            assert!(matches!(guard.enter(), Err(RuntimeError::CyclicReference)));
        }
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn guard_clears_even_when_the_token_drops_on_an_error_path() {
        let guard = ReentrancyGuard::default();
        let failing = || -> Result<(), RuntimeError> {
            let _token = guard.enter()?;
            Err(RuntimeError::DivisionByZero)
        };
        assert!(failing().is_err());
        assert!(guard.enter().is_ok());
    }
}
