//! Environment-derived values usable in expressions via `@name`.

use std::cell::RefCell;
use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::Data;

/// A single environment value, e.g. the current hour or the viewport width.
///
/// Dynamic globals have a change-notification source that the embedder
/// starts in [`Global::activate`] and stops in [`Global::deactivate`]; the
/// source reports changes by calling
/// [`Context::handle_global_change`](crate::Context::handle_global_change).
/// Activation is reference-counted across all live subscriptions that read
/// the global, so a source only runs while something depends on it.
pub trait Global {
    fn id(&self) -> &str;

    /// The current value. Implementations may cache while active.
    fn value(&mut self) -> Result<Data, GlobalError>;

    /// Whether this global has a change-notification source.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Start the change-notification source. Called on the 0→1 reference
    /// transition.
    fn activate(&mut self) {}

    /// Stop the change-notification source and drop any cached value.
    /// Called on the 1→0 reference transition.
    fn deactivate(&mut self) {}

    /// Recompute the cached value after a change notification.
    fn refresh(&mut self) {}
}

#[derive(Debug, Error)]
#[error("global {id} failed: {message}")]
pub struct GlobalError {
    pub id: String,
    pub message: String,
}

/// An explicitly constructed set of globals, injected into a
/// [`Context`](crate::Context) at build time.
#[derive(Default)]
pub struct GlobalRegistry {
    globals: BTreeMap<String, RefCell<Box<dyn Global>>>,
}

impl GlobalRegistry {
    pub fn new() -> Self {
        GlobalRegistry::default()
    }

    pub fn register(&mut self, global: Box<dyn Global>) {
        self.globals
            .insert(global.id().to_string(), RefCell::new(global));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.globals.contains_key(id)
    }

    pub fn is_dynamic(&self, id: &str) -> bool {
        self.globals
            .get(id)
            .is_some_and(|global| global.borrow().is_dynamic())
    }

    pub(crate) fn value(&self, id: &str) -> Option<Result<Data, GlobalError>> {
        self.globals.get(id).map(|global| global.borrow_mut().value())
    }

    pub(crate) fn activate(&self, id: &str) {
        if let Some(global) = self.globals.get(id) {
            global.borrow_mut().activate();
        }
    }

    pub(crate) fn deactivate(&self, id: &str) {
        if let Some(global) = self.globals.get(id) {
            global.borrow_mut().deactivate();
        }
    }

    pub(crate) fn refresh(&self, id: &str) {
        if let Some(global) = self.globals.get(id) {
            global.borrow_mut().refresh();
        }
    }
}
