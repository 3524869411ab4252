//! Subscription bookkeeping for dynamic globals and locale changes.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::context::Localized;
use crate::global::GlobalRegistry;

/// One live `localize` call: its id list, its callback, and the globals its
/// last resolution read.
pub(crate) struct Subscription {
    pub key: usize,
    pub ids: Rc<RefCell<Vec<String>>>,
    pub callback: Rc<RefCell<dyn FnMut(&Localized)>>,
    /// Exact snapshot of the dynamic globals read during the last
    /// successful resolution of this subscription.
    pub globals: BTreeSet<String>,
}

/// Tracks which subscriptions depend on which dynamic globals and keeps the
/// per-global reference counts that gate their change sources.
#[derive(Default)]
pub(crate) struct RetranslationManager {
    subscriptions: Vec<Subscription>,
    counters: BTreeMap<String, usize>,
}

impl RetranslationManager {
    pub fn register(
        &mut self,
        key: usize,
        ids: Rc<RefCell<Vec<String>>>,
        callback: Rc<RefCell<dyn FnMut(&Localized)>>,
    ) {
        self.subscriptions.push(Subscription {
            key,
            ids,
            callback,
            globals: BTreeSet::new(),
        });
    }

    pub fn subscription(&self, key: usize) -> Option<&Subscription> {
        self.subscriptions.iter().find(|sub| sub.key == key)
    }

    /// Update a subscription's tracked global set.
    ///
    /// Newly referenced globals increment their reference count (activating
    /// the change source on the 0→1 transition). With `extend` the new set
    /// is unioned in and nothing is released — the subscription only gained
    /// ids. Otherwise the new set replaces the old one and every global no
    /// longer referenced decrements its count (deactivating on 1→0); a
    /// subscription whose set becomes empty releases everything it held.
    pub fn rebind(
        &mut self,
        key: usize,
        new_globals: BTreeSet<String>,
        extend: bool,
        registry: &GlobalRegistry,
    ) {
        let Some(pos) = self.subscriptions.iter().position(|sub| sub.key == key) else {
            return;
        };
        let old = self.subscriptions[pos].globals.clone();
        let added: Vec<String> = new_globals
            .difference(&old)
            .filter(|id| registry.is_dynamic(id))
            .cloned()
            .collect();
        let removed: Vec<String> = if extend {
            Vec::new()
        } else {
            old.difference(&new_globals)
                .filter(|id| registry.is_dynamic(id))
                .cloned()
                .collect()
        };
        for id in &added {
            let count = self.counters.entry(id.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                registry.activate(id);
            }
        }
        for id in &removed {
            let count = self.counters.entry(id.clone()).or_insert(0);
            *count = count.saturating_sub(1);
            if *count == 0 {
                registry.deactivate(id);
            }
        }
        let sub = &mut self.subscriptions[pos];
        if extend {
            sub.globals.extend(new_globals);
        } else {
            sub.globals = new_globals;
        }
    }

    /// Keys of every subscription whose last resolution read `global_id`.
    pub fn dependents_of(&self, global_id: &str) -> Vec<usize> {
        self.subscriptions
            .iter()
            .filter(|sub| sub.globals.contains(global_id))
            .map(|sub| sub.key)
            .collect()
    }

    /// Keys of every known subscription, in registration order.
    pub fn all_keys(&self) -> Vec<usize> {
        self.subscriptions.iter().map(|sub| sub.key).collect()
    }

    /// Current reference count for a global.
    pub fn count(&self, global_id: &str) -> usize {
        self.counters.get(global_id).copied().unwrap_or(0)
    }
}
