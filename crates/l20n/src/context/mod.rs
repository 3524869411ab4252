//! The resolution context: registered locales, queued resources, the
//! fallback chain, and live `localize` subscriptions.
//!
//! A context moves through three states: accepting resources and locale
//! registrations, frozen (building), and ready. Freezing materializes every
//! queued resource descriptor against every available locale and builds the
//! first locale; the others build lazily on first access, keeping startup
//! cost proportional to one locale.

mod error;
mod locale;
mod resource;
mod retranslation;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use bon::Builder;

use crate::compiler::{EntityValue, Entry, RuntimeError, Scope};
use crate::events::{EventEmitter, ListenerId};
use crate::global::GlobalRegistry;
use crate::loader::{Loader, MemoryLoader};
use crate::platform;
use crate::types::Data;

pub use error::{ContextError, EntityError, ErrorEvent, GetError};
pub use locale::Locale;
pub use resource::Resource;

use resource::BuildDiagnostic;
use retranslation::RetranslationManager;

/// A queued resource descriptor, materialized against every available
/// locale at freeze time.
enum ResLink {
    Text(String),
    Uri(String),
    /// A URI template taking the locale code.
    Template(Box<dyn Fn(&str) -> String>),
}

/// Why a subscription callback ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// The locale list changed (or this is the callback's first run, in
    /// which case the current locale order is passed).
    Locales(Vec<String>),
    /// A dynamic global the subscription depends on changed.
    Global(String),
}

/// The payload delivered to a `localize` callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Localized {
    pub entities: BTreeMap<String, EntityValue>,
    pub reason: Reason,
}

/// Identifies a live subscription created by [`Context::localize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalizeHandle {
    key: usize,
}

struct Many {
    entities: BTreeMap<String, EntityValue>,
    globals_used: BTreeSet<String>,
}

/// The localization context.
///
/// # Example
///
/// ```
/// use l20n::Context;
///
/// let ctx = Context::new();
/// ctx.add_resource(r#"<hello "Hello, world!">"#).unwrap();
/// ctx.freeze().unwrap();
/// assert_eq!(ctx.get("hello").unwrap(), "Hello, world!");
/// ```
#[derive(Builder)]
#[builder(on(String, into))]
pub struct Context {
    /// Identifier for this context, used only by the embedder.
    id: Option<String>,

    /// Fetches URI-addressed resources.
    #[builder(default = Box::new(MemoryLoader::new()))]
    loader: Box<dyn Loader>,

    /// The globals reachable from expressions via `@name`.
    #[builder(default = platform::default_globals())]
    globals: GlobalRegistry,

    /// Context-wide persistent data, merged under per-call overrides.
    #[builder(skip)]
    data: RefCell<BTreeMap<String, Data>>,

    /// Locale codes in priority order, as registered.
    #[builder(skip)]
    registered: RefCell<Vec<String>>,

    /// The effective fallback chain; `None` is the sentinel no-locale key
    /// used in single-language mode.
    #[builder(skip)]
    available: RefCell<Vec<Option<String>>>,

    #[builder(skip)]
    locales: RefCell<BTreeMap<Option<String>, Locale>>,

    #[builder(skip)]
    reslinks: RefCell<Vec<ResLink>>,

    #[builder(skip)]
    is_frozen: Cell<bool>,

    #[builder(skip)]
    is_ready: Cell<bool>,

    #[builder(skip)]
    error_emitter: EventEmitter<ErrorEvent>,

    #[builder(skip)]
    debug_emitter: EventEmitter<String>,

    #[builder(skip)]
    ready_listeners: RefCell<Vec<Rc<dyn Fn()>>>,

    #[builder(skip)]
    retranslation: RefCell<RetranslationManager>,

    #[builder(skip)]
    next_subscription: Cell<usize>,
}

impl Default for Context {
    fn default() -> Self {
        Context::builder().build()
    }
}

impl Context {
    /// Create a context with the default loader and platform globals.
    pub fn new() -> Self {
        Context::default()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.get()
    }

    pub fn is_frozen(&self) -> bool {
        self.is_frozen.get()
    }

    /// The registered locale codes, in priority order.
    pub fn registered_locales(&self) -> Vec<String> {
        self.registered.borrow().clone()
    }

    pub fn globals(&self) -> &GlobalRegistry {
        &self.globals
    }

    /// Set one key of the context-wide persistent data.
    pub fn set_data(&self, key: impl Into<String>, value: impl Into<Data>) {
        self.data.borrow_mut().insert(key.into(), value.into());
    }

    // =========================================================================
    // Registration and freezing
    // =========================================================================

    /// Queue inline resource text.
    pub fn add_resource(&self, text: impl Into<String>) -> Result<(), ContextError> {
        if self.is_frozen.get() {
            return Err(ContextError::Frozen);
        }
        self.reslinks.borrow_mut().push(ResLink::Text(text.into()));
        Ok(())
    }

    /// Queue a URI-addressed resource.
    pub fn link_resource(&self, uri: impl Into<String>) -> Result<(), ContextError> {
        if self.is_frozen.get() {
            return Err(ContextError::Frozen);
        }
        self.reslinks.borrow_mut().push(ResLink::Uri(uri.into()));
        Ok(())
    }

    /// Queue a locale-parametrized resource URI template, e.g.
    /// `|code| format!("locales/{code}/app.lol")`.
    pub fn link_resource_template(
        &self,
        template: impl Fn(&str) -> String + 'static,
    ) -> Result<(), ContextError> {
        if self.is_frozen.get() {
            return Err(ContextError::Frozen);
        }
        self.reslinks
            .borrow_mut()
            .push(ResLink::Template(Box::new(template)));
        Ok(())
    }

    /// Register the locale fallback order.
    ///
    /// An empty iterator selects single-language mode. Re-registering on a
    /// ready context re-freezes it and re-fires every subscription with the
    /// new locale order; re-registering while a frozen context is still
    /// building is an error.
    pub fn register_locales<I, S>(&self, codes: I) -> Result<(), ContextError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.is_frozen.get() && !self.is_ready.get() {
            return Err(ContextError::NotReady);
        }
        let registered: Vec<String> = codes.into_iter().map(Into::into).collect();
        {
            let mut locales = self.locales.borrow_mut();
            for code in &registered {
                let key = Some(code.clone());
                locales
                    .entry(key.clone())
                    .or_insert_with(|| Locale::new(key));
            }
        }
        self.registered.replace(registered);
        if self.is_frozen.get() {
            return self.freeze();
        }
        Ok(())
    }

    /// Freeze the context and build the first locale synchronously.
    pub fn freeze(&self) -> Result<(), ContextError> {
        self.prepare_freeze()?;
        let first = self.available.borrow().first().cloned();
        if let Some(key) = first {
            self.build_locale_sync(&key)?;
        }
        self.set_ready();
        Ok(())
    }

    /// Freeze the context and build the first locale asynchronously.
    pub async fn freeze_async(&self) -> Result<(), ContextError> {
        self.prepare_freeze()?;
        let first = self.available.borrow().first().cloned();
        if let Some(key) = first {
            self.build_locale_async(&key).await?;
        }
        self.set_ready();
        Ok(())
    }

    /// Common freeze front half: validate, compute the fallback chain, and
    /// materialize every queued descriptor against every available locale.
    fn prepare_freeze(&self) -> Result<(), ContextError> {
        if self.is_frozen.get() && !self.is_ready.get() {
            return Err(ContextError::NotReady);
        }
        self.is_frozen.set(true);
        if self.reslinks.borrow().is_empty() {
            return Err(ContextError::NoResources);
        }
        let registered = self.registered.borrow().clone();
        let available: Vec<Option<String>> = if registered.is_empty() {
            vec![None]
        } else {
            registered.into_iter().map(Some).collect()
        };
        let reslinks = self.reslinks.borrow();
        let mut locales = self.locales.borrow_mut();
        for key in &available {
            let locale = locales
                .entry(key.clone())
                .or_insert_with(|| Locale::new(key.clone()));
            for link in reslinks.iter() {
                match link {
                    ResLink::Text(text) => locale.add_text(text.clone()),
                    ResLink::Uri(uri) => locale.link_uri(uri.clone()),
                    ResLink::Template(template) => match &locale.code {
                        Some(code) => locale.link_uri(template(code)),
                        None => return Err(ContextError::NoRegisteredLocales),
                    },
                }
            }
        }
        drop(locales);
        drop(reslinks);
        self.available.replace(available);
        Ok(())
    }

    fn set_ready(&self) {
        self.is_ready.set(true);
        let keys = self.retranslation.borrow().all_keys();
        let reason_locales = self.registered.borrow().clone();
        for key in keys {
            self.fire_subscription(key, Reason::Locales(reason_locales.clone()));
        }
        let listeners: Vec<Rc<dyn Fn()>> = self.ready_listeners.borrow().clone();
        for listener in listeners {
            listener();
        }
    }

    fn build_locale_sync(&self, key: &Option<String>) -> Result<(), ContextError> {
        let already = self
            .locales
            .borrow()
            .get(key)
            .is_some_and(|locale| locale.is_ready);
        if already {
            return Ok(());
        }
        let removed = self.locales.borrow_mut().remove(key);
        let Some(mut locale) = removed else {
            return Ok(());
        };
        let mut diagnostics = Vec::new();
        let result = locale.build_sync(&*self.loader, &mut diagnostics);
        self.locales.borrow_mut().insert(key.clone(), locale);
        self.emit_diagnostics(diagnostics);
        result
    }

    async fn build_locale_async(&self, key: &Option<String>) -> Result<(), ContextError> {
        let already = self
            .locales
            .borrow()
            .get(key)
            .is_some_and(|locale| locale.is_ready);
        if already {
            return Ok(());
        }
        let removed = self.locales.borrow_mut().remove(key);
        let Some(mut locale) = removed else {
            return Ok(());
        };
        let mut diagnostics = Vec::new();
        let result = locale.build_async(&*self.loader, &mut diagnostics).await;
        self.locales.borrow_mut().insert(key.clone(), locale);
        self.emit_diagnostics(diagnostics);
        result
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve an entity's value to a string, falling back through the
    /// locale chain. A valueless entity yields an empty string.
    pub fn get(&self, id: &str) -> Result<String, ContextError> {
        Ok(self.get_entity(id)?.value.unwrap_or_default())
    }

    /// Like [`Context::get`], with per-call data overriding the context's
    /// persistent data key by key.
    pub fn get_with(
        &self,
        id: &str,
        data: &BTreeMap<String, Data>,
    ) -> Result<String, ContextError> {
        Ok(self.get_entity_with(id, data)?.value.unwrap_or_default())
    }

    /// Resolve an entity to its value, public attributes, referenced
    /// globals, and source locale.
    pub fn get_entity(&self, id: &str) -> Result<EntityValue, ContextError> {
        self.lookup(id, None)
    }

    /// Like [`Context::get_entity`], with per-call data overrides.
    pub fn get_entity_with(
        &self,
        id: &str,
        data: &BTreeMap<String, Data>,
    ) -> Result<EntityValue, ContextError> {
        self.lookup(id, Some(data))
    }

    fn lookup(
        &self,
        id: &str,
        overrides: Option<&BTreeMap<String, Data>>,
    ) -> Result<EntityValue, ContextError> {
        if !self.is_ready.get() {
            return Err(ContextError::NotReady);
        }
        let args = self.merge_args(overrides);
        self.get_from_locale(0, id, &args, None)
    }

    fn merge_args(&self, overrides: Option<&BTreeMap<String, Data>>) -> BTreeMap<String, Data> {
        let mut args = self.data.borrow().clone();
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                args.insert(key.clone(), value.clone());
            }
        }
        args
    }

    /// The fallback algorithm: try the locale at `cur`, emit a diagnostic
    /// and recurse to the next on a miss or evaluation failure.
    ///
    /// `source_string` carries the first value-composition error's raw
    /// source forward; it becomes the degraded display value once every
    /// locale is exhausted (the bare identifier if no source was captured).
    fn get_from_locale(
        &self,
        cur: usize,
        id: &str,
        args: &BTreeMap<String, Data>,
        source_string: Option<String>,
    ) -> Result<EntityValue, ContextError> {
        let key = self.available.borrow().get(cur).cloned();
        let Some(key) = key else {
            let tried = self.registered.borrow().clone();
            self.emit_error(ErrorEvent::Get(GetError {
                message: "entity couldn't be retrieved".to_string(),
                id: id.to_string(),
                tried,
            }));
            return Ok(EntityValue {
                value: Some(source_string.unwrap_or_else(|| id.to_string())),
                attributes: BTreeMap::new(),
                globals: BTreeSet::new(),
                locale: None,
            });
        };
        self.build_locale_sync(&key)?;

        enum Outcome {
            Found(EntityValue),
            Missing,
            NotEntity,
            Failed(RuntimeError),
        }

        let outcome = {
            let locales = self.locales.borrow();
            let located = locales
                .get(&key)
                .and_then(|locale| locale.env().map(|env| (locale, env)));
            match located {
                None => Outcome::Missing,
                Some((locale, env)) => match locale.entry(id) {
                    None => Outcome::Missing,
                    Some(Entry::Macro(_)) => Outcome::NotEntity,
                    Some(Entry::Entity(entity)) => {
                        let scope = Scope::new(env, args, Some(&self.globals));
                        match entity.get(&scope) {
                            Ok(value) => Outcome::Found(value),
                            Err(err) => Outcome::Failed(err),
                        }
                    }
                },
            }
        };

        match outcome {
            Outcome::Found(mut value) => {
                value.locale = key.clone();
                Ok(value)
            }
            Outcome::Missing => {
                self.emit_error(ErrorEvent::Entity(EntityError {
                    message: "not found".to_string(),
                    id: id.to_string(),
                    locale: key.clone(),
                }));
                self.get_from_locale(cur + 1, id, args, source_string)
            }
            Outcome::NotEntity => {
                self.emit_error(ErrorEvent::Entity(EntityError {
                    message: "not an entity".to_string(),
                    id: id.to_string(),
                    locale: key.clone(),
                }));
                self.get_from_locale(cur + 1, id, args, source_string)
            }
            Outcome::Failed(err) => {
                let fallback =
                    source_string.or_else(|| err.value_source().map(ToString::to_string));
                let message = err.to_string();
                self.emit_error(ErrorEvent::Runtime(err));
                self.emit_error(ErrorEvent::Entity(EntityError {
                    message,
                    id: id.to_string(),
                    locale: key.clone(),
                }));
                self.get_from_locale(cur + 1, id, args, fallback)
            }
        }
    }

    fn get_many(&self, ids: &[String]) -> Result<Many, ContextError> {
        let args = self.merge_args(None);
        let mut entities = BTreeMap::new();
        let mut globals_used = BTreeSet::new();
        for id in ids {
            let entity = self.get_from_locale(0, id, &args, None)?;
            globals_used.extend(entity.globals.iter().cloned());
            entities.insert(id.clone(), entity);
        }
        Ok(Many {
            entities,
            globals_used,
        })
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe to a set of entity ids.
    ///
    /// If the context is ready the callback runs synchronously with the
    /// resolved entities and the current locale order as its reason; if not,
    /// it first runs once the context becomes ready. The callback runs again
    /// whenever the locale list changes or a dynamic global it depends on
    /// fires.
    pub fn localize(
        &self,
        ids: &[&str],
        callback: impl FnMut(&Localized) + 'static,
    ) -> LocalizeHandle {
        let key = self.next_subscription.get();
        self.next_subscription.set(key + 1);
        let ids: Rc<RefCell<Vec<String>>> =
            Rc::new(RefCell::new(ids.iter().map(ToString::to_string).collect()));
        let callback: Rc<RefCell<dyn FnMut(&Localized)>> = Rc::new(RefCell::new(callback));
        self.retranslation.borrow_mut().register(key, ids, callback);
        if self.is_ready.get() {
            self.fire_subscription(key, Reason::Locales(self.registered.borrow().clone()));
        }
        LocalizeHandle { key }
    }

    /// Add ids to a live subscription.
    ///
    /// Returns the newly resolved entities when the context is ready; their
    /// globals are unioned into the subscription's tracked set without
    /// disturbing already-tracked ones.
    pub fn extend(
        &self,
        handle: &LocalizeHandle,
        new_ids: &[&str],
    ) -> Result<Option<BTreeMap<String, EntityValue>>, ContextError> {
        let ids = {
            let retranslation = self.retranslation.borrow();
            retranslation
                .subscription(handle.key)
                .map(|sub| sub.ids.clone())
        };
        let Some(ids) = ids else {
            return Ok(None);
        };
        {
            let mut ids = ids.borrow_mut();
            for id in new_ids {
                if !ids.iter().any(|existing| existing == id) {
                    ids.push((*id).to_string());
                }
            }
        }
        if !self.is_ready.get() {
            return Ok(None);
        }
        let requested: Vec<String> = new_ids.iter().map(ToString::to_string).collect();
        let many = self.get_many(&requested)?;
        self.retranslation
            .borrow_mut()
            .rebind(handle.key, many.globals_used, true, &self.globals);
        Ok(Some(many.entities))
    }

    /// Run the callback once the context is ready (immediately if it
    /// already is), and again on every later transition to ready.
    pub fn ready(&self, callback: impl Fn() + 'static) {
        let callback: Rc<dyn Fn()> = Rc::new(callback);
        if self.is_ready.get() {
            callback();
        }
        self.ready_listeners.borrow_mut().push(callback);
    }

    /// Report a change of a dynamic global.
    ///
    /// Platform change sources (timers, resize handlers) call this; every
    /// subscription whose last resolution read the global re-resolves and
    /// re-fires with the global as its reason.
    pub fn handle_global_change(&self, id: &str) {
        self.globals.refresh(id);
        let keys = self.retranslation.borrow().dependents_of(id);
        for key in keys {
            self.fire_subscription(key, Reason::Global(id.to_string()));
        }
    }

    /// Current reference count of a dynamic global across all live
    /// subscriptions.
    pub fn global_ref_count(&self, id: &str) -> usize {
        self.retranslation.borrow().count(id)
    }

    /// Re-resolve a subscription's ids, update its tracked globals, and
    /// invoke its callback.
    fn fire_subscription(&self, key: usize, reason: Reason) {
        let handles = {
            let retranslation = self.retranslation.borrow();
            retranslation
                .subscription(key)
                .map(|sub| (sub.ids.clone(), sub.callback.clone()))
        };
        let Some((ids, callback)) = handles else {
            return;
        };
        let snapshot = ids.borrow().clone();
        let many = match self.get_many(&snapshot) {
            Ok(many) => many,
            Err(err) => {
                self.emit_debug(format!("retranslation failed: {err}"));
                return;
            }
        };
        self.retranslation
            .borrow_mut()
            .rebind(key, many.globals_used, false, &self.globals);
        let localized = Localized {
            entities: many.entities,
            reason,
        };
        (callback.borrow_mut())(&localized);
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Listen for diagnostics: parse errors, per-entry compilation
    /// failures, evaluation errors, and fallback misses.
    pub fn add_error_listener(&self, listener: impl Fn(&ErrorEvent) + 'static) -> ListenerId {
        self.error_emitter.add_listener(listener)
    }

    pub fn remove_error_listener(&self, id: ListenerId) -> bool {
        self.error_emitter.remove_listener(id)
    }

    /// Listen for non-fatal build notes, e.g. import fetch failures.
    pub fn add_debug_listener(&self, listener: impl Fn(&String) + 'static) -> ListenerId {
        self.debug_emitter.add_listener(listener)
    }

    pub fn remove_debug_listener(&self, id: ListenerId) -> bool {
        self.debug_emitter.remove_listener(id)
    }

    fn emit_error(&self, event: ErrorEvent) {
        log::warn!("{event}");
        self.error_emitter.emit(&event);
    }

    fn emit_debug(&self, message: String) {
        log::debug!("{message}");
        self.debug_emitter.emit(&message);
    }

    fn emit_diagnostics(&self, diagnostics: Vec<BuildDiagnostic>) {
        for diagnostic in diagnostics {
            match diagnostic {
                BuildDiagnostic::Parser(err) => self.emit_error(ErrorEvent::Parser(err)),
                BuildDiagnostic::Compilation(err) => self.emit_error(ErrorEvent::Compilation(err)),
                // a missing import degrades to empty source; report it
                // without failing the build
                BuildDiagnostic::Io(err) => self.emit_debug(format!("{err}")),
            }
        }
    }
}
