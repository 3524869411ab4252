//! Integration tests for subscriptions, dynamic globals, and reference
//! counting.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use l20n::global::{Global, GlobalError, GlobalRegistry};
use l20n::types::Data;
use l20n::{Context, Localized, MemoryLoader, Reason};

/// A controllable dynamic global for tests, with activation counters.
struct TickGlobal {
    value: Rc<Cell<i64>>,
    activations: Rc<Cell<usize>>,
    deactivations: Rc<Cell<usize>>,
}

#[derive(Clone)]
struct TickHandle {
    value: Rc<Cell<i64>>,
    activations: Rc<Cell<usize>>,
    deactivations: Rc<Cell<usize>>,
}

fn tick_global() -> (TickGlobal, TickHandle) {
    let value = Rc::new(Cell::new(1));
    let activations = Rc::new(Cell::new(0));
    let deactivations = Rc::new(Cell::new(0));
    let global = TickGlobal {
        value: value.clone(),
        activations: activations.clone(),
        deactivations: deactivations.clone(),
    };
    let handle = TickHandle {
        value,
        activations,
        deactivations,
    };
    (global, handle)
}

impl Global for TickGlobal {
    fn id(&self) -> &str {
        "tick"
    }

    fn value(&mut self) -> Result<Data, GlobalError> {
        Ok(Data::from(self.value.get()))
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn activate(&mut self) {
        self.activations.set(self.activations.get() + 1);
    }

    fn deactivate(&mut self) {
        self.deactivations.set(self.deactivations.get() + 1);
    }
}

fn tick_context(source: &str) -> (Context, TickHandle) {
    let (global, handle) = tick_global();
    let mut registry = GlobalRegistry::new();
    registry.register(Box::new(global));
    let ctx = Context::builder().globals(registry).build();
    ctx.add_resource(source).unwrap();
    (ctx, handle)
}

fn record(log: &Rc<RefCell<Vec<(Reason, String)>>>) -> impl FnMut(&Localized) + 'static {
    let log = log.clone();
    move |localized: &Localized| {
        let value = localized
            .entities
            .values()
            .next()
            .and_then(|entity| entity.value.clone())
            .unwrap_or_default();
        log.borrow_mut().push((localized.reason.clone(), value));
    }
}

// =============================================================================
// Subscription lifecycle
// =============================================================================

#[test]
fn localize_fires_synchronously_when_ready() {
    let (ctx, _handle) = tick_context(r#"<now "t{{ @tick }}">"#);
    ctx.freeze().unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    ctx.localize(&["now"], record(&log));
    let entries = log.borrow();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, Reason::Locales(Vec::new()));
    assert_eq!(entries[0].1, "t1");
}

#[test]
fn localize_before_readiness_fires_once_ready() {
    let (ctx, _handle) = tick_context(r#"<now "t{{ @tick }}">"#);
    let log = Rc::new(RefCell::new(Vec::new()));
    ctx.localize(&["now"], record(&log));
    assert!(log.borrow().is_empty());
    ctx.freeze().unwrap();
    assert_eq!(log.borrow().len(), 1);
}

// =============================================================================
// Reference counting
// =============================================================================

#[test]
fn reading_a_global_activates_its_change_source_once() {
    let (ctx, handle) = tick_context(r#"<now "t{{ @tick }}">"#);
    ctx.freeze().unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    ctx.localize(&["now"], record(&log));
    assert_eq!(ctx.global_ref_count("tick"), 1);
    assert_eq!(handle.activations.get(), 1);
    assert_eq!(handle.deactivations.get(), 0);
}

#[test]
fn a_global_change_refires_dependent_subscriptions() {
    let (ctx, handle) = tick_context(r#"<now "t{{ @tick }}">"#);
    ctx.freeze().unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    ctx.localize(&["now"], record(&log));

    handle.value.set(2);
    ctx.handle_global_change("tick");

    let entries = log.borrow();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].0, Reason::Global("tick".to_string()));
    assert_eq!(entries[1].1, "t2");
}

#[test]
fn subscriptions_that_stop_reading_a_global_release_it() {
    let source = r#"
        <tick_msg "t{{ @tick }}">
        <maybe "{{ $quiet ? 'silent' : tick_msg }}">
    "#;
    let (ctx, handle) = tick_context(source);
    ctx.set_data("quiet", false);
    ctx.freeze().unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    ctx.localize(&["maybe"], record(&log));
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(log.borrow()[0].1, "t1");
    assert_eq!(ctx.global_ref_count("tick"), 1);

    // the re-resolution no longer reads @tick: its dependency set empties,
    // the count returns to zero, and deactivate runs exactly once
    ctx.set_data("quiet", true);
    handle.value.set(2);
    ctx.handle_global_change("tick");
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(log.borrow()[1].1, "silent");
    assert_eq!(ctx.global_ref_count("tick"), 0);
    assert_eq!(handle.deactivations.get(), 1);

    // with nothing depending on it, further changes are ignored
    ctx.handle_global_change("tick");
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(handle.deactivations.get(), 1);
}

#[test]
fn two_subscriptions_share_one_activation() {
    let (ctx, handle) = tick_context(r#"<now "t{{ @tick }}">"#);
    ctx.freeze().unwrap();
    let first = Rc::new(RefCell::new(Vec::new()));
    let second = Rc::new(RefCell::new(Vec::new()));
    ctx.localize(&["now"], record(&first));
    ctx.localize(&["now"], record(&second));
    assert_eq!(ctx.global_ref_count("tick"), 2);
    assert_eq!(handle.activations.get(), 1);

    ctx.handle_global_change("tick");
    assert_eq!(first.borrow().len(), 2);
    assert_eq!(second.borrow().len(), 2);
}

// =============================================================================
// Extending subscriptions
// =============================================================================

#[test]
fn extend_resolves_new_ids_and_unions_their_globals() {
    let source = r#"
        <plain "no globals here">
        <now "t{{ @tick }}">
    "#;
    let (ctx, handle) = tick_context(source);
    ctx.freeze().unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    let subscription = ctx.localize(&["plain"], record(&log));
    assert_eq!(ctx.global_ref_count("tick"), 0);

    let added = ctx.extend(&subscription, &["now"]).unwrap().unwrap();
    assert_eq!(added["now"].value.as_deref(), Some("t1"));
    assert_eq!(ctx.global_ref_count("tick"), 1);
    assert_eq!(handle.activations.get(), 1);

    // the extended subscription now re-fires on tick changes
    handle.value.set(5);
    ctx.handle_global_change("tick");
    assert_eq!(log.borrow().len(), 2);
}

// =============================================================================
// Locale changes
// =============================================================================

#[test]
fn locale_changes_refire_every_subscription() {
    let mut loader = MemoryLoader::new();
    loader.add("en/app.lol", r#"<foo "english">"#);
    loader.add("fr/app.lol", r#"<foo "français">"#);
    let ctx = Context::builder().loader(Box::new(loader)).build();
    ctx.register_locales(["en"]).unwrap();
    ctx.link_resource_template(|code| format!("{code}/app.lol"))
        .unwrap();
    ctx.freeze().unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    ctx.localize(&["foo"], record(&log));
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(log.borrow()[0].1, "english");

    ctx.register_locales(["fr", "en"]).unwrap();
    let entries = log.borrow();
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[1].0,
        Reason::Locales(vec!["fr".to_string(), "en".to_string()])
    );
    assert_eq!(entries[1].1, "français");
}
