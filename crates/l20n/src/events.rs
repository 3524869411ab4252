//! Listener registration and dispatch.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Identifies a registered listener so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(usize);

/// A single-threaded listener list.
///
/// Listeners are invoked in registration order. The list is snapshotted
/// before dispatch, so a listener may add or remove listeners without
/// affecting the emission in flight.
pub struct EventEmitter<E> {
    listeners: RefCell<Vec<(ListenerId, Rc<dyn Fn(&E)>)>>,
    next_id: Cell<usize>,
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        EventEmitter {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        EventEmitter::default()
    }

    pub fn add_listener(&self, listener: impl Fn(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was still registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Rc<dyn Fn(&E)>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_listeners_in_order() {
        let emitter = EventEmitter::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let first = seen.clone();
        emitter.add_listener(move |event: &u32| first.borrow_mut().push(*event));
        let second = seen.clone();
        emitter.add_listener(move |event: &u32| second.borrow_mut().push(event + 1));
        emitter.emit(&7);
        assert_eq!(*seen.borrow(), vec![7, 8]);
    }

    #[test]
    fn removed_listeners_stop_firing() {
        let emitter = EventEmitter::new();
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        let id = emitter.add_listener(move |_: &()| counter.set(counter.get() + 1));
        emitter.emit(&());
        assert!(emitter.remove_listener(id));
        emitter.emit(&());
        assert_eq!(seen.get(), 1);
        assert!(!emitter.remove_listener(id));
    }
}
