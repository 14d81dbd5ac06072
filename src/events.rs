//! Synchronous observer registry.
//!
//! Components own a [`Listeners`] list and expose `subscribe`/`unsubscribe`
//! on top of it. Emission is in-line on the caller's thread, in
//! registration order, and completes before `emit` returns, so handlers
//! must stay short: a slow handler stalls the frame.

use std::fmt;

/// Token returned by `subscribe`, used to remove the handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler<P> = Box<dyn FnMut(&P) + Send>;

/// Listener list keyed by event kind.
pub struct Listeners<K, P> {
    next_id: u64,
    entries: Vec<(SubscriptionId, K, Handler<P>)>,
}

impl<K: PartialEq, P> Listeners<K, P> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Register `handler` for events of `kind`.
    pub fn subscribe<F>(&mut self, kind: K, handler: F) -> SubscriptionId
    where
        F: FnMut(&P) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, kind, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Deliver `payload` to every handler registered for `kind`.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&mut self, kind: &K, payload: &P) -> usize {
        let mut delivered = 0;
        for (_, entry_kind, handler) in self.entries.iter_mut() {
            if entry_kind == kind {
                handler(payload);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: PartialEq, P> Default for Listeners<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> fmt::Debug for Listeners<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, PartialEq)]
    enum Kind {
        A,
        B,
    }

    #[test]
    fn emit_reaches_only_matching_kind() {
        let mut listeners: Listeners<Kind, u32> = Listeners::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        listeners.subscribe(Kind::A, move |v| sink.lock().unwrap().push(("a", *v)));
        let sink = Arc::clone(&seen);
        listeners.subscribe(Kind::B, move |v| sink.lock().unwrap().push(("b", *v)));

        assert_eq!(listeners.emit(&Kind::A, &7), 1);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 7)]);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let mut listeners: Listeners<Kind, u32> = Listeners::new();
        let count = Arc::new(Mutex::new(0));

        let sink = Arc::clone(&count);
        let id = listeners.subscribe(Kind::A, move |_| *sink.lock().unwrap() += 1);
        listeners.emit(&Kind::A, &1);
        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));
        listeners.emit(&Kind::A, &1);

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let mut listeners: Listeners<Kind, ()> = Listeners::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let sink = Arc::clone(&order);
            listeners.subscribe(Kind::B, move |_| sink.lock().unwrap().push(i));
        }
        listeners.emit(&Kind::B, &());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
