//! Synchronous in-process event bus.
//!
//! Handlers run on the caller's thread, in registration order, before
//! `emit` returns. A panicking handler is logged and skipped; it never stops
//! delivery to the handlers registered after it.

use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::domain::{EngineEvent, EventKind};

/// Handle returned by [`EventBus::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&EngineEvent)>;

struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

/// Ordered list of event subscribers
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&EngineEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            kind,
            handler: Box::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns false if it was not registered for `kind`.
    pub fn off(&mut self, kind: EventKind, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers
            .retain(|s| !(s.id == id && s.kind == kind));
        self.subscribers.len() != before
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// Returns the number of handlers that panicked.
    pub fn emit(&mut self, event: &EngineEvent) -> usize {
        let kind = event.kind();
        let mut failures = 0;

        for subscriber in self.subscribers.iter_mut().filter(|s| s.kind == kind) {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (subscriber.handler)(event)));
            if outcome.is_err() {
                failures += 1;
                warn!(event = %kind, subscription = subscriber.id.0, "Event handler panicked");
            }
        }

        failures
    }

    /// Number of handlers registered for `kind`
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.iter().filter(|s| s.kind == kind).count()
    }
}
