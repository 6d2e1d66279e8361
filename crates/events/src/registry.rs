//! Priority-ordered handler table.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatch::{DispatchFailure, DispatchResult, handler_name, invoke};
use crate::event::Event;
use crate::event_type::EventType;
use crate::handler::EventHandler;

/// Priority of a registration that does not ask for one.
pub const DEFAULT_PRIORITY: i32 = 0;

/// A handler registered for one event type.
///
/// Higher priority runs first; equal priorities run in registration order.
pub struct Registration<E> {
    event_type: EventType,
    handler: Arc<dyn EventHandler<E>>,
    priority: i32,
}

impl<E> Registration<E> {
    pub fn new<H>(event_type: EventType, handler: H) -> Self
    where
        H: EventHandler<E> + 'static,
    {
        Self::shared(event_type, Arc::new(handler))
    }

    /// Register a handler instance that is shared with other registrations.
    pub fn shared(event_type: EventType, handler: Arc<dyn EventHandler<E>>) -> Self {
        Self {
            event_type,
            handler,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn handler(&self) -> &Arc<dyn EventHandler<E>> {
        &self.handler
    }

    /// See [`handler_name`](crate::dispatch::handler_name).
    pub fn handler_name(&self) -> String {
        handler_name(self.handler.as_ref())
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

impl<E> Clone for Registration<E> {
    fn clone(&self) -> Self {
        Self {
            event_type: self.event_type.clone(),
            handler: Arc::clone(&self.handler),
            priority: self.priority,
        }
    }
}

impl<E> core::fmt::Debug for Registration<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registration")
            .field("event_type", &self.event_type)
            .field("handler", &self.handler_name())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Handlers of one bounded context, keyed by event type.
///
/// Each list is kept sorted by descending priority; the sort is stable, so
/// registration order breaks ties.
pub struct HandlerTable<E> {
    by_type: HashMap<EventType, Vec<Registration<E>>>,
}

impl<E> Default for HandlerTable<E> {
    fn default() -> Self {
        Self {
            by_type: HashMap::new(),
        }
    }
}

impl<E> HandlerTable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, registration: Registration<E>) {
        let list = self
            .by_type
            .entry(registration.event_type.clone())
            .or_default();
        list.push(registration);
        list.sort_by_key(|r| Reverse(r.priority));
    }

    /// Handlers for `event_type`, in invocation order.
    pub fn handlers_for(&self, event_type: &EventType) -> &[Registration<E>] {
        self.by_type
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Total number of registrations across all event types.
    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }
}

impl<E: Event> HandlerTable<E> {
    /// Invoke every handler registered for the event's type, in order, one at
    /// a time. A failing or crashing handler never stops the ones after it.
    pub fn dispatch(&self, event: &E) -> DispatchResult {
        let failures: Vec<DispatchFailure> = self
            .handlers_for(event.event_type())
            .iter()
            .filter_map(|registration| invoke(registration.handler.as_ref(), event).err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }
}

impl<E> Extend<Registration<E>> for HandlerTable<E> {
    fn extend<I: IntoIterator<Item = Registration<E>>>(&mut self, iter: I) {
        for registration in iter {
            self.insert(registration);
        }
    }
}

impl<E> FromIterator<Registration<E>> for HandlerTable<E> {
    fn from_iter<I: IntoIterator<Item = Registration<E>>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}
