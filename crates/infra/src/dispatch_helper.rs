//! Fire-and-log wrapper around bus dispatch.
//!
//! Use cases raise events through [`EventDispatchHelper::dispatch`] and never
//! see a handler failure: failures are logged once, at `WARN` for normal
//! events and `ERROR` for critical ones.

use tracing::{error, warn};

use brightpath_core::BoundedContext;
use brightpath_events::{Criticality, DispatchFailure, DomainEvent};

use crate::domain_bus::DomainEventDispatcher;

#[derive(Debug, Clone)]
pub struct EventDispatchHelper<D> {
    dispatcher: D,
}

impl<D: DomainEventDispatcher> EventDispatchHelper<D> {
    pub fn new(dispatcher: D) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatch(&self, event: &DomainEvent, context: BoundedContext) {
        if let Err(failures) = self.dispatcher.dispatch(context, event) {
            log_failures(event, context, &failures);
        }
    }
}

fn log_failures(event: &DomainEvent, context: BoundedContext, failures: &[DispatchFailure]) {
    let summary = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");

    match event.criticality() {
        Criticality::Critical => error!(
            event_type = %event.event_type(),
            event_id = %event.event_id(),
            context = %context,
            failure_count = failures.len(),
            failures = %summary,
            "critical event dispatch failed"
        ),
        Criticality::Normal => warn!(
            event_type = %event.event_type(),
            event_id = %event.event_id(),
            context = %context,
            failure_count = failures.len(),
            failures = %summary,
            "event dispatch had handler failures"
        ),
    }
}
