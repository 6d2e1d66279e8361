//! Integration Event Promotion.
//!
//! A promoter sits on one context's bus and republishes selected domain
//! events as integration events on `integration:<context>:<event_type>`.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use brightpath_core::BoundedContext;
use brightpath_events::{
    DomainEvent, EventHandler, EventType, HandlerError, HandlerOutcome, IntegrationEvent, PubSub,
    Registration, Topic, WireEvent, WireMessage,
};

/// Promoters run before the context's own handlers.
pub const PROMOTION_PRIORITY: i32 = 100;

pub struct IntegrationEventPromoter<T> {
    name: String,
    context: BoundedContext,
    event_types: BTreeSet<EventType>,
    transport: T,
}

impl<T: PubSub<WireMessage>> IntegrationEventPromoter<T> {
    pub fn new<I>(context: BoundedContext, transport: T, event_types: I) -> Self
    where
        I: IntoIterator<Item = EventType>,
    {
        Self {
            name: format!("{context}_integration_promoter"),
            context,
            event_types: event_types.into_iter().collect(),
            transport,
        }
    }

    pub fn context(&self) -> BoundedContext {
        self.context
    }

    pub fn promotes(&self, event_type: &EventType) -> bool {
        self.event_types.contains(event_type)
    }

    /// One registration per promoted event type, all at
    /// [`PROMOTION_PRIORITY`] and sharing this promoter.
    pub fn registrations(self: Arc<Self>) -> Vec<Registration<DomainEvent>>
    where
        T: 'static,
    {
        let handler: Arc<dyn EventHandler<DomainEvent>> = self.clone();
        self.event_types
            .iter()
            .map(|event_type| {
                Registration::shared(event_type.clone(), Arc::clone(&handler))
                    .with_priority(PROMOTION_PRIORITY)
            })
            .collect()
    }
}

impl<T: PubSub<WireMessage>> EventHandler<DomainEvent> for IntegrationEventPromoter<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &DomainEvent) -> HandlerOutcome {
        if !self.promotes(event.event_type()) {
            return HandlerOutcome::Ignore;
        }

        let integration = IntegrationEvent::promote(event, self.context);
        let topic = Topic::integration(self.context, integration.event_type());
        let event_id = integration.event_id();

        match self.transport.publish(&topic, integration.into_wire()) {
            Ok(()) => {
                debug!(
                    topic = %topic,
                    event_id = %event_id,
                    domain_event_id = %event.event_id(),
                    "integration event published"
                );
                HandlerOutcome::Ok
            }
            Err(err) => HandlerOutcome::error(HandlerError::Transport(format!(
                "publish to {topic} failed: {err}"
            ))),
        }
    }
}

impl<T> core::fmt::Debug for IntegrationEventPromoter<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IntegrationEventPromoter")
            .field("context", &self.context)
            .field("event_types", &self.event_types)
            .finish()
    }
}
