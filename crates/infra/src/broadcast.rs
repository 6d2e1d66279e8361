//! Republishes in-process domain events on UI notification topics.

use tracing::debug;

use brightpath_events::{
    DomainEvent, EventHandler, HandlerError, HandlerOutcome, PubSub, Topic, WireEvent, WireMessage,
};

type TopicResolver = Box<dyn Fn(&DomainEvent) -> Option<Topic> + Send + Sync>;

/// Handler that pushes a domain event to the topic its resolver picks, e.g.
/// `conversation:<id>` for a sent message. Events without a topic are
/// ignored.
pub struct DomainEventBroadcaster<T> {
    name: String,
    transport: T,
    resolve: TopicResolver,
}

impl<T: PubSub<WireMessage>> DomainEventBroadcaster<T> {
    pub fn new<F>(name: impl Into<String>, transport: T, resolve: F) -> Self
    where
        F: Fn(&DomainEvent) -> Option<Topic> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            transport,
            resolve: Box::new(resolve),
        }
    }
}

impl<T: PubSub<WireMessage>> EventHandler<DomainEvent> for DomainEventBroadcaster<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &DomainEvent) -> HandlerOutcome {
        let Some(topic) = (self.resolve)(event) else {
            return HandlerOutcome::Ignore;
        };

        match self.transport.publish(&topic, event.clone().into_wire()) {
            Ok(()) => {
                debug!(
                    topic = %topic,
                    event_type = %event.event_type(),
                    event_id = %event.event_id(),
                    "domain event broadcast"
                );
                HandlerOutcome::Ok
            }
            Err(err) => HandlerOutcome::error(HandlerError::Transport(format!(
                "publish to {topic} failed: {err}"
            ))),
        }
    }
}

impl<T> core::fmt::Debug for DomainEventBroadcaster<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DomainEventBroadcaster")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use brightpath_core::BoundedContext;
    use brightpath_events::event_type::known;
    use brightpath_events::{InMemoryPubSub, Payload};

    use super::*;

    fn conversation_topic(event: &DomainEvent) -> Option<Topic> {
        event
            .payload()
            .get_str("conversation_id")
            .map(|id| Topic::entity("conversation", id))
    }

    #[test]
    fn publishes_on_the_resolved_topic() {
        let transport = Arc::new(InMemoryPubSub::<WireMessage>::new());
        let sub = transport.subscribe(&Topic::new("conversation:c-9"));
        let broadcaster =
            DomainEventBroadcaster::new("conversation_broadcaster", Arc::clone(&transport), conversation_topic);
        let event = DomainEvent::new(
            known::MESSAGE_SENT,
            "msg-1",
            BoundedContext::Messaging,
            Payload::new().with("conversation_id", "c-9"),
        );

        assert_eq!(broadcaster.handle(&event), HandlerOutcome::Ok);

        let delivery = sub.try_recv().unwrap();
        assert_eq!(delivery.message, WireMessage::DomainEvent(event));
    }

    #[test]
    fn unresolved_events_are_ignored() {
        let transport = Arc::new(InMemoryPubSub::<WireMessage>::new());
        let broadcaster = DomainEventBroadcaster::new("conversation_broadcaster", transport, conversation_topic);
        let event = DomainEvent::new(
            known::MESSAGE_SENT,
            "msg-1",
            BoundedContext::Messaging,
            Payload::new(),
        );
        assert_eq!(broadcaster.handle(&event), HandlerOutcome::Ignore);
    }
}
