//! Wire shape of messages on the pub/sub transport.
//!
//! Domain-event and integration-event messages share one transport; the tag
//! tells subscribers which flavor they are looking at:
//!
//! ```json
//! {"tag": "integration_event", "event": { ... }}
//! ```

use serde::{Deserialize, Serialize};

use crate::envelope::{DomainEvent, IntegrationEvent};
use crate::event::Event;

/// Discriminator of a [`WireMessage`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageTag {
    DomainEvent,
    IntegrationEvent,
}

impl core::fmt::Display for MessageTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MessageTag::DomainEvent => f.write_str("domain_event"),
            MessageTag::IntegrationEvent => f.write_str("integration_event"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", content = "event", rename_all = "snake_case")]
pub enum WireMessage {
    DomainEvent(DomainEvent),
    IntegrationEvent(IntegrationEvent),
}

impl WireMessage {
    pub fn tag(&self) -> MessageTag {
        match self {
            WireMessage::DomainEvent(_) => MessageTag::DomainEvent,
            WireMessage::IntegrationEvent(_) => MessageTag::IntegrationEvent,
        }
    }
}

/// An envelope flavor that travels inside a [`WireMessage`].
pub trait WireEvent: Event {
    const TAG: MessageTag;

    /// Unwrap a message carrying this flavor; `None` for the other tag.
    fn from_wire(message: WireMessage) -> Option<Self>;

    fn into_wire(self) -> WireMessage;
}

impl WireEvent for DomainEvent {
    const TAG: MessageTag = MessageTag::DomainEvent;

    fn from_wire(message: WireMessage) -> Option<Self> {
        match message {
            WireMessage::DomainEvent(event) => Some(event),
            WireMessage::IntegrationEvent(_) => None,
        }
    }

    fn into_wire(self) -> WireMessage {
        WireMessage::DomainEvent(self)
    }
}

impl WireEvent for IntegrationEvent {
    const TAG: MessageTag = MessageTag::IntegrationEvent;

    fn from_wire(message: WireMessage) -> Option<Self> {
        match message {
            WireMessage::IntegrationEvent(event) => Some(event),
            WireMessage::DomainEvent(_) => None,
        }
    }

    fn into_wire(self) -> WireMessage {
        WireMessage::IntegrationEvent(self)
    }
}
