use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use brightpath_core::{BoundedContext, CorrelationId, EventId};

use crate::event::Event;
use crate::event_type::EventType;
use crate::payload::Payload;

/// Drives log severity when dispatching an event fails.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    #[default]
    Normal,
    Critical,
}

impl Criticality {
    pub fn is_critical(self) -> bool {
        matches!(self, Criticality::Critical)
    }
}

/// Construction options recognized by both envelope flavors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOptions {
    pub criticality: Criticality,
    pub correlation_id: Option<CorrelationId>,
}

impl EventOptions {
    pub fn critical(mut self) -> Self {
        self.criticality = Criticality::Critical;
        self
    }

    pub fn correlated(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// Both flavors share one shape; only their role differs.
macro_rules! envelope {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            event_id: EventId,
            event_type: EventType,
            aggregate_id: String,
            source: BoundedContext,
            payload: Payload,
            #[serde(default)]
            criticality: Criticality,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            correlation_id: Option<CorrelationId>,
            occurred_at: DateTime<Utc>,
        }

        impl $name {
            /// Build an envelope with default options (`normal` criticality,
            /// no correlation id).
            pub fn new(
                event_type: EventType,
                aggregate_id: impl Into<String>,
                source: BoundedContext,
                payload: Payload,
            ) -> Self {
                Self::with_options(event_type, aggregate_id, source, payload, EventOptions::default())
            }

            /// Build an envelope; `event_id` and `occurred_at` are filled here.
            pub fn with_options(
                event_type: EventType,
                aggregate_id: impl Into<String>,
                source: BoundedContext,
                payload: Payload,
                options: EventOptions,
            ) -> Self {
                Self {
                    event_id: EventId::new(),
                    event_type,
                    aggregate_id: aggregate_id.into(),
                    source,
                    payload,
                    criticality: options.criticality,
                    correlation_id: options.correlation_id,
                    occurred_at: Utc::now(),
                }
            }

            pub fn event_id(&self) -> EventId {
                self.event_id
            }

            pub fn event_type(&self) -> &EventType {
                &self.event_type
            }

            pub fn aggregate_id(&self) -> &str {
                &self.aggregate_id
            }

            pub fn source(&self) -> BoundedContext {
                self.source
            }

            pub fn payload(&self) -> &Payload {
                &self.payload
            }

            pub fn criticality(&self) -> Criticality {
                self.criticality
            }

            pub fn correlation_id(&self) -> Option<CorrelationId> {
                self.correlation_id
            }

            pub fn occurred_at(&self) -> DateTime<Utc> {
                self.occurred_at
            }
        }

        impl Event for $name {
            fn event_id(&self) -> EventId {
                self.event_id
            }

            fn event_type(&self) -> &EventType {
                &self.event_type
            }

            fn aggregate_id(&self) -> &str {
                &self.aggregate_id
            }

            fn source(&self) -> BoundedContext {
                self.source
            }

            fn payload(&self) -> &Payload {
                &self.payload
            }

            fn criticality(&self) -> Criticality {
                self.criticality
            }

            fn correlation_id(&self) -> Option<CorrelationId> {
                self.correlation_id
            }

            fn occurred_at(&self) -> DateTime<Utc> {
                self.occurred_at
            }
        }
    };
}

envelope! {
    /// A fact about a state change inside one bounded context, dispatched
    /// synchronously to that context's in-process handlers.
    DomainEvent
}

envelope! {
    /// A domain event promoted across a context boundary and published on the
    /// pub/sub transport.
    IntegrationEvent
}

impl IntegrationEvent {
    /// Promote a domain event, rewriting its source to the promoting context.
    ///
    /// The integration event gets its own id and timestamp. It keeps the
    /// domain event's correlation id, or is correlated by the domain event id
    /// when there was none.
    pub fn promote(domain: &DomainEvent, source: BoundedContext) -> Self {
        let correlation_id = domain
            .correlation_id()
            .unwrap_or_else(|| CorrelationId::from(domain.event_id()));
        Self::with_options(
            domain.event_type().clone(),
            domain.aggregate_id(),
            source,
            domain.payload().clone(),
            EventOptions {
                criticality: domain.criticality(),
                correlation_id: Some(correlation_id),
            },
        )
    }
}
