//! Domain & integration events: envelopes, handlers and pub/sub mechanics.
//!
//! Everything in this crate is pure mechanics (no threads, no IO). Runtime
//! pieces (bus actors, subscriber workers, transports) live in
//! `brightpath-infra`.

pub mod bus;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod event;
pub mod event_type;
pub mod handler;
pub mod in_memory_bus;
pub mod payload;
pub mod registry;
pub mod retry;
pub mod topic;
pub mod wire;

pub use bus::{Delivery, PubSub, Subscription};
pub use dispatch::{DispatchFailure, DispatchResult, Handled, UNNAMED_HANDLER, handler_name, invoke};
pub use envelope::{Criticality, DomainEvent, EventOptions, IntegrationEvent};
pub use error::EnvelopeError;
pub use event::Event;
pub use event_type::EventType;
pub use handler::{EventHandler, FnHandler, HandlerError, HandlerOutcome, handler_fn};
pub use in_memory_bus::{InMemoryPubSub, InMemoryPubSubError};
pub use payload::Payload;
pub use registry::{DEFAULT_PRIORITY, HandlerTable, Registration};
pub use retry::{RetryContext, RetryOutcome, Retrier, retry_with_backoff};
pub use topic::Topic;
pub use wire::{MessageTag, WireEvent, WireMessage};
