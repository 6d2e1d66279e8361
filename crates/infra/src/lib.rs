//! Event dispatch runtime: per-context bus actors, subscriber workers,
//! integration event promotion, configuration and transports.

pub mod broadcast;
pub mod config;
pub mod dispatch_helper;
pub mod domain_bus;
pub mod error;
pub mod event_system;
pub mod promotion;
pub mod subscriber;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use broadcast::DomainEventBroadcaster;
pub use config::{ConfigError, EventingConfig, TransportKind};
pub use dispatch_helper::EventDispatchHelper;
pub use domain_bus::{DomainEventBus, DomainEventBusHandle, DomainEventBuses, DomainEventDispatcher};
pub use error::EventingError;
pub use event_system::{EventSystem, EventSystemBuilder};
pub use promotion::{IntegrationEventPromoter, PROMOTION_PRIORITY};
pub use subscriber::{EventSubscriber, SubscriberBinding, SubscriberHandle, SubscriberStats};
