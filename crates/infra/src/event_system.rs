//! Event system bootstrap.
//!
//! ```ignore
//! let system = EventSystemBuilder::new(transport, config)
//!     .promote(BoundedContext::Accounts, [known::USER_REGISTERED])
//!     .context(BoundedContext::Enrollment, enrollment_registrations)
//!     .subscriber(SubscriberBinding::new(create_profile, [topic]))
//!     .start()?;
//!
//! system.dispatch(&event, BoundedContext::Accounts);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use brightpath_core::BoundedContext;
use brightpath_events::{DomainEvent, EventType, PubSub, Registration, Topic, WireEvent, WireMessage};

use crate::broadcast::DomainEventBroadcaster;
use crate::config::EventingConfig;
use crate::dispatch_helper::EventDispatchHelper;
use crate::domain_bus::DomainEventBuses;
use crate::error::EventingError;
use crate::promotion::IntegrationEventPromoter;
use crate::subscriber::{EventSubscriber, SubscriberBinding, SubscriberHandle, SubscriberStats};

type PendingSubscriber<T> =
    Box<dyn FnOnce(&T, Duration) -> Result<SubscriberHandle, EventingError> + Send>;

pub struct EventSystemBuilder<T> {
    transport: Arc<T>,
    config: EventingConfig,
    registrations: BTreeMap<BoundedContext, Vec<Registration<DomainEvent>>>,
    subscribers: Vec<PendingSubscriber<T>>,
}

impl<T> EventSystemBuilder<T>
where
    T: PubSub<WireMessage> + 'static,
{
    pub fn new(transport: Arc<T>, config: EventingConfig) -> Self {
        Self {
            transport,
            config,
            registrations: BTreeMap::new(),
            subscribers: Vec::new(),
        }
    }

    /// Seed a context's bus with `registrations`.
    pub fn context<I>(mut self, context: BoundedContext, registrations: I) -> Self
    where
        I: IntoIterator<Item = Registration<DomainEvent>>,
    {
        self.registrations
            .entry(context)
            .or_default()
            .extend(registrations);
        self
    }

    /// Promote `event_types` raised in `context` to integration events.
    pub fn promote<I>(self, context: BoundedContext, event_types: I) -> Self
    where
        I: IntoIterator<Item = EventType>,
    {
        let promoter = Arc::new(IntegrationEventPromoter::new(
            context,
            Arc::clone(&self.transport),
            event_types,
        ));
        self.context(context, promoter.registrations())
    }

    /// Broadcast `event_types` raised in `context` to the topic `resolve`
    /// picks.
    pub fn broadcast<I, F>(self, context: BoundedContext, event_types: I, resolve: F) -> Self
    where
        I: IntoIterator<Item = EventType>,
        F: Fn(&DomainEvent) -> Option<Topic> + Send + Sync + 'static,
    {
        let broadcaster: Arc<DomainEventBroadcaster<Arc<T>>> = Arc::new(DomainEventBroadcaster::new(
            format!("{context}_broadcaster"),
            Arc::clone(&self.transport),
            resolve,
        ));
        let registrations: Vec<_> = event_types
            .into_iter()
            .map(|event_type| Registration::shared(event_type, broadcaster.clone()))
            .collect();
        self.context(context, registrations)
    }

    pub fn subscriber<E: WireEvent>(mut self, binding: SubscriberBinding<E>) -> Self {
        self.subscribers
            .push(Box::new(move |transport: &T, poll_interval: Duration| {
                EventSubscriber::spawn(binding, transport, poll_interval)
            }));
        self
    }

    /// Spawn every bus and subscriber. On failure, whatever already started
    /// is stopped again.
    pub fn start(self) -> Result<EventSystem<T>, EventingError> {
        let buses = DomainEventBuses::spawn_all(self.registrations)?;

        let poll_interval = self.config.subscriber_poll_interval;
        let mut subscribers = Vec::with_capacity(self.subscribers.len());
        for pending in self.subscribers {
            match pending(self.transport.as_ref(), poll_interval) {
                Ok(handle) => subscribers.push(handle),
                Err(err) => {
                    for handle in subscribers {
                        handle.shutdown();
                    }
                    buses.shutdown();
                    return Err(err);
                }
            }
        }

        info!(
            contexts = buses.len(),
            subscribers = subscribers.len(),
            transport = ?self.config.transport,
            "event system started"
        );

        Ok(EventSystem {
            helper: EventDispatchHelper::new(buses),
            transport: self.transport,
            subscribers,
            config: self.config,
        })
    }
}

/// Running buses and subscribers sharing one transport.
pub struct EventSystem<T> {
    helper: EventDispatchHelper<DomainEventBuses>,
    transport: Arc<T>,
    subscribers: Vec<SubscriberHandle>,
    config: EventingConfig,
}

impl<T> EventSystem<T>
where
    T: PubSub<WireMessage> + 'static,
{
    /// Dispatch on `context`'s bus; failures are logged, never returned.
    pub fn dispatch(&self, event: &DomainEvent, context: BoundedContext) {
        self.helper.dispatch(event, context);
    }

    /// Register a handler on a running bus.
    pub fn subscribe(
        &self,
        context: BoundedContext,
        registration: Registration<DomainEvent>,
    ) -> Result<(), EventingError> {
        self.buses().subscribe(context, registration)
    }

    pub fn buses(&self) -> &DomainEventBuses {
        self.helper.dispatcher()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn config(&self) -> &EventingConfig {
        &self.config
    }

    /// `(subscriber name, counters)` for every subscriber, in start order.
    pub fn subscriber_stats(&self) -> Vec<(String, SubscriberStats)> {
        self.subscribers
            .iter()
            .map(|s| (s.name().to_string(), s.stats()))
            .collect()
    }

    /// Stop subscribers first, then the buses.
    pub fn shutdown(self) {
        for subscriber in self.subscribers {
            subscriber.shutdown();
        }
        self.helper.dispatcher().shutdown();
        info!("event system stopped");
    }
}

impl<T> core::fmt::Debug for EventSystem<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventSystem")
            .field("buses", self.helper.dispatcher())
            .field("subscribers", &self.subscribers)
            .field("config", &self.config)
            .finish()
    }
}
