//! Event Subscriber: bridges the pub/sub transport to a single handler.
//!
//! One worker thread per binding:
//!
//! - subscribes to every topic of the binding before `spawn` returns
//! - unwraps messages carrying the binding's event flavor, skips the rest
//! - invokes the handler one message at a time, in arrival order
//! - logs handler errors and crashes; nothing is retried or redelivered
//! - stops on `shutdown()` or once its handle is dropped

use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, warn};

use brightpath_events::{
    Delivery, DispatchFailure, Event, EventHandler, Handled, MessageTag, PubSub, Subscription,
    Topic, WireEvent, WireMessage, handler_name, invoke,
};

use crate::error::EventingError;
use crate::supervisor::supervise;

/// A handler together with the topics it listens on.
pub struct SubscriberBinding<E> {
    name: String,
    handler: Arc<dyn EventHandler<E>>,
    topics: Vec<Topic>,
}

impl<E: WireEvent> SubscriberBinding<E> {
    pub fn new<H, I>(handler: H, topics: I) -> Self
    where
        H: EventHandler<E> + 'static,
        I: IntoIterator<Item = Topic>,
    {
        Self::shared(Arc::new(handler), topics)
    }

    pub fn shared<I>(handler: Arc<dyn EventHandler<E>>, topics: I) -> Self
    where
        I: IntoIterator<Item = Topic>,
    {
        let mut topics: Vec<Topic> = topics.into_iter().collect();
        topics.sort();
        topics.dedup();
        Self {
            name: handler_name(handler.as_ref()),
            handler,
            topics,
        }
    }

    /// Override the name used for the worker thread and in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Which wire flavor this binding consumes.
    pub fn message_tag(&self) -> MessageTag {
        E::TAG
    }
}

impl<E> core::fmt::Debug for SubscriberBinding<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriberBinding")
            .field("name", &self.name)
            .field("topics", &self.topics)
            .finish()
    }
}

/// Per-subscriber counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriberStats {
    pub received: u64,
    pub handled: u64,
    pub ignored: u64,
    pub failed: u64,
    pub crashed: u64,
    /// Messages of the other flavor.
    pub skipped: u64,
}

/// Handle to control and join a subscriber worker.
#[derive(Debug)]
pub struct SubscriberHandle {
    name: String,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<SubscriberStats>>,
}

impl SubscriberHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> SubscriberStats {
        match self.stats.lock() {
            Ok(stats) => *stats,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Request graceful shutdown and wait for the worker to stop. The worker
    /// drops its subscription on the way out.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

#[derive(Debug)]
pub struct EventSubscriber;

impl EventSubscriber {
    /// Subscribe `binding` to its topics on `transport` and start its worker.
    ///
    /// `poll_interval` bounds how long a shutdown request waits for the
    /// worker to notice it.
    pub fn spawn<E, T>(
        binding: SubscriberBinding<E>,
        transport: &T,
        poll_interval: Duration,
    ) -> Result<SubscriberHandle, EventingError>
    where
        E: WireEvent,
        T: PubSub<WireMessage> + ?Sized,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(SubscriberStats::default()));
        let subscription = transport.subscribe_all(binding.topics());

        let name = binding.name.clone();
        let worker_stats = Arc::clone(&stats);
        let join = thread::Builder::new()
            .name(format!("subscriber-{name}"))
            .spawn(move || {
                subscriber_loop(binding, subscription, shutdown_rx, poll_interval, &worker_stats)
            })
            .map_err(|source| EventingError::Spawn {
                name: name.clone(),
                source,
            })?;

        debug!(subscriber = %name, "event subscriber started");

        Ok(SubscriberHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

fn subscriber_loop<E: WireEvent>(
    binding: SubscriberBinding<E>,
    subscription: Subscription<WireMessage>,
    shutdown_rx: mpsc::Receiver<()>,
    poll_interval: Duration,
    stats: &Mutex<SubscriberStats>,
) {
    let actor = format!("subscriber-{}", binding.name);
    supervise(&actor, || {
        poll_messages(&binding, &subscription, &shutdown_rx, poll_interval, stats)
    });

    debug!(subscriber = %binding.name, "event subscriber stopped");
}

fn poll_messages<E: WireEvent>(
    binding: &SubscriberBinding<E>,
    subscription: &Subscription<WireMessage>,
    shutdown_rx: &mpsc::Receiver<()>,
    poll_interval: Duration,
    stats: &Mutex<SubscriberStats>,
) {
    loop {
        // A dropped handle counts as a shutdown request.
        match shutdown_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => return,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        match subscription.recv_timeout(poll_interval) {
            Ok(delivery) => process(binding, delivery, stats),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn process<E: WireEvent>(
    binding: &SubscriberBinding<E>,
    delivery: Delivery<WireMessage>,
    stats: &Mutex<SubscriberStats>,
) {
    record(stats, |s| s.received += 1);

    let tag = delivery.message.tag();
    let expected = E::TAG;
    let Some(event) = E::from_wire(delivery.message) else {
        debug!(
            subscriber = %binding.name,
            topic = %delivery.topic,
            tag = %tag,
            expected = %expected,
            "skipping message of another flavor"
        );
        record(stats, |s| s.skipped += 1);
        return;
    };

    match invoke(binding.handler.as_ref(), &event) {
        Ok(Handled::Processed) => record(stats, |s| s.handled += 1),
        Ok(Handled::Ignored) => record(stats, |s| s.ignored += 1),
        Err(failure @ DispatchFailure::HandlerCrashed { .. }) => {
            error!(
                subscriber = %binding.name,
                topic = %delivery.topic,
                event_type = %event.event_type(),
                event_id = %event.event_id(),
                error = %failure,
                "subscriber handler crashed"
            );
            record(stats, |s| s.crashed += 1);
        }
        Err(failure) => {
            warn!(
                subscriber = %binding.name,
                topic = %delivery.topic,
                event_type = %event.event_type(),
                event_id = %event.event_id(),
                error = %failure,
                "subscriber handler failed"
            );
            record(stats, |s| s.failed += 1);
        }
    }
}

fn record(stats: &Mutex<SubscriberStats>, update: impl FnOnce(&mut SubscriberStats)) {
    if let Ok(mut stats) = stats.lock() {
        update(&mut stats);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use brightpath_core::BoundedContext;
    use brightpath_events::event_type::known;
    use brightpath_events::{
        DomainEvent, HandlerError, HandlerOutcome, InMemoryPubSub, IntegrationEvent, Payload,
        handler_fn,
    };
    use tracing::Level;

    use super::*;
    use crate::test_support::capture_logs;

    const POLL: Duration = Duration::from_millis(10);

    fn wait_for(handle: &SubscriberHandle, done: impl Fn(&SubscriberStats) -> bool) -> SubscriberStats {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let stats = handle.stats();
            if done(&stats) || Instant::now() > deadline {
                return stats;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn registered() -> IntegrationEvent {
        IntegrationEvent::new(
            known::USER_REGISTERED,
            "user-1",
            BoundedContext::Accounts,
            Payload::new(),
        )
    }

    #[test]
    fn binding_derives_its_tag_and_dedups_topics() {
        let topic = Topic::integration(BoundedContext::Accounts, &known::USER_REGISTERED);
        let binding = SubscriberBinding::new(
            handler_fn("h", |_: &IntegrationEvent| HandlerOutcome::Ok),
            [topic.clone(), topic.clone()],
        );
        assert_eq!(binding.message_tag(), MessageTag::IntegrationEvent);
        assert_eq!(binding.topics(), &[topic]);
        assert_eq!(binding.name(), "h");
    }

    #[test]
    fn handles_matching_messages_and_skips_the_other_flavor() {
        let transport = InMemoryPubSub::<WireMessage>::new();
        let topic = Topic::integration(BoundedContext::Accounts, &known::USER_REGISTERED);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let handle = EventSubscriber::spawn(
            SubscriberBinding::new(
                handler_fn("collect", move |e: &IntegrationEvent| {
                    sink.lock().unwrap().push(e.aggregate_id().to_string());
                    HandlerOutcome::Ok
                }),
                [topic.clone()],
            ),
            &transport,
            POLL,
        )
        .unwrap();

        let domain = DomainEvent::new(
            known::USER_REGISTERED,
            "domain-1",
            BoundedContext::Accounts,
            Payload::new(),
        );
        transport.publish(&topic, domain.into_wire()).unwrap();
        transport.publish(&topic, registered().into_wire()).unwrap();

        let stats = wait_for(&handle, |s| s.received == 2);
        handle.shutdown();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.handled, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["user-1".to_string()]);
    }

    #[test]
    fn crash_and_error_are_counted_and_the_worker_keeps_going() {
        let transport = InMemoryPubSub::<WireMessage>::new();
        let topic = Topic::new("integration:accounts:user_registered");
        let calls = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&calls);

        let handle = EventSubscriber::spawn(
            SubscriberBinding::new(
                handler_fn("flaky", move |_: &IntegrationEvent| -> HandlerOutcome {
                    let n = {
                        let mut n = counter.lock().unwrap();
                        *n += 1;
                        *n
                    };
                    match n {
                        1 => panic!("boom"),
                        2 => HandlerOutcome::error(HandlerError::rejected("no")),
                        3 => HandlerOutcome::Ignore,
                        _ => HandlerOutcome::Ok,
                    }
                }),
                [topic.clone()],
            ),
            &transport,
            POLL,
        )
        .unwrap();

        for _ in 0..4 {
            transport.publish(&topic, registered().into_wire()).unwrap();
        }

        let stats = wait_for(&handle, |s| s.received == 4);
        handle.shutdown();

        assert_eq!(
            stats,
            SubscriberStats {
                received: 4,
                handled: 1,
                ignored: 1,
                failed: 1,
                crashed: 1,
                skipped: 0,
            }
        );
    }

    #[test]
    fn shutdown_drops_the_subscription() {
        let transport = InMemoryPubSub::<WireMessage>::new();
        let topic = Topic::new("conversation:1");
        let handle = EventSubscriber::spawn(
            SubscriberBinding::new(handler_fn("noop", |_: &DomainEvent| HandlerOutcome::Ok), [topic.clone()]),
            &transport,
            POLL,
        )
        .unwrap();
        assert_eq!(transport.subscriber_count(&topic), 1);

        handle.shutdown();
        transport
            .publish(
                &topic,
                DomainEvent::new(known::MESSAGE_SENT, "m-1", BoundedContext::Messaging, Payload::new())
                    .into_wire(),
            )
            .unwrap();

        assert_eq!(transport.subscriber_count(&topic), 0);
    }

    #[test]
    fn crash_is_logged_at_error_and_failure_at_warn() {
        let topic = Topic::integration(BoundedContext::Accounts, &known::USER_REGISTERED);
        let stats = Mutex::new(SubscriberStats::default());
        let crashing = SubscriberBinding::new(
            handler_fn("create_provider_profile", |_: &IntegrationEvent| -> HandlerOutcome {
                panic!("db connection lost")
            }),
            [topic.clone()],
        );
        let failing = SubscriberBinding::new(
            handler_fn("create_provider_profile", |_: &IntegrationEvent| {
                HandlerOutcome::error(HandlerError::rejected("duplicate email"))
            }),
            [topic.clone()],
        );
        let delivery = || Delivery {
            topic: topic.clone(),
            message: registered().into_wire(),
        };

        let ((), logs) = capture_logs(|| {
            process(&crashing, delivery(), &stats);
            process(&failing, delivery(), &stats);
        });

        let errors: Vec<_> = logs.iter().filter(|l| l.level == Level::ERROR).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field("event_type"), Some("user_registered"));
        assert_eq!(errors[0].field("subscriber"), Some("create_provider_profile"));
        assert!(errors[0].field("error").unwrap().contains("db connection lost"));

        let warnings: Vec<_> = logs.iter().filter(|l| l.level == Level::WARN).collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field("error").unwrap().contains("duplicate email"));

        let stats = *stats.lock().unwrap();
        assert_eq!((stats.crashed, stats.failed), (1, 1));
    }

    #[test]
    fn dropped_handle_stops_the_worker_and_unsubscribes() {
        let transport = InMemoryPubSub::<WireMessage>::new();
        let topic = Topic::new("conversation:1");
        let calls = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&calls);
        let handle = EventSubscriber::spawn(
            SubscriberBinding::new(
                handler_fn("count", move |_: &DomainEvent| {
                    *counter.lock().unwrap() += 1;
                    HandlerOutcome::Ok
                }),
                [topic.clone()],
            ),
            &transport,
            POLL,
        )
        .unwrap();
        assert_eq!(transport.subscriber_count(&topic), 1);

        drop(handle);
        thread::sleep(POLL * 10);
        transport
            .publish(
                &topic,
                DomainEvent::new(known::MESSAGE_SENT, "m-1", BoundedContext::Messaging, Payload::new())
                    .into_wire(),
            )
            .unwrap();

        assert_eq!(transport.subscriber_count(&topic), 0);
        assert_eq!(*calls.lock().unwrap(), 0);
    }
}
