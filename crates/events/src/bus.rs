//! Topic-based publish/subscribe abstraction (mechanics only).
//!
//! The transport carries integration events between bounded contexts and UI
//! notifications out of them. It is injected wherever it is needed, so tests
//! run against [`InMemoryPubSub`](crate::InMemoryPubSub) and deployments
//! against a broker.
//!
//! ## Delivery Guarantees
//!
//! - **Best effort**: a message published while nobody listens on its topic
//!   is dropped. Nothing is persisted or replayed.
//! - **Per-subscription ordering**: one subscription receives messages in the
//!   order the transport accepted them. Nothing is ordered across topics or
//!   across subscriptions.
//! - **Broadcast**: every subscription to a topic gets its own copy.
//!
//! ## Unsubscribing
//!
//! Dropping a [`Subscription`] unsubscribes it. Transports notice the closed
//! channel and stop delivering to it.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use crate::topic::Topic;

/// A message together with the topic it was published on.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery<M> {
    pub topic: Topic,
    pub message: M,
}

/// A subscription to one or more topics.
///
/// ## Usage Pattern
///
/// ```ignore
/// let subscription = transport.subscribe_all(&topics);
///
/// loop {
///     match subscription.recv_timeout(Duration::from_millis(250)) {
///         Ok(delivery) => handle(delivery.message),
///         Err(RecvTimeoutError::Timeout) => continue,  // check for shutdown
///         Err(RecvTimeoutError::Disconnected) => break,  // transport closed
///     }
/// }
/// ```
///
/// Subscriptions are consumed by a single thread.
#[derive(Debug)]
pub struct Subscription<M> {
    topics: Vec<Topic>,
    receiver: Receiver<Delivery<M>>,
}

impl<M> Subscription<M> {
    pub fn new(topics: Vec<Topic>, receiver: Receiver<Delivery<M>>) -> Self {
        Self { topics, receiver }
    }

    /// Topics this subscription listens on.
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<Delivery<M>, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<Delivery<M>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Delivery<M>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Topic-based pub/sub transport.
///
/// `Send + Sync`: many threads publish concurrently while subscriber workers
/// consume.
pub trait PubSub<M>: Send + Sync {
    type Error: core::fmt::Debug + core::fmt::Display + Send + Sync + 'static;

    fn publish(&self, topic: &Topic, message: M) -> Result<(), Self::Error>;

    /// One subscription receiving messages from every topic in `topics`.
    fn subscribe_all(&self, topics: &[Topic]) -> Subscription<M>;

    fn subscribe(&self, topic: &Topic) -> Subscription<M> {
        self.subscribe_all(std::slice::from_ref(topic))
    }
}

impl<M, B> PubSub<M> for Arc<B>
where
    B: PubSub<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, topic: &Topic, message: M) -> Result<(), Self::Error> {
        (**self).publish(topic, message)
    }

    fn subscribe_all(&self, topics: &[Topic]) -> Subscription<M> {
        (**self).subscribe_all(topics)
    }
}
