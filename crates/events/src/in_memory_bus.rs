//! In-memory pub/sub transport for tests/dev.

use std::collections::HashMap;
use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::bus::{Delivery, PubSub, Subscription};
use crate::topic::Topic;

#[derive(Debug, Error)]
pub enum InMemoryPubSubError {
    /// Publish failed due to internal lock poisoning.
    #[error("in-memory pub/sub lock poisoned")]
    Poisoned,
}

/// In-memory topic pub/sub.
///
/// - No IO / no async
/// - Best-effort fan-out per topic
/// - Dropped subscriptions are pruned on the next publish to their topics
#[derive(Debug)]
pub struct InMemoryPubSub<M> {
    topics: Mutex<HashMap<Topic, Vec<mpsc::Sender<Delivery<M>>>>>,
}

impl<M> InMemoryPubSub<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live-looking subscriptions on `topic` (dropped ones count until the
    /// next publish to the topic prunes them).
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .lock()
            .map(|topics| topics.get(topic).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl<M> Default for InMemoryPubSub<M> {
    fn default() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }
}

impl<M> PubSub<M> for InMemoryPubSub<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryPubSubError;

    fn publish(&self, topic: &Topic, message: M) -> Result<(), Self::Error> {
        let mut topics = self.topics.lock().map_err(|_| InMemoryPubSubError::Poisoned)?;

        if let Some(subs) = topics.get_mut(topic) {
            // Drop any dead subscribers while publishing.
            subs.retain(|tx| {
                tx.send(Delivery {
                    topic: topic.clone(),
                    message: message.clone(),
                })
                .is_ok()
            });
            if subs.is_empty() {
                topics.remove(topic);
            }
        }

        Ok(())
    }

    fn subscribe_all(&self, topics: &[Topic]) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut registered) = self.topics.lock() {
            for topic in topics {
                registered.entry(topic.clone()).or_default().push(tx.clone());
            }
        }

        Subscription::new(topics.to_vec(), rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_only_to_subscribers_of_the_topic() {
        let bus = InMemoryPubSub::<u32>::new();
        let a = bus.subscribe(&Topic::new("conversation:1"));
        let b = bus.subscribe(&Topic::new("conversation:2"));

        bus.publish(&Topic::new("conversation:1"), 7).unwrap();

        let delivery = a.try_recv().unwrap();
        assert_eq!(delivery.topic, Topic::new("conversation:1"));
        assert_eq!(delivery.message, 7);
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn one_subscription_fans_in_many_topics_in_publish_order() {
        let bus = InMemoryPubSub::<&'static str>::new();
        let topics = [Topic::new("a"), Topic::new("b")];
        let sub = bus.subscribe_all(&topics);
        assert_eq!(sub.topics(), &topics);

        bus.publish(&topics[1], "first").unwrap();
        bus.publish(&topics[0], "second").unwrap();

        assert_eq!(sub.try_recv().unwrap().message, "first");
        assert_eq!(sub.try_recv().unwrap().message, "second");
    }

    #[test]
    fn every_subscription_gets_a_copy() {
        let bus = InMemoryPubSub::<u8>::new();
        let topic = Topic::new("user:1:messages");
        let first = bus.subscribe(&topic);
        let second = bus.subscribe(&topic);

        bus.publish(&topic, 1).unwrap();

        assert_eq!(first.try_recv().unwrap().message, 1);
        assert_eq!(second.try_recv().unwrap().message, 1);
    }

    #[test]
    fn publish_without_subscribers_is_ok() {
        let bus = InMemoryPubSub::<u8>::new();
        assert!(bus.publish(&Topic::new("nobody"), 1).is_ok());
    }

    #[test]
    fn dropped_subscriptions_are_pruned_on_publish() {
        let bus = InMemoryPubSub::<u8>::new();
        let topic = Topic::new("conversation:9");
        let sub = bus.subscribe(&topic);
        assert_eq!(bus.subscriber_count(&topic), 1);

        drop(sub);
        bus.publish(&topic, 1).unwrap();

        assert_eq!(bus.subscriber_count(&topic), 0);
    }
}
