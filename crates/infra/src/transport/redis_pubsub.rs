//! Redis pub/sub transport for wire messages (feature `redis`).
//!
//! Each topic maps to the Redis channel of the same name and messages travel
//! as JSON. Redis pub/sub is not durable: messages published while nobody is
//! subscribed are lost, which matches the transport's best-effort contract.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use redis::Commands;
use thiserror::Error;
use tracing::{debug, warn};

use brightpath_events::{Delivery, PubSub, Subscription, Topic, WireMessage};

/// How long `subscribe_all` waits for the listener to confirm its channels.
const SUBSCRIBE_READY_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum RedisPubSubError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to serialize wire message: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct RedisPubSub {
    client: redis::Client,
}

impl RedisPubSub {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, RedisPubSubError> {
        let client = redis::Client::open(redis_url.as_ref())?;
        Ok(Self { client })
    }
}

impl PubSub<WireMessage> for RedisPubSub {
    type Error = RedisPubSubError;

    fn publish(&self, topic: &Topic, message: WireMessage) -> Result<(), Self::Error> {
        let payload = serde_json::to_string(&message)?;
        let mut conn = self.client.get_connection()?;
        let _: i64 = conn.publish(topic.as_str(), payload)?;
        Ok(())
    }

    /// Starts a listener thread holding its own connection. The listener
    /// exits when the subscription is dropped and the next message arrives,
    /// or when the connection fails.
    fn subscribe_all(&self, topics: &[Topic]) -> Subscription<WireMessage> {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<()>();

        let client = self.client.clone();
        let channels: Vec<String> = topics.iter().map(|t| t.as_str().to_string()).collect();

        let spawned = thread::Builder::new()
            .name("redis-pubsub".to_string())
            .spawn(move || listen(client, channels, tx, ready_tx));

        match spawned {
            Ok(_) => {
                if ready_rx.recv_timeout(SUBSCRIBE_READY_TIMEOUT).is_err() {
                    warn!(topics = ?topics, "redis subscription not confirmed in time");
                }
            }
            Err(err) => warn!(error = %err, "failed to spawn redis listener thread"),
        }

        Subscription::new(topics.to_vec(), rx)
    }
}

fn listen(
    client: redis::Client,
    channels: Vec<String>,
    tx: mpsc::Sender<Delivery<WireMessage>>,
    ready: mpsc::Sender<()>,
) {
    let mut conn = match client.get_connection() {
        Ok(c) => c,
        Err(err) => {
            warn!(error = %err, "redis listener could not connect");
            return;
        }
    };

    let mut pubsub = conn.as_pubsub();
    for channel in &channels {
        if let Err(err) = pubsub.subscribe(channel) {
            warn!(channel = %channel, error = %err, "redis subscribe failed");
            return;
        }
    }
    let _ = ready.send(());

    loop {
        let msg = match pubsub.get_message() {
            Ok(m) => m,
            Err(err) => {
                warn!(error = %err, "redis listener stopped");
                return;
            }
        };

        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(_) => continue,
        };

        let message: WireMessage = match serde_json::from_str(&payload) {
            Ok(m) => m,
            Err(err) => {
                debug!(channel = msg.get_channel_name(), error = %err, "dropping undecodable message");
                continue;
            }
        };

        let delivery = Delivery {
            topic: Topic::new(msg.get_channel_name()),
            message,
        };
        if tx.send(delivery).is_err() {
            return;
        }
    }
}
