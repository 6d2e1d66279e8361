//! Broker-backed pub/sub transports.
//!
//! The transport abstraction and the in-memory implementation live in
//! `brightpath-events`; this module adds implementations that need IO.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::{RedisPubSub, RedisPubSubError};
