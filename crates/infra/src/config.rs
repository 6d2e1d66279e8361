//! Eventing configuration loaded from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `EVENT_TRANSPORT` | `memory` (`memory` or `redis`) |
//! | `REDIS_URL` | `redis://localhost:6379` |
//! | `EVENT_SUBSCRIBER_POLL_MS` | `250` |
//! | `EVENT_RETRY_MAX_ATTEMPTS` | `3` |
//! | `EVENT_RETRY_BACKOFF_MS` | `100` |

use core::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use brightpath_events::RetryContext;
use brightpath_events::retry::{DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Which pub/sub transport carries integration events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Memory,
    Redis,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(TransportKind::Memory),
            "redis" => Ok(TransportKind::Redis),
            _ => Err(ConfigError::invalid(
                "EVENT_TRANSPORT",
                s,
                "expected `memory` or `redis`",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventingConfig {
    pub transport: TransportKind,
    pub redis_url: String,
    /// How long a subscriber blocks on its subscription before checking for
    /// shutdown.
    pub subscriber_poll_interval: Duration,
    pub retry_max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for EventingConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Memory,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            subscriber_poll_interval: DEFAULT_POLL_INTERVAL,
            retry_max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_BACKOFF,
        }
    }
}

impl EventingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let transport = match lookup("EVENT_TRANSPORT") {
            Some(raw) => raw.parse()?,
            None => defaults.transport,
        };
        let redis_url = lookup("REDIS_URL").unwrap_or(defaults.redis_url);

        let subscriber_poll_interval = match lookup("EVENT_SUBSCRIBER_POLL_MS") {
            Some(raw) => {
                let millis: u64 = parse_number("EVENT_SUBSCRIBER_POLL_MS", &raw)?;
                if millis == 0 {
                    return Err(ConfigError::invalid(
                        "EVENT_SUBSCRIBER_POLL_MS",
                        &raw,
                        "must be greater than zero",
                    ));
                }
                Duration::from_millis(millis)
            }
            None => defaults.subscriber_poll_interval,
        };

        let retry_max_attempts = match lookup("EVENT_RETRY_MAX_ATTEMPTS") {
            Some(raw) => parse_number("EVENT_RETRY_MAX_ATTEMPTS", &raw)?,
            None => defaults.retry_max_attempts,
        };

        let retry_backoff = match lookup("EVENT_RETRY_BACKOFF_MS") {
            Some(raw) => Duration::from_millis(parse_number("EVENT_RETRY_BACKOFF_MS", &raw)?),
            None => defaults.retry_backoff,
        };

        Ok(Self {
            transport,
            redis_url,
            subscriber_poll_interval,
            retry_max_attempts,
            retry_backoff,
        })
    }

    /// Retry budget for one side-effecting handler write.
    pub fn retry_context(
        &self,
        operation_name: impl Into<String>,
        aggregate_id: impl Into<String>,
    ) -> RetryContext {
        RetryContext::new(operation_name, aggregate_id)
            .with_max_attempts(self.retry_max_attempts)
            .with_backoff(self.retry_backoff)
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, raw, e.to_string()))
}
