//! Transport topic naming.
//!
//! - UI notifications: `"<entity>:<id>"`, `"<entity>:<id>:<stream>"`,
//!   `"<entity>:<event_type>"`
//! - Integration events: `"integration:<source_context>:<event_type>"`
//!
//! The `integration:` prefix is reserved so internal domain-event topics never
//! collide with cross-context ones.

use serde::{Deserialize, Serialize};

use brightpath_core::BoundedContext;

use crate::event_type::EventType;

const INTEGRATION_PREFIX: &str = "integration";

/// Name of a pub/sub topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Cross-context topic carrying promoted events of one type.
    pub fn integration(source: BoundedContext, event_type: &EventType) -> Self {
        Self(format!("{INTEGRATION_PREFIX}:{source}:{event_type}"))
    }

    /// Per-entity notification topic, e.g. `conversation:<id>`.
    pub fn entity(entity: &str, id: impl core::fmt::Display) -> Self {
        Self(format!("{entity}:{id}"))
    }

    /// Named stream of one entity, e.g. `user:<id>:messages`.
    pub fn entity_stream(entity: &str, id: impl core::fmt::Display, stream: &str) -> Self {
        Self(format!("{entity}:{id}:{stream}"))
    }

    /// Entity-wide topic for one event type, e.g. `program:program_published`.
    pub fn domain(entity: &str, event_type: &EventType) -> Self {
        Self(format!("{entity}:{event_type}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_integration(&self) -> bool {
        self.parse_integration().is_some()
    }

    /// Split an integration topic back into its source context and event type.
    pub fn parse_integration(&self) -> Option<(BoundedContext, EventType)> {
        let mut parts = self.0.splitn(3, ':');
        if parts.next()? != INTEGRATION_PREFIX {
            return None;
        }
        let source: BoundedContext = parts.next()?.parse().ok()?;
        let event_type = EventType::new(parts.next()?).ok()?;
        Some((source, event_type))
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Topic {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_type::known;

    #[test]
    fn integration_topics_follow_the_convention() {
        let topic = Topic::integration(BoundedContext::Accounts, &known::USER_REGISTERED);
        assert_eq!(topic.as_str(), "integration:accounts:user_registered");
        assert_eq!(
            topic.parse_integration(),
            Some((BoundedContext::Accounts, known::USER_REGISTERED))
        );
    }

    #[test]
    fn notification_topics() {
        assert_eq!(Topic::entity("conversation", 42).as_str(), "conversation:42");
        assert_eq!(
            Topic::entity_stream("user", "u-1", "messages").as_str(),
            "user:u-1:messages"
        );
        assert_eq!(
            Topic::domain("enrollment", &known::CHILD_ENROLLED).as_str(),
            "enrollment:child_enrolled"
        );
    }

    #[test]
    fn domain_topics_are_not_integration_topics() {
        assert!(!Topic::entity("conversation", 42).is_integration());
        assert!(!Topic::new("integration:billing:invoice_paid").is_integration());
        assert!(!Topic::new("integration:accounts").is_integration());
    }
}
