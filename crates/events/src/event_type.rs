//! Event type symbols (the dispatch key).

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// Longest accepted event type name, in bytes.
pub const MAX_EVENT_TYPE_LEN: usize = 128;

/// Interned event type symbol, e.g. `user_registered`.
///
/// Well-known types are `const` items borrowing static strings; types read
/// off the wire own their name. Equality and hashing are by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventType(Cow<'static, str>);

impl EventType {
    /// Build a symbol from a static name, checked at compile time when used
    /// in a `const` item.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a snake_case identifier.
    pub const fn from_static(name: &'static str) -> Self {
        assert!(
            is_valid_name(name.as_bytes()),
            "event type must be a snake_case identifier"
        );
        Self(Cow::Borrowed(name))
    }

    /// Validate and build a symbol from a runtime string.
    pub fn new(name: impl Into<String>) -> Result<Self, EnvelopeError> {
        let name = name.into();
        if let Some(reason) = invalid_reason(name.as_bytes()) {
            return Err(EnvelopeError::InvalidEventType { name, reason });
        }
        Ok(Self(Cow::Owned(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const fn is_valid_name(bytes: &[u8]) -> bool {
    if bytes.is_empty() || bytes.len() > MAX_EVENT_TYPE_LEN {
        return false;
    }
    if !bytes[0].is_ascii_lowercase() {
        return false;
    }
    let mut i = 1;
    while i < bytes.len() {
        let b = bytes[i];
        if !(b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_') {
            return false;
        }
        i += 1;
    }
    true
}

fn invalid_reason(bytes: &[u8]) -> Option<&'static str> {
    if bytes.is_empty() {
        Some("must not be empty")
    } else if bytes.len() > MAX_EVENT_TYPE_LEN {
        Some("too long")
    } else if !is_valid_name(bytes) {
        Some("must be snake_case ([a-z][a-z0-9_]*)")
    } else {
        None
    }
}

impl core::fmt::Display for EventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EventType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EventType {
    type Error = EnvelopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for EventType {
    type Error = EnvelopeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.0.into_owned()
    }
}

/// Event types raised by the platform's bounded contexts.
pub mod known {
    use super::EventType;

    pub const USER_REGISTERED: EventType = EventType::from_static("user_registered");
    pub const USER_ANONYMIZED: EventType = EventType::from_static("user_anonymized");
    pub const PROVIDER_PROFILE_CREATED: EventType =
        EventType::from_static("provider_profile_created");
    pub const CHILD_ENROLLED: EventType = EventType::from_static("child_enrolled");
    pub const MESSAGE_SENT: EventType = EventType::from_static("message_sent");
    pub const SESSION_COMPLETED: EventType = EventType::from_static("session_completed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_and_runtime_symbols_compare_by_name() {
        assert_eq!(EventType::new("user_registered").unwrap(), known::USER_REGISTERED);
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "UserRegistered", "user-registered", "1st_event", "user registered"] {
            let err = EventType::new(bad).unwrap_err();
            assert!(matches!(err, EnvelopeError::InvalidEventType { .. }), "{bad}");
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let name = "a".repeat(MAX_EVENT_TYPE_LEN + 1);
        let err = EventType::new(name).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidEventType { reason: "too long", .. }));
    }

    #[test]
    #[should_panic(expected = "snake_case")]
    fn from_static_panics_on_malformed_name() {
        let _ = EventType::from_static("Not Valid");
    }

    #[test]
    fn deserialization_validates() {
        let ok: EventType = serde_json::from_str("\"child_enrolled\"").unwrap();
        assert_eq!(ok, known::CHILD_ENROLLED);
        assert!(serde_json::from_str::<EventType>("\"Child-Enrolled\"").is_err());
    }
}
