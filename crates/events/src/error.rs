use thiserror::Error;

/// Malformed input while building an event envelope.
///
/// These are caller programming errors, not runtime conditions to recover
/// from.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("invalid event type {name:?}: {reason}")]
    InvalidEventType { name: String, reason: &'static str },

    #[error("event payload must be a JSON object, got {found}")]
    PayloadNotObject { found: &'static str },
}
