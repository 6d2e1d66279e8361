use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use brightpath_core::DomainError;

/// Reason a handler reports when it could not do its job.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HandlerError {
    /// The handler looked at the event and refused or failed it.
    #[error("{0}")]
    Rejected(String),

    /// A domain operation invoked by the handler failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Publishing to the pub/sub transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl HandlerError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

/// What a handler reports after seeing one event.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// The event was handled.
    Ok,
    /// The event was not relevant to this handler.
    Ignore,
    /// Handling failed; recorded, siblings still run.
    Error(HandlerError),
    /// A reply outside the handler protocol (see `From<JsonValue>`).
    Unrecognized(JsonValue),
}

impl HandlerOutcome {
    pub fn error(error: impl Into<HandlerError>) -> Self {
        Self::Error(error.into())
    }
}

impl<E> From<Result<(), E>> for HandlerOutcome
where
    E: Into<HandlerError>,
{
    fn from(value: Result<(), E>) -> Self {
        match value {
            Ok(()) => HandlerOutcome::Ok,
            Err(e) => HandlerOutcome::Error(e.into()),
        }
    }
}

/// Replies from handlers that answer in JSON (bridged or scripted handlers).
///
/// `"ok"` and `"ignore"` map to their variants, `{"error": reason}` to an
/// error; anything else is kept verbatim as [`HandlerOutcome::Unrecognized`].
impl From<JsonValue> for HandlerOutcome {
    fn from(value: JsonValue) -> Self {
        match &value {
            JsonValue::String(s) if s == "ok" => HandlerOutcome::Ok,
            JsonValue::String(s) if s == "ignore" => HandlerOutcome::Ignore,
            JsonValue::Object(map) if map.len() == 1 && map.contains_key("error") => {
                let reason = match &map["error"] {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                };
                HandlerOutcome::Error(HandlerError::Rejected(reason))
            }
            _ => HandlerOutcome::Unrecognized(value),
        }
    }
}

/// Single-method capability that reacts to one event and reports an outcome.
///
/// Handlers run on the thread of the bus or subscriber that owns them, one
/// event at a time. A panic inside `handle` is caught at the call boundary
/// and recorded as a crash.
pub trait EventHandler<E>: Send + Sync {
    /// Name used in failure records and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn handle(&self, event: &E) -> HandlerOutcome;
}

impl<E, H> EventHandler<E> for Arc<H>
where
    H: EventHandler<E> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn handle(&self, event: &E) -> HandlerOutcome {
        (**self).handle(event)
    }
}

/// Closure-backed handler.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a named handler.
///
/// The closure may return anything convertible into a [`HandlerOutcome`]:
/// the outcome itself, `Result<(), impl Into<HandlerError>>`, or a JSON reply.
pub fn handler_fn<E, R, F>(name: impl Into<String>, f: F) -> FnHandler<F>
where
    F: Fn(&E) -> R + Send + Sync,
    R: Into<HandlerOutcome>,
{
    FnHandler { name: name.into(), f }
}

impl<E, R, F> EventHandler<E> for FnHandler<F>
where
    F: Fn(&E) -> R + Send + Sync,
    R: Into<HandlerOutcome>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &E) -> HandlerOutcome {
        (self.f)(event).into()
    }
}

impl<F> core::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}
