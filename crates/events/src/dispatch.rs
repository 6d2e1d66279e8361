//! Failure-isolating handler invocation.
//!
//! Every handler call goes through [`invoke`], which turns each way a handler
//! can go wrong into a [`DispatchFailure`] value:
//!
//! - an explicit `Error` reply (application error),
//! - a panic (crash), caught with `catch_unwind` at the handler boundary,
//! - a reply outside the protocol (protocol violation).
//!
//! Nothing unwinds past a single handler, including a panic raised while
//! reading the handler's name.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value as JsonValue;
use thiserror::Error;

use brightpath_core::BoundedContext;

use crate::handler::{EventHandler, HandlerError, HandlerOutcome};

/// One recorded failure from a dispatch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchFailure {
    /// The handler replied with an error.
    #[error("handler {handler} failed: {reason}")]
    Failed { handler: String, reason: HandlerError },

    /// The handler panicked.
    #[error("handler {handler} crashed: {message}")]
    HandlerCrashed { handler: String, message: String },

    /// The handler replied with something outside the protocol.
    #[error("handler {handler} returned unexpected value {value}")]
    UnexpectedReturn { handler: String, value: JsonValue },

    /// No bus is running for the context.
    #[error("event bus for {context} is unavailable")]
    BusUnavailable { context: BoundedContext },
}

impl DispatchFailure {
    /// Name of the handler that produced this failure, if any.
    pub fn handler(&self) -> Option<&str> {
        match self {
            DispatchFailure::Failed { handler, .. }
            | DispatchFailure::HandlerCrashed { handler, .. }
            | DispatchFailure::UnexpectedReturn { handler, .. } => Some(handler),
            DispatchFailure::BusUnavailable { .. } => None,
        }
    }
}

/// `Ok` when every handler succeeded or ignored the event; otherwise every
/// recorded failure, in invocation order.
pub type DispatchResult = Result<(), Vec<DispatchFailure>>;

/// Successful handler outcomes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Handled {
    Processed,
    Ignored,
}

/// Name recorded for a handler whose `name()` panics.
pub const UNNAMED_HANDLER: &str = "<unnamed>";

/// Invoke one handler, classifying its outcome.
pub fn invoke<E, H>(handler: &H, event: &E) -> Result<Handled, DispatchFailure>
where
    H: EventHandler<E> + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
        Ok(HandlerOutcome::Ok) => Ok(Handled::Processed),
        Ok(HandlerOutcome::Ignore) => Ok(Handled::Ignored),
        Ok(HandlerOutcome::Error(reason)) => Err(DispatchFailure::Failed {
            handler: handler_name(handler),
            reason,
        }),
        Ok(HandlerOutcome::Unrecognized(value)) => Err(DispatchFailure::UnexpectedReturn {
            handler: handler_name(handler),
            value,
        }),
        Err(payload) => Err(DispatchFailure::HandlerCrashed {
            handler: handler_name(handler),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// The handler's name, or [`UNNAMED_HANDLER`] if reading it panics.
pub fn handler_name<E, H>(handler: &H) -> String
where
    H: EventHandler<E> + ?Sized,
{
    panic::catch_unwind(AssertUnwindSafe(|| handler.name().to_string()))
        .unwrap_or_else(|_| UNNAMED_HANDLER.to_string())
}

/// Text of a panic payload caught with `catch_unwind`.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::handler::handler_fn;

    #[test]
    fn ok_and_ignore_are_successes() {
        let ok = handler_fn("ok", |_: &()| HandlerOutcome::Ok);
        let ignore = handler_fn("ignore", |_: &()| HandlerOutcome::Ignore);
        assert_eq!(invoke(&ok, &()), Ok(Handled::Processed));
        assert_eq!(invoke(&ignore, &()), Ok(Handled::Ignored));
    }

    #[test]
    fn panics_are_caught_with_their_message() {
        let boom = handler_fn("boom", |_: &()| -> HandlerOutcome { panic!("boom") });
        assert_eq!(
            invoke(&boom, &()),
            Err(DispatchFailure::HandlerCrashed {
                handler: "boom".into(),
                message: "boom".into(),
            })
        );

        let formatted = handler_fn("formatted", |n: &u32| -> HandlerOutcome {
            panic!("bad input {n}")
        });
        match invoke(&formatted, &7) {
            Err(DispatchFailure::HandlerCrashed { message, .. }) => {
                assert_eq!(message, "bad input 7")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn protocol_violations_keep_the_reply() {
        let wrong = handler_fn("wrong", |_: &()| json!("wrong_return"));
        assert_eq!(
            invoke(&wrong, &()),
            Err(DispatchFailure::UnexpectedReturn {
                handler: "wrong".into(),
                value: json!("wrong_return"),
            })
        );
    }

    struct Nameless;

    impl EventHandler<()> for Nameless {
        fn name(&self) -> &str {
            panic!("name lookup failed")
        }

        fn handle(&self, _event: &()) -> HandlerOutcome {
            HandlerOutcome::error(HandlerError::rejected("no"))
        }
    }

    #[test]
    fn panicking_name_is_contained() {
        assert_eq!(handler_name::<(), _>(&Nameless), UNNAMED_HANDLER);
        assert_eq!(
            invoke(&Nameless, &()),
            Err(DispatchFailure::Failed {
                handler: UNNAMED_HANDLER.into(),
                reason: HandlerError::rejected("no"),
            })
        );
    }

    #[test]
    fn failures_name_their_handler() {
        let failing = handler_fn("failing", |_: &()| {
            HandlerOutcome::error(HandlerError::rejected("a"))
        });
        let failure = invoke(&failing, &()).unwrap_err();
        assert_eq!(failure.handler(), Some("failing"));
        assert_eq!(failure.to_string(), "handler failing failed: a");
    }
}
