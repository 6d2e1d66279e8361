use std::io;

use thiserror::Error;

use brightpath_core::BoundedContext;

use crate::config::ConfigError;

/// Failures starting or talking to the eventing runtime.
///
/// Handler failures are not represented here: they travel as
/// [`DispatchFailure`](brightpath_events::DispatchFailure) values.
#[derive(Debug, Error)]
pub enum EventingError {
    #[error("failed to spawn worker thread `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("event bus for {context} is unavailable")]
    BusUnavailable { context: BoundedContext },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
