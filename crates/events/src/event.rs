use chrono::{DateTime, Utc};

use brightpath_core::{BoundedContext, CorrelationId, EventId};

use crate::envelope::Criticality;
use crate::event_type::EventType;
use crate::payload::Payload;

/// Read-only view shared by both envelope flavors.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - dispatched by [`EventType`]
/// - never persisted by the dispatch fabric
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_id(&self) -> EventId;

    /// Dispatch key.
    fn event_type(&self) -> &EventType;

    /// Identifier of the entity the event is about.
    fn aggregate_id(&self) -> &str;

    /// Originating bounded context.
    fn source(&self) -> BoundedContext;

    fn payload(&self) -> &Payload;

    fn criticality(&self) -> Criticality;

    fn correlation_id(&self) -> Option<CorrelationId>;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
