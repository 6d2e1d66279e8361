//! Per-context Domain Event Bus actors.
//!
//! Each bounded context gets one thread that owns the context's
//! [`HandlerTable`] and drains a mailbox of commands. Registrations and
//! dispatches for a context are therefore serialized, while different
//! contexts run concurrently.
//!
//! A handler must not dispatch synchronously into its own context's bus: the
//! actor is busy running that handler and would never read the request.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use tracing::{debug, info};

use brightpath_core::BoundedContext;
use brightpath_events::{
    DispatchFailure, DispatchResult, DomainEvent, EventType, HandlerTable, Registration,
};

use crate::error::EventingError;
use crate::supervisor::supervise;

enum BusCommand {
    Subscribe {
        registration: Registration<DomainEvent>,
        ack: mpsc::Sender<()>,
    },
    Dispatch {
        event: DomainEvent,
        reply: mpsc::Sender<DispatchResult>,
    },
    Handlers {
        event_type: EventType,
        reply: mpsc::Sender<Vec<(String, i32)>>,
    },
    Shutdown,
}

/// Spawns bus actors.
#[derive(Debug)]
pub struct DomainEventBus;

impl DomainEventBus {
    /// Start the actor for `context` with an initial set of registrations.
    pub fn spawn<I>(context: BoundedContext, registrations: I) -> Result<DomainEventBusHandle, EventingError>
    where
        I: IntoIterator<Item = Registration<DomainEvent>>,
    {
        let table: HandlerTable<DomainEvent> = registrations.into_iter().collect();
        let (mailbox_tx, mailbox_rx) = mpsc::channel::<BusCommand>();

        let name = format!("event-bus-{context}");
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || bus_loop(context, table, mailbox_rx))
            .map_err(|source| EventingError::Spawn { name, source })?;

        Ok(DomainEventBusHandle {
            context,
            mailbox: mailbox_tx,
            join: Arc::new(Mutex::new(Some(join))),
        })
    }
}

fn bus_loop(
    context: BoundedContext,
    mut table: HandlerTable<DomainEvent>,
    mailbox: mpsc::Receiver<BusCommand>,
) {
    debug!(context = %context, handlers = table.len(), "event bus started");

    let actor = format!("event-bus-{context}");
    supervise(&actor, || serve(context, &mut table, &mailbox));

    debug!(context = %context, "event bus stopped");
}

/// Drain the mailbox. Ends on Shutdown or once every handle is gone.
///
/// A panic here unwinds into the supervisor, which re-enters with the same
/// table and mailbox; the request in flight sees the bus as unavailable.
fn serve(
    context: BoundedContext,
    table: &mut HandlerTable<DomainEvent>,
    mailbox: &mpsc::Receiver<BusCommand>,
) {
    for command in mailbox.iter() {
        match command {
            BusCommand::Subscribe { registration, ack } => {
                debug!(
                    context = %context,
                    event_type = %registration.event_type(),
                    handler = %registration.handler_name(),
                    priority = registration.priority(),
                    "handler subscribed"
                );
                table.insert(registration);
                let _ = ack.send(());
            }
            BusCommand::Dispatch { event, reply } => {
                let result = table.dispatch(&event);
                debug!(
                    context = %context,
                    event_type = %event.event_type(),
                    event_id = %event.event_id(),
                    handlers = table.handlers_for(event.event_type()).len(),
                    failures = result.as_ref().err().map_or(0, Vec::len),
                    "event dispatched"
                );
                let _ = reply.send(result);
            }
            BusCommand::Handlers { event_type, reply } => {
                let handlers = table
                    .handlers_for(&event_type)
                    .iter()
                    .map(|r| (r.handler_name(), r.priority()))
                    .collect();
                let _ = reply.send(handlers);
            }
            BusCommand::Shutdown => return,
        }
    }
}

/// Cloneable handle to a running bus actor.
#[derive(Debug, Clone)]
pub struct DomainEventBusHandle {
    context: BoundedContext,
    mailbox: mpsc::Sender<BusCommand>,
    join: Arc<Mutex<Option<thread::JoinHandle<()>>>>,
}

impl core::fmt::Debug for BusCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BusCommand::Subscribe { registration, .. } => {
                f.debug_tuple("Subscribe").field(registration).finish()
            }
            BusCommand::Dispatch { event, .. } => f.debug_tuple("Dispatch").field(event).finish(),
            BusCommand::Handlers { event_type, .. } => {
                f.debug_tuple("Handlers").field(event_type).finish()
            }
            BusCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl DomainEventBusHandle {
    pub fn context(&self) -> BoundedContext {
        self.context
    }

    /// Add a registration. Returns once the actor has inserted it, so a
    /// dispatch issued afterwards sees the new handler.
    pub fn subscribe(&self, registration: Registration<DomainEvent>) -> Result<(), EventingError> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.send(BusCommand::Subscribe {
            registration,
            ack: ack_tx,
        })?;
        ack_rx.recv().map_err(|_| self.unavailable())
    }

    /// Run every handler for the event's type and wait for the outcome.
    pub fn dispatch(&self, event: &DomainEvent) -> DispatchResult {
        let (reply_tx, reply_rx) = mpsc::channel();
        let sent = self.send(BusCommand::Dispatch {
            event: event.clone(),
            reply: reply_tx,
        });

        match sent.ok().and_then(|()| reply_rx.recv().ok()) {
            Some(result) => result,
            None => Err(vec![DispatchFailure::BusUnavailable {
                context: self.context,
            }]),
        }
    }

    /// `(handler name, priority)` for `event_type`, in invocation order.
    pub fn handlers(&self, event_type: &EventType) -> Result<Vec<(String, i32)>, EventingError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(BusCommand::Handlers {
            event_type: event_type.clone(),
            reply: reply_tx,
        })?;
        reply_rx.recv().map_err(|_| self.unavailable())
    }

    pub fn is_running(&self) -> bool {
        self.join
            .lock()
            .map(|join| join.as_ref().is_some_and(|j| !j.is_finished()))
            .unwrap_or(false)
    }

    /// Stop the actor and wait for it. Every clone of the handle sees the bus
    /// as unavailable afterwards.
    pub fn shutdown(&self) {
        let _ = self.mailbox.send(BusCommand::Shutdown);
        let join = self.join.lock().ok().and_then(|mut join| join.take());
        if let Some(j) = join {
            let _ = j.join();
        }
    }

    fn send(&self, command: BusCommand) -> Result<(), EventingError> {
        self.mailbox.send(command).map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> EventingError {
        EventingError::BusUnavailable {
            context: self.context,
        }
    }
}

/// Anything that can run a domain event through a context's bus.
pub trait DomainEventDispatcher: Send + Sync {
    fn dispatch(&self, context: BoundedContext, event: &DomainEvent) -> DispatchResult;
}

impl<D> DomainEventDispatcher for Arc<D>
where
    D: DomainEventDispatcher + ?Sized,
{
    fn dispatch(&self, context: BoundedContext, event: &DomainEvent) -> DispatchResult {
        (**self).dispatch(context, event)
    }
}

/// One running bus per bounded context.
#[derive(Debug, Clone, Default)]
pub struct DomainEventBuses {
    buses: BTreeMap<BoundedContext, DomainEventBusHandle>,
}

impl DomainEventBuses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a bus for every bounded context, seeding each with its
    /// registrations (contexts without any start empty). If one actor fails
    /// to spawn, the ones already running are stopped.
    pub fn spawn_all(
        mut registrations: BTreeMap<BoundedContext, Vec<Registration<DomainEvent>>>,
    ) -> Result<Self, EventingError> {
        let mut buses = Self::new();

        for context in BoundedContext::ALL {
            let seed = registrations.remove(&context).unwrap_or_default();
            match DomainEventBus::spawn(context, seed) {
                Ok(handle) => buses.insert(handle),
                Err(err) => {
                    buses.shutdown();
                    return Err(err);
                }
            }
        }

        info!(contexts = buses.len(), "domain event buses started");
        Ok(buses)
    }

    /// Track a bus, replacing any previous one for the same context.
    pub fn insert(&mut self, handle: DomainEventBusHandle) {
        self.buses.insert(handle.context(), handle);
    }

    pub fn get(&self, context: BoundedContext) -> Option<&DomainEventBusHandle> {
        self.buses.get(&context)
    }

    pub fn contexts(&self) -> impl Iterator<Item = BoundedContext> + '_ {
        self.buses.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    pub fn subscribe(
        &self,
        context: BoundedContext,
        registration: Registration<DomainEvent>,
    ) -> Result<(), EventingError> {
        self.get(context)
            .ok_or(EventingError::BusUnavailable { context })?
            .subscribe(registration)
    }

    pub fn shutdown(&self) {
        for bus in self.buses.values() {
            bus.shutdown();
        }
    }
}

impl DomainEventDispatcher for DomainEventBuses {
    fn dispatch(&self, context: BoundedContext, event: &DomainEvent) -> DispatchResult {
        match self.get(context) {
            Some(bus) => bus.dispatch(event),
            None => Err(vec![DispatchFailure::BusUnavailable { context }]),
        }
    }
}

impl DomainEventDispatcher for DomainEventBusHandle {
    fn dispatch(&self, context: BoundedContext, event: &DomainEvent) -> DispatchResult {
        if context != self.context {
            return Err(vec![DispatchFailure::BusUnavailable { context }]);
        }
        DomainEventBusHandle::dispatch(self, event)
    }
}
