//! Event system for the data-access facade.
//!
//! The connection manager reports every state change (connection attempts,
//! scheduled retries, the switch to mock mode, pool errors) as an event.
//! Listeners are registered at configuration time and called synchronously
//! on the task that made the change, so they must not block.
//!
//! Most callers only care about degraded service. Wrap a listener in a
//! [`FilteredListener`] with [`EventFilter::Degraded`] to hear about
//! failures and the switch to mock data without the routine traffic.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a facade component.
pub trait FacadeEvent: Send + Sync + fmt::Debug {
    /// Stable snake_case name, e.g. `"connected"` or `"mock_mode_activated"`.
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;

    /// Name of the manager that emitted the event.
    fn source_name(&self) -> &str;

    /// `true` when the event means queries are, or may soon be, answered
    /// from mock data.
    fn is_degraded(&self) -> bool {
        false
    }
}

/// Receives facade events.
pub trait EventListener<E: FacadeEvent>: Send + Sync {
    /// Called once per emitted event.
    fn on_event(&self, event: &E);
}

/// Selects the events a [`FilteredListener`] forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// Every event.
    All,
    /// Events whose [`event_type`](FacadeEvent::event_type) is listed.
    Types(&'static [&'static str]),
    /// Events for which [`is_degraded`](FacadeEvent::is_degraded) holds.
    Degraded,
}

impl EventFilter {
    /// Returns `true` if `event` passes the filter.
    pub fn matches<E: FacadeEvent>(&self, event: &E) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Types(types) => types.contains(&event.event_type()),
            EventFilter::Degraded => event.is_degraded(),
        }
    }
}

/// A listener that only sees the events its [`EventFilter`] accepts.
pub struct FilteredListener<L> {
    filter: EventFilter,
    inner: L,
}

impl<L> FilteredListener<L> {
    /// Wraps `inner` behind `filter`.
    pub fn new(filter: EventFilter, inner: L) -> Self {
        Self { filter, inner }
    }
}

impl<E, L> EventListener<E> for FilteredListener<L>
where
    E: FacadeEvent,
    L: EventListener<E>,
{
    fn on_event(&self, event: &E) {
        if self.filter.matches(event) {
            self.inner.on_event(event);
        }
    }
}

/// The listeners registered on one manager.
#[derive(Clone)]
pub struct EventListeners<E: FacadeEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: FacadeEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Calls every listener in registration order.
    ///
    /// A listener that panics is logged and skipped; the rest still run and
    /// the manager's state is unaffected.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
            if outcome.is_err() {
                tracing::warn!(
                    source = event.source_name(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: FacadeEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: FacadeEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<F>(F);

impl<F> FnListener<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<E, F> EventListener<E> for FnListener<F>
where
    E: FacadeEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.0)(event)
    }
}
