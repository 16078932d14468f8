//! Event delivery for breakers and registries.
//!
//! Breakers describe what happened to them as typed events. Anything that wants
//! to observe them (metrics bridges, test probes, audit logs) registers an
//! [`EventListener`] on the breaker's configuration, either for every event or
//! for a single [`FuseEvent::Kind`].
//!
//! Emission is lazy per kind: a breaker on a hot path asks
//! [`EventListeners::emit_with`] to build an event only when some subscription
//! would actually receive it.

use std::fmt;
use std::sync::Arc;

/// An observable occurrence emitted by a breaker.
pub trait FuseEvent: Send + Sync + fmt::Debug {
    /// Discriminant used to route the event to kind-filtered subscriptions.
    type Kind: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Receives events of type `E`.
pub trait EventListener<E: FuseEvent>: Send + Sync {
    /// Called once per delivered event.
    fn on_event(&self, event: &E);
}

/// Shared, type-erased listener.
pub type SharedEventListener<E> = Arc<dyn EventListener<E>>;

struct Subscription<E: FuseEvent> {
    /// `None` receives every kind.
    kind: Option<E::Kind>,
    listener: SharedEventListener<E>,
}

impl<E: FuseEvent> Subscription<E> {
    fn accepts(&self, kind: E::Kind) -> bool {
        self.kind.map_or(true, |wanted| wanted == kind)
    }
}

impl<E: FuseEvent> Clone for Subscription<E> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            listener: Arc::clone(&self.listener),
        }
    }
}

/// An ordered set of subscriptions.
pub struct EventListeners<E: FuseEvent> {
    subscriptions: Vec<Subscription<E>>,
}

impl<E: FuseEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Subscribes `listener` to every event.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.subscriptions.push(Subscription {
            kind: None,
            listener: Arc::new(listener),
        });
    }

    /// Subscribes `listener` to events of one kind only.
    pub fn add_for<L>(&mut self, kind: E::Kind, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.subscriptions.push(Subscription {
            kind: Some(kind),
            listener: Arc::new(listener),
        });
    }

    /// Whether any subscription would receive an event of `kind`.
    pub fn wants(&self, kind: E::Kind) -> bool {
        self.subscriptions.iter().any(|s| s.accepts(kind))
    }

    /// Delivers `event` to every matching subscription in registration order.
    ///
    /// A panicking listener is isolated: the panic is caught and the remaining
    /// listeners still run. Breaker state is never affected by a listener.
    pub fn emit(&self, event: &E) {
        let kind = event.kind();
        for subscription in self.subscriptions.iter().filter(|s| s.accepts(kind)) {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                subscription.listener.on_event(event);
            }));
        }
    }

    /// Builds and delivers an event of `kind` only when it has a receiver.
    pub fn emit_with<F>(&self, kind: E::Kind, make: F)
    where
        F: FnOnce() -> E,
    {
        if self.wants(kind) {
            self.emit(&make());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }
}

impl<E: FuseEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            subscriptions: self.subscriptions.clone(),
        }
    }
}

impl<E: FuseEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: FuseEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filtered = self.subscriptions.iter().filter(|s| s.kind.is_some()).count();
        f.debug_struct("EventListeners")
            .field("len", &self.subscriptions.len())
            .field("filtered", &filtered)
            .finish()
    }
}

/// A listener backed by a closure.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _event: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: FuseEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
