//! The event stream: a node in the dispatch graph.

use super::state::{StreamState, Subscription};
use crate::error::{Result, StreamError};
use crate::listeners::{
    channel_listener, ChannelListener, ErasedListener, Listener, ListenerGuard,
};
use crate::types::{AnyEvent, Event, EventType};
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

/// Stream configuration.
#[derive(Clone, Debug, Default)]
pub struct StreamConfig {
    /// Name used in logs, errors and `Debug` output.
    pub label: Option<String>,

    /// Number of event types to preallocate room for.
    pub type_capacity: usize,
}

/// Shared node behind every [`EventStream`] handle.
///
/// Peers only ever hold `Weak` references to a core, so the graph never owns
/// its nodes. The lock is held for bookkeeping only: it is released before
/// any callback runs and before any peer stream is touched.
pub(crate) struct StreamCore<F: 'static> {
    label: Option<String>,
    state: Mutex<StreamState<F>>,
    _family: PhantomData<fn() -> F>,
}

impl<F: 'static> StreamCore<F> {
    fn new(config: StreamConfig) -> Self {
        Self {
            label: config.label,
            state: Mutex::new(StreamState::with_capacity(config.type_capacity)),
            _family: PhantomData,
        }
    }

    fn name(&self) -> &str {
        self.label.as_deref().unwrap_or("<unlabeled>")
    }

    fn disposed_error(&self) -> StreamError {
        StreamError::disposed(self.label.as_deref())
    }

    // --- Propagation ---

    /// Append `subscription` under `event_type`. The first subscription for a
    /// type registers this stream with every source, recursively.
    ///
    /// Returns false (and stores nothing) if the stream is disposed.
    fn add_subscription(self: &Arc<Self>, event_type: EventType, subscription: Subscription<F>) -> bool {
        let sources = {
            let mut state = self.state.lock();
            if state.is_disposed() {
                return false;
            }
            if !state.push(event_type, subscription) {
                return true;
            }
            state.live_sources()
        };

        if !sources.is_empty() {
            debug!(
                stream = self.name(),
                event_type = %event_type,
                sources = sources.len(),
                "first subscription, registering with sources"
            );
        }

        let registration = Subscription::Forward(Arc::downgrade(self));
        for source in sources {
            source.add_subscription(event_type, registration.clone());
        }
        true
    }

    /// Remove the first subscription under `event_type` matching `pred`. The
    /// last removal for a type unregisters this stream from every source,
    /// recursively. Missing entries are ignored.
    fn remove_subscription<P>(&self, event_type: EventType, pred: P)
    where
        P: Fn(&Subscription<F>) -> bool,
    {
        let (removed, sources) = {
            let mut state = self.state.lock();
            let Some((removed, emptied)) = state.remove_first(event_type, pred) else {
                return;
            };
            let sources = if emptied { state.live_sources() } else { Vec::new() };
            (removed, sources)
        };
        // The entry may own the last handle to a callback, whose captures may
        // touch streams when dropped.
        drop(removed);

        if !sources.is_empty() {
            debug!(
                stream = self.name(),
                event_type = %event_type,
                sources = sources.len(),
                "last subscription removed, unregistering from sources"
            );
        }

        let this = self as *const Self;
        for source in sources {
            source.remove_forward(event_type, this);
        }
    }

    /// Remove one forwarding registration for `target` under `event_type`.
    ///
    /// Not generic, so the upstream recursion of `remove_subscription` always
    /// instantiates the same predicate type.
    fn remove_forward(&self, event_type: EventType, target: *const Self) {
        self.remove_subscription(event_type, |s| s.is_forward_to(target));
    }

    fn dispatch<T: 'static>(&self, event_type: EventType, event: &T) {
        let snapshot = {
            let state = self.state.lock();
            match state.snapshot(event_type) {
                Some(snapshot) => snapshot,
                None => return,
            }
        };

        trace!(
            stream = self.name(),
            event_type = %event_type,
            subscriptions = snapshot.len(),
            "dispatching event"
        );

        for subscription in &snapshot {
            match subscription {
                Subscription::Callback(handler) => handler.call(event),
                Subscription::Forward(target) => {
                    if let Some(target) = target.upgrade() {
                        target.dispatch(event_type, event);
                    }
                }
            }
        }
    }

    // --- Links ---

    fn link(self: &Arc<Self>, forward: &Arc<Self>) -> Result<()> {
        {
            let state = self.state.lock();
            if state.is_disposed() {
                return Err(self.disposed_error());
            }
            if state.has_forward(Arc::as_ptr(forward)) {
                debug!(
                    stream = self.name(),
                    forward = forward.name(),
                    "streams already linked"
                );
                return Ok(());
            }
        }

        let listened = {
            let mut state = forward.state.lock();
            if state.is_disposed() {
                return Err(forward.disposed_error());
            }
            state.add_source(Arc::downgrade(self));
            state.listened_types()
        };
        self.state.lock().add_forward(Arc::downgrade(forward));

        debug!(
            stream = self.name(),
            forward = forward.name(),
            types = listened.len(),
            "linked forward stream"
        );

        let registration = Subscription::Forward(Arc::downgrade(forward));
        for event_type in listened {
            self.add_subscription(event_type, registration.clone());
        }
        Ok(())
    }

    fn unlink(&self, forward: &StreamCore<F>) {
        let target = forward as *const Self;
        if !self.state.lock().has_forward(target) {
            return;
        }

        let listened = forward.state.lock().listened_types();
        for event_type in &listened {
            self.remove_forward(*event_type, target);
        }

        self.state.lock().remove_forward(target);
        forward.state.lock().remove_source(self as *const Self);

        debug!(
            stream = self.name(),
            forward = forward.name(),
            types = listened.len(),
            "unlinked forward stream"
        );
    }

    /// Sever every link, then clear the subscription map. Forward links go
    /// first and source links second so upstream cleanup still sees this
    /// stream's subscriptions.
    fn dispose(&self) {
        let forwards = {
            let mut state = self.state.lock();
            if !state.mark_disposed() {
                return;
            }
            state.live_forwards()
        };
        for forward in &forwards {
            self.unlink(forward);
        }

        let sources = self.state.lock().live_sources();
        for source in &sources {
            source.unlink(self);
        }

        let leftovers = {
            let mut state = self.state.lock();
            state.clear_links();
            state.take_subscriptions()
        };

        debug!(
            stream = self.name(),
            forwards = forwards.len(),
            sources = sources.len(),
            types = leftovers.len(),
            "disposed event stream"
        );
        drop(leftovers);
    }
}

impl<F: 'static> Drop for StreamCore<F> {
    fn drop(&mut self) {
        // Peers only hold weak references, so the last handle going away
        // must take its registrations with it.
        self.dispose();
    }
}

/// A node in a typed event dispatch graph.
///
/// Listeners subscribe by event type; [`trigger_event`](Self::trigger_event)
/// calls every listener registered for the exact type of the event. Streams
/// can be chained with [`add_listener_stream`](Self::add_listener_stream):
/// the source then forwards to the target every event type the target
/// currently has listeners for, and nothing else. Registrations with sources
/// are created when a type gains its first listener and removed when it
/// loses its last one, transitively through the whole chain.
///
/// `EventStream` is a cheap handle; clones refer to the same stream. Links
/// between streams do not keep them alive: dropping the last handle severs
/// every link, as [`dispose`](Self::dispose) does.
///
/// # Contract
///
/// - Dispatch is synchronous and depth-first. A cycle of forward links
///   recurses without bound; forming one is a caller error and is not
///   detected.
/// - Listeners may add or remove listeners and links (on any stream) while
///   being dispatched to; the change applies from the next trigger on.
/// - Concurrent mutation of a connected graph must be serialized by the
///   caller.
///
/// # Example
///
/// ```
/// use eventstream::{EventStream, Listener};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// struct Speed(u32);
///
/// let child: EventStream = EventStream::labeled("child");
/// let parent: EventStream = EventStream::labeled("parent");
/// child.add_listener_stream(&parent).unwrap();
///
/// let total = Arc::new(AtomicU32::new(0));
/// let sum = total.clone();
/// let listener = Listener::new(move |speed: &Speed| {
///     sum.fetch_add(speed.0, Ordering::SeqCst);
/// });
/// parent.add_listener(&listener).unwrap();
///
/// child.trigger_event(Speed(7));
/// assert_eq!(total.load(Ordering::SeqCst), 7);
/// ```
pub struct EventStream<F: 'static = AnyEvent> {
    core: Arc<StreamCore<F>>,
}

impl<F: 'static> EventStream<F> {
    /// Create an empty stream with default configuration.
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    /// Create an empty stream with a label for logs and errors.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self::with_config(StreamConfig {
            label: Some(label.into()),
            ..Default::default()
        })
    }

    pub fn with_config(config: StreamConfig) -> Self {
        Self {
            core: Arc::new(StreamCore::new(config)),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.core.label.as_deref()
    }

    // --- Listeners ---

    /// Register `listener` for events of type `T`.
    ///
    /// Registering the same listener twice is allowed; each registration is
    /// called and removed independently.
    pub fn add_listener<T: Event<F>>(&self, listener: &Listener<T>) -> Result<()> {
        self.insert_callback(EventType::of::<T>(), Subscription::Callback(listener.handler()))
    }

    /// Remove one registration of `listener`. Does nothing if it is not
    /// registered.
    pub fn remove_listener<T: Event<F>>(&self, listener: &Listener<T>) {
        let identity = listener.identity();
        self.core
            .remove_subscription(EventType::of::<T>(), |s| s.is_callback(identity));
    }

    /// Register a type-erased listener under a runtime event type.
    ///
    /// `event_type` should name an event of this stream's family; the stream
    /// cannot check that for erased keys.
    pub fn add_erased_listener(&self, event_type: EventType, listener: &ErasedListener) -> Result<()> {
        self.insert_callback(event_type, Subscription::Callback(listener.handler()))
    }

    pub fn remove_erased_listener(&self, event_type: EventType, listener: &ErasedListener) {
        let identity = listener.identity();
        self.core
            .remove_subscription(event_type, |s| s.is_callback(identity));
    }

    /// Register `callback` for events of type `T` until the returned guard is
    /// dropped.
    pub fn subscribe<T, C>(&self, callback: C) -> Result<ListenerGuard>
    where
        T: Event<F>,
        C: Fn(&T) + Send + Sync + 'static,
    {
        let listener = Listener::new(callback);
        self.add_listener(&listener)?;
        Ok(self.guard(&listener))
    }

    /// Receive clones of every `T` event through a bounded channel.
    ///
    /// Events arriving while the buffer is full are dropped and counted
    /// rather than blocking dispatch.
    pub fn subscribe_channel<T>(&self, capacity: usize) -> Result<ChannelListener<T>>
    where
        T: Event<F> + Clone + Send,
    {
        let (listener, receiver, dropped) = channel_listener::<T>(capacity);
        self.add_listener(&listener)?;
        let guard = self.guard(&listener);
        // The stream now holds the only strong handle, so disposal closes the
        // channel.
        drop(listener);
        Ok(ChannelListener::new(receiver, dropped, guard))
    }

    fn insert_callback(&self, event_type: EventType, subscription: Subscription<F>) -> Result<()> {
        if self.core.add_subscription(event_type, subscription) {
            Ok(())
        } else {
            Err(self.core.disposed_error())
        }
    }

    fn guard<T: Event<F>>(&self, listener: &Listener<T>) -> ListenerGuard {
        let stream = Arc::downgrade(&self.core);
        let listener = listener.downgrade();
        ListenerGuard::new(
            EventType::of::<T>(),
            Box::new(move || {
                let (Some(core), Some(listener)) = (stream.upgrade(), Listener::upgrade(&listener))
                else {
                    return;
                };
                let identity = listener.identity();
                core.remove_subscription(EventType::of::<T>(), |s| s.is_callback(identity));
            }),
        )
    }

    // --- Links ---

    /// Forward to `forward` every event it has listeners for.
    ///
    /// Types `forward` starts listening to later are picked up through normal
    /// propagation. Linking an already linked pair does nothing. Fails if
    /// either stream is disposed.
    pub fn add_listener_stream(&self, forward: &EventStream<F>) -> Result<()> {
        self.core.link(&forward.core)
    }

    /// Stop forwarding to `forward` and drop registrations upstream that only
    /// existed for it. Does nothing if the streams are not linked.
    pub fn remove_listener_stream(&self, forward: &EventStream<F>) {
        self.core.unlink(&forward.core);
    }

    // --- Dispatch ---

    /// Dispatch `event` to every listener for its exact type, here and in
    /// every stream this one forwards it to.
    ///
    /// Each stream dispatches against the list of subscriptions it had when
    /// the event reached it. Unknown types are ignored.
    pub fn trigger_event<T: Event<F>>(&self, event: T) {
        self.core.dispatch(EventType::of::<T>(), &event);
    }

    // --- Lifecycle ---

    /// Sever every link and clear all subscriptions.
    ///
    /// The stream stays disposed: later registrations fail with
    /// [`StreamError::Disposed`], removals and triggers do nothing, and
    /// disposing again is a no-op. Peer streams are never disposed.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.state.lock().is_disposed()
    }

    // --- Introspection ---

    /// Whether the stream has at least one subscription, direct or forwarded,
    /// for `T`.
    pub fn listens_to<T: Event<F>>(&self) -> bool {
        self.core.state.lock().listens_to(EventType::of::<T>())
    }

    pub fn listened_types(&self) -> Vec<EventType> {
        self.core.state.lock().listened_types()
    }

    /// Total subscriptions (callbacks and forwards) under `event_type`.
    pub fn subscription_count(&self, event_type: EventType) -> usize {
        self.core.state.lock().subscription_count(event_type)
    }

    /// Number of forwarding registrations for `target` under `event_type`.
    pub fn forward_registrations(&self, event_type: EventType, target: &EventStream<F>) -> usize {
        let target = Arc::as_ptr(&target.core);
        self.core
            .state
            .lock()
            .count_matching(event_type, |s| s.is_forward_to(target))
    }

    pub fn forwards_to(&self, other: &EventStream<F>) -> bool {
        self.core.state.lock().has_forward(Arc::as_ptr(&other.core))
    }

    pub fn has_source(&self, other: &EventStream<F>) -> bool {
        self.core.state.lock().has_source(Arc::as_ptr(&other.core))
    }

    pub fn forward_count(&self) -> usize {
        self.core.state.lock().forward_count()
    }

    pub fn source_count(&self) -> usize {
        self.core.state.lock().source_count()
    }

    /// Whether both handles refer to the same stream.
    pub fn same_stream(&self, other: &EventStream<F>) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl<F: 'static> Clone for EventStream<F> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<F: 'static> Default for EventStream<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: 'static> fmt::Debug for EventStream<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.lock();
        f.debug_struct("EventStream")
            .field("label", &self.core.label)
            .field("types", &state.type_count())
            .field("forwards", &state.forward_count())
            .field("sources", &state.source_count())
            .field("disposed", &state.is_disposed())
            .finish()
    }
}
