//! Per-stream subscription map and link lists.

use super::event_stream::StreamCore;
use crate::listeners::Handler;
use crate::types::EventType;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// A single entry in a stream's subscription list.
pub(crate) enum Subscription<F: 'static> {
    /// Caller-supplied callback.
    Callback(Handler),
    /// Re-dispatch into a downstream stream.
    Forward(Weak<StreamCore<F>>),
}

impl<F: 'static> Subscription<F> {
    pub(crate) fn is_callback(&self, identity: *const ()) -> bool {
        matches!(self, Subscription::Callback(handler) if handler.identity() == identity)
    }

    pub(crate) fn is_forward_to(&self, target: *const StreamCore<F>) -> bool {
        matches!(self, Subscription::Forward(stream) if Weak::as_ptr(stream) == target)
    }
}

impl<F: 'static> Clone for Subscription<F> {
    fn clone(&self) -> Self {
        match self {
            Subscription::Callback(handler) => Subscription::Callback(handler.clone()),
            Subscription::Forward(stream) => Subscription::Forward(stream.clone()),
        }
    }
}

/// Mutable state of one stream. Only touched under the stream's own lock,
/// and never while a callback or a peer stream is running.
pub(crate) struct StreamState<F: 'static> {
    /// Keys exist only while their list is non-empty.
    subscriptions: HashMap<EventType, Vec<Subscription<F>>>,
    /// Streams this stream feeds.
    forward_streams: Vec<Weak<StreamCore<F>>>,
    /// Streams feeding this stream.
    source_streams: Vec<Weak<StreamCore<F>>>,
    disposed: bool,
}

impl<F: 'static> StreamState<F> {
    pub(crate) fn with_capacity(type_capacity: usize) -> Self {
        Self {
            subscriptions: HashMap::with_capacity(type_capacity),
            forward_streams: Vec::new(),
            source_streams: Vec::new(),
            disposed: false,
        }
    }

    /// Append a subscription. Returns true if it is the first for `event_type`.
    pub(crate) fn push(&mut self, event_type: EventType, subscription: Subscription<F>) -> bool {
        let list = self.subscriptions.entry(event_type).or_default();
        list.push(subscription);
        list.len() == 1
    }

    /// Remove the first subscription matching `pred`.
    ///
    /// Returns the removed entry and whether the list for `event_type` became
    /// empty (in which case the key is gone too).
    pub(crate) fn remove_first<P>(
        &mut self,
        event_type: EventType,
        pred: P,
    ) -> Option<(Subscription<F>, bool)>
    where
        P: Fn(&Subscription<F>) -> bool,
    {
        let list = self.subscriptions.get_mut(&event_type)?;
        let position = list.iter().position(pred)?;
        let removed = list.remove(position);

        let emptied = list.is_empty();
        if emptied {
            self.subscriptions.remove(&event_type);
        }
        Some((removed, emptied))
    }

    /// Copy of the list for `event_type`, taken before dispatch.
    pub(crate) fn snapshot(&self, event_type: EventType) -> Option<Vec<Subscription<F>>> {
        self.subscriptions.get(&event_type).cloned()
    }

    pub(crate) fn listens_to(&self, event_type: EventType) -> bool {
        self.subscriptions.contains_key(&event_type)
    }

    pub(crate) fn listened_types(&self) -> Vec<EventType> {
        self.subscriptions.keys().copied().collect()
    }

    pub(crate) fn subscription_count(&self, event_type: EventType) -> usize {
        self.subscriptions.get(&event_type).map_or(0, Vec::len)
    }

    pub(crate) fn count_matching<P>(&self, event_type: EventType, pred: P) -> usize
    where
        P: Fn(&Subscription<F>) -> bool,
    {
        self.subscriptions
            .get(&event_type)
            .map_or(0, |list| list.iter().filter(|s| pred(*s)).count())
    }

    pub(crate) fn type_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Empty the subscription map, handing the entries back so the caller can
    /// drop them after releasing the lock.
    pub(crate) fn take_subscriptions(&mut self) -> HashMap<EventType, Vec<Subscription<F>>> {
        std::mem::take(&mut self.subscriptions)
    }

    // --- Links ---

    pub(crate) fn has_forward(&self, target: *const StreamCore<F>) -> bool {
        self.forward_streams.iter().any(|s| Weak::as_ptr(s) == target)
    }

    pub(crate) fn has_source(&self, source: *const StreamCore<F>) -> bool {
        self.source_streams.iter().any(|s| Weak::as_ptr(s) == source)
    }

    pub(crate) fn add_forward(&mut self, target: Weak<StreamCore<F>>) {
        self.forward_streams.push(target);
    }

    pub(crate) fn add_source(&mut self, source: Weak<StreamCore<F>>) {
        self.source_streams.push(source);
    }

    pub(crate) fn remove_forward(&mut self, target: *const StreamCore<F>) -> bool {
        remove_link(&mut self.forward_streams, target)
    }

    pub(crate) fn remove_source(&mut self, source: *const StreamCore<F>) -> bool {
        remove_link(&mut self.source_streams, source)
    }

    pub(crate) fn live_forwards(&self) -> Vec<Arc<StreamCore<F>>> {
        self.forward_streams.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn live_sources(&self) -> Vec<Arc<StreamCore<F>>> {
        self.source_streams.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn forward_count(&self) -> usize {
        self.forward_streams.len()
    }

    pub(crate) fn source_count(&self) -> usize {
        self.source_streams.len()
    }

    pub(crate) fn clear_links(&mut self) {
        self.forward_streams.clear();
        self.source_streams.clear();
    }

    // --- Lifecycle ---

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Mark disposed. Returns false if it already was.
    pub(crate) fn mark_disposed(&mut self) -> bool {
        !std::mem::replace(&mut self.disposed, true)
    }
}

fn remove_link<F: 'static>(links: &mut Vec<Weak<StreamCore<F>>>, target: *const StreamCore<F>) -> bool {
    match links.iter().position(|s| Weak::as_ptr(s) == target) {
        Some(position) => {
            links.remove(position);
            true
        }
        None => false,
    }
}
