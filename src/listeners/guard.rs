//! Scoped listener registrations.

use crate::types::EventType;
use std::fmt;

type Release = Box<dyn FnOnce() + Send + Sync>;

/// Keeps a listener registered for as long as it is alive.
///
/// Dropping the guard removes the registration from its stream. The guard
/// does not keep the stream alive; if the stream is already gone or disposed,
/// dropping the guard does nothing.
#[must_use = "dropping the guard immediately removes the listener"]
pub struct ListenerGuard {
    event_type: EventType,
    release: Option<Release>,
}

impl ListenerGuard {
    pub(crate) fn new(event_type: EventType, release: Release) -> Self {
        Self {
            event_type,
            release: Some(release),
        }
    }

    /// The event type this registration listens to.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Remove the registration now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Give up the guard while keeping the listener registered until its
    /// stream is disposed.
    pub fn detach(mut self) {
        self.release = None;
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("event_type", &self.event_type)
            .field("attached", &self.release.is_some())
            .finish()
    }
}
