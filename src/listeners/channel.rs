//! Channel-backed listeners for consuming events on another thread.

use super::callback::Listener;
use super::guard::ListenerGuard;
use crossbeam_channel::{bounded, Receiver, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default buffer size for channel listeners.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Receives cloned events from a stream through a bounded channel.
///
/// Dispatch never blocks on the channel: when the buffer is full (or the
/// receiving side is gone) the event is dropped and counted. Dropping the
/// `ChannelListener` removes its registration from the stream.
pub struct ChannelListener<T> {
    receiver: Receiver<T>,
    dropped: Arc<AtomicU64>,
    _guard: ListenerGuard,
}

impl<T> ChannelListener<T> {
    pub(crate) fn new(receiver: Receiver<T>, dropped: Arc<AtomicU64>, guard: ListenerGuard) -> Self {
        Self {
            receiver,
            dropped,
            _guard: guard,
        }
    }

    /// Receive the next event (blocking).
    ///
    /// Returns an error once the stream has released the listener (disposed
    /// or dropped) and the buffer is drained.
    pub fn recv(&self) -> Result<T, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<T, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Number of events dropped because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// The underlying receiver, e.g. for `crossbeam_channel::select!`.
    pub fn receiver(&self) -> &Receiver<T> {
        &self.receiver
    }
}

/// Build the listener half: a callback that clones events into a bounded
/// channel, plus the receiver and the drop counter.
pub(crate) fn channel_listener<T>(capacity: usize) -> (Listener<T>, Receiver<T>, Arc<AtomicU64>)
where
    T: Clone + Send + 'static,
{
    let (sender, receiver) = bounded(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let counter = dropped.clone();

    let listener = Listener::new(move |event: &T| match sender.try_send(event.clone()) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            let total = counter.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(
                event_type = std::any::type_name::<T>(),
                dropped = total,
                "channel listener full, dropping event"
            );
        }
        Err(TrySendError::Disconnected(_)) => {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    (listener, receiver, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_feeds_channel() {
        let (listener, receiver, dropped) = channel_listener::<u32>(4);

        listener.call(&1);
        listener.call(&2);

        assert_eq!(receiver.try_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_full_buffer_drops_and_counts() {
        let (listener, receiver, dropped) = channel_listener::<u32>(2);

        for i in 0..5 {
            listener.call(&i);
        }

        assert_eq!(receiver.try_iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(dropped.load(Ordering::Relaxed), 3);
    }
}
