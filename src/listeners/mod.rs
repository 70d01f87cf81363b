//! Listener handles for event streams.
//!
//! - [`Listener`]: typed callback, identified by its handle
//! - [`ErasedListener`]: callback over `&dyn Any` keyed by a runtime event type
//! - [`ListenerGuard`]: removes its registration on drop
//! - [`ChannelListener`]: bounded channel bridge to another thread

mod callback;
mod channel;
mod guard;

pub(crate) use callback::Handler;
pub(crate) use channel::channel_listener;

pub use callback::{ErasedListener, Listener};
pub use channel::{ChannelListener, DEFAULT_CHANNEL_CAPACITY};
pub use guard::ListenerGuard;
