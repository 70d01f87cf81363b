//! # Event Streams
//!
//! Typed, in-process event dispatch graphs.
//!
//! ## Core Concepts
//!
//! - **Events**: plain payloads, dispatched by their exact type
//! - **Listeners**: callbacks registered per event type, called in order
//! - **Streams**: nodes that hold listeners and forward events to other streams
//! - **Lazy propagation**: a stream is registered with its sources only for
//!   the event types it currently has listeners for, transitively
//!
//! ## Example
//!
//! ```
//! use eventstream::{Event, EventStream};
//!
//! pub enum ChildEvents {}
//!
//! #[derive(Clone, Debug)]
//! pub struct Running { pub child: usize, pub speed: f32 }
//! impl Event<ChildEvents> for Running {}
//!
//! let parent = EventStream::<ChildEvents>::labeled("parent");
//! let children: Vec<_> = (0..3)
//!     .map(|i| EventStream::<ChildEvents>::labeled(format!("child {i}")))
//!     .collect();
//! for child in &children {
//!     child.add_listener_stream(&parent)?;
//! }
//!
//! let running = parent.subscribe_channel::<Running>(16)?;
//! children[1].trigger_event(Running { child: 1, speed: 4.0 });
//!
//! assert_eq!(running.try_recv().unwrap().child, 1);
//! # Ok::<(), eventstream::StreamError>(())
//! ```

pub mod error;
pub mod listeners;
pub mod stream;
pub mod types;

// Re-exports
pub use error::{Result, StreamError};
pub use listeners::{
    ChannelListener, ErasedListener, Listener, ListenerGuard, DEFAULT_CHANNEL_CAPACITY,
};
pub use stream::{EventStream, StreamConfig};
pub use types::{AnyEvent, Event, EventType};
