//! Event streams and the subscription propagation between them.
//!
//! Each stream keeps, per event type, an ordered list of subscriptions. A
//! subscription is either a callback or a forwarding entry pointing at a
//! downstream stream. For a link `source -> target`, the source holds exactly
//! one forwarding entry for `target` under every type `target` listens to
//! (directly or through its own forwards), and none for any other type.
//!
//! That invariant is maintained lazily:
//! - a type's first subscription on a stream registers the stream with all
//!   of its sources, which may in turn be their first subscription
//! - a type's last subscription going away unregisters the stream from all
//!   of its sources, again transitively
//! - linking registers the target's current types; unlinking and disposal
//!   remove them

mod event_stream;
mod state;

pub use event_stream::{EventStream, StreamConfig};
