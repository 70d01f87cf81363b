//! Core types for event streams.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Marks a payload as a member of the event family `F`.
///
/// A stream of family `F` only accepts listeners and events whose types
/// implement `Event<F>`. Families are plain marker types:
///
/// ```
/// use eventstream::Event;
///
/// pub enum ChildEvents {}
///
/// pub struct Running { pub speed: f32 }
/// impl Event<ChildEvents> for Running {}
/// ```
pub trait Event<F = AnyEvent>: Any {}

/// Open event family accepting every `'static` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnyEvent {}

impl<T: Any> Event<AnyEvent> for T {}

/// Dispatch key: the exact runtime type of an event.
///
/// Equality and hashing only consider the `TypeId`; the name is kept for
/// logs and error messages.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Key for the concrete type `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventType({})", self.name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Speed;
    struct Stop;

    #[test]
    fn test_event_type_identity() {
        assert_eq!(EventType::of::<Speed>(), EventType::of::<Speed>());
        assert_ne!(EventType::of::<Speed>(), EventType::of::<Stop>());

        let mut set = HashSet::new();
        set.insert(EventType::of::<Speed>());
        set.insert(EventType::of::<Speed>());
        set.insert(EventType::of::<Stop>());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_event_type_display_uses_type_name() {
        let ty = EventType::of::<Speed>();
        assert!(ty.to_string().ends_with("Speed"));
        assert_eq!(ty.type_id(), TypeId::of::<Speed>());
    }
}
