//! Callback handles and their type-erased storage form.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Typed callback body. Stored erased as `Arc<dyn Any>` and recovered by
/// downcasting the handler (never the event) at the trigger site.
pub(crate) struct TypedFn<T: 'static>(Box<dyn Fn(&T) + Send + Sync>);

type ErasedFn = dyn Fn(&dyn Any) + Send + Sync;

/// A callback for events of type `T`.
///
/// The handle is the listener's identity: clones refer to the same listener,
/// and removing any clone removes one registration of it. Two handles built
/// from identical closures are different listeners.
pub struct Listener<T: 'static> {
    func: Arc<TypedFn<T>>,
}

impl<T: 'static> Listener<T> {
    pub fn new<C>(callback: C) -> Self
    where
        C: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(TypedFn(Box::new(callback))),
        }
    }

    /// Invoke the callback directly, bypassing any stream.
    pub fn call(&self, event: &T) {
        (self.func.0)(event)
    }

    /// Whether both handles refer to the same listener.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }

    pub(crate) fn identity(&self) -> *const () {
        Arc::as_ptr(&self.func) as *const ()
    }

    pub(crate) fn handler(&self) -> Handler {
        Handler::Typed(self.func.clone())
    }

    /// Non-owning reference that does not keep the callback (or anything it
    /// captures) alive.
    pub(crate) fn downgrade(&self) -> Weak<TypedFn<T>> {
        Arc::downgrade(&self.func)
    }

    pub(crate) fn upgrade(weak: &Weak<TypedFn<T>>) -> Option<Self> {
        weak.upgrade().map(|func| Self { func })
    }
}

impl<T: 'static> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
        }
    }
}

impl<T: 'static> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("event_type", &std::any::type_name::<T>())
            .field("id", &self.identity())
            .finish()
    }
}

/// A callback over `&dyn Any`, registered under a runtime [`EventType`].
///
/// Useful when the event type is only known at runtime. The callback only
/// ever sees events whose exact type matches the key it was registered with.
///
/// [`EventType`]: crate::EventType
#[derive(Clone)]
pub struct ErasedListener {
    func: Arc<ErasedFn>,
}

impl ErasedListener {
    pub fn new<C>(callback: C) -> Self
    where
        C: Fn(&dyn Any) + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(callback),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }

    pub(crate) fn identity(&self) -> *const () {
        Arc::as_ptr(&self.func) as *const ()
    }

    pub(crate) fn handler(&self) -> Handler {
        Handler::Erased(self.func.clone())
    }
}

impl fmt::Debug for ErasedListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedListener")
            .field("id", &self.identity())
            .finish()
    }
}

/// Stored form of a callback subscription.
#[derive(Clone)]
pub(crate) enum Handler {
    Typed(Arc<dyn Any + Send + Sync>),
    Erased(Arc<ErasedFn>),
}

impl Handler {
    pub(crate) fn call<T: 'static>(&self, event: &T) {
        match self {
            Handler::Typed(func) => {
                if let Some(func) = (**func).downcast_ref::<TypedFn<T>>() {
                    (func.0)(event);
                } else {
                    // Only reachable when an erased key disagrees with the handler.
                    tracing::trace!(
                        expected = std::any::type_name::<T>(),
                        "skipping handler registered for another type"
                    );
                }
            }
            Handler::Erased(func) => (**func)(event as &dyn Any),
        }
    }

    pub(crate) fn identity(&self) -> *const () {
        match self {
            Handler::Typed(func) => Arc::as_ptr(func) as *const (),
            Handler::Erased(func) => Arc::as_ptr(func) as *const (),
        }
    }
}
