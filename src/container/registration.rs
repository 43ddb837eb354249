//! Registration records stored by the [`ServiceContainer`](super::ServiceContainer).

use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::BoxError;

use super::ServiceContainer;

/// How long a constructed instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// A new instance on every resolution. The caller owns disposal.
    #[default]
    Transient,
    /// One instance per container, built on first resolution and disposed
    /// when the container is disposed.
    PerContainer,
}

/// Type-erased instance. The concrete type is always `Arc<S>` for the
/// registration's service type `S`.
pub(crate) type AnyInstance = Box<dyn Any + Send + Sync>;

/// Type-erased factory.
pub(crate) type Factory =
    Arc<dyn Fn(&ServiceContainer) -> std::result::Result<AnyInstance, BoxError> + Send + Sync>;

/// Turns a freshly built instance into its teardown closure.
pub(crate) type Teardown = Arc<dyn Fn(&AnyInstance) -> Option<TeardownHook> + Send + Sync>;

/// A single deferred release action.
pub(crate) type TeardownHook = Box<dyn FnOnce() + Send>;

/// One named registration for a service type.
pub(crate) struct Registration {
    /// Binding name, unique per service type.
    pub name: String,
    pub lifetime: Lifetime,
    pub factory: Factory,
    /// Present when the service type declared [`Dispose`](super::Dispose).
    pub teardown: Option<Teardown>,
    /// Cached instance for [`Lifetime::PerContainer`].
    pub cached: Mutex<Option<Arc<AnyInstance>>>,
}

impl Registration {
    pub fn new(name: String, lifetime: Lifetime, factory: Factory, teardown: Option<Teardown>) -> Self {
        Self {
            name,
            lifetime,
            factory,
            teardown,
            cached: Mutex::new(None),
        }
    }

    /// Get the cached per-container instance, if built.
    pub fn cached(&self) -> Option<Arc<AnyInstance>> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store a per-container instance unless another caller won the race.
    ///
    /// Returns the instance that ended up cached, plus our own instance
    /// back when it was rejected so the caller can release it.
    pub fn cache(&self, instance: AnyInstance) -> (Arc<AnyInstance>, Option<AnyInstance>) {
        let mut slot = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(existing) => (existing.clone(), Some(instance)),
            None => {
                let instance = Arc::new(instance);
                *slot = Some(instance.clone());
                (instance, None)
            }
        }
    }
}

/// Per-service-type list of registrations, in registration order.
pub(crate) struct ServiceEntry {
    pub service: &'static str,
    pub registrations: Vec<Arc<Registration>>,
}

impl ServiceEntry {
    pub fn new(service: &'static str) -> Self {
        Self {
            service,
            registrations: Vec::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registrations.iter().any(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(name: &str) -> Registration {
        let factory: Factory =
            Arc::new(|_: &ServiceContainer| Ok(Box::new(Arc::new(1u32)) as AnyInstance));
        Registration::new(name.to_string(), Lifetime::PerContainer, factory, None)
    }

    #[test]
    fn test_default_lifetime_is_transient() {
        assert_eq!(Lifetime::default(), Lifetime::Transient);
    }

    #[test]
    fn test_first_cached_instance_wins() {
        let reg = registration("a");
        assert!(reg.cached().is_none());

        let (first, rejected) = reg.cache(Box::new(Arc::new(1u32)));
        assert!(rejected.is_none());

        let (second, rejected) = reg.cache(Box::new(Arc::new(2u32)));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            second.downcast_ref::<Arc<u32>>().map(|v| **v),
            Some(1)
        );
        assert_eq!(
            rejected.and_then(|r| r.downcast_ref::<Arc<u32>>().map(|v| **v)),
            Some(2)
        );
    }

    #[test]
    fn test_entry_contains_name() {
        let mut entry = ServiceEntry::new("u32");
        entry.registrations.push(Arc::new(registration("a")));

        assert!(entry.contains("a"));
        assert!(!entry.contains("b"));
    }
}
