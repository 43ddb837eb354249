//! Service container - the construction collaborator behind handler activation.
//!
//! The container maps a service type (sized or `dyn Trait`) to an ordered
//! list of named registrations. Each registration owns a factory closure
//! and a [`Lifetime`]. Two verbs matter to the rest of the crate:
//!
//! - register a type under a contract, optionally with disposal
//! - construct every instance registered for a contract
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use procwire_activation::container::{Lifetime, ServiceContainer};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String { "hello".into() }
//! }
//!
//! let container = ServiceContainer::new();
//! container
//!     .register::<dyn Greeter, _>("english", Lifetime::Transient, |_| {
//!         Ok(Arc::new(English) as Arc<dyn Greeter>)
//!     })
//!     .unwrap();
//!
//! let greeters = container.get_all_instances::<dyn Greeter>().unwrap();
//! assert_eq!(greeters[0].greet(), "hello");
//! ```

mod registration;

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::{ActivationError, BoxError, Result};

pub use registration::Lifetime;
use registration::{AnyInstance, Factory, Registration, ServiceEntry, Teardown, TeardownHook};

/// Capability marker for instances holding releasable resources.
///
/// Only types that implement this trait get disposal hooks; there is no
/// runtime probing.
pub trait Dispose: Send + Sync {
    /// Release held resources. Called at most once per instance by this crate.
    fn dispose(&self);
}

/// Registry of named service registrations with per-container instances.
pub struct ServiceContainer {
    /// Registrations by service type.
    services: RwLock<HashMap<TypeId, ServiceEntry>>,
    /// Release actions for per-container instances, in construction order.
    teardown: Mutex<Vec<TeardownHook>>,
    disposed: AtomicBool,
}

impl ServiceContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            teardown: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Register a factory for service type `S` under `name`.
    ///
    /// Fails with [`ActivationError::DuplicateBinding`] if `S` already has a
    /// registration with the same name.
    pub fn register<S, F>(&self, name: impl Into<String>, lifetime: Lifetime, factory: F) -> Result<()>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceContainer) -> std::result::Result<Arc<S>, BoxError> + Send + Sync + 'static,
    {
        self.register_all(vec![PendingRegistration::new::<S, _>(name, lifetime, factory)])
            .map(|_| ())
    }

    /// Register a factory for a service type that declared [`Dispose`].
    ///
    /// Per-container instances are disposed with the container. Transient
    /// instances are left to whoever resolved them.
    pub fn register_disposable<S, F>(
        &self,
        name: impl Into<String>,
        lifetime: Lifetime,
        factory: F,
    ) -> Result<()>
    where
        S: ?Sized + Dispose + 'static,
        F: Fn(&ServiceContainer) -> std::result::Result<Arc<S>, BoxError> + Send + Sync + 'static,
    {
        self.register_all(vec![PendingRegistration::disposable::<S, _>(name, lifetime, factory)])
            .map(|_| ())
    }

    /// Add a batch of registrations atomically.
    ///
    /// Every name is checked under the write lock before anything is
    /// written, so either the whole batch is added or none of it is.
    /// Returns `Ok(false)` without writing anything when an
    /// [exclusive](PendingRegistration::exclusive) registration's service
    /// type is already registered.
    pub(crate) fn register_all(&self, batch: Vec<PendingRegistration>) -> Result<bool> {
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);

        let occupied = batch.iter().any(|pending| {
            pending.exclusive
                && services
                    .get(&pending.service_type)
                    .is_some_and(|e| !e.registrations.is_empty())
        });
        if occupied {
            return Ok(false);
        }

        for pending in &batch {
            let taken = services
                .get(&pending.service_type)
                .is_some_and(|e| e.contains(&pending.registration.name));
            if taken {
                return Err(ActivationError::DuplicateBinding {
                    service: pending.service,
                    name: pending.registration.name.clone(),
                });
            }
        }

        for pending in batch {
            let entry = services
                .entry(pending.service_type)
                .or_insert_with(|| ServiceEntry::new(pending.service));
            tracing::debug!(
                "Registered '{}' for {} ({:?})",
                pending.registration.name,
                entry.service,
                pending.registration.lifetime
            );
            entry.registrations.push(Arc::new(pending.registration));
        }
        Ok(true)
    }

    /// Check whether `S` has at least one registration.
    pub fn is_registered<S: ?Sized + 'static>(&self) -> bool {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<S>())
            .is_some_and(|e| !e.registrations.is_empty())
    }

    /// Check whether `S` has a registration named `name`.
    pub fn contains_name<S: ?Sized + 'static>(&self, name: &str) -> bool {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<S>())
            .is_some_and(|e| e.contains(name))
    }

    /// Binding names registered for `S`, in registration order.
    pub fn registration_names<S: ?Sized + 'static>(&self) -> Vec<String> {
        self.registrations::<S>()
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    /// Resolve the first registration of `S`.
    pub fn get_instance<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>> {
        let registration = self
            .registrations::<S>()
            .into_iter()
            .next()
            .ok_or(ActivationError::NotRegistered(type_name::<S>()))?;
        self.build::<S>(&registration)
    }

    /// Resolve the registration of `S` named `name`.
    pub fn get_named_instance<S: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<S>> {
        let registration = self
            .registrations::<S>()
            .into_iter()
            .find(|r| r.name == name)
            .ok_or(ActivationError::NotRegistered(type_name::<S>()))?;
        self.build::<S>(&registration)
    }

    /// Construct every instance registered for `S`, in registration order.
    ///
    /// Returns an empty list when nothing is registered. Stops at the first
    /// factory error.
    pub fn get_all_instances<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>> {
        self.instances::<S>().collect()
    }

    /// Lazily construct every instance registered for `S`.
    ///
    /// The registration list is captured when this is called; later
    /// registrations are not observed by the returned iterator.
    pub fn instances<S: ?Sized + Send + Sync + 'static>(&self) -> Instances<'_, S> {
        Instances {
            container: self,
            pending: self.registrations::<S>().into_iter(),
            _service: PhantomData,
        }
    }

    fn registrations<S: ?Sized + 'static>(&self) -> Vec<Arc<Registration>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<S>())
            .map(|e| e.registrations.clone())
            .unwrap_or_default()
    }

    fn build<S: ?Sized + Send + Sync + 'static>(&self, registration: &Registration) -> Result<Arc<S>> {
        if registration.lifetime == Lifetime::PerContainer {
            if let Some(cached) = registration.cached() {
                return downcast::<S>(&cached, registration);
            }
        }

        // Factories may resolve other services, so no lock is held here.
        let instance = (registration.factory)(self).map_err(|source| {
            tracing::error!(
                "Failed to construct '{}' for {}: {}",
                registration.name,
                type_name::<S>(),
                source
            );
            ActivationError::Construction {
                service: type_name::<S>(),
                name: registration.name.clone(),
                source,
            }
        })?;

        match registration.lifetime {
            Lifetime::Transient => downcast::<S>(&instance, registration),
            Lifetime::PerContainer => {
                let (cached, rejected) = registration.cache(instance);
                let service = downcast::<S>(&cached, registration)?;
                match rejected {
                    None => {
                        if let Some(hook) = registration.teardown.as_ref().and_then(|t| t(&cached)) {
                            self.push_teardown(hook);
                        }
                    }
                    Some(rejected) => release_rejected(registration, &service, rejected),
                }
                Ok(service)
            }
        }
    }

    fn push_teardown(&self, hook: TeardownHook) {
        if self.is_disposed() {
            tracing::warn!("Per-container instance built after container disposal; releasing now");
            hook();
            return;
        }
        self.teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    /// Dispose every per-container instance that declared [`Dispose`].
    ///
    /// Idempotent: only the first call releases anything. Also runs on drop.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let hooks = std::mem::take(&mut *self.teardown.lock().unwrap_or_else(PoisonError::into_inner));
        tracing::debug!("Disposing container ({} instances)", hooks.len());
        for hook in hooks.into_iter().rev() {
            hook();
        }
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ServiceContainer {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Iterator returned by [`ServiceContainer::instances`].
pub struct Instances<'a, S: ?Sized> {
    container: &'a ServiceContainer,
    pending: std::vec::IntoIter<Arc<Registration>>,
    _service: PhantomData<fn() -> Arc<S>>,
}

impl<S: ?Sized + Send + Sync + 'static> Iterator for Instances<'_, S> {
    type Item = Result<Arc<S>>;

    fn next(&mut self) -> Option<Self::Item> {
        let registration = self.pending.next()?;
        Some(self.container.build::<S>(&registration))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending.size_hint()
    }
}

/// A registration prepared for [`ServiceContainer::register_all`].
pub(crate) struct PendingRegistration {
    service_type: TypeId,
    service: &'static str,
    registration: Registration,
    exclusive: bool,
}

impl PendingRegistration {
    pub fn new<S, F>(name: impl Into<String>, lifetime: Lifetime, factory: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceContainer) -> std::result::Result<Arc<S>, BoxError> + Send + Sync + 'static,
    {
        Self {
            service_type: TypeId::of::<S>(),
            service: type_name::<S>(),
            registration: Registration::new(name.into(), lifetime, erase(factory), None),
            exclusive: false,
        }
    }

    /// Like [`new`](Self::new), for a service type that declared [`Dispose`].
    pub fn disposable<S, F>(name: impl Into<String>, lifetime: Lifetime, factory: F) -> Self
    where
        S: ?Sized + Dispose + 'static,
        F: Fn(&ServiceContainer) -> std::result::Result<Arc<S>, BoxError> + Send + Sync + 'static,
    {
        Self {
            service_type: TypeId::of::<S>(),
            service: type_name::<S>(),
            registration: Registration::new(
                name.into(),
                lifetime,
                erase(factory),
                Some(teardown_for::<S>()),
            ),
            exclusive: false,
        }
    }

    /// Only add this registration if its service type has none yet.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
}

/// Dispose an instance that lost a concurrent per-container build.
///
/// Factories that hand out one shared instance produce the same `Arc` for
/// both builders; that instance is the cached one and stays alive.
fn release_rejected<S: ?Sized + Send + Sync + 'static>(
    registration: &Registration,
    cached: &Arc<S>,
    rejected: AnyInstance,
) {
    let shared = rejected
        .downcast_ref::<Arc<S>>()
        .is_some_and(|other| Arc::ptr_eq(cached, other));
    if shared {
        return;
    }
    if let Some(hook) = registration.teardown.as_ref().and_then(|t| t(&rejected)) {
        tracing::debug!(
            "Releasing duplicate '{}' for {} built concurrently",
            registration.name,
            type_name::<S>()
        );
        drop(rejected);
        hook();
    }
}

fn erase<S, F>(factory: F) -> Factory
where
    S: ?Sized + Send + Sync + 'static,
    F: Fn(&ServiceContainer) -> std::result::Result<Arc<S>, BoxError> + Send + Sync + 'static,
{
    Arc::new(move |container: &ServiceContainer| {
        factory(container).map(|instance| Box::new(instance) as AnyInstance)
    })
}

fn teardown_for<S: ?Sized + Dispose + 'static>() -> Teardown {
    Arc::new(|instance: &AnyInstance| {
        instance
            .downcast_ref::<Arc<S>>()
            .cloned()
            .map(|service| Box::new(move || service.dispose()) as TeardownHook)
    })
}

fn downcast<S: ?Sized + Send + Sync + 'static>(
    instance: &AnyInstance,
    registration: &Registration,
) -> Result<Arc<S>> {
    instance
        .downcast_ref::<Arc<S>>()
        .cloned()
        .ok_or_else(|| ActivationError::Construction {
            service: type_name::<S>(),
            name: registration.name.clone(),
            source: "factory produced an instance of a different type".into(),
        })
}
