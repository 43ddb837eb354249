//! Handler registry for binding handler types to message contracts.
//!
//! Registering a handler type creates one named binding per message
//! contract it declares. Binding names are `"{handler type}:{contract}"`,
//! so one handler bound to several contracts never collides with itself
//! and two handlers bound to the same contract coexist.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use procwire_activation::container::ServiceContainer;
//! use procwire_activation::handler::HandlerRegistry;
//!
//! let container = Arc::new(ServiceContainer::new());
//! let mut registry = HandlerRegistry::new(container.clone());
//!
//! registry.register::<OrderProjection>()?.register::<AuditLog>()?;
//!
//! let schema = registry.build_schema();
//! ```

use std::any::{type_name, TypeId};
use std::sync::Arc;

use super::contract::{Handler, HandlerCapabilities};
use crate::container::ServiceContainer;
use crate::error::Result;
use crate::schema::BindingSchema;

/// A named association from a message contract to a handler type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerBinding {
    /// Message type identity.
    pub message_type: TypeId,
    /// Message type name.
    pub message_name: &'static str,
    /// Handler type name.
    pub handler_type: &'static str,
    /// Binding name, unique per message type.
    pub name: String,
}

/// Build the binding name for a handler bound to a contract.
pub fn binding_name(handler_type: &str, contract: &str) -> String {
    format!("{}:{}", handler_type, contract)
}

/// Registry writing handler bindings into a [`ServiceContainer`].
pub struct HandlerRegistry {
    /// Container receiving the bindings.
    container: Arc<ServiceContainer>,
    /// Bindings created so far, in registration order.
    bindings: Vec<HandlerBinding>,
}

impl HandlerRegistry {
    /// Create a registry writing into `container`.
    pub fn new(container: Arc<ServiceContainer>) -> Self {
        Self {
            container,
            bindings: Vec::new(),
        }
    }

    /// Register handler type `H` under every contract it declares.
    ///
    /// Either all of `H`'s bindings are added or none are. Name collisions
    /// are checked under the container's write lock, so this holds even
    /// when several registries share one container.
    pub fn register<H: Handler>(&mut self) -> Result<&mut Self> {
        let mut caps = HandlerCapabilities::<H>::new();
        H::capabilities(&mut caps);

        let handler_type = type_name::<H>();
        if caps.is_empty() {
            tracing::warn!("Handler {} declares no message contracts", handler_type);
            return Ok(self);
        }

        let mut pending = Vec::with_capacity(caps.len());
        let mut bindings = Vec::with_capacity(caps.len());
        for contract in caps.contracts() {
            let name = binding_name(handler_type, &contract.contract_name());
            pending.push((contract.prepare)(name.clone(), caps.dispose_fn()));
            bindings.push(HandlerBinding {
                message_type: contract.message_type,
                message_name: contract.message_name,
                handler_type,
                name,
            });
        }

        self.container.register_all(pending)?;
        for binding in &bindings {
            tracing::debug!("Bound {} to {}", handler_type, binding.message_name);
        }
        self.bindings.extend(bindings);

        Ok(self)
    }

    /// All bindings, in registration order.
    pub fn bindings(&self) -> &[HandlerBinding] {
        &self.bindings
    }

    /// Bindings for message type `M`.
    pub fn bindings_for<M: 'static>(&self) -> impl Iterator<Item = &HandlerBinding> {
        let message_type = TypeId::of::<M>();
        self.bindings
            .iter()
            .filter(move |b| b.message_type == message_type)
    }

    /// Get a binding by name.
    pub fn get_binding(&self, name: &str) -> Option<&HandlerBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// The container bindings are written into.
    pub fn container(&self) -> &Arc<ServiceContainer> {
        &self.container
    }

    /// Build a [`BindingSchema`] describing every binding.
    pub fn build_schema(&self) -> BindingSchema {
        let mut schema = BindingSchema::new();

        for binding in &self.bindings {
            schema.add_binding(&binding.name, binding.message_name, binding.handler_type);
        }

        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Dispose, Lifetime};
    use crate::error::{ActivationError, BoxError};
    use crate::handler::{BoxFuture, HandleMessages, HandlerInstance, HandlerResult, MessageContext};

    struct OrderPlaced;
    struct OrderCancelled;
    struct Unrelated;

    macro_rules! noop_handler {
        ($handler:ty, $($message:ty),+) => {
            $(
                impl HandleMessages<$message> for $handler {
                    fn handle<'a>(&'a self, _: &'a $message, _: &'a MessageContext) -> BoxFuture<'a, HandlerResult> {
                        Box::pin(async { Ok(()) })
                    }
                }
            )+

            impl Handler for $handler {
                fn capabilities(caps: &mut HandlerCapabilities<Self>) {
                    $( caps.handles::<$message>(); )+
                }

                fn construct(_: &ServiceContainer) -> std::result::Result<Self, BoxError> {
                    Ok(Self)
                }
            }
        };
    }

    struct Projection;
    noop_handler!(Projection, OrderPlaced, OrderCancelled);

    struct Audit;
    noop_handler!(Audit, OrderPlaced);

    struct Silent;

    impl Handler for Silent {
        fn capabilities(_: &mut HandlerCapabilities<Self>) {}

        fn construct(_: &ServiceContainer) -> std::result::Result<Self, BoxError> {
            Ok(Silent)
        }
    }

    fn registry() -> HandlerRegistry {
        HandlerRegistry::new(Arc::new(ServiceContainer::new()))
    }

    #[test]
    fn test_one_binding_per_contract() {
        let mut registry = registry();
        registry.register::<Projection>().unwrap();

        assert_eq!(registry.bindings().len(), 2);
        assert_ne!(registry.bindings()[0].name, registry.bindings()[1].name);
        assert!(registry
            .bindings()
            .iter()
            .all(|b| b.handler_type == type_name::<Projection>()));
    }

    #[test]
    fn test_binding_name_format() {
        let mut registry = registry();
        registry.register::<Audit>().unwrap();

        let expected = format!(
            "{}:HandleMessages<{}>",
            type_name::<Audit>(),
            type_name::<OrderPlaced>()
        );
        assert_eq!(registry.bindings()[0].name, expected);
        assert!(registry.get_binding(&expected).is_some());
    }

    #[test]
    fn test_two_handlers_same_contract() {
        let mut registry = registry();
        registry
            .register::<Projection>()
            .unwrap()
            .register::<Audit>()
            .unwrap();

        assert_eq!(registry.bindings_for::<OrderPlaced>().count(), 2);
        assert_eq!(registry.bindings_for::<OrderCancelled>().count(), 1);
        assert_eq!(registry.bindings_for::<Unrelated>().count(), 0);

        let placed = registry
            .container()
            .get_all_instances::<HandlerInstance<OrderPlaced>>()
            .unwrap();
        assert_eq!(placed.len(), 2);
    }

    #[test]
    fn test_registering_twice_fails_without_side_effects() {
        let mut registry = registry();
        registry.register::<Projection>().unwrap();

        let err = registry.register::<Projection>().err().unwrap();

        assert!(err.is_configuration());
        assert!(matches!(err, ActivationError::DuplicateBinding { .. }));
        assert_eq!(registry.bindings().len(), 2);
        assert_eq!(
            registry
                .container()
                .registration_names::<HandlerInstance<OrderCancelled>>()
                .len(),
            1
        );
    }

    #[test]
    fn test_partial_collision_adds_nothing() {
        let container = Arc::new(ServiceContainer::new());
        let taken = binding_name(
            type_name::<Projection>(),
            &format!("HandleMessages<{}>", type_name::<OrderCancelled>()),
        );
        container
            .register::<HandlerInstance<OrderCancelled>, _>(taken, Lifetime::Transient, |_| {
                Err("placeholder".into())
            })
            .unwrap();

        let mut registry = HandlerRegistry::new(container.clone());
        let err = registry.register::<Projection>().err().unwrap();

        assert!(matches!(err, ActivationError::DuplicateBinding { .. }));
        assert!(registry.bindings().is_empty());
        assert!(!container.is_registered::<HandlerInstance<OrderPlaced>>());
    }

    #[test]
    fn test_shared_container_registers_once() {
        let container = Arc::new(ServiceContainer::new());

        let successes: usize = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let container = container.clone();
                    s.spawn(move || HandlerRegistry::new(container).register::<Projection>().is_ok())
                })
                .collect();
            workers
                .into_iter()
                .map(|w| usize::from(w.join().unwrap()))
                .sum()
        });

        assert_eq!(successes, 1);
        assert_eq!(
            container.registration_names::<HandlerInstance<OrderPlaced>>().len(),
            1
        );
        assert_eq!(
            container.registration_names::<HandlerInstance<OrderCancelled>>().len(),
            1
        );
    }

    #[test]
    fn test_handler_without_contracts() {
        let mut registry = registry();
        registry.register::<Silent>().unwrap();

        assert!(registry.bindings().is_empty());
    }

    #[test]
    fn test_build_schema() {
        let mut registry = registry();
        registry.register::<Projection>().unwrap();

        let schema = registry.build_schema();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.for_message(type_name::<OrderCancelled>()).count(), 1);
    }

    #[test]
    fn test_disposable_flag_reaches_instances() {
        // Implementing Dispose is not enough; it must be declared.
        struct Pooled;
        noop_handler!(Pooled, Unrelated);

        impl Dispose for Pooled {
            fn dispose(&self) {}
        }

        struct PooledDisposable;
        impl HandleMessages<Unrelated> for PooledDisposable {
            fn handle<'a>(&'a self, _: &'a Unrelated, _: &'a MessageContext) -> BoxFuture<'a, HandlerResult> {
                Box::pin(async { Ok(()) })
            }
        }
        impl Dispose for PooledDisposable {
            fn dispose(&self) {}
        }
        impl Handler for PooledDisposable {
            fn capabilities(caps: &mut HandlerCapabilities<Self>) {
                caps.handles::<Unrelated>().disposable();
            }

            fn construct(_: &ServiceContainer) -> std::result::Result<Self, BoxError> {
                Ok(PooledDisposable)
            }
        }

        let mut registry = registry();
        registry
            .register::<Pooled>()
            .unwrap()
            .register::<PooledDisposable>()
            .unwrap();

        let flags: Vec<bool> = registry
            .container()
            .get_all_instances::<HandlerInstance<Unrelated>>()
            .unwrap()
            .iter()
            .map(|h| h.is_disposable())
            .collect();
        assert_eq!(flags, vec![false, true]);
    }
}
