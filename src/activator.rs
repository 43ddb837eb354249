//! Handler activator - the host runtime's entry point.
//!
//! The [`HandlerActivator`] sits between a message-bus runtime and a
//! [`ServiceContainer`]. For each inbound message the host:
//! 1. Creates a [`TransactionScope`]
//! 2. Calls [`HandlerActivator::get_handlers`] for the message type
//! 3. Invokes each handler in turn
//! 4. Ends the scope, which releases disposable handlers
//!
//! [`HandlerActivator::dispatch`] performs all four steps.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use procwire_activation::{HandlerActivator, MessageContext, ServiceContainer};
//!
//! let container = Arc::new(ServiceContainer::new());
//! HandlerRegistry::new(container.clone()).register::<OrderProjection>()?;
//!
//! let activator = HandlerActivator::builder(container)
//!     .resolution_order(ResolutionOrder::BindingName)
//!     .build();
//! activator.set_bus(bus)?;
//!
//! let handled = activator
//!     .dispatch(&OrderPlaced { id: 7 }, MessageContext::for_message::<OrderPlaced>("msg-1"))
//!     .await?;
//! ```

use std::any::type_name;
use std::sync::Arc;

use crate::bus::{Bus, SyncBus};
use crate::config::{ActivatorConfig, ResolutionOrder};
use crate::container::{Lifetime, PendingRegistration, ServiceContainer};
use crate::error::{ActivationError, Result};
use crate::handler::{HandlerInstance, MessageContext};
use crate::scope::TransactionScope;

/// Binding name of the bus registration.
pub const BUS_BINDING: &str = "procwire:bus";

/// Binding name of the synchronous bus view.
pub const SYNC_BUS_BINDING: &str = "procwire:sync-bus";

/// Binding name of the current-message-context factory.
pub const MESSAGE_CONTEXT_BINDING: &str = "procwire:message-context";

/// Builder for a [`HandlerActivator`].
pub struct ActivatorBuilder {
    container: Arc<ServiceContainer>,
    config: ActivatorConfig,
}

impl ActivatorBuilder {
    /// Create a builder over `container` with default configuration.
    pub fn new(container: Arc<ServiceContainer>) -> Self {
        Self {
            container,
            config: ActivatorConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ActivatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the tie-break order for handlers of one message type.
    ///
    /// Default: [`ResolutionOrder::Registration`]
    pub fn resolution_order(mut self, order: ResolutionOrder) -> Self {
        self.config.resolution_order = order;
        self
    }

    /// Log every resolved binding.
    ///
    /// Default: false
    pub fn trace_resolutions(mut self, enabled: bool) -> Self {
        self.config.trace_resolutions = enabled;
        self
    }

    /// Build the activator.
    pub fn build(self) -> HandlerActivator {
        HandlerActivator {
            container: self.container,
            config: self.config,
        }
    }
}

/// Resolves handlers for inbound messages from a [`ServiceContainer`].
pub struct HandlerActivator {
    /// Container holding handler bindings and the bus.
    container: Arc<ServiceContainer>,
    config: ActivatorConfig,
}

impl HandlerActivator {
    /// Create an activator with default configuration.
    pub fn new(container: Arc<ServiceContainer>) -> Self {
        ActivatorBuilder::new(container).build()
    }

    /// Create a new activator builder.
    pub fn builder(container: Arc<ServiceContainer>) -> ActivatorBuilder {
        ActivatorBuilder::new(container)
    }

    /// The underlying container.
    pub fn container(&self) -> &Arc<ServiceContainer> {
        &self.container
    }

    /// Active configuration.
    pub fn config(&self) -> &ActivatorConfig {
        &self.config
    }

    /// Resolve every handler bound to message type `M`.
    ///
    /// Matching is by exact type. No bindings yields an empty list. Each
    /// disposable handler gets a hook on `scope` as soon as it is built, so
    /// handlers constructed before a failing one are still released when
    /// the scope ends.
    ///
    /// Constructors that resolve [`MessageContext`] need the context
    /// installed around this call (see [`MessageContext::sync_scope`]);
    /// [`dispatch`](Self::dispatch) does that.
    pub fn get_handlers<M: Send + Sync + 'static>(
        &self,
        _message: &M,
        scope: &TransactionScope,
    ) -> Result<Vec<Arc<HandlerInstance<M>>>> {
        let mut handlers = Vec::new();

        for instance in self.container.instances::<HandlerInstance<M>>() {
            let instance = instance?;
            if let Some(disposable) = instance.disposable() {
                scope.on_disposed(move |_| disposable.dispose());
            }
            handlers.push(instance);
        }

        if self.config.resolution_order == ResolutionOrder::BindingName {
            handlers.sort_by(|a, b| a.binding().cmp(b.binding()));
        }

        if self.config.trace_resolutions {
            for handler in &handlers {
                tracing::debug!("Scope {}: resolved '{}'", scope.id(), handler.binding());
            }
        }
        tracing::trace!(
            "Resolved {} handlers for {} in scope {}",
            handlers.len(),
            type_name::<M>(),
            scope.id()
        );

        Ok(handlers)
    }

    /// Register the bus for this container.
    ///
    /// Also registers a transient [`SyncBus`] view and a transient
    /// [`MessageContext`] factory that reads the current message. All three
    /// registrations are added together or not at all. The bus is resolved
    /// once here so the container disposes it on teardown.
    ///
    /// Fails with [`ActivationError::BusAlreadyRegistered`] if the container
    /// already has a bus; the existing registration is kept. Hosting several
    /// buses in one process needs one container per bus.
    pub fn set_bus(&self, bus: Arc<dyn Bus>) -> Result<()> {
        let registered = self.container.register_all(vec![
            PendingRegistration::disposable::<dyn Bus, _>(BUS_BINDING, Lifetime::PerContainer, move |_| {
                Ok(bus.clone())
            })
            .exclusive(),
            PendingRegistration::new::<MessageContext, _>(
                MESSAGE_CONTEXT_BINDING,
                Lifetime::Transient,
                |_| Ok(Arc::new(MessageContext::current()?)),
            ),
            PendingRegistration::new::<dyn SyncBus, _>(SYNC_BUS_BINDING, Lifetime::Transient, |services| {
                Ok(services.get_instance::<dyn Bus>()?.sync_bus())
            }),
        ])?;
        if !registered {
            tracing::warn!("Rejected second bus registration");
            return Err(ActivationError::BusAlreadyRegistered);
        }

        self.container.get_instance::<dyn Bus>()?;
        tracing::debug!("Bus registered");
        Ok(())
    }

    /// Handle one message: resolve its handlers inside a fresh scope and
    /// invoke them in turn.
    ///
    /// `context` is installed as the current message context while the
    /// handlers are constructed and for the duration of each call, so
    /// constructors may resolve [`MessageContext`] from the container.
    ///
    /// The scope is completed on success and aborted on the first failure;
    /// either way disposable handlers are released before this returns. If
    /// the returned future is dropped early, the scope is released as
    /// abandoned.
    ///
    /// Returns the number of handlers invoked. Zero is not an error.
    pub async fn dispatch<M: Send + Sync + 'static>(
        &self,
        message: &M,
        context: MessageContext,
    ) -> Result<usize> {
        let scope = TransactionScope::new();

        let outcome = self.invoke_handlers(message, &context, &scope).await;
        match &outcome {
            Ok(_) => scope.complete(),
            Err(_) => scope.abort(),
        }

        outcome
    }

    async fn invoke_handlers<M: Send + Sync + 'static>(
        &self,
        message: &M,
        context: &MessageContext,
        scope: &TransactionScope,
    ) -> Result<usize> {
        let handlers = context
            .clone()
            .sync_scope(|| self.get_handlers(message, scope))?;
        if handlers.is_empty() {
            tracing::debug!(
                "No handlers for {} (message {})",
                type_name::<M>(),
                context.message_id()
            );
        }

        for handler in &handlers {
            context
                .clone()
                .scope(handler.handle(message, context))
                .await
                .map_err(|source| {
                    tracing::error!(
                        "Handler error for message {} in '{}': {}",
                        context.message_id(),
                        handler.binding(),
                        source
                    );
                    ActivationError::Handler {
                        binding: handler.binding().to_string(),
                        source,
                    }
                })?;
        }

        Ok(handlers.len())
    }
}
