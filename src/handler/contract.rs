//! Handler contracts and statically declared capabilities.
//!
//! A handler type implements [`HandleMessages<M>`] once per message type it
//! processes, then lists those contracts in [`Handler::capabilities`]. The
//! same declaration says whether instances hold releasable resources, so
//! disposal is decided by trait bounds at compile time.

use std::any::{type_name, TypeId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::MessageContext;
use crate::container::{Dispose, Lifetime, PendingRegistration, ServiceContainer};
use crate::error::BoxError;

/// Result type for handler functions.
pub type HandlerResult = std::result::Result<(), BoxError>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Processing logic for one message type.
pub trait HandleMessages<M>: Send + Sync + 'static {
    /// Handle a message.
    ///
    /// `ctx` describes the message being handled. The same value is also
    /// reachable through [`MessageContext::current`] for the duration of
    /// the call.
    fn handle<'a>(&'a self, message: &'a M, ctx: &'a MessageContext) -> BoxFuture<'a, HandlerResult>;
}

/// A handler type that can be registered with a
/// [`HandlerRegistry`](super::HandlerRegistry).
///
/// # Example
///
/// ```
/// use procwire_activation::container::ServiceContainer;
/// use procwire_activation::error::BoxError;
/// use procwire_activation::handler::{
///     BoxFuture, HandleMessages, Handler, HandlerCapabilities, HandlerResult, MessageContext,
/// };
///
/// struct OrderPlaced;
/// struct OrderCancelled;
///
/// struct OrderProjection;
///
/// impl HandleMessages<OrderPlaced> for OrderProjection {
///     fn handle<'a>(&'a self, _: &'a OrderPlaced, _: &'a MessageContext) -> BoxFuture<'a, HandlerResult> {
///         Box::pin(async { Ok(()) })
///     }
/// }
///
/// impl HandleMessages<OrderCancelled> for OrderProjection {
///     fn handle<'a>(&'a self, _: &'a OrderCancelled, _: &'a MessageContext) -> BoxFuture<'a, HandlerResult> {
///         Box::pin(async { Ok(()) })
///     }
/// }
///
/// impl Handler for OrderProjection {
///     fn capabilities(caps: &mut HandlerCapabilities<Self>) {
///         caps.handles::<OrderPlaced>().handles::<OrderCancelled>();
///     }
///
///     fn construct(_: &ServiceContainer) -> Result<Self, BoxError> {
///         Ok(OrderProjection)
///     }
/// }
/// ```
pub trait Handler: Sized + Send + Sync + 'static {
    /// Declare the message contracts this type implements.
    fn capabilities(caps: &mut HandlerCapabilities<Self>);

    /// Build an instance, resolving dependencies from `services`.
    fn construct(services: &ServiceContainer) -> std::result::Result<Self, BoxError>;
}

/// Converts a handler into its disposal capability.
type IntoDispose<H> = fn(Arc<H>) -> Arc<dyn Dispose>;

/// Prepares the container registration for one contract of `H`.
type PrepareFn<H> = fn(String, Option<IntoDispose<H>>) -> PendingRegistration;

/// One declared message contract.
pub(crate) struct Contract<H> {
    pub message_type: TypeId,
    pub message_name: &'static str,
    pub prepare: PrepareFn<H>,
}

impl<H> Contract<H> {
    /// Human-readable contract identity, e.g. `HandleMessages<app::OrderPlaced>`.
    pub fn contract_name(&self) -> String {
        format!("HandleMessages<{}>", self.message_name)
    }
}

/// Capabilities declared by a [`Handler`].
pub struct HandlerCapabilities<H> {
    contracts: Vec<Contract<H>>,
    into_dispose: Option<IntoDispose<H>>,
}

impl<H: Handler> HandlerCapabilities<H> {
    pub(crate) fn new() -> Self {
        Self {
            contracts: Vec::new(),
            into_dispose: None,
        }
    }

    /// Declare that `H` handles messages of type `M`.
    ///
    /// Declaring the same message type twice has no further effect.
    pub fn handles<M>(&mut self) -> &mut Self
    where
        H: HandleMessages<M>,
        M: 'static,
    {
        let message_type = TypeId::of::<M>();
        if self.contracts.iter().any(|c| c.message_type == message_type) {
            return self;
        }

        self.contracts.push(Contract {
            message_type,
            message_name: type_name::<M>(),
            prepare: prepare_contract::<H, M>,
        });
        self
    }

    /// Declare that instances of `H` must be disposed when their scope ends.
    pub fn disposable(&mut self) -> &mut Self
    where
        H: Dispose,
    {
        self.into_dispose = Some(into_dispose::<H> as IntoDispose<H>);
        self
    }

    /// Number of distinct contracts declared.
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Whether no contract was declared.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Whether [`disposable`](Self::disposable) was declared.
    pub fn is_disposable(&self) -> bool {
        self.into_dispose.is_some()
    }

    pub(crate) fn contracts(&self) -> &[Contract<H>] {
        &self.contracts
    }

    pub(crate) fn dispose_fn(&self) -> Option<IntoDispose<H>> {
        self.into_dispose
    }
}

fn into_dispose<H: Dispose + 'static>(handler: Arc<H>) -> Arc<dyn Dispose> {
    handler
}

fn prepare_contract<H, M>(binding: String, into_dispose: Option<IntoDispose<H>>) -> PendingRegistration
where
    H: Handler + HandleMessages<M>,
    M: 'static,
{
    let shared: Arc<str> = Arc::from(binding.as_str());
    PendingRegistration::new::<HandlerInstance<M>, _>(binding, Lifetime::Transient, move |services| {
        let handler = Arc::new(H::construct(services)?);
        Ok(Arc::new(HandlerInstance {
            binding: shared.clone(),
            handler_type: type_name::<H>(),
            disposable: into_dispose.map(|f| f(handler.clone())),
            handler,
        }))
    })
}

/// A handler resolved for message type `M`.
pub struct HandlerInstance<M: 'static> {
    binding: Arc<str>,
    handler_type: &'static str,
    handler: Arc<dyn HandleMessages<M>>,
    disposable: Option<Arc<dyn Dispose>>,
}

impl<M: 'static> HandlerInstance<M> {
    /// Binding name this instance was resolved from.
    #[inline]
    pub fn binding(&self) -> &str {
        &self.binding
    }

    /// Type name of the concrete handler.
    #[inline]
    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    /// Whether the handler declared [`Dispose`].
    pub fn is_disposable(&self) -> bool {
        self.disposable.is_some()
    }

    pub(crate) fn disposable(&self) -> Option<Arc<dyn Dispose>> {
        self.disposable.clone()
    }

    /// Invoke the handler.
    pub fn handle<'a>(&'a self, message: &'a M, ctx: &'a MessageContext) -> BoxFuture<'a, HandlerResult> {
        self.handler.handle(message, ctx)
    }
}

impl<M: 'static> std::fmt::Debug for HandlerInstance<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerInstance")
            .field("binding", &self.binding)
            .field("handler_type", &self.handler_type)
            .field("disposable", &self.is_disposable())
            .finish()
    }
}
