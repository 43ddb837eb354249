//! # procwire-activation
//!
//! Handler activation for message-bus runtimes.
//!
//! This crate connects a message-processing runtime to a service container:
//! it binds handler types to the message types they process, resolves every
//! handler for an inbound message, releases disposable handlers when the
//! message's scope ends, and holds the one bus instance a container serves.
//!
//! ## Architecture
//!
//! - **Registry** (startup): [`HandlerRegistry`] writes one named binding
//!   per declared message contract into a [`ServiceContainer`]
//! - **Activator** (per message): [`HandlerActivator`] resolves bindings by
//!   exact message type inside a [`TransactionScope`]
//! - **Context**: [`MessageContext`] is passed to handlers and readable via
//!   [`MessageContext::current`] during the invocation
//!
//! Transport, serialization and retries belong to the host runtime.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use procwire_activation::{HandlerActivator, HandlerRegistry, MessageContext, ServiceContainer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let container = Arc::new(ServiceContainer::new());
//!     HandlerRegistry::new(container.clone())
//!         .register::<OrderProjection>()?
//!         .register::<AuditLog>()?;
//!
//!     let activator = HandlerActivator::new(container);
//!     activator.set_bus(bus)?;
//!
//!     let ctx = MessageContext::for_message::<OrderPlaced>("msg-1");
//!     activator.dispatch(&OrderPlaced { id: 1 }, ctx).await?;
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod config;
pub mod container;
pub mod error;
pub mod handler;
pub mod schema;
pub mod scope;

mod activator;

pub use activator::{
    ActivatorBuilder, HandlerActivator, BUS_BINDING, MESSAGE_CONTEXT_BINDING, SYNC_BUS_BINDING,
};
pub use container::{Dispose, Lifetime, ServiceContainer};
pub use error::{ActivationError, ErrorKind};
pub use handler::{HandleMessages, Handler, HandlerRegistry, MessageContext};
pub use scope::TransactionScope;
