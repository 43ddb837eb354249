//! Handler module - contracts, bindings and message context.
//!
//! Provides:
//! - [`HandleMessages`] / [`Handler`] - what a handler type implements
//! - [`HandlerRegistry`] - binds handler types to message contracts
//! - [`MessageContext`] - describes the message being handled
//!
//! # Example
//!
//! ```ignore
//! use procwire_activation::handler::HandlerRegistry;
//!
//! let mut registry = HandlerRegistry::new(container.clone());
//!
//! // One binding per message contract declared by each handler
//! registry.register::<OrderProjection>()?;
//! registry.register::<AuditLog>()?;
//! ```

mod context;
mod contract;
mod registry;

pub use context::MessageContext;
pub use contract::{BoxFuture, HandleMessages, Handler, HandlerCapabilities, HandlerInstance, HandlerResult};
pub use registry::{binding_name, HandlerBinding, HandlerRegistry};
