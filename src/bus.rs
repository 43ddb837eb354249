//! Bus (dispatcher) contracts.
//!
//! The bus is the host runtime's outbound side. This crate never sends
//! anything itself; it only stores one shared bus per container so that
//! handlers can have it injected.

use std::sync::Arc;

use serde_json::Value;

use crate::container::Dispose;
use crate::error::BoxError;
use crate::handler::BoxFuture;

/// Result type for bus operations.
pub type BusResult = std::result::Result<(), BoxError>;

/// Asynchronous bus API exposed to handlers.
///
/// Disposed together with the container it was registered in.
pub trait Bus: Dispose {
    /// Send a message to a specific destination.
    fn send<'a>(&'a self, destination: &'a str, message: Value) -> BoxFuture<'a, BusResult>;

    /// Publish an event to all subscribers of `topic`.
    fn publish<'a>(&'a self, topic: &'a str, event: Value) -> BoxFuture<'a, BusResult>;

    /// Synchronous view of this bus.
    fn sync_bus(&self) -> Arc<dyn SyncBus>;
}

/// Synchronous bus API for code that cannot await.
pub trait SyncBus: Send + Sync {
    /// Send a message to a specific destination.
    fn send(&self, destination: &str, message: Value) -> BusResult;

    /// Publish an event to all subscribers of `topic`.
    fn publish(&self, topic: &str, event: Value) -> BusResult;
}
