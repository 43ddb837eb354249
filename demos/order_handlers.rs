//! Order handlers - registry, bus injection and dispatch.
//!
//! This example demonstrates:
//! - A handler bound to two message contracts
//! - Two handlers bound to the same contract
//! - A disposable handler released when its message scope ends
//! - Injecting the bus and reading the current message context
//!
//! Run with `RUST_LOG=debug cargo run --example order_handlers` to see the
//! activation log.

use std::sync::{Arc, Mutex};

use procwire_activation::bus::{Bus, BusResult, SyncBus};
use procwire_activation::error::BoxError;
use procwire_activation::handler::{BoxFuture, HandlerCapabilities, HandlerResult};
use procwire_activation::{
    Dispose, HandleMessages, Handler, HandlerActivator, HandlerRegistry, MessageContext,
    ServiceContainer,
};
use serde_json::{json, Value};

#[derive(Debug)]
struct OrderPlaced {
    id: u32,
}

#[derive(Debug)]
struct OrderCancelled {
    id: u32,
}

/// Keeps a per-message read model; holds a connection it must release.
struct OrderProjection;

impl HandleMessages<OrderPlaced> for OrderProjection {
    fn handle<'a>(&'a self, message: &'a OrderPlaced, ctx: &'a MessageContext) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            println!("[projection] order {} placed ({})", message.id, ctx.message_id());
            Ok(())
        })
    }
}

impl HandleMessages<OrderCancelled> for OrderProjection {
    fn handle<'a>(&'a self, message: &'a OrderCancelled, _: &'a MessageContext) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            println!("[projection] order {} cancelled", message.id);
            Ok(())
        })
    }
}

impl Dispose for OrderProjection {
    fn dispose(&self) {
        println!("[projection] connection released");
    }
}

impl Handler for OrderProjection {
    fn capabilities(caps: &mut HandlerCapabilities<Self>) {
        caps.handles::<OrderPlaced>()
            .handles::<OrderCancelled>()
            .disposable();
    }

    fn construct(_: &ServiceContainer) -> Result<Self, BoxError> {
        Ok(OrderProjection)
    }
}

/// Publishes a notification for every placed order.
struct Notifier {
    bus: Arc<dyn Bus>,
}

impl HandleMessages<OrderPlaced> for Notifier {
    fn handle<'a>(&'a self, message: &'a OrderPlaced, _: &'a MessageContext) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let tenant = MessageContext::current()?
                .header("tenant")
                .unwrap_or("unknown")
                .to_string();
            self.bus
                .publish("order.notified", json!({ "id": message.id, "tenant": tenant }))
                .await
        })
    }
}

impl Handler for Notifier {
    fn capabilities(caps: &mut HandlerCapabilities<Self>) {
        caps.handles::<OrderPlaced>();
    }

    fn construct(services: &ServiceContainer) -> Result<Self, BoxError> {
        Ok(Notifier {
            bus: services.get_instance::<dyn Bus>()?,
        })
    }
}

/// Stand-in for a real bus: prints what it would send.
#[derive(Default)]
struct ConsoleBus {
    sent: Arc<Mutex<usize>>,
}

impl Dispose for ConsoleBus {
    fn dispose(&self) {
        println!("[bus] shut down after {} messages", self.sent.lock().map(|n| *n).unwrap_or(0));
    }
}

impl Bus for ConsoleBus {
    fn send<'a>(&'a self, destination: &'a str, message: Value) -> BoxFuture<'a, BusResult> {
        Box::pin(async move { self.sync_bus().send(destination, message) })
    }

    fn publish<'a>(&'a self, topic: &'a str, event: Value) -> BoxFuture<'a, BusResult> {
        Box::pin(async move { self.sync_bus().publish(topic, event) })
    }

    fn sync_bus(&self) -> Arc<dyn SyncBus> {
        Arc::new(ConsoleSyncBus(self.sent.clone()))
    }
}

struct ConsoleSyncBus(Arc<Mutex<usize>>);

impl SyncBus for ConsoleSyncBus {
    fn send(&self, destination: &str, message: Value) -> BusResult {
        println!("[bus] send to {}: {}", destination, message);
        *self.0.lock().map_err(|_| "bus counter poisoned")? += 1;
        Ok(())
    }

    fn publish(&self, topic: &str, event: Value) -> BusResult {
        println!("[bus] publish {}: {}", topic, event);
        *self.0.lock().map_err(|_| "bus counter poisoned")? += 1;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let container = Arc::new(ServiceContainer::new());

    let mut registry = HandlerRegistry::new(container.clone());
    registry
        .register::<OrderProjection>()?
        .register::<Notifier>()?;
    println!("{}", registry.build_schema().to_json()?);

    let activator = HandlerActivator::new(container.clone());
    activator.set_bus(Arc::new(ConsoleBus::default()))?;

    let placed = MessageContext::for_message::<OrderPlaced>("msg-1").with_header("tenant", "acme");
    let handled = activator.dispatch(&OrderPlaced { id: 7 }, placed).await?;
    println!("OrderPlaced handled by {} handlers", handled);

    let cancelled = MessageContext::for_message::<OrderCancelled>("msg-2");
    let handled = activator.dispatch(&OrderCancelled { id: 7 }, cancelled).await?;
    println!("OrderCancelled handled by {} handlers", handled);

    let handled = activator
        .dispatch(&"unrouted".to_string(), MessageContext::new("msg-3"))
        .await?;
    println!("String handled by {} handlers", handled);

    container.dispose();
    Ok(())
}
