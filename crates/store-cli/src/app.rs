//! Wires one in-process registry, event bus, and callable registry together
//! for the lifetime of a single CLI invocation.

use std::sync::Arc;

use store_callable::CallableRegistry;
use store_events::EventBus;
use store_registry::Registry;

use crate::config::StoreCliConfig;
use crate::demo;

pub struct AppContext {
    pub registry: Arc<Registry>,
    pub bus: Arc<EventBus>,
    pub calls: Arc<CallableRegistry>,
}

impl AppContext {
    pub async fn bootstrap(config: &StoreCliConfig) -> anyhow::Result<Self> {
        let (bus, _drain) = EventBus::spawn(config.queue_capacity, config.history_capacity);
        let registry = Arc::new(Registry::new());
        let bus = Arc::new(bus);
        let calls = Arc::new(CallableRegistry::new(registry.clone(), bus.clone()));

        demo::register_demo_functions(&calls).await?;

        Ok(Self { registry, bus, calls })
    }
}
