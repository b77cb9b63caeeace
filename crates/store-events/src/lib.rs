//! C8: Hierarchical Event Bus.

pub mod bridge;
pub mod bus;
pub mod context;
pub mod event;
pub mod subscription;

pub use bridge::{emit_with_children, ChildFactory};
pub use bus::{BusStats, EventBus};
pub use context::EventContext;
pub use event::{Event, EventPhase};
pub use subscription::{Handler, Predicate, Subscription};

/// Contractual, dotted-lowercase event type names the core emits, kept
/// alongside the logging macros' event strings in `store-core-types` so
/// both sides draw from one table.
pub use store_core_types::schema::event_type;
