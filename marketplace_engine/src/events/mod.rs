//! Marketplace events and the hooks that react to them.
//!
//! Hooks are for best-effort side effects such as analytics and reporting. They run after the primary operation has
//! been committed, and nothing they do can undo it.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
