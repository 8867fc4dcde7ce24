//! `turnstile-events` — event contracts and pub/sub mechanics.
//!
//! Domain-agnostic: the `Event` trait and `EventEnvelope` describe how facts
//! are named, versioned and carried; the `EventBus` distributes them after
//! they have been persisted.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
