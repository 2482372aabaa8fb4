//! `merchstore-events` — event contracts and pub/sub plumbing.
//!
//! Domain crates define their typed events against the [`Event`] trait;
//! infrastructure moves them around as [`EventEnvelope`]s over an [`EventBus`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
