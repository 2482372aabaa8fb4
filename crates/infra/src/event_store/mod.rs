pub mod in_memory;
pub mod postgres;
#[allow(clippy::module_inception)]
mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
