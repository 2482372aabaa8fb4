//! Command execution pipeline.
//!
//! One path for every aggregate: load the stream, rehydrate, let the
//! aggregate decide, append with an optimistic concurrency check, publish
//! the committed events.
//!
//! ```text
//! Command -> load -> rehydrate -> handle -> append -> publish
//! ```
//!
//! Events are persisted before publication: if the append fails nothing is
//! published, and if publication fails the events are already durable, so a
//! republish gives at-least-once delivery.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use merchstore_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use merchstore_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure (e.g. stale aggregate version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    /// Domain validation failure (deterministic).
    #[error("validation failed: {0}")]
    Validation(String),
    /// Domain invariant failure (deterministic).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// Reservation would overdraw a stock bucket.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),
    /// Domain authorization failure.
    #[error("unauthorized")]
    Unauthorized,
    /// Domain-level not found.
    #[error("not found")]
    NotFound,
    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),
    /// Persisting to the event store failed.
    #[error(transparent)]
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::InsufficientStock(msg) => DispatchError::InsufficientStock(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Sits between the API layer and the storage layer; composes an
/// [`EventStore`] and an [`EventBus`] so tests can run fully in memory and
/// production can run on Postgres without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate an aggregate from its stream without dispatching anything.
    ///
    /// The `make_aggregate` closure supplies a fresh instance (e.g.
    /// `Order::empty(id)`); history is replayed onto it.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Dispatch a command through the full pipeline.
    ///
    /// Optimistic concurrency: the stream version observed at load time is
    /// expected at append time. If a concurrent dispatch won the race, the
    /// append fails with [`DispatchError::Concurrency`] and the caller may
    /// retry against the fresh state.
    ///
    /// Returns the committed events with their assigned sequence numbers;
    /// an empty vector means the command decided nothing needed to happen.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: merchstore_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Defense in depth against a buggy backend: the stream must belong to
    // the requested aggregate and be strictly increasing by sequence number.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!("loaded stream contains wrong aggregate_id at index {idx}"),
            )));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::Utc;

    use merchstore_catalog::{CreateProduct, Product, ProductCommand, ProductId};
    use merchstore_core::{AggregateRoot, Price};
    use merchstore_events::InMemoryEventBus;

    use super::*;
    use crate::event_store::InMemoryEventStore;

    fn create_command(id: ProductId) -> ProductCommand {
        ProductCommand::CreateProduct(CreateProduct {
            product_id: id,
            name: "Tote Bag".to_string(),
            price: Price::from_minor_units(1500),
            image_links: vec![],
            about: vec![],
            sizes: BTreeSet::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_appends_events_and_rehydrates_state() {
        let store = Arc::new(InMemoryEventStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let d = CommandDispatcher::new(Arc::clone(&store), Arc::clone(&bus));

        let id = ProductId::new(AggregateId::new());
        let committed = d
            .dispatch(id.0, "catalog.product", create_command(id), |_| {
                Product::empty(id)
            })
            .unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].sequence_number, 1);
        assert_eq!(committed[0].event_type, "catalog.product.created");

        // The committed event was published.
        let envelope = sub.try_recv().unwrap();
        assert_eq!(envelope.aggregate_id(), id.0);
        assert_eq!(envelope.sequence_number(), 1);

        // Rehydration reproduces the decided state.
        let product = d.load(id.0, |_| Product::empty(id)).unwrap();
        assert_eq!(product.name(), "Tote Bag");
        assert_eq!(product.version(), 1);
    }

    #[test]
    fn duplicate_create_is_rejected_by_the_rehydrated_aggregate() {
        let store = Arc::new(InMemoryEventStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let d = CommandDispatcher::new(Arc::clone(&store), Arc::clone(&bus));

        let id = ProductId::new(AggregateId::new());
        d.dispatch(id.0, "catalog.product", create_command(id), |_| {
            Product::empty(id)
        })
        .unwrap();

        let err = d
            .dispatch(id.0, "catalog.product", create_command(id), |_| {
                Product::empty(id)
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));
    }
}
