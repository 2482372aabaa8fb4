use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use merchstore_core::Price;
use merchstore_events::EventEnvelope;
use merchstore_orders::{Customer, OrderEvent, OrderId, OrderLine, ProcessingState};

use super::{CursorDecision, Cursors, ProjectionError};
use crate::read_model::ReadStore;

/// Queryable order read model for the admin dashboard and the sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub customer: Customer,
    pub lines: Vec<OrderLine>,
    pub state: ProcessingState,
    pub placed_at: DateTime<Utc>,
    pub total: Price,
    pub item_count: u32,
}

/// Orders projection.
#[derive(Debug)]
pub struct OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderRecord>,
{
    store: S,
    cursors: Cursors,
}

impl<S> OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderRecord> {
        self.store.get(order_id)
    }

    /// Orders in one lifecycle stage, oldest first.
    pub fn list_by_state(&self, state: ProcessingState) -> Vec<OrderRecord> {
        let mut records = self.store.list();
        records.retain(|r| r.state == state);
        records.sort_by_key(|r| (r.placed_at, r.order_id));
        records
    }

    /// Orders still in `processing` that were placed at or before `cutoff`.
    /// Input to the stale order sweep.
    pub fn stale(&self, cutoff: DateTime<Utc>) -> Vec<OrderRecord> {
        let mut records = self.store.list();
        records.retain(|r| r.state == ProcessingState::Processing && r.placed_at <= cutoff);
        records.sort_by_key(|r| (r.placed_at, r.order_id));
        records
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if self.cursors.check(aggregate_id, seq)? == CursorDecision::Skip {
            return Ok(());
        }

        let event: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let order_id = match &event {
            OrderEvent::OrderPlaced(e) => e.order_id,
            OrderEvent::ProcessingStateChanged(e) => e.order_id,
        };
        if order_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            OrderEvent::OrderPlaced(e) => {
                let total = e.lines.iter().map(OrderLine::line_total).sum();
                let item_count = e
                    .lines
                    .iter()
                    .fold(0u32, |acc, line| acc.saturating_add(line.quantity));
                self.store.upsert(
                    e.order_id,
                    OrderRecord {
                        order_id: e.order_id,
                        customer: e.customer,
                        lines: e.lines,
                        state: ProcessingState::Processing,
                        placed_at: e.occurred_at,
                        total,
                        item_count,
                    },
                );
            }
            OrderEvent::ProcessingStateChanged(e) => {
                if let Some(mut record) = self.store.get(&e.order_id) {
                    record.state = e.to;
                    self.store.upsert(e.order_id, record);
                }
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.reset();
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
