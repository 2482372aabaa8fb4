use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use merchstore_catalog::ProductId;
use merchstore_core::Size;
use merchstore_events::EventEnvelope;
use merchstore_inventory::{StockKey, StockLedgerEvent, ledger_aggregate_id};

use super::{CursorDecision, Cursors, ProjectionError};
use crate::read_model::ReadStore;

/// Available quantity of one stock bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRecord {
    pub key: StockKey,
    pub available: u32,
}

/// Stock availability projection.
///
/// Mirrors the stock ledger stream into a per-bucket read model so the
/// storefront can show per-size availability without rehydrating the ledger.
#[derive(Debug)]
pub struct StockProjection<S>
where
    S: ReadStore<StockKey, StockRecord>,
{
    store: S,
    cursors: Cursors,
}

impl<S> StockProjection<S>
where
    S: ReadStore<StockKey, StockRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn available(&self, key: StockKey) -> u32 {
        self.store.get(&key).map(|r| r.available).unwrap_or(0)
    }

    /// Non-empty buckets for one product, keyed by size.
    pub fn quantities_for(&self, product_id: ProductId) -> BTreeMap<Size, u32> {
        self.store
            .list()
            .into_iter()
            .filter(|r| r.key.product_id == product_id && r.available > 0)
            .map(|r| (r.key.size, r.available))
            .collect()
    }

    /// Sizes of one product that can currently be ordered.
    pub fn sizes_in_stock(&self, product_id: ProductId) -> Vec<Size> {
        self.quantities_for(product_id).into_keys().collect()
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if aggregate_id != ledger_aggregate_id() {
            return Err(ProjectionError::StreamMismatch(
                "envelope does not belong to the stock ledger stream".to_string(),
            ));
        }

        if self.cursors.check(aggregate_id, seq)? == CursorDecision::Skip {
            return Ok(());
        }

        let event: StockLedgerEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            StockLedgerEvent::StockLevelSet(e) => {
                let key = StockKey::new(e.product_id, e.size);
                self.store.upsert(
                    key,
                    StockRecord {
                        key,
                        available: e.quantity,
                    },
                );
            }
            StockLedgerEvent::StockReserved(e) => {
                for line in &e.lines {
                    let key = line.key();
                    let mut record = self.store.get(&key).unwrap_or(StockRecord {
                        key,
                        available: 0,
                    });
                    record.available = record.available.saturating_sub(line.quantity);
                    self.store.upsert(key, record);
                }
            }
            StockLedgerEvent::StockReleased(e) => {
                for line in &e.lines {
                    let key = line.key();
                    let mut record = self.store.get(&key).unwrap_or(StockRecord {
                        key,
                        available: 0,
                    });
                    record.available = record.available.saturating_add(line.quantity);
                    self.store.upsert(key, record);
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
        envs.sort_by_key(|e| e.sequence_number());

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use merchstore_core::AggregateId;
    use merchstore_inventory::{StockLevelSet, StockLine, StockReserved};

    use super::*;
    use crate::read_model::InMemoryReadStore;

    fn envelope(seq: u64, event: &StockLedgerEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            ledger_aggregate_id(),
            "inventory.stock_ledger".to_string(),
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    #[test]
    fn levels_and_reservations_shape_availability() {
        let projection = StockProjection::new(InMemoryReadStore::new());
        let product_id = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(
                1,
                &StockLedgerEvent::StockLevelSet(StockLevelSet {
                    product_id,
                    size: Size::M,
                    quantity: 3,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        projection
            .apply_envelope(&envelope(
                2,
                &StockLedgerEvent::StockReserved(StockReserved {
                    lines: vec![StockLine {
                        product_id,
                        size: Size::M,
                        quantity: 3,
                    }],
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert_eq!(projection.available(StockKey::new(product_id, Size::M)), 0);
        assert!(projection.quantities_for(product_id).is_empty());
        assert!(projection.sizes_in_stock(product_id).is_empty());
    }

    #[test]
    fn foreign_streams_are_rejected() {
        let projection = StockProjection::new(InMemoryReadStore::new());
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::new(),
            "inventory.stock_ledger".to_string(),
            1,
            serde_json::json!({}),
        );

        let err = projection.apply_envelope(&env).unwrap_err();
        assert!(matches!(err, ProjectionError::StreamMismatch(_)));
    }
}
