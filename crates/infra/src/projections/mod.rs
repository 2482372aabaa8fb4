//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: Can be reconstructed from the event stream
//! - **Idempotent**: Safe for at-least-once delivery

pub mod catalog;
pub mod orders;
pub mod stock;

pub use catalog::{CatalogProjection, CatalogRecord};
pub use orders::{OrderRecord, OrdersProjection};
pub use stock::{StockProjection, StockRecord};

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use merchstore_core::AggregateId;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("envelope does not belong to this stream: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Per-aggregate cursors supporting at-least-once delivery.
///
/// A replayed envelope at or below the cursor is a duplicate and is skipped;
/// after the first applied event, sequence numbers must advance by exactly
/// one.
#[derive(Debug, Default)]
pub(crate) struct Cursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

/// What the cursor says to do with an incoming envelope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CursorDecision {
    Apply,
    Skip,
}

impl Cursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn check(
        &self,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<CursorDecision, ProjectionError> {
        let cursors = match self.inner.read() {
            Ok(c) => c,
            Err(_) => return Ok(CursorDecision::Skip),
        };
        let last = *cursors.get(&aggregate_id).unwrap_or(&0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(CursorDecision::Skip);
        }
        // The first event of a stream may arrive at any positive sequence;
        // after that, strict increments.
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        Ok(CursorDecision::Apply)
    }

    pub(crate) fn advance(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub(crate) fn reset(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}
