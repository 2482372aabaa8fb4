//! Stale order sweep.
//!
//! Orders are held for pickup. One that has sat in `processing` beyond the
//! staleness window is cancelled: stock goes back, the customer is told.
//! Each order is its own transaction; one failure never blocks the rest.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use merchstore_events::{EventBus, EventEnvelope};
use merchstore_orders::{OrderId, ProcessingState};

use crate::event_store::EventStore;
use crate::projections::{OrderRecord, OrdersProjection};
use crate::read_model::ReadStore;
use crate::service::OrderService;

/// Orders older than this are considered abandoned.
pub const DEFAULT_STALENESS_DAYS: i64 = 7;

/// Pause between cancellation emails, respecting the provider's rate limit.
pub const DEFAULT_EMAIL_THROTTLE: std::time::Duration = std::time::Duration::from_millis(600);

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Stale orders found.
    pub examined: usize,
    /// Orders successfully cancelled.
    pub cancelled: usize,
    /// Orders whose cancellation failed; they stay for the next run.
    pub failed: usize,
}

/// Periodic job that cancels abandoned orders.
pub struct StaleOrderSweep<S, B, R>
where
    R: ReadStore<OrderId, OrderRecord>,
{
    service: std::sync::Arc<OrderService<S, B>>,
    orders: std::sync::Arc<OrdersProjection<R>>,
    staleness: Duration,
    throttle: std::time::Duration,
}

impl<S, B, R> StaleOrderSweep<S, B, R>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    R: ReadStore<OrderId, OrderRecord>,
{
    pub fn new(
        service: std::sync::Arc<OrderService<S, B>>,
        orders: std::sync::Arc<OrdersProjection<R>>,
    ) -> Self {
        Self {
            service,
            orders,
            staleness: Duration::days(DEFAULT_STALENESS_DAYS),
            throttle: DEFAULT_EMAIL_THROTTLE,
        }
    }

    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn with_throttle(mut self, throttle: std::time::Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Cancel every order still in `processing` that was placed more than
    /// the staleness window before `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> SweepReport {
        let cutoff = now - self.staleness;
        let stale = self.orders.stale(cutoff);

        let mut report = SweepReport {
            examined: stale.len(),
            ..SweepReport::default()
        };
        if stale.is_empty() {
            return report;
        }

        info!(count = stale.len(), %cutoff, "sweeping stale orders");

        for (idx, record) in stale.iter().enumerate() {
            match self
                .service
                .set_processing_state(record.order_id, ProcessingState::Cancelled, now)
                .await
            {
                Ok(()) => {
                    report.cancelled += 1;
                }
                Err(err) => {
                    // Isolated per order; the next run retries it.
                    warn!(order_id = %record.order_id, error = %err, "stale cancel failed");
                    report.failed += 1;
                }
            }

            if idx + 1 < stale.len() {
                tokio::time::sleep(self.throttle).await;
            }
        }

        info!(
            cancelled = report.cancelled,
            failed = report.failed,
            "stale order sweep finished"
        );
        report
    }
}
