//! Order application service.
//!
//! Coordinates the three aggregates behind one storefront operation:
//! checkout re-validates the submitted cart, reserves stock, places the
//! order, and sends the confirmation email; state changes apply their
//! inventory effect around the transition.
//!
//! Effect ordering is what makes the coordination safe without a
//! distributed transaction:
//! - reservations run BEFORE the state change, with a compensating release
//!   if the change then fails;
//! - restorations run AFTER the state change, since a release cannot fail
//!   on availability.
//! Emails are sent last and their failures are logged, never propagated; a
//! committed transition outlives a broken email provider.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, info, warn};

use merchstore_catalog::{ProductId, ProductSnapshot};
use merchstore_core::{Aggregate, AggregateId, Price, Size};
use merchstore_events::{EventBus, EventEnvelope};
use merchstore_inventory::{
    ReleaseStock, ReserveStock, StockLedger, StockLedgerCommand, StockLine, ledger_aggregate_id,
};
use merchstore_notify::{EmailBranding, EmailSender, OrderEmailKind, OrderEmailView};
use merchstore_orders::{
    CartLine, ChangeProcessingState, Customer, LineRejection, Order, OrderCommand, OrderId,
    OrderLine, PlaceOrder, ProcessingState, StockEffect, check_submission, inventory_effect,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

/// Attempts at appending a compensating release before giving up.
const RELEASE_ATTEMPTS: u32 = 5;

pub const PRODUCT_AGGREGATE_TYPE: &str = "catalog.product";
pub const ORDER_AGGREGATE_TYPE: &str = "orders.order";
pub const STOCK_LEDGER_AGGREGATE_TYPE: &str = "inventory.stock_ledger";

/// Live product lookup used for cart reconciliation and email rendering.
/// Backed by the catalog projection in production.
pub trait CatalogLookup: Send + Sync {
    fn snapshot(&self, product_id: ProductId) -> Option<ProductSnapshot>;
}

impl<C> CatalogLookup for Arc<C>
where
    C: CatalogLookup + ?Sized,
{
    fn snapshot(&self, product_id: ProductId) -> Option<ProductSnapshot> {
        (**self).snapshot(product_id)
    }
}

/// One client-submitted checkout line. Entirely untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine {
    pub product_id: ProductId,
    pub size: Option<Size>,
    pub quantity: u32,
    pub unit_price: Price,
}

impl RequestedLine {
    fn cart_line(&self) -> CartLine {
        CartLine {
            product_id: self.product_id,
            size: self.size,
            unit_price: self.unit_price,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// The submitted cart does not match the live catalog. Carries a report
    /// for each offending line.
    #[error("order submission rejected: {} line(s) failed reconciliation", .0.len())]
    Rejected(Vec<LineRejection>),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Coordinates orders, the stock ledger, and the catalog read model.
pub struct OrderService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    catalog: Arc<dyn CatalogLookup>,
    email: Arc<dyn EmailSender>,
    branding: EmailBranding,
}

impl<S, B> OrderService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        catalog: Arc<dyn CatalogLookup>,
        email: Arc<dyn EmailSender>,
        branding: EmailBranding,
    ) -> Self {
        Self {
            dispatcher,
            catalog,
            email,
            branding,
        }
    }

    /// Place an order from a submitted cart.
    ///
    /// The cart is re-reconciled against the live catalog at this moment, so
    /// stale prices and dropped sizes that slipped past the cart view are
    /// still rejected here. Stock for all sized lines is reserved in one
    /// all-or-nothing ledger command before the order is placed.
    pub async fn checkout(
        &self,
        customer: Customer,
        requested: Vec<RequestedLine>,
        now: DateTime<Utc>,
    ) -> Result<OrderId, OrderServiceError> {
        let snapshots = self.snapshots_for(&requested);
        let cart_lines: Vec<CartLine> = requested.iter().map(RequestedLine::cart_line).collect();
        check_submission(&cart_lines, |id| snapshots.get(&id))
            .map_err(OrderServiceError::Rejected)?;

        let order_lines: Vec<OrderLine> = requested
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id,
                size: line.size,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        let stock_lines = sized_stock_lines(&order_lines);

        let order_id = OrderId::new(AggregateId::new());
        let place = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            customer,
            lines: order_lines,
            occurred_at: now,
        });

        // Decide the command against an empty order first: a rejected
        // submission must leave the event log untouched.
        Order::empty(order_id)
            .handle(&place)
            .map_err(DispatchError::from)?;

        self.reserve(&stock_lines, now)?;

        if let Err(err) =
            self.dispatcher
                .dispatch(order_id.0, ORDER_AGGREGATE_TYPE, place, |id| {
                    Order::empty(OrderId::new(id))
                })
        {
            // The reservation is already committed; hand the stock back.
            self.release_or_log(&stock_lines, now);
            return Err(err.into());
        }

        info!(order_id = %order_id, "order placed");
        self.notify(order_id, OrderEmailKind::Confirmed).await;

        Ok(order_id)
    }

    /// Move an order to a new lifecycle stage, applying the inventory effect
    /// of the transition and notifying the customer.
    pub async fn set_processing_state(
        &self,
        order_id: OrderId,
        to: ProcessingState,
        now: DateTime<Utc>,
    ) -> Result<(), OrderServiceError> {
        let order = self
            .dispatcher
            .load(order_id.0, |id| Order::empty(OrderId::new(id)))?;
        if !order.exists() {
            return Err(DispatchError::NotFound.into());
        }

        let effect = inventory_effect(Some(order.state()), to);
        let stock_lines = sized_stock_lines(order.lines());

        if effect == StockEffect::Reserve {
            self.reserve(&stock_lines, now)?;
        }

        let change = OrderCommand::ChangeProcessingState(ChangeProcessingState {
            order_id,
            to,
            occurred_at: now,
        });
        let changed = self
            .dispatcher
            .dispatch(order_id.0, ORDER_AGGREGATE_TYPE, change, |id| {
                Order::empty(OrderId::new(id))
            });
        if let Err(err) = changed {
            if effect == StockEffect::Reserve {
                self.release_or_log(&stock_lines, now);
            }
            return Err(err.into());
        }

        if effect == StockEffect::Restore {
            self.release_or_log(&stock_lines, now);
        }

        info!(order_id = %order_id, state = %to, "order state changed");
        match to {
            ProcessingState::Processed => self.notify(order_id, OrderEmailKind::Processed).await,
            ProcessingState::Cancelled => self.notify(order_id, OrderEmailKind::Cancelled).await,
            // Reinstating repeats the confirmation: the order is active again.
            ProcessingState::Processing => self.notify(order_id, OrderEmailKind::Confirmed).await,
        }

        Ok(())
    }

    fn snapshots_for(&self, requested: &[RequestedLine]) -> HashMap<ProductId, ProductSnapshot> {
        let mut snapshots = HashMap::new();
        for line in requested {
            if let Some(snapshot) = self.catalog.snapshot(line.product_id) {
                snapshots.insert(line.product_id, snapshot);
            }
        }
        snapshots
    }

    fn reserve(
        &self,
        stock_lines: &[StockLine],
        now: DateTime<Utc>,
    ) -> Result<(), OrderServiceError> {
        if stock_lines.is_empty() {
            return Ok(());
        }
        let reserve = StockLedgerCommand::ReserveStock(ReserveStock {
            lines: stock_lines.to_vec(),
            occurred_at: now,
        });
        self.dispatcher
            .dispatch(
                ledger_aggregate_id(),
                STOCK_LEDGER_AGGREGATE_TYPE,
                reserve,
                StockLedger::empty,
            )
            .map_err(OrderServiceError::from)?;
        Ok(())
    }

    /// Return quantities to availability.
    ///
    /// Every reservation and release contends on the single ledger stream, so
    /// an append race here is routine; a release never fails on availability,
    /// so retrying against fresh state converges. Exhausting the retries
    /// loses no order data but strands reserved stock, so it is logged loudly
    /// for an operator.
    fn release_or_log(&self, stock_lines: &[StockLine], now: DateTime<Utc>) {
        if stock_lines.is_empty() {
            return;
        }
        for attempt in 1..=RELEASE_ATTEMPTS {
            let release = StockLedgerCommand::ReleaseStock(ReleaseStock {
                lines: stock_lines.to_vec(),
                occurred_at: now,
            });
            match self.dispatcher.dispatch(
                ledger_aggregate_id(),
                STOCK_LEDGER_AGGREGATE_TYPE,
                release,
                StockLedger::empty,
            ) {
                Ok(_) => return,
                Err(DispatchError::Concurrency(_)) if attempt < RELEASE_ATTEMPTS => {
                    warn!(attempt, "stock release lost an append race; retrying");
                }
                Err(err) => {
                    error!(error = %err, "stock release failed; availability needs manual correction");
                    return;
                }
            }
        }
    }

    async fn notify(&self, order_id: OrderId, kind: OrderEmailKind) {
        let order = match self
            .dispatcher
            .load(order_id.0, |id| Order::empty(OrderId::new(id)))
        {
            Ok(order) if order.exists() => order,
            Ok(_) | Err(_) => {
                warn!(order_id = %order_id, "order not found when rendering email");
                return;
            }
        };

        let view = OrderEmailView::from_order(&order, |product_id| {
            self.catalog.snapshot(product_id).map(|s| s.name)
        });
        let subject = merchstore_notify::subject(kind, &self.branding);
        let html = merchstore_notify::render(kind, &view, &self.branding);

        if let Err(err) = self.email.send(&view.customer_email, &subject, &html).await {
            warn!(order_id = %order_id, error = %err, "order email failed; transition stands");
        }
    }
}

fn sized_stock_lines(lines: &[OrderLine]) -> Vec<StockLine> {
    lines
        .iter()
        .filter_map(|line| {
            line.size.map(|size| StockLine {
                product_id: line.product_id,
                size,
                quantity: line.quantity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use merchstore_orders::OrderLine;

    #[test]
    fn only_sized_lines_touch_the_ledger() {
        let sized = ProductId::new(AggregateId::new());
        let no_size = ProductId::new(AggregateId::new());
        let lines = vec![
            OrderLine {
                product_id: sized,
                size: Some(Size::M),
                quantity: 2,
                unit_price: Price::from_minor_units(4500),
            },
            OrderLine {
                product_id: no_size,
                size: None,
                quantity: 5,
                unit_price: Price::from_minor_units(300),
            },
        ];

        let stock = sized_stock_lines(&lines);
        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].product_id, sized);
        assert_eq!(stock[0].quantity, 2);
    }
}
