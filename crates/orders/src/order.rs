use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merchstore_catalog::ProductId;
use merchstore_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Price, Size};
use merchstore_events::Event;

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle stage of an order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Processing,
    Processed,
    Cancelled,
}

impl ProcessingState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Processing => "processing",
            ProcessingState::Processed => "processed",
            ProcessingState::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a state transition does to reserved stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockEffect {
    /// No inventory movement.
    None,
    /// Decrement availability; the transition must fail if stock is short.
    Reserve,
    /// Return the ordered quantities to availability.
    Restore,
}

/// Inventory effect of moving an order from `from` to `to`.
///
/// `from == None` is initial placement. Active states (`processing`,
/// `processed`) hold stock; `cancelled` does not. The effect is the
/// difference: entering an active state from a non-active one reserves,
/// leaving the active states restores.
pub const fn inventory_effect(from: Option<ProcessingState>, to: ProcessingState) -> StockEffect {
    use ProcessingState::{Cancelled, Processed, Processing};

    match (from, to) {
        (None, Processing) => StockEffect::Reserve,
        (Some(Processing), Processed) => StockEffect::None,
        (Some(Processing), Cancelled) => StockEffect::Restore,
        (Some(Processed), Cancelled) => StockEffect::Restore,
        (Some(Cancelled), Processing) => StockEffect::Reserve,
        (Some(Cancelled), Processed) => StockEffect::Reserve,
        _ => StockEffect::None,
    }
}

/// Who placed the order. Orders are placed without accounts, so contact
/// details are captured inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub discord: String,
}

/// One line of an order.
///
/// `unit_price` is snapshotted at purchase time and never recalculated from
/// the live product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub size: Option<Size>,
    pub quantity: u32,
    pub unit_price: Price,
}

impl OrderLine {
    pub fn line_total(&self) -> Price {
        self.unit_price.line_total(self.quantity)
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    customer: Customer,
    lines: Vec<OrderLine>,
    state: ProcessingState,
    placed_at: DateTime<Utc>,
    version: u64,
    created: bool,
}

impl Order {
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            customer: Customer {
                name: String::new(),
                email: String::new(),
                discord: String::new(),
            },
            lines: Vec::new(),
            state: ProcessingState::Processing,
            placed_at: DateTime::<Utc>::MIN_UTC,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn state(&self) -> ProcessingState {
        self.state
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    /// Sum of all line totals, in minor units.
    pub fn total(&self) -> Price {
        self.lines.iter().map(OrderLine::line_total).sum()
    }

    /// Total number of ordered units across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Lines that carry a size. Only these touch the stock ledger.
    pub fn sized_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|line| line.size.is_some())
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub customer: Customer,
    pub lines: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeProcessingState.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeProcessingState {
    pub order_id: OrderId,
    pub to: ProcessingState,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    ChangeProcessingState(ChangeProcessingState),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub customer: Customer,
    pub lines: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProcessingStateChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStateChanged {
    pub order_id: OrderId,
    pub from: ProcessingState,
    pub to: ProcessingState,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    ProcessingStateChanged(ProcessingStateChanged),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::ProcessingStateChanged(_) => "orders.order.state_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::ProcessingStateChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.customer = e.customer.clone();
                self.lines = e.lines.clone();
                self.state = ProcessingState::Processing;
                self.placed_at = e.occurred_at;
                self.created = true;
            }
            OrderEvent::ProcessingStateChanged(e) => {
                self.state = e.to;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::ChangeProcessingState(cmd) => self.handle_change_state(cmd),
        }
    }
}

impl Order {
    fn validate_customer(customer: &Customer) -> Result<(), DomainError> {
        if customer.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if !customer.email.contains('@') {
            return Err(DomainError::validation("email address is malformed"));
        }
        if customer.discord.trim().is_empty() {
            return Err(DomainError::validation("discord handle cannot be empty"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        Self::validate_customer(&cmd.customer)?;
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must have at least one line"));
        }
        if cmd.lines.iter().any(|line| line.quantity == 0) {
            return Err(DomainError::validation("quantity must be at least 1"));
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            customer: cmd.customer.clone(),
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_state(
        &self,
        cmd: &ChangeProcessingState,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        use ProcessingState::{Cancelled, Processed, Processing};

        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != cmd.order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }

        let allowed = matches!(
            (self.state, cmd.to),
            (Processing, Processed)
                | (Processing, Cancelled)
                | (Processed, Cancelled)
                | (Cancelled, Processing)
                | (Cancelled, Processed)
        );
        if !allowed {
            return Err(DomainError::validation(format!(
                "cannot move order from {} to {}",
                self.state, cmd.to
            )));
        }

        Ok(vec![OrderEvent::ProcessingStateChanged(
            ProcessingStateChanged {
                order_id: cmd.order_id,
                from: self.state,
                to: cmd.to,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_order_id() -> OrderId {
        OrderId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_customer() -> Customer {
        Customer {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.edu".to_string(),
            discord: "ada#0001".to_string(),
        }
    }

    fn test_lines() -> Vec<OrderLine> {
        vec![
            OrderLine {
                product_id: ProductId::new(AggregateId::new()),
                size: Some(Size::M),
                quantity: 2,
                unit_price: Price::from_minor_units(4500),
            },
            OrderLine {
                product_id: ProductId::new(AggregateId::new()),
                size: None,
                quantity: 1,
                unit_price: Price::from_minor_units(300),
            },
        ]
    }

    fn placed_order(id: OrderId) -> Order {
        let mut order = Order::empty(id);
        let events = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id: id,
                customer: test_customer(),
                lines: test_lines(),
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        order
    }

    fn move_to(order: &mut Order, to: ProcessingState) {
        let events = order
            .handle(&OrderCommand::ChangeProcessingState(
                ChangeProcessingState {
                    order_id: order.id_typed(),
                    to,
                    occurred_at: test_time(),
                },
            ))
            .unwrap();
        order.apply(&events[0]);
    }

    #[test]
    fn place_order_starts_in_processing() {
        let id = test_order_id();
        let order = placed_order(id);

        assert!(order.exists());
        assert_eq!(order.state(), ProcessingState::Processing);
        assert_eq!(order.total(), Price::from_minor_units(9300));
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.sized_lines().count(), 1);
        assert_eq!(order.version(), 1);
    }

    #[test]
    fn place_order_validates_contact_details() {
        let id = test_order_id();
        let order = Order::empty(id);

        for customer in [
            Customer {
                name: "".to_string(),
                ..test_customer()
            },
            Customer {
                email: "not-an-email".to_string(),
                ..test_customer()
            },
            Customer {
                discord: "  ".to_string(),
                ..test_customer()
            },
        ] {
            let err = order
                .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                    order_id: id,
                    customer,
                    lines: test_lines(),
                    occurred_at: test_time(),
                }))
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn place_order_rejects_empty_and_zero_quantity_lines() {
        let id = test_order_id();
        let order = Order::empty(id);

        let err = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id: id,
                customer: test_customer(),
                lines: vec![],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut lines = test_lines();
        lines[0].quantity = 0;
        let err = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id: id,
                customer: test_customer(),
                lines,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn allowed_transitions_walk_the_full_lifecycle() {
        let id = test_order_id();
        let mut order = placed_order(id);

        move_to(&mut order, ProcessingState::Cancelled);
        assert_eq!(order.state(), ProcessingState::Cancelled);

        move_to(&mut order, ProcessingState::Processing);
        assert_eq!(order.state(), ProcessingState::Processing);

        move_to(&mut order, ProcessingState::Processed);
        assert_eq!(order.state(), ProcessingState::Processed);

        move_to(&mut order, ProcessingState::Cancelled);
        move_to(&mut order, ProcessingState::Processed);
        assert_eq!(order.state(), ProcessingState::Processed);
    }

    #[test]
    fn same_state_and_processed_to_processing_are_rejected() {
        let id = test_order_id();
        let mut order = placed_order(id);

        let err = order
            .handle(&OrderCommand::ChangeProcessingState(
                ChangeProcessingState {
                    order_id: id,
                    to: ProcessingState::Processing,
                    occurred_at: test_time(),
                },
            ))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        move_to(&mut order, ProcessingState::Processed);
        let err = order
            .handle(&OrderCommand::ChangeProcessingState(
                ChangeProcessingState {
                    order_id: id,
                    to: ProcessingState::Processing,
                    occurred_at: test_time(),
                },
            ))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn change_state_on_missing_order_is_not_found() {
        let id = test_order_id();
        let order = Order::empty(id);

        let err = order
            .handle(&OrderCommand::ChangeProcessingState(
                ChangeProcessingState {
                    order_id: id,
                    to: ProcessingState::Cancelled,
                    occurred_at: test_time(),
                },
            ))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn inventory_effect_matches_transition_table() {
        use ProcessingState::{Cancelled, Processed, Processing};

        assert_eq!(inventory_effect(None, Processing), StockEffect::Reserve);
        assert_eq!(
            inventory_effect(Some(Processing), Processed),
            StockEffect::None
        );
        assert_eq!(
            inventory_effect(Some(Processing), Cancelled),
            StockEffect::Restore
        );
        assert_eq!(
            inventory_effect(Some(Processed), Cancelled),
            StockEffect::Restore
        );
        assert_eq!(
            inventory_effect(Some(Cancelled), Processing),
            StockEffect::Reserve
        );
        assert_eq!(
            inventory_effect(Some(Cancelled), Processed),
            StockEffect::Reserve
        );
    }

    #[test]
    fn processing_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProcessingState::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }
}
