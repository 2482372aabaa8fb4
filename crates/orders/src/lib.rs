//! `merchstore-orders` — order lifecycle and cart reconciliation.

pub mod cart;
pub mod order;

pub use cart::{CartIssue, CartLine, CartLineReport, LineRejection, check_submission, reconcile};
pub use order::{
    ChangeProcessingState, Customer, Order, OrderCommand, OrderEvent, OrderId, OrderLine,
    OrderPlaced, PlaceOrder, ProcessingState, ProcessingStateChanged, StockEffect,
    inventory_effect,
};
