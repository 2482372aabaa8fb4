//! Request DTOs and JSON mapping helpers for the read models.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::json;

use merchstore_core::{Price, Size};
use merchstore_infra::{CatalogRecord, OrderRecord, RequestedLine};
use merchstore_orders::{CartLine, Customer};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image_links: Vec<String>,
    #[serde(default)]
    pub about: Vec<String>,
    #[serde(default)]
    pub sizes: BTreeSet<Size>,
    /// Starting availability per size, applied to the stock ledger after
    /// the product is created.
    #[serde(default)]
    pub initial_stock: BTreeMap<Size, u32>,
}

#[derive(Debug, Deserialize)]
pub struct EditProductRequest {
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image_links: Vec<String>,
    #[serde(default)]
    pub about: Vec<String>,
    #[serde(default)]
    pub sizes: BTreeSet<Size>,
    pub archived: bool,
    /// Product version the editor last saw; a mismatch rejects the edit.
    pub expected_version: u64,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub size: Size,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub customer: Customer,
    pub lines: Vec<RequestedLine>,
}

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub lines: Vec<CartLine>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeOrderStateRequest {
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CasLoginRequest {
    /// Service ticket handed to the client by the CAS server.
    pub ticket: String,
    /// Service URL the ticket was issued for.
    pub service: String,
}

// -------------------------
// Response mapping
// -------------------------

pub fn product_to_json(
    record: &CatalogRecord,
    availability: &BTreeMap<Size, u32>,
) -> serde_json::Value {
    json!({
        "id": record.product_id.to_string(),
        "name": record.name,
        "price": record.price,
        "image_links": record.image_links,
        "about": record.about,
        "sizes": record.sizes,
        "availability": availability,
        "archived": record.archived,
        "version": record.version,
    })
}

pub fn order_to_json(record: &OrderRecord) -> serde_json::Value {
    json!({
        "id": record.order_id.to_string(),
        "customer": record.customer,
        "lines": record.lines,
        "state": record.state.as_str(),
        "placed_at": record.placed_at,
        "total": record.total,
        "item_count": record.item_count,
    })
}
