//! Read-side view of a product for pricing and availability checks.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use merchstore_core::{Price, Size};

use crate::product::{Product, ProductId};

/// The slice of product state that checkout and cart reconciliation need.
///
/// Snapshots come from the catalog read model, so they may lag the aggregate
/// by a moment; checkout re-validates price and size against this view and
/// rejects anything that drifted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub archived: bool,
    pub sizes: BTreeSet<Size>,
}

impl ProductSnapshot {
    pub fn requires_size(&self) -> bool {
        !self.sizes.is_empty()
    }

    pub fn offers_size(&self, size: Size) -> bool {
        self.sizes.contains(&size)
    }
}

impl From<&Product> for ProductSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id_typed(),
            name: product.name().to_string(),
            price: product.price(),
            archived: product.is_archived(),
            sizes: product.sizes().clone(),
        }
    }
}
