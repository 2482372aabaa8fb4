//! Cart reconciliation.
//!
//! The client holds a cached cart; everything in it is untrusted. Before
//! checkout each line is re-checked against the live catalog and classified.
//! The same check runs again inside order submission, so a cart that looked
//! fine when viewed still cannot buy at a stale price.

use serde::{Deserialize, Serialize};

use merchstore_catalog::{ProductId, ProductSnapshot};
use merchstore_core::{Price, Size};

/// One client-supplied cart line. Price and size may be stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub size: Option<Size>,
    pub unit_price: Price,
}

/// A soft problem with an otherwise purchasable line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CartIssue {
    /// Submitted price differs from the live price. Both are reported so the
    /// client can show the delta and refresh.
    Price { live: Price, submitted: Price },
    /// The requested size is no longer offered for this product.
    SizeUnavailable {
        requested: Size,
        available: Vec<Size>,
    },
    /// The product is sold in sizes but the line carries none.
    SizeRequired { available: Vec<Size> },
}

/// Classification of a single cart line against the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CartLineReport {
    /// No such product.
    NotExist { product_id: ProductId },
    /// The product exists but is archived; the line must be removed.
    Archived { product_id: ProductId, name: String },
    /// The product is purchasable; `issues` may still block submission.
    Normal {
        product_id: ProductId,
        name: String,
        issues: Vec<CartIssue>,
    },
}

impl CartLineReport {
    /// Whether this line may be part of a submitted order as-is.
    pub fn is_clean(&self) -> bool {
        matches!(self, CartLineReport::Normal { issues, .. } if issues.is_empty())
    }
}

/// A submission-blocking line, keyed by its position in the submitted cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRejection {
    pub index: usize,
    pub report: CartLineReport,
}

/// Classify one line against the live product (or its absence).
pub fn reconcile_line(line: &CartLine, product: Option<&ProductSnapshot>) -> CartLineReport {
    let Some(product) = product else {
        return CartLineReport::NotExist {
            product_id: line.product_id,
        };
    };

    if product.archived {
        return CartLineReport::Archived {
            product_id: line.product_id,
            name: product.name.clone(),
        };
    }

    let mut issues = Vec::new();

    if line.unit_price != product.price {
        issues.push(CartIssue::Price {
            live: product.price,
            submitted: line.unit_price,
        });
    }

    match line.size {
        Some(requested) if !product.offers_size(requested) => {
            issues.push(CartIssue::SizeUnavailable {
                requested,
                available: product.sizes.iter().copied().collect(),
            });
        }
        None if product.requires_size() => {
            issues.push(CartIssue::SizeRequired {
                available: product.sizes.iter().copied().collect(),
            });
        }
        _ => {}
    }

    CartLineReport::Normal {
        product_id: line.product_id,
        name: product.name.clone(),
        issues,
    }
}

/// Classify every line of a cart.
pub fn reconcile<'a, F>(lines: &[CartLine], lookup: F) -> Vec<CartLineReport>
where
    F: Fn(ProductId) -> Option<&'a ProductSnapshot>,
{
    lines
        .iter()
        .map(|line| reconcile_line(line, lookup(line.product_id)))
        .collect()
}

/// Gate for order submission: every line must reconcile clean, otherwise the
/// whole order is rejected with per-line reports.
pub fn check_submission<'a, F>(lines: &[CartLine], lookup: F) -> Result<(), Vec<LineRejection>>
where
    F: Fn(ProductId) -> Option<&'a ProductSnapshot>,
{
    let rejections: Vec<LineRejection> = reconcile(lines, lookup)
        .into_iter()
        .enumerate()
        .filter(|(_, report)| !report.is_clean())
        .map(|(index, report)| LineRejection { index, report })
        .collect();

    if rejections.is_empty() {
        Ok(())
    } else {
        Err(rejections)
    }
}
