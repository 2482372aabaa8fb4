//! Prices in minor currency units.
//!
//! All prices are carried as integer cents to avoid floating-point rounding.
//! Conversion to major units happens only when rendering customer-facing text.

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// A price in minor currency units (cents).
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub const fn from_minor_units(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn minor_units(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Line total for a quantity of this unit price.
    ///
    /// Saturating: order totals cannot meaningfully overflow `u64` cents,
    /// but a malicious quantity must not wrap around.
    pub fn line_total(self, quantity: u32) -> Price {
        Price(self.0.saturating_mul(u64::from(quantity)))
    }

    pub fn saturating_add(self, other: Price) -> Price {
        Price(self.0.saturating_add(other.0))
    }

    /// Render as major units (e.g. `1250` cents -> `"12.50"`).
    pub fn format_major(&self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl ValueObject for Price {}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.format_major())
    }
}

impl core::iter::Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Self {
        iter.fold(Price::ZERO, Price::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_major_units() {
        assert_eq!(Price::from_minor_units(1250).format_major(), "12.50");
        assert_eq!(Price::from_minor_units(5).format_major(), "0.05");
        assert_eq!(Price::ZERO.format_major(), "0.00");
    }

    #[test]
    fn line_total_multiplies_in_minor_units() {
        let price = Price::from_minor_units(1000);
        assert_eq!(price.line_total(3), Price::from_minor_units(3000));
    }

    #[test]
    fn line_total_saturates_instead_of_wrapping() {
        let price = Price::from_minor_units(u64::MAX);
        assert_eq!(price.line_total(2), Price::from_minor_units(u64::MAX));
    }

    #[test]
    fn sums_line_totals() {
        let total: Price = [
            Price::from_minor_units(1000).line_total(2),
            Price::from_minor_units(500).line_total(1),
        ]
        .into_iter()
        .sum();
        assert_eq!(total, Price::from_minor_units(2500));
    }
}
