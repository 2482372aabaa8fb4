//! Closed garment size enumeration.
//!
//! Per-size data is always keyed by this enum (never by free-form strings),
//! so key-existence is checked at the serde boundary instead of at runtime.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// Garment size offered by the store.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Xxs,
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

impl Size {
    /// All sizes, smallest first.
    pub const ALL: [Size; 7] = [
        Size::Xxs,
        Size::Xs,
        Size::S,
        Size::M,
        Size::L,
        Size::Xl,
        Size::Xxl,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Size::Xxs => "xxs",
            Size::Xs => "xs",
            Size::S => "s",
            Size::M => "m",
            Size::L => "l",
            Size::Xl => "xl",
            Size::Xxl => "xxl",
        }
    }
}

impl ValueObject for Size {}

impl core::fmt::Display for Size {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Size {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xxs" => Ok(Size::Xxs),
            "xs" => Ok(Size::Xs),
            "s" => Ok(Size::S),
            "m" => Ok(Size::M),
            "l" => Ok(Size::L),
            "xl" => Ok(Size::Xl),
            "xxl" => Ok(Size::Xxl),
            other => Err(DomainError::validation(format!("unknown size: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_label() {
        for size in Size::ALL {
            assert_eq!(size.as_str().parse::<Size>().unwrap(), size);
        }
    }

    #[test]
    fn rejects_unknown_labels() {
        assert!("xxxl".parse::<Size>().is_err());
        assert!("".parse::<Size>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_labels() {
        assert_eq!(serde_json::to_string(&Size::Xxl).unwrap(), "\"xxl\"");
        let parsed: Size = serde_json::from_str("\"m\"").unwrap();
        assert_eq!(parsed, Size::M);
    }
}
