//! Value object trait: equality by value, not identity.
//!
//! Value objects are domain objects with **no identity** - they are defined
//! entirely by their attribute values. Two value objects with the same values
//! are considered equal, and they are immutable: to "modify" one, create a
//! new one with the new values.

/// Marker trait for value objects.
///
/// Requires `Clone` (values are cheap to copy), `PartialEq` (compared by
/// value) and `Debug` (loggable/testable).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
