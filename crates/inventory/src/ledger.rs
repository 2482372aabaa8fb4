use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use merchstore_catalog::ProductId;
use merchstore_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Size};
use merchstore_events::Event;

/// Stable identifier of the store's single stock ledger stream.
///
/// Every reservation for an order goes through one aggregate, so a checkout
/// either reserves all of its lines or none of them. The id is a fixed UUID
/// rather than a generated one so that rehydration always finds the stream.
pub fn ledger_aggregate_id() -> AggregateId {
    AggregateId::from_uuid(Uuid::from_u128(0x5354_4f43_4b4c_4544_4745_5200_0000_0001))
}

/// Key of a stock bucket: one product in one size.
///
/// Only sized merchandise is stocked. Products sold without sizes have no
/// buckets here and no inventory effect when ordered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub size: Size,
}

impl StockKey {
    pub fn new(product_id: ProductId, size: Size) -> Self {
        Self { product_id, size }
    }
}

/// A quantity of one stock bucket, as carried by reserve/release commands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: ProductId,
    pub size: Size,
    pub quantity: u32,
}

impl StockLine {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.size)
    }
}

/// Aggregate root: StockLedger.
///
/// Holds the available (not reserved) quantity for every stock bucket in the
/// store. Availability can never go negative: a reservation command is
/// checked against every requested bucket before any event is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLedger {
    id: AggregateId,
    available: BTreeMap<StockKey, u32>,
    version: u64,
}

impl StockLedger {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            available: BTreeMap::new(),
            version: 0,
        }
    }

    /// Available quantity for a bucket. Unknown buckets are empty.
    pub fn available(&self, key: StockKey) -> u32 {
        self.available.get(&key).copied().unwrap_or(0)
    }

    /// Available quantities for every bucket of one product, keyed by size.
    pub fn quantities_for(&self, product_id: ProductId) -> BTreeMap<Size, u32> {
        self.available
            .iter()
            .filter(|(key, _)| key.product_id == product_id)
            .map(|(key, qty)| (key.size, *qty))
            .collect()
    }
}

impl AggregateRoot for StockLedger {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SetStockLevel. Overwrites the available count of one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStockLevel {
    pub product_id: ProductId,
    pub size: Size,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock. Decrements every bucket, or fails as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub lines: Vec<StockLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseStock. Returns previously reserved quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub lines: Vec<StockLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockLedgerCommand {
    SetStockLevel(SetStockLevel),
    ReserveStock(ReserveStock),
    ReleaseStock(ReleaseStock),
}

/// Event: StockLevelSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevelSet {
    pub product_id: ProductId,
    pub size: Size,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub lines: Vec<StockLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReleased {
    pub lines: Vec<StockLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockLedgerEvent {
    StockLevelSet(StockLevelSet),
    StockReserved(StockReserved),
    StockReleased(StockReleased),
}

impl Event for StockLedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockLedgerEvent::StockLevelSet(_) => "inventory.stock.level_set",
            StockLedgerEvent::StockReserved(_) => "inventory.stock.reserved",
            StockLedgerEvent::StockReleased(_) => "inventory.stock.released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockLedgerEvent::StockLevelSet(e) => e.occurred_at,
            StockLedgerEvent::StockReserved(e) => e.occurred_at,
            StockLedgerEvent::StockReleased(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockLedger {
    type Command = StockLedgerCommand;
    type Event = StockLedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockLedgerEvent::StockLevelSet(e) => {
                let key = StockKey::new(e.product_id, e.size);
                if e.quantity == 0 {
                    self.available.remove(&key);
                } else {
                    self.available.insert(key, e.quantity);
                }
            }
            StockLedgerEvent::StockReserved(e) => {
                for line in &e.lines {
                    let entry = self.available.entry(line.key()).or_insert(0);
                    *entry = entry.saturating_sub(line.quantity);
                    if *entry == 0 {
                        self.available.remove(&line.key());
                    }
                }
            }
            StockLedgerEvent::StockReleased(e) => {
                for line in &e.lines {
                    let entry = self.available.entry(line.key()).or_insert(0);
                    *entry = entry.saturating_add(line.quantity);
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockLedgerCommand::SetStockLevel(cmd) => self.handle_set_level(cmd),
            StockLedgerCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
            StockLedgerCommand::ReleaseStock(cmd) => self.handle_release(cmd),
        }
    }
}

impl StockLedger {
    fn handle_set_level(&self, cmd: &SetStockLevel) -> Result<Vec<StockLedgerEvent>, DomainError> {
        Ok(vec![StockLedgerEvent::StockLevelSet(StockLevelSet {
            product_id: cmd.product_id,
            size: cmd.size,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Collapse duplicate buckets so two lines for the same (product, size)
    /// are checked against availability as one demand.
    fn aggregate_demand(lines: &[StockLine]) -> Result<BTreeMap<StockKey, u32>, DomainError> {
        let mut demand: BTreeMap<StockKey, u32> = BTreeMap::new();
        for line in lines {
            if line.quantity == 0 {
                return Err(DomainError::validation("quantity must be at least 1"));
            }
            let entry = demand.entry(line.key()).or_insert(0);
            *entry = entry
                .checked_add(line.quantity)
                .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        }
        Ok(demand)
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<StockLedgerEvent>, DomainError> {
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("nothing to reserve"));
        }

        let demand = Self::aggregate_demand(&cmd.lines)?;
        for (key, wanted) in &demand {
            let have = self.available(*key);
            if have < *wanted {
                return Err(DomainError::insufficient_stock(format!(
                    "product {} size {}: wanted {wanted}, have {have}",
                    key.product_id, key.size,
                )));
            }
        }

        Ok(vec![StockLedgerEvent::StockReserved(StockReserved {
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseStock) -> Result<Vec<StockLedgerEvent>, DomainError> {
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("nothing to release"));
        }
        // Quantities still have to be sane even though release cannot fail
        // on availability.
        Self::aggregate_demand(&cmd.lines)?;

        Ok(vec![StockLedgerEvent::StockReleased(StockReleased {
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn apply_all(ledger: &mut StockLedger, events: Vec<StockLedgerEvent>) {
        for event in &events {
            ledger.apply(event);
        }
    }

    fn set_level(ledger: &mut StockLedger, product_id: ProductId, size: Size, quantity: u32) {
        let events = ledger
            .handle(&StockLedgerCommand::SetStockLevel(SetStockLevel {
                product_id,
                size,
                quantity,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(ledger, events);
    }

    fn ledger_with(product_id: ProductId, size: Size, quantity: u32) -> StockLedger {
        let mut ledger = StockLedger::empty(ledger_aggregate_id());
        set_level(&mut ledger, product_id, size, quantity);
        ledger
    }

    #[test]
    fn set_level_overwrites_bucket() {
        let product_id = ProductId::new(AggregateId::new());
        let mut ledger = ledger_with(product_id, Size::M, 5);

        set_level(&mut ledger, product_id, Size::M, 2);

        assert_eq!(ledger.available(StockKey::new(product_id, Size::M)), 2);
    }

    #[test]
    fn reserve_decrements_when_sufficient() {
        let product_id = ProductId::new(AggregateId::new());
        let mut ledger = ledger_with(product_id, Size::M, 3);

        let events = ledger
            .handle(&StockLedgerCommand::ReserveStock(ReserveStock {
                lines: vec![StockLine {
                    product_id,
                    size: Size::M,
                    quantity: 2,
                }],
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut ledger, events);

        assert_eq!(ledger.available(StockKey::new(product_id, Size::M)), 1);
    }

    #[test]
    fn reserve_fails_atomically_when_any_line_is_short() {
        let a = ProductId::new(AggregateId::new());
        let b = ProductId::new(AggregateId::new());
        let mut ledger = ledger_with(a, Size::M, 5);
        set_level(&mut ledger, b, Size::S, 1);

        let err = ledger
            .handle(&StockLedgerCommand::ReserveStock(ReserveStock {
                lines: vec![
                    StockLine {
                        product_id: a,
                        size: Size::M,
                        quantity: 1,
                    },
                    StockLine {
                        product_id: b,
                        size: Size::S,
                        quantity: 2,
                    },
                ],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock(_)));

        // Nothing was decremented.
        assert_eq!(ledger.available(StockKey::new(a, Size::M)), 5);
        assert_eq!(ledger.available(StockKey::new(b, Size::S)), 1);
    }

    #[test]
    fn duplicate_lines_for_one_bucket_are_checked_as_combined_demand() {
        let product_id = ProductId::new(AggregateId::new());
        let ledger = ledger_with(product_id, Size::L, 3);

        let err = ledger
            .handle(&StockLedgerCommand::ReserveStock(ReserveStock {
                lines: vec![
                    StockLine {
                        product_id,
                        size: Size::L,
                        quantity: 2,
                    },
                    StockLine {
                        product_id,
                        size: Size::L,
                        quantity: 2,
                    },
                ],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock(_)));
    }

    #[test]
    fn release_restores_availability() {
        let product_id = ProductId::new(AggregateId::new());
        let mut ledger = ledger_with(product_id, Size::S, 2);
        let line = StockLine {
            product_id,
            size: Size::S,
            quantity: 2,
        };

        let events = ledger
            .handle(&StockLedgerCommand::ReserveStock(ReserveStock {
                lines: vec![line],
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut ledger, events);
        assert_eq!(ledger.available(line.key()), 0);

        let events = ledger
            .handle(&StockLedgerCommand::ReleaseStock(ReleaseStock {
                lines: vec![line],
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut ledger, events);
        assert_eq!(ledger.available(line.key()), 2);
    }

    #[test]
    fn reserve_rejects_zero_quantity_lines() {
        let product_id = ProductId::new(AggregateId::new());
        let ledger = ledger_with(product_id, Size::M, 5);

        let err = ledger
            .handle(&StockLedgerCommand::ReserveStock(ReserveStock {
                lines: vec![StockLine {
                    product_id,
                    size: Size::M,
                    quantity: 0,
                }],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn quantities_for_reports_only_that_product() {
        let a = ProductId::new(AggregateId::new());
        let b = ProductId::new(AggregateId::new());
        let mut ledger = ledger_with(a, Size::M, 4);
        set_level(&mut ledger, a, Size::L, 2);
        set_level(&mut ledger, b, Size::S, 9);

        let for_a = ledger.quantities_for(a);
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[&Size::M], 4);
        assert_eq!(for_a[&Size::L], 2);
    }

    proptest! {
        /// Availability is conserved: after any interleaving of successful
        /// reserves and releases, a bucket holds exactly
        /// `initial - reserved + released`, and a reserve never succeeds
        /// when it would overdraw.
        #[test]
        fn reserve_release_conserves_stock(
            initial in 0u32..50,
            ops in proptest::collection::vec((proptest::bool::ANY, 1u32..10), 0..20),
        ) {
            let product_id = ProductId::new(AggregateId::new());
            let key = StockKey::new(product_id, Size::M);
            let mut ledger = ledger_with(product_id, Size::M, initial);

            let mut expected = initial;
            for (is_reserve, qty) in ops {
                let lines = vec![StockLine { product_id, size: Size::M, quantity: qty }];
                if is_reserve {
                    let result = ledger.handle(&StockLedgerCommand::ReserveStock(ReserveStock {
                        lines,
                        occurred_at: test_time(),
                    }));
                    match result {
                        Ok(events) => {
                            prop_assert!(qty <= expected);
                            apply_all(&mut ledger, events);
                            expected -= qty;
                        }
                        Err(err) => {
                            prop_assert!(matches!(err, DomainError::InsufficientStock(_)));
                            prop_assert!(qty > expected);
                        }
                    }
                } else {
                    let events = ledger.handle(&StockLedgerCommand::ReleaseStock(ReleaseStock {
                        lines,
                        occurred_at: test_time(),
                    })).unwrap();
                    apply_all(&mut ledger, events);
                    expected = expected.saturating_add(qty);
                }
                prop_assert_eq!(ledger.available(key), expected);
            }
        }
    }
}
