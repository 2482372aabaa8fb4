//! `merchstore-inventory` — stock ledger domain.

pub mod ledger;

pub use ledger::{
    ReleaseStock, ReserveStock, SetStockLevel, StockKey, StockLedger, StockLedgerCommand,
    StockLedgerEvent, StockLevelSet, StockLine, StockReleased, StockReserved, ledger_aggregate_id,
};
