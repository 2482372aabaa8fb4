//! Infrastructure layer: event store, command dispatch, projections, and the
//! order application service.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod service;
pub mod sweep;
pub mod workers;


pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore, StoredEvent,
    UncommittedEvent,
};
pub use projections::{
    CatalogProjection, CatalogRecord, OrderRecord, OrdersProjection, ProjectionError,
    StockProjection, StockRecord,
};
pub use read_model::{InMemoryReadStore, ReadStore};
pub use service::{
    CatalogLookup, ORDER_AGGREGATE_TYPE, OrderService, OrderServiceError,
    PRODUCT_AGGREGATE_TYPE, RequestedLine, STOCK_LEDGER_AGGREGATE_TYPE,
};
pub use sweep::{StaleOrderSweep, SweepReport};
pub use workers::{ProjectionWorker, WorkerHandle};
