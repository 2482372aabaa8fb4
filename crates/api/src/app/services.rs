//! Infrastructure wiring: event store/bus, projections, dispatcher, and the
//! order service, assembled once at startup.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use merchstore_catalog::ProductId;
use merchstore_core::{AggregateId, DomainError};
use merchstore_events::{EventEnvelope, InMemoryEventBus};
use merchstore_infra::{
    CatalogProjection, CatalogRecord, CommandDispatcher, DispatchError, InMemoryEventStore,
    InMemoryReadStore, ORDER_AGGREGATE_TYPE, OrderRecord, OrderService, OrderServiceError,
    OrdersProjection, PRODUCT_AGGREGATE_TYPE, PostgresEventStore, ProjectionWorker, RequestedLine,
    STOCK_LEDGER_AGGREGATE_TYPE, StaleOrderSweep, StockProjection, StockRecord, StoredEvent,
    SweepReport, WorkerHandle,
};
use merchstore_inventory::StockKey;
use merchstore_notify::{EmailSender, RecordingEmailSender, ResendEmailSender};
use merchstore_orders::{Customer, OrderId, ProcessingState};

use crate::config::AppConfig;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

type Catalog = Arc<CatalogProjection<Arc<InMemoryReadStore<ProductId, CatalogRecord>>>>;
type Stock = Arc<StockProjection<Arc<InMemoryReadStore<StockKey, StockRecord>>>>;
type Orders = Arc<OrdersProjection<Arc<InMemoryReadStore<OrderId, OrderRecord>>>>;

type InMemoryDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;
type PersistentDispatcher = CommandDispatcher<Arc<PostgresEventStore>, Bus>;

/// Command/query surface the routes talk to.
///
/// Read models stay in-memory in both modes; they are rebuilt from the event
/// log on startup of a persistent deployment, so only the log itself needs
/// durable storage.
pub struct AppServices {
    backend: Backend,
    catalog: Catalog,
    stock: Stock,
    orders: Orders,
    _projection_worker: WorkerHandle,
}

enum Backend {
    InMemory {
        dispatcher: Arc<InMemoryDispatcher>,
        service: Arc<OrderService<Arc<InMemoryEventStore>, Bus>>,
    },
    Persistent {
        dispatcher: Arc<PersistentDispatcher>,
        service: Arc<OrderService<Arc<PostgresEventStore>, Bus>>,
    },
}

pub async fn build_services(config: &AppConfig) -> AppServices {
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let catalog: Catalog = Arc::new(CatalogProjection::new(Arc::new(InMemoryReadStore::new())));
    let stock: Stock = Arc::new(StockProjection::new(Arc::new(InMemoryReadStore::new())));
    let orders: Orders = Arc::new(OrdersProjection::new(Arc::new(InMemoryReadStore::new())));

    let projection_worker = spawn_projection_worker(&bus, &catalog, &stock, &orders);

    let email: Arc<dyn EmailSender> = match &config.resend_api_key {
        Some(key) => Arc::new(ResendEmailSender::new(key.clone(), config.email_from.clone())),
        None => {
            tracing::warn!("RESEND_API_KEY not set; order emails are recorded, not delivered");
            Arc::new(RecordingEmailSender::new())
        }
    };

    let backend = match &config.database_url {
        Some(database_url) => {
            let pool = PgPool::connect(database_url)
                .await
                .expect("failed to connect to Postgres");
            let store = Arc::new(PostgresEventStore::new(pool));

            let history = store
                .load_all_async()
                .await
                .expect("failed to load the event log");
            tracing::info!(events = history.len(), "replaying event log into read models");
            rebuild_projections(&history, &catalog, &stock, &orders);

            let dispatcher = Arc::new(CommandDispatcher::new(store, bus.clone()));
            let service = Arc::new(OrderService::new(
                dispatcher.clone(),
                catalog.clone() as Arc<dyn merchstore_infra::CatalogLookup>,
                email,
                config.branding.clone(),
            ));
            Backend::Persistent {
                dispatcher,
                service,
            }
        }
        None => {
            let store = Arc::new(InMemoryEventStore::new());
            let dispatcher = Arc::new(CommandDispatcher::new(store, bus.clone()));
            let service = Arc::new(OrderService::new(
                dispatcher.clone(),
                catalog.clone() as Arc<dyn merchstore_infra::CatalogLookup>,
                email,
                config.branding.clone(),
            ));
            Backend::InMemory {
                dispatcher,
                service,
            }
        }
    };

    AppServices {
        backend,
        catalog,
        stock,
        orders,
        _projection_worker: projection_worker,
    }
}

/// Replay a full event log into fresh read models, one stream kind each.
fn rebuild_projections(history: &[StoredEvent], catalog: &Catalog, stock: &Stock, orders: &Orders) {
    let envelopes_for = |aggregate_type: &str| {
        history
            .iter()
            .filter(|e| e.aggregate_type == aggregate_type)
            .map(StoredEvent::to_envelope)
            .collect::<Vec<_>>()
    };

    catalog
        .rebuild_from_scratch(envelopes_for(PRODUCT_AGGREGATE_TYPE))
        .expect("failed to rebuild the catalog read model");
    stock
        .rebuild_from_scratch(envelopes_for(STOCK_LEDGER_AGGREGATE_TYPE))
        .expect("failed to rebuild the stock read model");
    orders
        .rebuild_from_scratch(envelopes_for(ORDER_AGGREGATE_TYPE))
        .expect("failed to rebuild the orders read model");
}

/// Background subscriber: bus -> projections, routed by aggregate type.
fn spawn_projection_worker(
    bus: &Bus,
    catalog: &Catalog,
    stock: &Stock,
    orders: &Orders,
) -> WorkerHandle {
    let catalog = catalog.clone();
    let stock = stock.clone();
    let orders = orders.clone();
    ProjectionWorker::spawn(
        "projections",
        bus.clone(),
        move |env: EventEnvelope<JsonValue>| match env.aggregate_type() {
            PRODUCT_AGGREGATE_TYPE => catalog.apply_envelope(&env).map_err(|e| e.to_string()),
            STOCK_LEDGER_AGGREGATE_TYPE => stock.apply_envelope(&env).map_err(|e| e.to_string()),
            ORDER_AGGREGATE_TYPE => orders.apply_envelope(&env).map_err(|e| e.to_string()),
            other => Err(format!("unrouted aggregate type: {other}")),
        },
    )
}

impl AppServices {
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stock(&self) -> &Stock {
        &self.stock
    }

    pub fn orders(&self) -> &Orders {
        &self.orders
    }

    /// Dispatch a command against one aggregate stream.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: merchstore_core::Aggregate<Error = DomainError>,
        A::Event: merchstore_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        match &self.backend {
            Backend::InMemory { dispatcher, .. } => {
                dispatcher.dispatch(aggregate_id, aggregate_type, command, make_aggregate)
            }
            Backend::Persistent { dispatcher, .. } => {
                dispatcher.dispatch(aggregate_id, aggregate_type, command, make_aggregate)
            }
        }
    }

    /// Place an order from a submitted cart.
    pub async fn checkout(
        &self,
        customer: Customer,
        lines: Vec<RequestedLine>,
    ) -> Result<OrderId, OrderServiceError> {
        let now = chrono::Utc::now();
        match &self.backend {
            Backend::InMemory { service, .. } => service.checkout(customer, lines, now).await,
            Backend::Persistent { service, .. } => service.checkout(customer, lines, now).await,
        }
    }

    /// Move an order through its lifecycle, with the inventory effect.
    pub async fn set_order_state(
        &self,
        order_id: OrderId,
        to: ProcessingState,
    ) -> Result<(), OrderServiceError> {
        let now = chrono::Utc::now();
        match &self.backend {
            Backend::InMemory { service, .. } => {
                service.set_processing_state(order_id, to, now).await
            }
            Backend::Persistent { service, .. } => {
                service.set_processing_state(order_id, to, now).await
            }
        }
    }

    /// Cancel abandoned orders (cron entrypoint).
    pub async fn sweep_stale_orders(&self) -> SweepReport {
        let now = chrono::Utc::now();
        match &self.backend {
            Backend::InMemory { service, .. } => {
                StaleOrderSweep::new(service.clone(), self.orders.clone())
                    .run(now)
                    .await
            }
            Backend::Persistent { service, .. } => {
                StaleOrderSweep::new(service.clone(), self.orders.clone())
                    .run(now)
                    .await
            }
        }
    }
}
