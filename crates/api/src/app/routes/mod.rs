use axum::Router;

pub mod auth;
pub mod cart;
pub mod common;
pub mod cron;
pub mod orders;
pub mod products;
pub mod system;

/// Routes open to anyone: browse the catalog, check a cart, place an order.
pub fn public_router() -> Router {
    Router::new()
        .merge(products::public_router())
        .merge(cart::router())
        .merge(orders::public_router())
}

/// Routes behind the auth middleware (nested under `/admin`).
pub fn admin_router() -> Router {
    Router::new()
        .route("/whoami", axum::routing::get(system::whoami))
        .nest("/products", products::admin_router())
        .nest("/orders", orders::admin_router())
}
