//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (event store/bus, projections, dispatcher)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use crate::config::AppConfig;
use crate::jwt::Hs256JwtValidator;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: AppConfig) -> Router {
    let jwt = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let auth_services = Arc::new(routes::auth::AuthServices::from_config(&config));
    let services = Arc::new(services::build_services(&config).await);

    // Admin routes: require a valid bearer token.
    let admin = routes::admin_router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public_router().layer(Extension(services.clone())))
        .merge(routes::auth::router().layer(Extension(auth_services.clone())))
        .merge(
            routes::cron::router()
                .layer(Extension(services))
                .layer(Extension(auth_services)),
        )
        .nest("/admin", admin)
}
