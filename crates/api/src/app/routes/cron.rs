use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::HeaderMap, http::StatusCode,
    response::IntoResponse, routing::post,
};

use crate::app::errors;
use crate::app::routes::auth::AuthServices;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/cron/cancel-orders", post(cancel_orders))
}

/// Cancel orders abandoned past the staleness window. Invoked by the
/// scheduler, authenticated by a shared key instead of a bearer token.
pub async fn cancel_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<Arc<AuthServices>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if presented != Some(auth.cron_api_key.as_str()) {
        return errors::json_error(StatusCode::UNAUTHORIZED, "invalid_api_key", "bad or missing x-api-key");
    }

    let report = services.sweep_stale_orders().await;
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "examined": report.examined,
            "cancelled": report.cancelled,
            "failed": report.failed,
        })),
    )
        .into_response()
}
