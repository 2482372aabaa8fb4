use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::post,
};

use merchstore_orders::reconcile;

use crate::app::dto;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/cart/reconcile", post(reconcile_cart))
}

/// Classify every submitted line against the live catalog.
///
/// Purely advisory: the same checks run again inside checkout, so a client
/// skipping this endpoint gains nothing.
pub async fn reconcile_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ReconcileRequest>,
) -> axum::response::Response {
    let mut snapshots = HashMap::new();
    for line in &body.lines {
        if let Some(record) = services.catalog().get(&line.product_id) {
            snapshots.insert(line.product_id, record.snapshot());
        }
    }

    let reports = reconcile(&body.lines, |id| snapshots.get(&id));
    (StatusCode::OK, Json(serde_json::json!({ "lines": reports }))).into_response()
}
