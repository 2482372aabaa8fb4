use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use merchstore_auth::Permission;
use merchstore_core::AggregateId;
use merchstore_orders::{OrderId, ProcessingState};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn public_router() -> Router {
    Router::new().route("/orders", post(checkout))
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/state", post(change_state))
}

/// Place an order. No account needed; the customer is identified by the
/// contact details on the order itself.
pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CheckoutRequest>,
) -> axum::response::Response {
    match services.checkout(body.customer, body.lines).await {
        Ok(order_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "order_id": order_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::order_service_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub state: Option<String>,
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<OrdersQuery>,
) -> axum::response::Response {
    let states = match query.state.as_deref() {
        Some(raw) => match errors::parse_processing_state(raw) {
            Ok(state) => vec![state],
            Err(response) => return response,
        },
        None => vec![
            ProcessingState::Processing,
            ProcessingState::Processed,
            ProcessingState::Cancelled,
        ],
    };

    let items = states
        .into_iter()
        .flat_map(|state| services.orders().list_by_state(state))
        .map(|record| dto::order_to_json(&record))
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(agg) = id.parse::<AggregateId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
    };

    match services.orders().get(&OrderId::new(agg)) {
        Some(record) => (StatusCode::OK, Json(dto::order_to_json(&record))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}

/// Move an order to a new lifecycle stage. Stock moves with it: reinstating
/// reserves again, cancelling restores, and an impossible reservation
/// rejects the whole transition.
pub async fn change_state(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeOrderStateRequest>,
) -> axum::response::Response {
    let Ok(agg) = id.parse::<AggregateId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
    };
    let to = match errors::parse_processing_state(&body.state) {
        Ok(state) => state,
        Err(response) => return response,
    };

    let cmd_auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("orders.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.set_order_state(OrderId::new(agg), to).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "state": to.as_str(),
            })),
        )
            .into_response(),
        Err(e) => errors::order_service_error_to_response(e),
    }
}
