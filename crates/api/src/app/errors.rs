use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use merchstore_infra::{DispatchError, OrderServiceError};
use merchstore_orders::ProcessingState;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::InsufficientStock(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", msg)
        }
        DispatchError::Unauthorized => {
            json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized")
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn order_service_error_to_response(err: OrderServiceError) -> axum::response::Response {
    match err {
        OrderServiceError::Rejected(rejections) => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "cart_rejected",
                "message": "one or more lines no longer match the catalog",
                "rejections": rejections,
            })),
        )
            .into_response(),
        OrderServiceError::Dispatch(e) => dispatch_error_to_response(e),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_processing_state(s: &str) -> Result<ProcessingState, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "processing" => Ok(ProcessingState::Processing),
        "processed" => Ok(ProcessingState::Processed),
        "cancelled" => Ok(ProcessingState::Cancelled),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_state",
            "state must be one of: processing, processed, cancelled",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_states_case_insensitively() {
        assert_eq!(
            parse_processing_state("Processed").unwrap(),
            ProcessingState::Processed
        );
        assert_eq!(
            parse_processing_state("cancelled").unwrap(),
            ProcessingState::Cancelled
        );
        assert!(parse_processing_state("shipped").is_err());
    }
}
