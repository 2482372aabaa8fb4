use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;

use merchstore_auth::Permission;
use merchstore_catalog::{
    ArchiveProduct, CreateProduct, EditProduct, Product, ProductCommand, ProductId,
    UnarchiveProduct,
};
use merchstore_core::AggregateId;
use merchstore_infra::{PRODUCT_AGGREGATE_TYPE, STOCK_LEDGER_AGGREGATE_TYPE};
use merchstore_inventory::{SetStockLevel, StockLedger, StockLedgerCommand, ledger_aggregate_id};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn public_router() -> Router {
    Router::new()
        .route("/products", get(list_public))
        .route("/products/:id", get(get_public))
        .route("/products/:id/sizes", get(list_sizes))
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_all))
        .route("/:id", get(get_any).put(edit_product))
        .route("/:id/archive", post(archive_product))
        .route("/:id/unarchive", post(unarchive_product))
        .route("/:id/stock", put(set_stock))
}

pub async fn list_public(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let items = services
        .catalog()
        .list_public()
        .iter()
        .map(|record| {
            let availability = services.stock().quantities_for(record.product_id);
            dto::product_to_json(record, &availability)
        })
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_public(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(agg) = id.parse::<AggregateId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
    };
    let product_id = ProductId::new(agg);

    // Archived products are invisible to the storefront.
    match services.catalog().get(&product_id).filter(|r| !r.archived) {
        Some(record) => {
            let availability = services.stock().quantities_for(product_id);
            (StatusCode::OK, Json(dto::product_to_json(&record, &availability))).into_response()
        }
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}

/// Sizes of a product that currently have stock.
pub async fn list_sizes(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(agg) = id.parse::<AggregateId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
    };
    let product_id = ProductId::new(agg);

    if services
        .catalog()
        .get(&product_id)
        .filter(|r| !r.archived)
        .is_none()
    {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found");
    }

    let sizes = services.stock().sizes_in_stock(product_id);
    (StatusCode::OK, Json(serde_json::json!({ "sizes": sizes }))).into_response()
}

/// Admin view of one product; archived products are visible here.
pub async fn get_any(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(agg) = id.parse::<AggregateId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
    };
    let product_id = ProductId::new(agg);

    match services.catalog().get(&product_id) {
        Some(record) => {
            let availability = services.stock().quantities_for(product_id);
            (StatusCode::OK, Json(dto::product_to_json(&record, &availability))).into_response()
        }
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}

pub async fn list_all(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let items = services
        .catalog()
        .list_all()
        .iter()
        .map(|record| {
            let availability = services.stock().quantities_for(record.product_id);
            dto::product_to_json(record, &availability)
        })
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let product_id = ProductId::new(agg);

    let cmd = ProductCommand::CreateProduct(CreateProduct {
        product_id,
        name: body.name,
        price: body.price,
        image_links: body.image_links,
        about: body.about,
        sizes: body.sizes,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch(
        agg,
        PRODUCT_AGGREGATE_TYPE,
        cmd_auth.inner,
        |aggregate_id| Product::empty(ProductId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // Seed the ledger with the starting availability per size.
    for (size, quantity) in body.initial_stock {
        let set = StockLedgerCommand::SetStockLevel(SetStockLevel {
            product_id,
            size,
            quantity,
            occurred_at: Utc::now(),
        });
        if let Err(e) = services.dispatch(
            ledger_aggregate_id(),
            STOCK_LEDGER_AGGREGATE_TYPE,
            set,
            StockLedger::empty,
        ) {
            return errors::dispatch_error_to_response(e);
        }
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn edit_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::EditProductRequest>,
) -> axum::response::Response {
    let Ok(agg) = id.parse::<AggregateId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
    };
    let product_id = ProductId::new(agg);

    let cmd = ProductCommand::EditProduct(EditProduct {
        product_id,
        name: body.name,
        price: body.price,
        image_links: body.image_links,
        about: body.about,
        sizes: body.sizes,
        archived: body.archived,
        expected_version: body.expected_version,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch(
        agg,
        PRODUCT_AGGREGATE_TYPE,
        cmd_auth.inner,
        |aggregate_id| Product::empty(ProductId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    toggle_archived(services, principal, id, true).await
}

pub async fn unarchive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    toggle_archived(services, principal, id, false).await
}

async fn toggle_archived(
    services: Arc<AppServices>,
    principal: crate::context::PrincipalContext,
    id: String,
    archived: bool,
) -> axum::response::Response {
    let Ok(agg) = id.parse::<AggregateId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
    };
    let product_id = ProductId::new(agg);

    let cmd = if archived {
        ProductCommand::ArchiveProduct(ArchiveProduct {
            product_id,
            occurred_at: Utc::now(),
        })
    } else {
        ProductCommand::UnarchiveProduct(UnarchiveProduct {
            product_id,
            occurred_at: Utc::now(),
        })
    };

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch(
        agg,
        PRODUCT_AGGREGATE_TYPE,
        cmd_auth.inner,
        |aggregate_id| Product::empty(ProductId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetStockRequest>,
) -> axum::response::Response {
    let Ok(agg) = id.parse::<AggregateId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
    };
    let product_id = ProductId::new(agg);

    let cmd = StockLedgerCommand::SetStockLevel(SetStockLevel {
        product_id,
        size: body.size,
        quantity: body.quantity,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch(
        ledger_aggregate_id(),
        STOCK_LEDGER_AGGREGATE_TYPE,
        cmd_auth.inner,
        StockLedger::empty,
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}
