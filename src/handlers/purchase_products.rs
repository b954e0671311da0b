use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{
        CreatePurchaseProductRequest, NewPurchaseLine, PurchaseProduct, PurchaseProductFilter,
        UpdatePurchaseProductRequest,
    },
    repository::{ProductRepository, PurchaseProductRepository, PurchaseRepository},
    validation::ValidatedJson,
};

/// list_purchase_products
///
/// [Admin Route] All line items, or those of one purchase with `?purchase_id=`.
#[utoipa::path(
    get,
    path = "/admin/purchase-products",
    tag = "purchase-products",
    params(PurchaseProductFilter),
    responses((status = 200, description = "Line items", body = [PurchaseProduct]))
)]
pub async fn list_purchase_products(
    State(state): State<AppState>,
    Query(filter): Query<PurchaseProductFilter>,
) -> Result<Json<Vec<PurchaseProduct>>> {
    Ok(Json(state.repo.list_purchase_products(filter.purchase_id).await?))
}

/// get_purchase_product
///
/// [Admin Route] One line item.
#[utoipa::path(
    get,
    path = "/admin/purchase-products/{id}",
    tag = "purchase-products",
    params(("id" = Uuid, Path, description = "Line item ID")),
    responses((status = 200, description = "Found", body = PurchaseProduct), (status = 404, description = "Not Found"))
)]
pub async fn get_purchase_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseProduct>> {
    state
        .repo
        .get_purchase_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("purchase product"))
}

/// create_purchase_product
///
/// [Admin Route] Adds a line to an existing purchase at the product's current price and
/// recomputes the purchase total.
#[utoipa::path(
    post,
    path = "/admin/purchase-products",
    tag = "purchase-products",
    request_body = CreatePurchaseProductRequest,
    responses(
        (status = 201, description = "Created", body = PurchaseProduct),
        (status = 404, description = "Unknown purchase or product")
    )
)]
pub async fn create_purchase_product(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePurchaseProductRequest>,
) -> Result<(StatusCode, Json<PurchaseProduct>)> {
    if state.repo.get_purchase(payload.purchase_id).await?.is_none() {
        return Err(AppError::not_found("purchase"));
    }
    let product = state
        .repo
        .get_product(payload.product_id)
        .await?
        .ok_or_else(|| AppError::not_found("product"))?;

    let line = state
        .repo
        .add_purchase_product(
            payload.purchase_id,
            NewPurchaseLine {
                product_id: product.id,
                quantity: payload.quantity,
                unit_price: product.price,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// update_purchase_product
///
/// [Admin Route] Changes a line's quantity and recomputes the purchase total.
#[utoipa::path(
    patch,
    path = "/admin/purchase-products/{id}",
    tag = "purchase-products",
    params(("id" = Uuid, Path, description = "Line item ID")),
    request_body = UpdatePurchaseProductRequest,
    responses((status = 200, description = "Updated", body = PurchaseProduct), (status = 404, description = "Not Found"))
)]
pub async fn update_purchase_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdatePurchaseProductRequest>,
) -> Result<Json<PurchaseProduct>> {
    state
        .repo
        .update_purchase_product_quantity(id, payload.quantity)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("purchase product"))
}

/// delete_purchase_product
///
/// [Admin Route] Removes a line and recomputes the purchase total.
#[utoipa::path(
    delete,
    path = "/admin/purchase-products/{id}",
    tag = "purchase-products",
    params(("id" = Uuid, Path, description = "Line item ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_purchase_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    if state.repo.delete_purchase_product(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("purchase product"))
    }
}
