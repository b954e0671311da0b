use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        AdminStats, CreatePurchaseRequest, MAX_LINE_QUANTITY, NewPurchase, NewPurchaseLine,
        Product, Purchase, PurchaseDetails, PurchaseItemRequest, UpdatePurchaseRequest,
    },
    repository::{ProductRepository, PurchaseProductRepository, PurchaseRepository, RepositoryState},
    validation::ValidatedJson,
};

/// Merges repeated products into one line each, keeping first-seen order. A merged line
/// is held to the same quantity limit as a single item.
fn merge_items(items: &[PurchaseItemRequest]) -> Result<Vec<(Uuid, i32)>> {
    let mut merged: Vec<(Uuid, i32)> = Vec::with_capacity(items.len());
    for item in items {
        match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, quantity)) => {
                *quantity = quantity
                    .checked_add(item.quantity)
                    .filter(|q| *q <= MAX_LINE_QUANTITY)
                    .ok_or_else(|| {
                        AppError::bad_request(format!(
                            "quantity of product {} exceeds {MAX_LINE_QUANTITY}",
                            item.product_id
                        ))
                    })?;
            }
            None => merged.push((item.product_id, item.quantity)),
        }
    }
    Ok(merged)
}

/// price_lines
///
/// Snapshots catalogue prices onto the requested lines and returns them with the order
/// total. Every product must be present in `catalogue`.
pub(crate) fn price_lines(
    requested: Vec<(Uuid, i32)>,
    catalogue: &HashMap<Uuid, Product>,
) -> Result<(Vec<NewPurchaseLine>, i64)> {
    let mut total: i64 = 0;
    let mut lines = Vec::with_capacity(requested.len());

    for (product_id, quantity) in requested {
        let product = catalogue
            .get(&product_id)
            .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
        let line_total = i64::from(quantity)
            .checked_mul(i64::from(product.price))
            .ok_or_else(|| AppError::bad_request("purchase total is too large"))?;
        total = total
            .checked_add(line_total)
            .ok_or_else(|| AppError::bad_request("purchase total is too large"))?;
        lines.push(NewPurchaseLine {
            product_id,
            quantity,
            unit_price: product.price,
        });
    }

    Ok((lines, total))
}

async fn load_details(repo: &RepositoryState, purchase: Purchase) -> Result<PurchaseDetails> {
    let items = repo.list_purchase_products(Some(purchase.id)).await?;
    Ok(PurchaseDetails { purchase, items })
}

/// create_purchase
///
/// [Authenticated Route] Places an order for the caller. Prices come from the catalogue,
/// never from the client, and the purchase and its lines are written in one transaction.
#[utoipa::path(
    post,
    path = "/purchases",
    tag = "purchases",
    request_body = CreatePurchaseRequest,
    responses(
        (status = 201, description = "Created", body = PurchaseDetails),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Unknown product")
    )
)]
pub async fn create_purchase(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseDetails>)> {
    let requested = merge_items(&payload.items)?;
    let ids: Vec<Uuid> = requested.iter().map(|(id, _)| *id).collect();
    let catalogue: HashMap<Uuid, Product> = state
        .repo
        .find_products_by_ids(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let (lines, total_price) = price_lines(requested, &catalogue)?;

    let details = state
        .repo
        .create_purchase(
            NewPurchase {
                user_id: user.id,
                address: payload.address,
                postal_code: payload.postal_code,
                city: payload.city,
                payment_method: payload.payment_method,
                total_price,
            },
            lines,
        )
        .await?;

    tracing::info!(
        purchase_id = %details.purchase.id,
        user_id = %user.id,
        total_price,
        "purchase created"
    );
    Ok((StatusCode::CREATED, Json(details)))
}

/// list_my_purchases
///
/// [Authenticated Route] The caller's purchases, newest first.
#[utoipa::path(
    get,
    path = "/me/purchases",
    tag = "purchases",
    responses((status = 200, description = "Caller's purchases, newest first", body = [Purchase]))
)]
pub async fn list_my_purchases(user: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<Purchase>>> {
    Ok(Json(state.repo.list_purchases_for_user(user.id).await?))
}

/// get_purchase
///
/// [Authenticated Route] Owner or admin only. Someone else's purchase is reported as
/// missing.
#[utoipa::path(
    get,
    path = "/purchases/{id}",
    tag = "purchases",
    params(("id" = Uuid, Path, description = "Purchase ID")),
    responses((status = 200, description = "Found", body = PurchaseDetails), (status = 404, description = "Not Found"))
)]
pub async fn get_purchase(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseDetails>> {
    let purchase = state
        .repo
        .get_purchase(id)
        .await?
        .filter(|p| user.can_access(p.user_id))
        .ok_or_else(|| AppError::not_found("purchase"))?;
    Ok(Json(load_details(&state.repo, purchase).await?))
}

/// list_purchases
///
/// [Admin Route] Every purchase, newest first.
#[utoipa::path(
    get,
    path = "/admin/purchases",
    tag = "purchases",
    responses((status = 200, description = "All purchases, newest first", body = [Purchase]))
)]
pub async fn list_purchases(State(state): State<AppState>) -> Result<Json<Vec<Purchase>>> {
    Ok(Json(state.repo.list_purchases().await?))
}

/// update_purchase
///
/// [Admin Route] Shipping details and status. Admins may set any status, e.g. to mark an
/// order shipped.
#[utoipa::path(
    patch,
    path = "/admin/purchases/{id}",
    tag = "purchases",
    params(("id" = Uuid, Path, description = "Purchase ID")),
    request_body = UpdatePurchaseRequest,
    responses((status = 200, description = "Updated", body = Purchase), (status = 404, description = "Not Found"))
)]
pub async fn update_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdatePurchaseRequest>,
) -> Result<Json<Purchase>> {
    let purchase = state
        .repo
        .update_purchase(id, payload)
        .await?
        .ok_or_else(|| AppError::not_found("purchase"))?;
    tracing::info!(purchase_id = %purchase.id, status = purchase.status.as_str(), "purchase updated by admin");
    Ok(Json(purchase))
}

/// delete_purchase
///
/// [Admin Route] Deletes a purchase together with its line items.
#[utoipa::path(
    delete,
    path = "/admin/purchases/{id}",
    tag = "purchases",
    params(("id" = Uuid, Path, description = "Purchase ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_purchase(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    if state.repo.delete_purchase(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("purchase"))
    }
}

/// get_admin_stats
///
/// [Admin Route] Dashboard counters.
#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "purchases",
    responses((status = 200, description = "Stats", body = AdminStats))
)]
pub async fn get_admin_stats(State(state): State<AppState>) -> Result<Json<AdminStats>> {
    Ok(Json(state.repo.stats().await?))
}
