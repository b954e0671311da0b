use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{CreateProductRequest, Product, ProductDetails, ProductFilter, UpdateProductRequest},
    repository::{CategoryRepository, ImageRepository, ProductRepository, RepositoryState},
    validation::ValidatedJson,
};

async fn ensure_category_exists(repo: &RepositoryState, category_id: Option<Uuid>) -> Result<()> {
    if let Some(id) = category_id {
        if repo.get_category(id).await?.is_none() {
            return Err(AppError::not_found("category"));
        }
    }
    Ok(())
}

/// list_products
///
/// [Public Route] Catalogue listing, newest first, with optional category filter and a
/// case-insensitive search over name and short description.
#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    params(ProductFilter),
    responses(
        (status = 200, description = "Matching products", body = [Product]),
        (status = 400, description = "Invalid paging parameters")
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    filter.validate()?;
    Ok(Json(state.repo.list_products(&filter).await?))
}

/// get_product
///
/// [Public Route] Product page: the product with its category and photos.
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses((status = 200, description = "Found", body = ProductDetails), (status = 404, description = "Not Found"))
)]
pub async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ProductDetails>> {
    let product = state
        .repo
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::not_found("product"))?;

    let category = match product.category_id {
        Some(category_id) => state.repo.get_category(category_id).await?,
        None => None,
    };
    let images = state.repo.list_images_for_product(product.id).await?;

    Ok(Json(ProductDetails {
        product,
        category,
        images,
    }))
}

/// create_product
///
/// [Admin Route] Adds a product to the catalogue. A given category must exist.
#[utoipa::path(
    post,
    path = "/admin/products",
    tag = "products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Created", body = Product),
        (status = 404, description = "Unknown category")
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    ensure_category_exists(&state.repo, payload.category_id).await?;
    let product = state.repo.create_product(payload).await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// update_product
///
/// [Admin Route] Partial update of a product.
#[utoipa::path(
    patch,
    path = "/admin/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated", body = Product),
        (status = 404, description = "Unknown product or category")
    )
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateProductRequest>,
) -> Result<Json<Product>> {
    ensure_category_exists(&state.repo, payload.category_id).await?;
    state
        .repo
        .update_product(id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("product"))
}

/// delete_product
///
/// [Admin Route] Refused (400) while past purchases still reference the product.
#[utoipa::path(
    delete,
    path = "/admin/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Referenced by purchases"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    if state.repo.delete_product(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("product"))
    }
}
