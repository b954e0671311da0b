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
    models::{Category, CreateCategoryRequest, Product, ProductFilter, UpdateCategoryRequest},
    repository::{CategoryRepository, ProductRepository},
    validation::ValidatedJson,
};

/// list_categories
///
/// [Public Route] All categories, alphabetically.
#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    responses((status = 200, description = "All categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.repo.list_categories().await?))
}

/// get_category
///
/// [Public Route] One category.
#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses((status = 200, description = "Found", body = Category), (status = 404, description = "Not Found"))
)]
pub async fn get_category(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Category>> {
    state
        .repo
        .get_category(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("category"))
}

/// list_category_products
///
/// [Public Route] A category's products, paged and searchable like GET /products. Any
/// `category_id` in the query is replaced by the path id.
#[utoipa::path(
    get,
    path = "/categories/{id}/products",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category ID"), ProductFilter),
    responses(
        (status = 200, description = "Products of the category", body = [Product]),
        (status = 400, description = "Invalid paging parameters"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn list_category_products(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    filter.validate()?;
    if state.repo.get_category(id).await?.is_none() {
        return Err(AppError::not_found("category"));
    }
    let filter = ProductFilter {
        category_id: Some(id),
        ..filter
    };
    Ok(Json(state.repo.list_products(&filter).await?))
}

/// create_category
///
/// [Admin Route] Creates a category; names are unique.
#[utoipa::path(
    post,
    path = "/admin/categories",
    tag = "categories",
    request_body = CreateCategoryRequest,
    responses((status = 201, description = "Created", body = Category), (status = 409, description = "Duplicate name"))
)]
pub async fn create_category(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = state.repo.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
///
/// [Admin Route] Partial update of a category.
#[utoipa::path(
    patch,
    path = "/admin/categories/{id}",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Duplicate name")
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateCategoryRequest>,
) -> Result<Json<Category>> {
    state
        .repo
        .update_category(id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("category"))
}

/// delete_category
///
/// [Admin Route] The category's products are kept and become uncategorised.
#[utoipa::path(
    delete,
    path = "/admin/categories/{id}",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_category(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    if state.repo.delete_category(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("category"))
    }
}
