use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{CreateImageRequest, Image, ImageUploadRequest, ImageUploadResponse, UpdateImageRequest},
    repository::{ImageRepository, ProductRepository},
    storage::image_object_key,
    validation::ValidatedJson,
};

/// get_image
///
/// [Public Route] One product image.
#[utoipa::path(
    get,
    path = "/images/{id}",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses((status = 200, description = "Found", body = Image), (status = 404, description = "Not Found"))
)]
pub async fn get_image(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Image>> {
    state
        .repo
        .get_image(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("image"))
}

/// list_product_images
///
/// [Public Route] Photos of a product.
#[utoipa::path(
    get,
    path = "/products/{id}/images",
    tag = "images",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses((status = 200, description = "Photos of the product", body = [Image]), (status = 404, description = "Unknown product"))
)]
pub async fn list_product_images(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<Image>>> {
    if state.repo.get_product(product_id).await?.is_none() {
        return Err(AppError::not_found("product"));
    }
    Ok(Json(state.repo.list_images_for_product(product_id).await?))
}

/// create_image
///
/// [Admin Route] Attaches an image URL to an existing product.
#[utoipa::path(
    post,
    path = "/admin/images",
    tag = "images",
    request_body = CreateImageRequest,
    responses((status = 201, description = "Created", body = Image), (status = 404, description = "Unknown product"))
)]
pub async fn create_image(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateImageRequest>,
) -> Result<(StatusCode, Json<Image>)> {
    if state.repo.get_product(payload.product_id).await?.is_none() {
        return Err(AppError::not_found("product"));
    }
    let image = state.repo.create_image(payload).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

/// update_image
///
/// [Admin Route] Partial update of an image's URL or alt text.
#[utoipa::path(
    patch,
    path = "/admin/images/{id}",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image ID")),
    request_body = UpdateImageRequest,
    responses((status = 200, description = "Updated", body = Image), (status = 404, description = "Not Found"))
)]
pub async fn update_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateImageRequest>,
) -> Result<Json<Image>> {
    state
        .repo
        .update_image(id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("image"))
}

/// delete_image
///
/// [Admin Route] Removes an image record. The stored object is left in the bucket.
#[utoipa::path(
    delete,
    path = "/admin/images/{id}",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_image(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    if state.repo.delete_image(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("image"))
    }
}

/// request_image_upload
///
/// [Admin Route] Issues a short-lived presigned PUT URL so the browser uploads the photo
/// straight to the object store. The returned `public_url` is then saved with
/// POST /admin/images.
#[utoipa::path(
    post,
    path = "/admin/images/upload",
    tag = "images",
    request_body = ImageUploadRequest,
    responses(
        (status = 200, description = "Presigned URL", body = ImageUploadResponse),
        (status = 400, description = "Not an image content type"),
        (status = 500, description = "Storage unavailable")
    )
)]
pub async fn request_image_upload(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ImageUploadRequest>,
) -> Result<Json<ImageUploadResponse>> {
    if !payload.content_type.starts_with("image/") {
        return Err(AppError::bad_request("content_type must be an image/* type"));
    }

    let resource_key = image_object_key(&payload.filename);
    let upload_url = state
        .storage
        .presign_upload(&resource_key, &payload.content_type)
        .await?;

    Ok(Json(ImageUploadResponse {
        upload_url,
        public_url: state.storage.public_url(&resource_key),
        resource_key,
    }))
}
