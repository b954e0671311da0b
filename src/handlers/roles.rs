use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{Role, RoleRequest},
    repository::RoleRepository,
    validation::ValidatedJson,
};

/// list_roles
///
/// [Admin Route] All roles.
#[utoipa::path(
    get,
    path = "/admin/roles",
    tag = "roles",
    responses((status = 200, description = "All roles", body = [Role]))
)]
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>> {
    Ok(Json(state.repo.list_roles().await?))
}

/// get_role
///
/// [Admin Route] One role.
#[utoipa::path(
    get,
    path = "/admin/roles/{id}",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses((status = 200, description = "Found", body = Role), (status = 404, description = "Not Found"))
)]
pub async fn get_role(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Role>> {
    state
        .repo
        .get_role(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("role"))
}

/// create_role
///
/// [Admin Route] Names are unique; a duplicate is a 409.
#[utoipa::path(
    post,
    path = "/admin/roles",
    tag = "roles",
    request_body = RoleRequest,
    responses((status = 201, description = "Created", body = Role), (status = 409, description = "Duplicate name"))
)]
pub async fn create_role(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RoleRequest>,
) -> Result<(StatusCode, Json<Role>)> {
    let role = state.repo.create_role(payload.name.trim()).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// update_role
///
/// [Admin Route] Renames a role; names are unique.
#[utoipa::path(
    patch,
    path = "/admin/roles/{id}",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = RoleRequest,
    responses(
        (status = 200, description = "Renamed", body = Role),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Duplicate name")
    )
)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<RoleRequest>,
) -> Result<Json<Role>> {
    state
        .repo
        .update_role(id, payload.name.trim())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("role"))
}

/// delete_role
///
/// [Admin Route] Also removes every grant of the role.
#[utoipa::path(
    delete,
    path = "/admin/roles/{id}",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_role(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    if state.repo.delete_role(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("role"))
    }
}
