use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{AssignRoleRequest, CreateUserRequest, NewUser, UpdateUserRequest, User, UserChanges, UserProfile},
    password::hash_password,
    repository::{RepositoryState, RoleRepository, UserRepository},
    validation::ValidatedJson,
};

/// Loads a user's profile (user row plus role names), or 404.
pub(crate) async fn load_profile(repo: &RepositoryState, user_id: Uuid) -> Result<UserProfile> {
    let user = repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;
    profile_of(repo, user).await
}

pub(crate) async fn profile_of(repo: &RepositoryState, user: User) -> Result<UserProfile> {
    let roles = repo
        .roles_for_user(user.id)
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect();
    Ok(UserProfile::new(user, roles))
}

/// Turns a validated update payload into repository changes, hashing a new password.
pub(crate) fn changes_from(payload: UpdateUserRequest) -> Result<UserChanges> {
    let password_hash = payload
        .password
        .as_deref()
        .map(hash_password)
        .transpose()?;
    Ok(UserChanges {
        firstname: payload.firstname,
        lastname: payload.lastname,
        email: payload.email,
        password_hash,
    })
}

/// list_users
///
/// [Admin Route] Every account, oldest first.
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "users",
    responses((status = 200, description = "All users", body = [User]))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    Ok(Json(state.repo.list_users().await?))
}

/// create_user
///
/// [Admin Route] Creates an account and grants the given roles. Unknown role ids are
/// rejected before anything is written.
#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = UserProfile),
        (status = 404, description = "Unknown role"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    for role_id in &payload.role_ids {
        if state.repo.get_role(*role_id).await?.is_none() {
            return Err(AppError::not_found("role"));
        }
    }

    let user = state
        .repo
        .create_user(NewUser {
            firstname: payload.firstname,
            lastname: payload.lastname,
            email: payload.email,
            password_hash: hash_password(&payload.password)?,
        })
        .await?;

    for role_id in payload.role_ids {
        state.repo.assign_role(user.id, role_id).await?;
    }

    tracing::info!(user_id = %user.id, "user created by admin");
    Ok((StatusCode::CREATED, Json(profile_of(&state.repo, user).await?)))
}

/// get_user
///
/// [Admin Route] A user profile with role names.
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<UserProfile>> {
    Ok(Json(load_profile(&state.repo, id).await?))
}

/// update_user
///
/// [Admin Route] Partial update. A new password is re-hashed.
#[utoipa::path(
    patch,
    path = "/admin/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserProfile>> {
    let user = state
        .repo
        .update_user(id, changes_from(payload)?)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;
    Ok(Json(profile_of(&state.repo, user).await?))
}

/// delete_user
///
/// [Admin Route] Deletes a user, their role grants and purchases.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    if state.repo.delete_user(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("user"))
    }
}

/// assign_role
///
/// [Admin Route] Grants a role. Granting a role the user already holds is a no-op.
#[utoipa::path(
    post,
    path = "/admin/users/{id}/roles",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Granted", body = UserProfile),
        (status = 404, description = "Unknown user or role")
    )
)]
pub async fn assign_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRoleRequest>,
) -> Result<Json<UserProfile>> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;
    let role = state
        .repo
        .get_role(payload.role_id)
        .await?
        .ok_or_else(|| AppError::not_found("role"))?;

    state.repo.assign_role(user.id, role.id).await?;
    tracing::info!(user_id = %user.id, role = %role.name, "role granted");
    Ok(Json(profile_of(&state.repo, user).await?))
}

/// revoke_role
///
/// [Admin Route] Withdraws a role from a user; 404 when it was not granted.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}/roles/{role_id}",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("role_id" = Uuid, Path, description = "Role ID")
    ),
    responses((status = 204, description = "Revoked"), (status = 404, description = "Role not granted"))
)]
pub async fn revoke_role(
    State(state): State<AppState>,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    if state.repo.revoke_role(id, role_id).await? {
        tracing::info!(user_id = %id, %role_id, "role revoked");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("role grant"))
    }
}
