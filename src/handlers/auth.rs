use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    auth::{AuthUser, issue_session, removal_cookie, session_cookie},
    error::{AppError, Result},
    handlers::users::{changes_from, load_profile, profile_of},
    models::{LoginRequest, LoginResponse, NewUser, RegisterRequest, UpdateUserRequest, UserProfile, role::MEMBER_ROLE},
    password::{hash_password, verify_password},
    repository::{RoleRepository, UserRepository},
    validation::ValidatedJson,
};

/// register
///
/// [Public Route] Creates a customer account with the `member` role.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    let user = state
        .repo
        .create_user(NewUser {
            firstname: payload.firstname,
            lastname: payload.lastname,
            email: payload.email,
            password_hash: hash_password(&payload.password)?,
        })
        .await?;

    match state.repo.find_role_by_name(MEMBER_ROLE).await? {
        Some(member) => state.repo.assign_role(user.id, member.id).await?,
        None => tracing::warn!("'{}' role is missing; new user has no roles", MEMBER_ROLE),
    }

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(profile_of(&state.repo, user).await?)))
}

/// login
///
/// [Public Route] Verifies credentials, sets the session cookie and hands back the CSRF
/// token. Unknown email and wrong password are indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let credentials = state
        .repo
        .find_credentials_by_email(&payload.email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&credentials.password_hash, &payload.password)? {
        tracing::info!(user_id = %credentials.id, "login rejected: wrong password");
        return Err(AppError::Unauthorized);
    }

    let user = load_profile(&state.repo, credentials.id).await?;
    let session = issue_session(&state.config, user.id, &user.email)?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok((
        jar.add(session_cookie(&state.config, session.token)),
        Json(LoginResponse {
            csrf_token: session.csrf_token,
            user,
        }),
    ))
}

/// logout
///
/// [Public Route] Clears the session cookie. Tokens are stateless, so this is all there
/// is to it.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses((status = 204, description = "Session cookie cleared"))
)]
pub async fn logout(jar: CookieJar) -> (StatusCode, CookieJar) {
    (StatusCode::NO_CONTENT, jar.remove(removal_cookie()))
}

/// get_me
///
/// [Authenticated Route] The caller's profile with role names.
#[utoipa::path(
    get,
    path = "/me",
    tag = "auth",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> Result<Json<UserProfile>> {
    Ok(Json(load_profile(&state.repo, user.id).await?))
}

/// update_me
///
/// [Authenticated Route] Partial update of the caller's own account.
#[utoipa::path(
    patch,
    path = "/me",
    tag = "auth",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserProfile>> {
    let updated = state
        .repo
        .update_user(user.id, changes_from(payload)?)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(profile_of(&state.repo, updated).await?))
}

/// delete_me
///
/// [Authenticated Route] Deletes the caller's account (and with it their purchases) and
/// clears the session cookie.
#[utoipa::path(
    delete,
    path = "/me",
    tag = "auth",
    responses((status = 204, description = "Account deleted"))
)]
pub async fn delete_me(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(StatusCode, CookieJar)> {
    if !state.repo.delete_user(user.id).await? {
        return Err(AppError::Unauthorized);
    }
    tracing::info!(user_id = %user.id, "account deleted by owner");
    Ok((StatusCode::NO_CONTENT, jar.remove(removal_cookie())))
}
