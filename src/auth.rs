use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, Method, header, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::{AppError, Result},
    models::role::ADMIN_ROLE,
    repository::{RepositoryState, RoleRepository, UserRepository},
};

/// Name of the HttpOnly cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "access_token";
/// Header in which the client echoes the CSRF token received at login.
pub const CSRF_HEADER: &str = "x-csrf-token";
/// Local-only development bypass header.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the session token. `csrf` binds the token to the CSRF value handed to the
/// client at login, so a cross-site request riding on the cookie cannot forge it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub csrf: String,
    pub iat: usize,
    pub exp: usize,
}

/// A freshly minted session: the signed token and the CSRF token it embeds.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub csrf_token: String,
}

/// issue_session
///
/// Signs an HS256 token for `user_id` valid for `config.jwt_ttl_secs`.
pub fn issue_session(config: &AppConfig, user_id: Uuid, email: &str) -> Result<Session> {
    let now = Utc::now().timestamp();
    let csrf_token = Uuid::new_v4().simple().to_string();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        csrf: csrf_token.clone(),
        iat: usize::try_from(now).map_err(|e| AppError::Internal(e.to_string()))?,
        exp: now
            .checked_add(config.jwt_ttl_secs)
            .and_then(|exp| usize::try_from(exp).ok())
            .ok_or_else(|| AppError::Internal("session expiry out of range".to_string()))?,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;

    Ok(Session { token, csrf_token })
}

/// Decodes and validates (signature, `exp`) a session token.
pub fn decode_session(config: &AppConfig, token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("rejected session token: {}", e);
        AppError::Unauthorized
    })
}

/// The `Set-Cookie` value installing a session.
pub fn session_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(config.secure_cookies())
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(config.jwt_ttl_secs))
        .build()
}

/// Cookie used to remove the session; path must match the one it was set with.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// AuthUser
///
/// Resolved identity of an authenticated request. Roles are re-read from the database on
/// every request so a revoked grant takes effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }

    /// Owners and admins may read a user-owned resource.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.is_admin()
    }

    async fn load(repo: &RepositoryState, user_id: Uuid) -> Result<Self> {
        let user = repo.get_user(user_id).await?.ok_or(AppError::Unauthorized)?;
        let roles = repo
            .roles_for_user(user.id)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect();
        Ok(AuthUser {
            id: user.id,
            email: user.email,
            roles,
        })
    }
}

enum TokenSource {
    Cookie,
    Bearer,
}

fn extract_token(headers: &HeaderMap) -> Option<(String, TokenSource)> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some((cookie.value().to_string(), TokenSource::Cookie));
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| (token.trim().to_string(), TokenSource::Bearer))
}

fn is_state_changing(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// AuthUser Extractor Implementation
///
/// 1. Reuses an identity already resolved by the auth middleware for this request.
/// 2. Local development bypass through the `x-user-id` header.
/// 3. Session token from the `access_token` cookie, else an `Authorization: Bearer` header.
/// 4. CSRF check for cookie-borne tokens on state-changing methods.
/// 5. Database lookup of the user and their roles.
///
/// Rejection: 401 for a missing/invalid token or unknown user, 403 for a CSRF mismatch.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let dev_user = parts
                .headers
                .get(DEV_USER_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());
            if let Some(user_id) = dev_user {
                if let Ok(user) = AuthUser::load(&repo, user_id).await {
                    return Ok(user);
                }
            }
        }

        let (token, source) = extract_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        let claims = decode_session(&config, &token)?;

        if matches!(source, TokenSource::Cookie) && is_state_changing(&parts.method) {
            let presented = parts
                .headers
                .get(CSRF_HEADER)
                .and_then(|value| value.to_str().ok());
            if presented != Some(claims.csrf.as_str()) {
                tracing::warn!(user_id = %claims.sub, "csrf token missing or mismatched");
                return Err(AppError::Forbidden);
            }
        }

        AuthUser::load(&repo, claims.sub).await
    }
}

/// AdminUser
///
/// An `AuthUser` holding the `admin` role. Rejects with 403 otherwise.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
