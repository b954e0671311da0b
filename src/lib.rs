use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod checkout;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod payments;
pub mod repository;
pub mod storage;
pub mod validation;

// Routers segregated by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::{AdminUser, AuthUser};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use payments::{MockPaymentGateway, PaymentState, StripeClient};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document served at `/api-docs/openapi.json` (Swagger UI at `/swagger-ui`).
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register, handlers::auth::login, handlers::auth::logout,
        handlers::auth::get_me, handlers::auth::update_me, handlers::auth::delete_me,
        handlers::users::list_users, handlers::users::create_user, handlers::users::get_user,
        handlers::users::update_user, handlers::users::delete_user,
        handlers::users::assign_role, handlers::users::revoke_role,
        handlers::roles::list_roles, handlers::roles::get_role, handlers::roles::create_role,
        handlers::roles::update_role, handlers::roles::delete_role,
        handlers::categories::list_categories, handlers::categories::get_category,
        handlers::categories::list_category_products, handlers::categories::create_category,
        handlers::categories::update_category, handlers::categories::delete_category,
        handlers::products::list_products, handlers::products::get_product,
        handlers::products::create_product, handlers::products::update_product,
        handlers::products::delete_product,
        handlers::images::get_image, handlers::images::list_product_images,
        handlers::images::create_image, handlers::images::update_image,
        handlers::images::delete_image, handlers::images::request_image_upload,
        handlers::purchases::create_purchase, handlers::purchases::list_my_purchases,
        handlers::purchases::get_purchase, handlers::purchases::list_purchases,
        handlers::purchases::update_purchase, handlers::purchases::delete_purchase,
        handlers::purchases::get_admin_stats,
        handlers::purchase_products::list_purchase_products,
        handlers::purchase_products::get_purchase_product,
        handlers::purchase_products::create_purchase_product,
        handlers::purchase_products::update_purchase_product,
        handlers::purchase_products::delete_purchase_product,
        handlers::checkout::create_checkout, handlers::checkout::check_payment_status,
        handlers::checkout::stripe_webhook,
    ),
    components(
        schemas(
            models::User, models::UserProfile, models::RegisterRequest, models::LoginRequest,
            models::LoginResponse, models::CreateUserRequest, models::UpdateUserRequest,
            models::Role, models::RoleRequest, models::AssignRoleRequest,
            models::Category, models::CreateCategoryRequest, models::UpdateCategoryRequest,
            models::Product, models::ProductDetails, models::CreateProductRequest,
            models::UpdateProductRequest,
            models::Image, models::CreateImageRequest, models::UpdateImageRequest,
            models::ImageUploadRequest, models::ImageUploadResponse,
            models::Purchase, models::PurchaseStatus, models::PurchaseProduct,
            models::PurchaseDetails, models::PurchaseItemRequest, models::CreatePurchaseRequest,
            models::UpdatePurchaseRequest, models::CreatePurchaseProductRequest,
            models::UpdatePurchaseProductRequest, models::CheckoutSessionResponse,
            models::PaymentStatusResponse, models::AdminStats,
        )
    ),
    tags(
        (name = "greenroots", description = "GreenRoots plant shop API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container for every service a handler may need.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub payments: PaymentState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for PaymentState {
    fn from_ref(app_state: &AppState) -> PaymentState {
        app_state.payments.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards the authenticated router. A failed `AuthUser` extraction short-circuits with
/// its 401/403; otherwise the resolved user is stashed in the request extensions so the
/// handler's own extractor does not hit the database again.
async fn auth_middleware(user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// admin_middleware
///
/// Same as `auth_middleware`, additionally requiring the `admin` role (403 otherwise).
async fn admin_middleware(AdminUser(user): AdminUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// CORS for the storefront: its single origin, with credentials so the session cookie is
/// sent along.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(auth::CSRF_HEADER),
        ]);

    match HeaderValue::from_str(config.frontend_url.trim_end_matches('/')) {
        Ok(origin) => base.allow_origin(origin).allow_credentials(true),
        Err(e) => {
            tracing::warn!("FRONTEND_URL is not a valid origin ({}); CORS disabled", e);
            base
        }
    }
}

/// create_router
///
/// Assembles the routers, applies the guards and the observability layers, and registers
/// the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, tagged with its `x-request-id` so every log line of the request
/// can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
