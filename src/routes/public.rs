use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read-only storefront endpoints plus the identity gateway. The Stripe webhook lives here
/// too: it authenticates with its signature, not with a session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // --- Identity ---
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        // --- Catalogue ---
        // GET /products?category_id=&search=&limit=&offset=
        .route("/products", get(handlers::products::list_products))
        .route("/products/{id}", get(handlers::products::get_product))
        .route("/products/{id}/images", get(handlers::images::list_product_images))
        .route("/categories", get(handlers::categories::list_categories))
        .route("/categories/{id}", get(handlers::categories::get_category))
        .route(
            "/categories/{id}/products",
            get(handlers::categories::list_category_products),
        )
        .route("/images/{id}", get(handlers::images::get_image))
        // POST /stripe/webhook
        // Signature-verified payment notifications.
        .route("/stripe/webhook", post(handlers::checkout::stripe_webhook))
}
