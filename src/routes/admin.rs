use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Admin Router Module
///
/// Back-office endpoints, nested under `/admin` and wrapped in `admin_middleware`, which
/// rejects anyone without the `admin` role before a handler runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        .route("/stats", get(handlers::purchases::get_admin_stats))
        // --- Users & roles ---
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/users/{id}",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/users/{id}/roles", post(handlers::users::assign_role))
        .route(
            "/users/{id}/roles/{role_id}",
            delete(handlers::users::revoke_role),
        )
        .route(
            "/roles",
            get(handlers::roles::list_roles).post(handlers::roles::create_role),
        )
        .route(
            "/roles/{id}",
            get(handlers::roles::get_role)
                .patch(handlers::roles::update_role)
                .delete(handlers::roles::delete_role),
        )
        // --- Catalogue ---
        .route("/categories", post(handlers::categories::create_category))
        .route(
            "/categories/{id}",
            axum::routing::patch(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )
        .route("/products", post(handlers::products::create_product))
        .route(
            "/products/{id}",
            axum::routing::patch(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route("/images", post(handlers::images::create_image))
        // POST /admin/images/upload
        // Presigned S3 PUT URL for a product photo (10 minutes, image/* only).
        .route("/images/upload", post(handlers::images::request_image_upload))
        .route(
            "/images/{id}",
            axum::routing::patch(handlers::images::update_image)
                .delete(handlers::images::delete_image),
        )
        // --- Orders ---
        .route("/purchases", get(handlers::purchases::list_purchases))
        .route(
            "/purchases/{id}",
            axum::routing::patch(handlers::purchases::update_purchase)
                .delete(handlers::purchases::delete_purchase),
        )
        .route(
            "/purchase-products",
            get(handlers::purchase_products::list_purchase_products)
                .post(handlers::purchase_products::create_purchase_product),
        )
        .route(
            "/purchase-products/{id}",
            get(handlers::purchase_products::get_purchase_product)
                .patch(handlers::purchase_products::update_purchase_product)
                .delete(handlers::purchase_products::delete_purchase_product),
        )
}
