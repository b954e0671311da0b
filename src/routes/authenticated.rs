use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Customer endpoints. `auth_middleware` resolves the `AuthUser` once and stores it in the
/// request extensions, so the handlers' own `AuthUser` extractors are free. Ownership
/// checks (purchase belongs to the caller) happen in the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PATCH/DELETE /me
        .route(
            "/me",
            get(handlers::auth::get_me)
                .patch(handlers::auth::update_me)
                .delete(handlers::auth::delete_me),
        )
        .route("/me/purchases", get(handlers::purchases::list_my_purchases))
        // --- Orders ---
        .route("/purchases", post(handlers::purchases::create_purchase))
        .route("/purchases/{id}", get(handlers::purchases::get_purchase))
        // --- Stripe checkout ---
        .route(
            "/purchases/{id}/checkout",
            post(handlers::checkout::create_checkout),
        )
        .route(
            "/purchases/{id}/payment-status",
            get(handlers::checkout::check_payment_status),
        )
}
