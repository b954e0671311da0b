use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    checkout,
    error::{AppError, Result},
    models::{CheckoutSessionResponse, PaymentStatusResponse},
    payments::{StripeEvent, verify_webhook_signature},
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// create_checkout
///
/// [Authenticated Route] Opens a Stripe Checkout session for one of the caller's pending
/// purchases. The client redirects to the returned `url`.
#[utoipa::path(
    post,
    path = "/purchases/{id}/checkout",
    tag = "checkout",
    params(("id" = Uuid, Path, description = "Purchase ID")),
    responses(
        (status = 200, description = "Session created", body = CheckoutSessionResponse),
        (status = 400, description = "Purchase not payable or provider error"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn create_checkout(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CheckoutSessionResponse>> {
    let session = checkout::start_checkout(&state.repo, &state.payments, &state.config, &user, id).await?;
    Ok(Json(session))
}

/// check_payment_status
///
/// [Authenticated Route] Polled by the success page: asks Stripe for the session and
/// settles the purchase accordingly.
#[utoipa::path(
    get,
    path = "/purchases/{id}/payment-status",
    tag = "checkout",
    params(("id" = Uuid, Path, description = "Purchase ID")),
    responses(
        (status = 200, description = "Current status", body = PaymentStatusResponse),
        (status = 400, description = "No checkout session yet"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn check_payment_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentStatusResponse>> {
    let status = checkout::sync_payment_status(&state.repo, &state.payments, &user, id).await?;
    Ok(Json(status))
}

/// stripe_webhook
///
/// [Public Route] Stripe event sink. The raw body is needed for signature verification,
/// so it is taken as bytes and parsed only once the signature checks out.
#[utoipa::path(
    post,
    path = "/stripe/webhook",
    tag = "checkout",
    request_body(content = String, description = "Raw Stripe event JSON"),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 400, description = "Bad signature or payload")
    )
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::bad_request("missing Stripe-Signature header"))?;

    if let Err(e) = verify_webhook_signature(
        &body,
        signature,
        &state.config.stripe_webhook_secret,
        Utc::now().timestamp(),
    ) {
        tracing::warn!("rejected webhook: {}", e);
        return Err(e);
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("malformed event: {e}")))?;

    checkout::handle_webhook_event(&state.repo, event).await?;
    Ok(StatusCode::OK)
}
