//! Stripe checkout flow: opening a session for a pending purchase and folding the
//! session outcome (polled or pushed by webhook) back into the purchase status.

use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    config::AppConfig,
    error::{AppError, Result},
    models::{CheckoutSessionResponse, PaymentStatusResponse, Purchase, PurchaseStatus},
    payments::{CheckoutLine, CheckoutSession, CheckoutSessionRequest, PaymentState, StripeEvent},
    repository::{ProductRepository, PurchaseProductRepository, PurchaseRepository, RepositoryState},
};

/// start_checkout
///
/// Opens a hosted checkout session for one of the caller's own purchases. The purchase
/// must still be `pending` and have at least one line. The session id is stored on the
/// purchase so later status checks and webhooks can find it.
#[instrument(name = "checkout::start", skip(repo, payments, config, user), fields(user_id = %user.id))]
pub async fn start_checkout(
    repo: &RepositoryState,
    payments: &PaymentState,
    config: &AppConfig,
    user: &AuthUser,
    purchase_id: Uuid,
) -> Result<CheckoutSessionResponse> {
    let purchase = repo
        .get_purchase(purchase_id)
        .await?
        .filter(|p| p.user_id == user.id)
        .ok_or_else(|| AppError::not_found("purchase"))?;

    if purchase.status != PurchaseStatus::Pending {
        return Err(AppError::bad_request(format!(
            "purchase is {} and cannot be paid",
            purchase.status.as_str()
        )));
    }

    let items = repo.list_purchase_products(Some(purchase.id)).await?;
    if items.is_empty() {
        return Err(AppError::bad_request("purchase has no products"));
    }

    let product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
    let names: HashMap<Uuid, String> = repo
        .find_products_by_ids(&product_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();

    let lines = items
        .iter()
        .map(|item| CheckoutLine {
            name: names
                .get(&item.product_id)
                .cloned()
                .unwrap_or_else(|| format!("Product {}", item.product_id)),
            unit_amount: i64::from(item.unit_price),
            quantity: i64::from(item.quantity),
        })
        .collect();

    let frontend = config.frontend_url.trim_end_matches('/');
    let request = CheckoutSessionRequest {
        purchase_id: purchase.id,
        customer_email: user.email.clone(),
        currency: config.stripe_currency.clone(),
        success_url: format!("{frontend}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{frontend}/checkout/cancel?purchase_id={}", purchase.id),
        lines,
    };

    let session = payments.create_checkout_session(&request).await?;
    let url = session
        .url
        .clone()
        .ok_or_else(|| AppError::Payment("checkout session has no redirect url".to_string()))?;

    repo.set_stripe_session(purchase.id, &session.id)
        .await?
        .ok_or_else(|| AppError::not_found("purchase"))?;

    tracing::info!(purchase_id = %purchase.id, session_id = %session.id, "checkout session created");

    Ok(CheckoutSessionResponse {
        session_id: session.id,
        url,
    })
}

/// sync_payment_status
///
/// Asks Stripe for the session attached to the purchase and applies its outcome.
#[instrument(name = "checkout::sync", skip(repo, payments, user), fields(user_id = %user.id))]
pub async fn sync_payment_status(
    repo: &RepositoryState,
    payments: &PaymentState,
    user: &AuthUser,
    purchase_id: Uuid,
) -> Result<PaymentStatusResponse> {
    let purchase = repo
        .get_purchase(purchase_id)
        .await?
        .filter(|p| user.can_access(p.user_id))
        .ok_or_else(|| AppError::not_found("purchase"))?;

    let session_id = purchase
        .stripe_session_id
        .clone()
        .ok_or_else(|| AppError::bad_request("no checkout session was created for this purchase"))?;

    let session = payments.retrieve_checkout_session(&session_id).await?;
    let purchase = apply_session_outcome(repo, purchase, &session).await?;

    Ok(PaymentStatusResponse {
        purchase_id: purchase.id,
        status: purchase.status,
        payment_status: session.payment_status,
    })
}

/// Moves a pending purchase to `paid` or `cancelled` according to the session. Purchases
/// that already left `pending` are returned untouched.
async fn apply_session_outcome(
    repo: &RepositoryState,
    purchase: Purchase,
    session: &CheckoutSession,
) -> Result<Purchase> {
    let target = if session.is_paid() {
        PurchaseStatus::Paid
    } else if session.is_expired() {
        PurchaseStatus::Cancelled
    } else {
        return Ok(purchase);
    };
    transition_from_pending(repo, purchase, target).await
}

async fn transition_from_pending(
    repo: &RepositoryState,
    purchase: Purchase,
    target: PurchaseStatus,
) -> Result<Purchase> {
    match repo
        .transition_status(purchase.id, PurchaseStatus::Pending, target)
        .await?
    {
        Some(updated) => {
            tracing::info!(purchase_id = %updated.id, status = updated.status.as_str(), "purchase status updated");
            Ok(updated)
        }
        None => {
            tracing::debug!(purchase_id = %purchase.id, status = purchase.status.as_str(), "purchase no longer pending");
            Ok(repo.get_purchase(purchase.id).await?.unwrap_or(purchase))
        }
    }
}

/// handle_webhook_event
///
/// Applies a verified Stripe event. Events that do not concern checkout sessions, or that
/// reference an unknown purchase, are acknowledged without effect. Expiry and failure only
/// count for the session currently stored on the purchase; a payment counts from any of
/// its sessions.
#[instrument(name = "checkout::webhook", skip(repo, event), fields(event_id = %event.id, event_type = %event.event_type))]
pub async fn handle_webhook_event(repo: &RepositoryState, event: StripeEvent) -> Result<()> {
    let target = match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            PurchaseStatus::Paid
        }
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            PurchaseStatus::Cancelled
        }
        _ => {
            tracing::debug!("ignoring webhook event");
            return Ok(());
        }
    };

    let session: CheckoutSession = serde_json::from_value(event.data.object)
        .map_err(|e| AppError::bad_request(format!("malformed checkout session payload: {e}")))?;

    if target == PurchaseStatus::Paid && !session.is_paid() {
        tracing::debug!(session_id = %session.id, "session completed without payment yet");
        return Ok(());
    }

    let purchase = match session.purchase_id() {
        Some(id) => repo.get_purchase(id).await?,
        None => repo.find_purchase_by_session(&session.id).await?,
    };

    let Some(purchase) = purchase else {
        tracing::warn!(session_id = %session.id, "webhook references an unknown purchase");
        return Ok(());
    };

    let current = purchase.stripe_session_id.as_deref() == Some(session.id.as_str());
    if !current {
        // A superseded session may only report money that was actually captured.
        if target != PurchaseStatus::Paid {
            tracing::debug!(session_id = %session.id, purchase_id = %purchase.id, "ignoring outcome of a superseded session");
            return Ok(());
        }
        tracing::warn!(session_id = %session.id, purchase_id = %purchase.id, "payment received on a superseded session");
    }

    transition_from_pending(repo, purchase, target).await?;
    Ok(())
}
