use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, Result};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
/// Maximum age of a webhook signature timestamp, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// One product line of a checkout session. Amounts are in the currency's minor unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub name: String,
    pub unit_amount: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub purchase_id: Uuid,
    pub customer_email: String,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub lines: Vec<CheckoutLine>,
}

impl CheckoutSessionRequest {
    /// Form fields in the bracketed notation the Stripe API expects.
    fn form_fields(&self) -> Vec<(String, String)> {
        let purchase_id = self.purchase_id.to_string();
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("customer_email".to_string(), self.customer_email.clone()),
            ("client_reference_id".to_string(), purchase_id.clone()),
            ("metadata[purchase_id]".to_string(), purchase_id),
        ];
        for (i, line) in self.lines.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            fields.push((format!("{prefix}[price_data][currency]"), self.currency.clone()));
            fields.push((format!("{prefix}[price_data][product_data][name]"), line.name.clone()));
            fields.push((format!("{prefix}[price_data][unit_amount]"), line.unit_amount.to_string()));
            fields.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
        }
        fields
    }
}

/// CheckoutSession
///
/// The subset of a Stripe Checkout Session object this service reads.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    /// `open`, `complete` or `expired`.
    pub status: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn is_expired(&self) -> bool {
        self.status.as_deref() == Some("expired")
    }

    /// Purchase id carried in the session, preferring the metadata copy.
    pub fn purchase_id(&self) -> Option<Uuid> {
        self.metadata
            .get("purchase_id")
            .map(String::as_str)
            .or(self.client_reference_id.as_deref())
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

/// PaymentGateway
///
/// Contract for the hosted-checkout provider, so handlers can run against Stripe in
/// production and against `MockPaymentGateway` in tests.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, req: &CheckoutSessionRequest) -> Result<CheckoutSession>;
    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession>;
}

pub type PaymentState = Arc<dyn PaymentGateway>;

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// StripeClient
///
/// Talks to the Stripe REST API directly with `reqwest` (form-encoded requests, bearer
/// authentication with the secret key).
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: &str) -> Self {
        Self::with_api_base(secret_key, STRIPE_API_BASE)
    }

    pub fn with_api_base(secret_key: &str, api_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn parse_session(response: reqwest::Response) -> Result<CheckoutSession> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "unknown Stripe error".to_string());
            return Err(AppError::Payment(format!("Stripe responded {status}: {message}")));
        }
        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::Payment(format!("unreadable Stripe response: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[tracing::instrument(name = "stripe::create_session", skip_all, fields(purchase_id = %req.purchase_id))]
    async fn create_checkout_session(&self, req: &CheckoutSessionRequest) -> Result<CheckoutSession> {
        let response = self
            .http
            .post(format!("{}/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&req.form_fields())
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("Stripe request failed: {e}")))?;
        Self::parse_session(response).await
    }

    #[tracing::instrument(name = "stripe::retrieve_session", skip(self))]
    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession> {
        let response = self
            .http
            .get(format!("{}/checkout/sessions/{}", self.api_base, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("Stripe request failed: {e}")))?;
        Self::parse_session(response).await
    }
}

// --- Webhooks ---

/// StripeEvent
///
/// Envelope of a webhook notification; `data.object` is kept raw because its shape
/// depends on `type`.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

type HmacSha256 = Hmac<Sha256>;

fn signature_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("invalid webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Builds a `Stripe-Signature` header value for `payload`, as Stripe would.
pub fn sign_webhook_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mac = signature_mac(secret, timestamp, payload)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// verify_webhook_signature
///
/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=..]`) against the raw
/// request body. The timestamp must be within `WEBHOOK_TOLERANCE_SECS` of `now` and at
/// least one `v1` signature must match; comparison is constant-time.
pub fn verify_webhook_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(sig) = hex::decode(value) {
                    signatures.push(sig);
                }
            }
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| AppError::bad_request("webhook signature has no timestamp"))?;
    if signatures.is_empty() {
        return Err(AppError::bad_request("webhook signature has no v1 entry"));
    }
    if (now - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(AppError::bad_request("webhook signature timestamp out of tolerance"));
    }

    let mac = signature_mac(secret, timestamp, payload)?;
    if signatures
        .iter()
        .any(|sig| mac.clone().verify_slice(sig).is_ok())
    {
        Ok(())
    } else {
        Err(AppError::bad_request("webhook signature mismatch"))
    }
}

// --- Mock Implementation (For Tests) ---

/// MockPaymentGateway
///
/// In-memory stand-in for Stripe. Sessions start `open`/`unpaid`; tests flip them with
/// `mark_paid` / `mark_expired` and inspect what was requested with `requests`.
#[derive(Default)]
pub struct MockPaymentGateway {
    /// When true, every call fails like an unreachable provider.
    pub should_fail: bool,
    sessions: Mutex<HashMap<String, CheckoutSession>>,
    requests: Mutex<Vec<CheckoutSessionRequest>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn mark_paid(&self, session_id: &str) {
        if let Some(session) = self.sessions.lock().await.get_mut(session_id) {
            session.payment_status = "paid".to_string();
            session.status = Some("complete".to_string());
        }
    }

    pub async fn mark_expired(&self, session_id: &str) {
        if let Some(session) = self.sessions.lock().await.get_mut(session_id) {
            session.status = Some("expired".to_string());
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(&self, req: &CheckoutSessionRequest) -> Result<CheckoutSession> {
        if self.should_fail {
            return Err(AppError::Payment("mock gateway failure".to_string()));
        }
        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        let session = CheckoutSession {
            url: Some(format!("https://checkout.stripe.test/c/pay/{id}")),
            id: id.clone(),
            status: Some("open".to_string()),
            payment_status: "unpaid".to_string(),
            client_reference_id: Some(req.purchase_id.to_string()),
            metadata: HashMap::from([("purchase_id".to_string(), req.purchase_id.to_string())]),
        };
        self.requests.lock().await.push(req.clone());
        self.sessions.lock().await.insert(id, session.clone());
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession> {
        if self.should_fail {
            return Err(AppError::Payment("mock gateway failure".to_string()));
        }
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| AppError::Payment(format!("no such checkout session: {session_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_unit";

    #[test]
    fn signatures_round_trip_within_tolerance() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = sign_webhook_payload(SECRET, 1_700_000_000, payload).unwrap();
        assert!(verify_webhook_signature(payload, &header, SECRET, 1_700_000_100).is_ok());
    }

    #[test]
    fn tampered_payloads_are_rejected() {
        let header = sign_webhook_payload(SECRET, 1_700_000_000, b"original").unwrap();
        assert!(verify_webhook_signature(b"tampered", &header, SECRET, 1_700_000_000).is_err());
    }

    #[test]
    fn stale_timestamps_are_rejected() {
        let header = sign_webhook_payload(SECRET, 1_700_000_000, b"body").unwrap();
        let later = 1_700_000_000 + WEBHOOK_TOLERANCE_SECS + 1;
        assert!(verify_webhook_signature(b"body", &header, SECRET, later).is_err());
    }

    #[test]
    fn any_matching_v1_entry_is_accepted() {
        let valid = sign_webhook_payload(SECRET, 42, b"body").unwrap();
        let v1 = valid.split_once(",v1=").unwrap().1;
        let header = format!("t=42,v1={},v1={v1}", "00".repeat(32));
        assert!(verify_webhook_signature(b"body", &header, SECRET, 42).is_ok());
    }

    #[test]
    fn form_fields_use_bracket_notation() {
        let req = CheckoutSessionRequest {
            purchase_id: Uuid::nil(),
            customer_email: "ada@example.com".to_string(),
            currency: "eur".to_string(),
            success_url: "http://shop/success".to_string(),
            cancel_url: "http://shop/cancel".to_string(),
            lines: vec![CheckoutLine {
                name: "Fern".to_string(),
                unit_amount: 500,
                quantity: 2,
            }],
        };
        let fields = req.form_fields();
        assert!(fields.contains(&("line_items[0][price_data][unit_amount]".to_string(), "500".to_string())));
        assert!(fields.contains(&("line_items[0][quantity]".to_string(), "2".to_string())));
        assert!(fields.contains(&("metadata[purchase_id]".to_string(), Uuid::nil().to_string())));
    }

    #[test]
    fn purchase_id_falls_back_to_client_reference() {
        let id = Uuid::new_v4();
        let session = CheckoutSession {
            id: "cs_1".to_string(),
            url: None,
            status: None,
            payment_status: "paid".to_string(),
            client_reference_id: Some(id.to_string()),
            metadata: HashMap::new(),
        };
        assert_eq!(session.purchase_id(), Some(id));
        assert!(session.is_paid());
    }
}
