use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// PurchaseStatus
///
/// Maps to the `purchase_status` Postgres enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "purchase_status", rename_all = "lowercase")]
#[ts(export)]
pub enum PurchaseStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
    Shipped,
    Delivered,
}

impl PurchaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Paid => "paid",
            PurchaseStatus::Cancelled => "cancelled",
            PurchaseStatus::Shipped => "shipped",
            PurchaseStatus::Delivered => "delivered",
        }
    }
}

/// Purchase
///
/// An order placed by a user. `total_price` is in cents and always equals the sum of
/// `quantity * unit_price` over its line items.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub total_price: i64,
    pub status: PurchaseStatus,
    pub payment_method: String,
    pub stripe_session_id: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// PurchaseProduct
///
/// A line item. `unit_price` is copied from the catalogue when the line is created, so
/// later price changes do not alter past orders.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct PurchaseProduct {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i32,
}

impl PurchaseProduct {
    pub fn line_total(&self) -> i64 {
        i64::from(self.quantity) * i64::from(self.unit_price)
    }
}

/// PurchaseDetails
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct PurchaseDetails {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub items: Vec<PurchaseProduct>,
}

/// Insert payload for the purchase row; the total is computed before it reaches the
/// repository.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user_id: Uuid,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub payment_method: String,
    pub total_price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i32,
}

// --- Request Payloads ---

/// Upper bound on the quantity of a single line item.
pub const MAX_LINE_QUANTITY: i32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct PurchaseItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
}

/// CreatePurchaseRequest
///
/// Body of POST /purchases. Prices are never taken from the client.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CreatePurchaseRequest {
    #[validate(length(min = 1, max = 255))]
    pub address: String,
    #[validate(length(min = 2, max = 16))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 32))]
    pub payment_method: String,
    #[validate(length(min = 1, max = 100), nested)]
    pub items: Vec<PurchaseItemRequest>,
}

/// UpdatePurchaseRequest
///
/// Admin-side partial update (PATCH /admin/purchases/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdatePurchaseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255))]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2, max = 16))]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PurchaseStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CreatePurchaseProductRequest {
    pub purchase_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct UpdatePurchaseProductRequest {
    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
}

/// Query parameters for GET /admin/purchase-products.
#[derive(Debug, Clone, Deserialize, Default, utoipa::IntoParams)]
pub struct PurchaseProductFilter {
    pub purchase_id: Option<Uuid>,
}

// --- Checkout & Dashboard ---

/// CheckoutSessionResponse
///
/// Returned by POST /purchases/{id}/checkout; the client redirects to `url`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub url: String,
}

/// PaymentStatusResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct PaymentStatusResponse {
    pub purchase_id: Uuid,
    pub status: PurchaseStatus,
    /// Raw Stripe `payment_status` (`paid`, `unpaid`, `no_payment_required`).
    pub payment_status: String,
}

/// AdminStats
///
/// GET /admin/stats. `paid_revenue` sums purchases that reached `paid` or beyond.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_products: i64,
    pub total_purchases: i64,
    pub pending_purchases: i64,
    pub paid_revenue: i64,
}
