use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Image
///
/// A product photo. `url` is either an external link or the public URL of an object
/// uploaded through the presigned upload flow.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Image {
    pub id: Uuid,
    pub product_id: Uuid,
    pub url: String,
    pub alt: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CreateImageRequest {
    pub product_id: Uuid,
    #[validate(url, length(max = 2048))]
    pub url: String,
    #[validate(length(max = 255))]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateImageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url, length(max = 2048))]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255))]
    pub alt: Option<String>,
}

/// ImageUploadRequest
///
/// Input for POST /admin/images/upload. The content type is pinned into the presigned
/// URL, so the client cannot upload anything other than the declared image type.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Validate, Default)]
#[ts(export)]
pub struct ImageUploadRequest {
    #[schema(example = "monstera.jpg")]
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    #[schema(example = "image/jpeg")]
    #[validate(length(min = 1, max = 100))]
    pub content_type: String,
}

/// ImageUploadResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct ImageUploadResponse {
    /// Time-limited URL for the PUT request.
    pub upload_url: String,
    /// Object key inside the bucket.
    pub resource_key: String,
    /// URL to store on the `Image` once the upload has completed.
    pub public_url: String,
}
