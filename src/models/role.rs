use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const ADMIN_ROLE: &str = "admin";
pub const MEMBER_ROLE: &str = "member";

/// Role
///
/// A named permission set from the `roles` table (`admin`, `member`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

/// UserRole
///
/// Join row granting a role to a user. Composite primary key (user_id, role_id).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

/// RoleRequest
///
/// Payload for both POST /admin/roles and PATCH /admin/roles/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct RoleRequest {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
}

/// AssignRoleRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
}
