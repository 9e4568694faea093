//! API request/response models for users.

use crate::db::models::users::UserDBResponse;
use crate::types::{RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Registration request for a new user account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRegister {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// User response model
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub confirmed: bool,
    pub active: bool,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            first_name: db.first_name,
            last_name: db.last_name,
            email: db.email,
            confirmed: db.confirmed,
            active: db.active,
            role_id: db.role_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Response to a successful registration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub user: UserResponse,
    /// Token to redeem via `POST /users/confirm`. Delivered to the account
    /// holder out-of-band in production deployments.
    pub confirmation_token: String,
}

/// Confirmation-token redemption request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfirmRequest {
    pub token: String,
}

/// Password change request for the authenticated user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Generic success message response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// The resolved identity of the authenticated caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrincipalResponse {
    pub user_id: UserId,
    pub email: String,
    pub role: String,
    pub permissions: Vec<String>,
}
