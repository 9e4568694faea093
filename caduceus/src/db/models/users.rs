//! Database models for users.

use crate::types::{RoleId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub first_name: String,
    pub last_name: String,
    /// Normalized (uppercased, trimmed) before storage
    pub email: String,
    pub password_hash: Option<String>,
    pub confirmed: bool,
    pub active: bool,
    /// Requested role. A missing or unknown id resolves to the default role.
    pub role_id: Option<RoleId>,
    pub token_secret: String,
}

/// Database request for updating a user's password.
///
/// The outgoing hash is retained as the previous-password hash so the last
/// password stays comparable.
#[derive(Debug, Clone)]
pub struct UserPasswordUpdateDBRequest {
    pub password_hash: String,
}

/// Database response for a user
#[derive(Debug, Clone, PartialEq)]
pub struct UserDBResponse {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    /// The user's active email address, as stored (normalized)
    pub email: String,
    pub password_hash: Option<String>,
    pub previous_password_hash: Option<String>,
    pub confirmed: bool,
    pub active: bool,
    pub role_id: RoleId,
    pub token_secret: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
