//! API models for the token endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An issued bearer token. The token string is opaque to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}
