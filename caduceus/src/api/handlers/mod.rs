//! Axum route handlers for all API endpoints.

pub mod tokens;
pub mod users;
