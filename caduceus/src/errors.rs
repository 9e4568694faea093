use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

/// Reason an authentication attempt was rejected.
///
/// Every variant maps to HTTP 401. The variants deliberately disclose the
/// minimum distinction clients need (existence vs. password vs. account
/// status vs. token state) and nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Basic credentials carried no email address
    MissingEmail,
    /// No user matched the provided email among active email records
    UserNotFound,
    /// Password could not be verified
    InvalidCredentials,
    /// Account exists but has not redeemed its confirmation token
    UnconfirmedAccount,
    /// Account has been administratively deactivated
    InactiveAccount,
    /// Bearer token failed verification (malformed, forged, or revoked)
    InvalidToken,
    /// Bearer token was authentic but past its validity window
    TokenExpired,
}

impl AuthFailure {
    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::MissingEmail => "Authentication failed: no email address provided",
            AuthFailure::UserNotFound => "Authentication failed: no user matching the provided email found",
            AuthFailure::InvalidCredentials => "Authentication failed: password could not be verified",
            AuthFailure::UnconfirmedAccount => "Authentication failed: user account is unconfirmed",
            AuthFailure::InactiveAccount => "Authentication failed: user account is inactive",
            AuthFailure::InvalidToken => "Authentication failed: invalid token provided",
            AuthFailure::TokenExpired => "Authentication failed: authentication token expired",
        }
    }
}

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but missing, or credentials were rejected
    #[error("Not authenticated")]
    Unauthenticated { failure: Option<AuthFailure> },

    /// Authenticated identity lacks a required permission
    #[error("Insufficient permissions: {required} required for {resource}")]
    InsufficientPermissions { required: String, resource: String },

    /// Stored identity data is inconsistent; resolution fails closed
    #[error("Data integrity violation: {detail}")]
    Integrity { detail: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Conflict error, e.g., for unique constraint violations
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Shorthand for an authentication rejection with a typed reason
    pub fn auth(failure: AuthFailure) -> Self {
        Error::Unauthenticated { failure: Some(failure) }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::Integrity { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { failure } => failure
                .map(|f| f.message().to_string())
                .unwrap_or_else(|| "Authentication required".to_string()),
            Error::InsufficientPermissions { required, resource } => {
                format!("Insufficient permissions: {required} required for {resource}")
            }
            Error::Integrity { .. } => "Internal server error".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Conflict { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => match (table.as_deref(), constraint.as_deref()) {
                    (Some("email_addresses"), Some(c)) if c.contains("email") => {
                        "An account with this email address already exists".to_string()
                    }
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Integrity { .. } => {
                tracing::error!("Data-integrity incident: {:#}", self);
            }
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
        }

        let status = self.status_code();
        let user_message = self.user_message();
        (status, user_message).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
