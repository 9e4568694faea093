//! Extractors for the authenticated identity in handlers.
//!
//! These read the [`RequestContext`] the authentication middleware
//! attached; they never re-run credential verification, so resolution
//! happens exactly once per request.
//!
//! - [`CurrentIdentity`]: any authentication method
//! - [`PasswordAuthenticated`]: Basic credentials required
//! - [`TokenAuthenticated`]: a Bearer token required

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    auth::{
        identity::{AuthMethod, Identity, Principal},
        middleware::RequestContext,
    },
    errors::Error,
};

fn identity_from(parts: &Parts) -> Result<Identity, Error> {
    let context = parts.extensions.get::<RequestContext>().ok_or_else(|| Error::Internal {
        operation: "read request context (authentication middleware not installed)".to_string(),
    })?;

    match &context.principal {
        Principal::Authenticated(identity) => Ok(identity.clone()),
        Principal::Anonymous => Err(Error::Unauthenticated { failure: None }),
    }
}

/// The authenticated identity, regardless of method.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from(parts).map(Self)
    }
}

/// An identity established through Basic credentials.
#[derive(Debug, Clone)]
pub struct PasswordAuthenticated(pub Identity);

impl<S> FromRequestParts<S> for PasswordAuthenticated
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity_from(parts)?;
        if identity.method != AuthMethod::Basic {
            return Err(Error::Unauthenticated { failure: None });
        }
        Ok(Self(identity))
    }
}

/// An identity established through a Bearer token.
#[derive(Debug, Clone)]
pub struct TokenAuthenticated(pub Identity);

impl<S> FromRequestParts<S> for TokenAuthenticated
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity_from(parts)?;
        if identity.method != AuthMethod::Token {
            return Err(Error::Unauthenticated { failure: None });
        }
        Ok(Self(identity))
    }
}
