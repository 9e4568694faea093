//! Request context population and API response shaping.
//!
//! Every API route is wrapped by [`authenticate_request`]. The middleware
//! runs the dispatcher once, attaches the resulting [`RequestContext`] to
//! the request (request-scoped, never shared), and shapes the outbound
//! response: the canonical media type is forced on every API response, and
//! the session cookie is stripped whenever the request authenticated
//! through this pipeline (API calls must never establish browser session
//! state).

use axum::{
    extract::{Request, State},
    http::{
        HeaderName, HeaderValue,
        header::{CONTENT_TYPE, SET_COOKIE},
    },
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    auth::{dispatcher, identity::Principal},
    errors::Error,
};

/// Canonical media type for all API responses.
pub const FHIR_JSON: &str = "application/fhir+json";

const CHARSET: HeaderName = HeaderName::from_static("charset");

/// Per-request authentication state. Lifetime is bounded to one request;
/// a fresh value is constructed for every request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub principal: Principal,
    /// True when this request authenticated via the API pipeline
    pub api_auth: bool,
}

/// Authenticate the request, attach the request context, and apply the
/// API response headers on the way out.
pub async fn authenticate_request(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, Error> {
    // A rejected credential aborts the request here with no partial
    // identity attached.
    let principal = dispatcher::authenticate(request.headers(), &state).await?;
    let api_auth = matches!(principal, Principal::Authenticated(_));
    request.extensions_mut().insert(RequestContext { principal, api_auth });

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON));
    headers.insert(CHARSET, HeaderValue::from_static("UTF-8"));
    if api_auth {
        headers.remove(SET_COOKIE);
    }

    Ok(response)
}
