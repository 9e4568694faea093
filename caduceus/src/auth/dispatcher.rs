//! Multi-method authentication dispatch.
//!
//! One verification path runs per request, selected by the credential the
//! request carries: Basic credentials take precedence over a Bearer token
//! when both are present, and a failure on the selected path is terminal
//! (no fallback to the other method). A request with no credentials is
//! anonymous; whether that is acceptable is the endpoint's decision.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use base64::{Engine as _, engine::general_purpose};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    auth::{
        identity::{self, AuthMethod, Identity, Principal},
        password, token,
    },
    errors::{AuthFailure, Error},
};

/// Credentials extracted from the request headers.
#[derive(Debug)]
enum Credentials {
    Basic { email: String, password: String },
    Bearer { token: String },
    None,
}

/// Parse the Authorization header(s). Basic credentials win when both
/// schemes are present; schemes other than Basic and Bearer are ignored.
fn extract_credentials(headers: &HeaderMap) -> Result<Credentials, Error> {
    let mut bearer = None;

    for value in headers.get_all(AUTHORIZATION) {
        let value = value.to_str().map_err(|e| Error::BadRequest {
            message: format!("Invalid authorization header: {e}"),
        })?;

        if let Some(encoded) = value.strip_prefix("Basic ") {
            let decoded = general_purpose::STANDARD.decode(encoded.trim()).map_err(|_| Error::BadRequest {
                message: "Invalid authorization header: malformed Basic credentials".to_string(),
            })?;
            let decoded = String::from_utf8(decoded).map_err(|_| Error::BadRequest {
                message: "Invalid authorization header: malformed Basic credentials".to_string(),
            })?;
            let (email, password) = decoded.split_once(':').ok_or_else(|| Error::BadRequest {
                message: "Invalid authorization header: malformed Basic credentials".to_string(),
            })?;
            return Ok(Credentials::Basic {
                email: email.to_string(),
                password: password.to_string(),
            });
        }

        if bearer.is_none()
            && let Some(token) = value.strip_prefix("Bearer ")
        {
            bearer = Some(token.to_string());
        }
    }

    Ok(match bearer {
        Some(token) => Credentials::Bearer { token },
        None => Credentials::None,
    })
}

/// Authenticate one request.
///
/// Returns `Principal::Anonymous` when no usable credentials are present,
/// `Principal::Authenticated` on success, and an error (terminal for the
/// request, no partial identity) when presented credentials are rejected.
#[instrument(skip_all)]
pub async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Principal, Error> {
    match extract_credentials(headers)? {
        Credentials::Basic { email, password } => {
            trace!("Attempting Basic authentication");
            verify_basic(state, &email, &password).await.map(Principal::Authenticated)
        }
        // An empty token is "no credentials", not a failure
        Credentials::Bearer { token } if token.trim().is_empty() => Ok(Principal::Anonymous),
        Credentials::Bearer { token } => {
            trace!("Attempting token authentication");
            verify_bearer(state, &token).await.map(Principal::Authenticated)
        }
        Credentials::None => {
            trace!("No authentication credentials found in request");
            Ok(Principal::Anonymous)
        }
    }
}

/// The Basic path: email lookup, password check, account-status checks.
async fn verify_basic(state: &AppState, email: &str, password_input: &str) -> Result<Identity, Error> {
    if email.trim().is_empty() {
        return Err(Error::auth(AuthFailure::MissingEmail));
    }

    // Case-insensitive, trimmed match against active email records
    let normalized = email.trim().to_uppercase();
    let user = state
        .store
        .find_by_active_email(&normalized)
        .await?
        .ok_or_else(|| Error::auth(AuthFailure::UserNotFound))?;

    // Verify the password on a blocking thread to avoid stalling the runtime
    let stored_hash = user.password_hash.clone();
    let candidate = password_input.to_string();
    let is_valid = tokio::task::spawn_blocking(move || password::verify(stored_hash.as_deref(), &candidate))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?;

    if !is_valid {
        return Err(Error::auth(AuthFailure::InvalidCredentials));
    }
    if !user.confirmed {
        return Err(Error::auth(AuthFailure::UnconfirmedAccount));
    }
    if !user.active {
        return Err(Error::auth(AuthFailure::InactiveAccount));
    }

    debug!("Basic authentication succeeded for user {}", user.id);
    identity::resolve(state.store.as_ref(), &user, AuthMethod::Basic).await
}

/// The token path: verification, expiry, account-status checks.
async fn verify_bearer(state: &AppState, bearer: &str) -> Result<Identity, Error> {
    let (user, expired) = token::verify(bearer, state.store.as_ref(), &state.config).await?;

    let Some(user) = user else {
        return Err(Error::auth(AuthFailure::InvalidToken));
    };
    if expired {
        return Err(Error::auth(AuthFailure::TokenExpired));
    }
    if !user.confirmed {
        return Err(Error::auth(AuthFailure::UnconfirmedAccount));
    }

    debug!("Token authentication succeeded for user {}", user.id);
    identity::resolve(state.store.as_ref(), &user, AuthMethod::Token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestUser, basic_header, seeded_state};
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.append(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn failure_of(result: Result<Principal, Error>) -> AuthFailure {
        match result {
            Err(Error::Unauthenticated { failure: Some(f) }) => f,
            other => panic!("expected a typed auth failure, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_no_credentials_is_anonymous() {
        let state = seeded_state().await;
        let principal = authenticate(&HeaderMap::new(), &state).await.unwrap();
        assert!(matches!(principal, Principal::Anonymous));
    }

    #[test_log::test(tokio::test)]
    async fn test_empty_bearer_token_is_anonymous() {
        let state = seeded_state().await;
        let principal = authenticate(&headers_with("Bearer "), &state).await.unwrap();
        assert!(matches!(principal, Principal::Anonymous));
    }

    #[test_log::test(tokio::test)]
    async fn test_basic_success_for_confirmed_active_user() {
        let state = seeded_state().await;
        TestUser::confirmed("ALICE@EXAMPLE.COM").create_in(&state).await;

        let headers = headers_with(&basic_header("alice@example.com", "hunter2"));
        let principal = authenticate(&headers, &state).await.unwrap();

        let Principal::Authenticated(identity) = principal else {
            panic!("expected authenticated principal");
        };
        assert_eq!(identity.email, "ALICE@EXAMPLE.COM");
        assert_eq!(identity.method, AuthMethod::Basic);
        assert_eq!(identity.role, "User");
    }

    #[test_log::test(tokio::test)]
    async fn test_basic_email_match_is_case_insensitive_and_trimmed() {
        let state = seeded_state().await;
        TestUser::confirmed("ALICE@EXAMPLE.COM").create_in(&state).await;

        let headers = headers_with(&basic_header("  Alice@Example.Com  ", "hunter2"));
        let principal = authenticate(&headers, &state).await.unwrap();
        assert!(matches!(principal, Principal::Authenticated(_)));
    }

    #[test_log::test(tokio::test)]
    async fn test_basic_missing_email() {
        let state = seeded_state().await;
        let headers = headers_with(&basic_header("", "hunter2"));
        assert_eq!(failure_of(authenticate(&headers, &state).await), AuthFailure::MissingEmail);
    }

    #[test_log::test(tokio::test)]
    async fn test_basic_unknown_email() {
        let state = seeded_state().await;
        let headers = headers_with(&basic_header("nobody@example.com", "hunter2"));
        assert_eq!(failure_of(authenticate(&headers, &state).await), AuthFailure::UserNotFound);
    }

    #[test_log::test(tokio::test)]
    async fn test_basic_inactive_email_record_is_not_found() {
        let (state, store) = crate::test_utils::seeded_state_with_store().await;
        let user = TestUser::confirmed("OLD@EXAMPLE.COM").create_in(&state).await;
        store.deactivate_email(user.id);

        let headers = headers_with(&basic_header("old@example.com", "hunter2"));
        assert_eq!(failure_of(authenticate(&headers, &state).await), AuthFailure::UserNotFound);
    }

    #[test_log::test(tokio::test)]
    async fn test_basic_wrong_password() {
        let state = seeded_state().await;
        TestUser::confirmed("ALICE@EXAMPLE.COM").create_in(&state).await;

        let headers = headers_with(&basic_header("alice@example.com", "wrong"));
        assert_eq!(failure_of(authenticate(&headers, &state).await), AuthFailure::InvalidCredentials);
    }

    #[test_log::test(tokio::test)]
    async fn test_basic_unconfirmed_account_with_correct_password() {
        let state = seeded_state().await;
        TestUser::unconfirmed("NEW@EXAMPLE.COM").create_in(&state).await;

        let headers = headers_with(&basic_header("new@example.com", "hunter2"));
        assert_eq!(failure_of(authenticate(&headers, &state).await), AuthFailure::UnconfirmedAccount);
    }

    #[test_log::test(tokio::test)]
    async fn test_basic_inactive_account() {
        let state = seeded_state().await;
        TestUser::confirmed("GONE@EXAMPLE.COM").inactive().create_in(&state).await;

        let headers = headers_with(&basic_header("gone@example.com", "hunter2"));
        assert_eq!(failure_of(authenticate(&headers, &state).await), AuthFailure::InactiveAccount);
    }

    #[test_log::test(tokio::test)]
    async fn test_bearer_success() {
        let state = seeded_state().await;
        let user = TestUser::confirmed("ALICE@EXAMPLE.COM").create_in(&state).await;
        let bearer = token::issue(&user, &state.config).unwrap();

        let headers = headers_with(&format!("Bearer {bearer}"));
        let principal = authenticate(&headers, &state).await.unwrap();

        let Principal::Authenticated(identity) = principal else {
            panic!("expected authenticated principal");
        };
        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.method, AuthMethod::Token);
    }

    #[test_log::test(tokio::test)]
    async fn test_bearer_garbage_token() {
        let state = seeded_state().await;
        let headers = headers_with("Bearer not-a-real-token");
        assert_eq!(failure_of(authenticate(&headers, &state).await), AuthFailure::InvalidToken);
    }

    #[test_log::test(tokio::test)]
    async fn test_bearer_unconfirmed_account() {
        let state = seeded_state().await;
        let user = TestUser::unconfirmed("NEW@EXAMPLE.COM").create_in(&state).await;
        let bearer = token::issue(&user, &state.config).unwrap();

        let headers = headers_with(&format!("Bearer {bearer}"));
        assert_eq!(failure_of(authenticate(&headers, &state).await), AuthFailure::UnconfirmedAccount);
    }

    #[test_log::test(tokio::test)]
    async fn test_basic_takes_precedence_and_failure_is_terminal() {
        let state = seeded_state().await;
        let user = TestUser::confirmed("ALICE@EXAMPLE.COM").create_in(&state).await;
        let valid_bearer = token::issue(&user, &state.config).unwrap();

        // Wrong Basic password plus a valid Bearer token: the Basic path is
        // selected and its failure must not fall back to the token path
        let mut headers = HeaderMap::new();
        headers.append(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {valid_bearer}")).unwrap());
        headers.append(
            AUTHORIZATION,
            HeaderValue::from_str(&basic_header("alice@example.com", "wrong")).unwrap(),
        );

        assert_eq!(failure_of(authenticate(&headers, &state).await), AuthFailure::InvalidCredentials);
    }

    #[test_log::test(tokio::test)]
    async fn test_unrecognized_scheme_is_anonymous() {
        let state = seeded_state().await;
        let headers = headers_with("Digest username=\"alice\"");
        let principal = authenticate(&headers, &state).await.unwrap();
        assert!(matches!(principal, Principal::Anonymous));
    }
}
