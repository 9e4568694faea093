//! Token endpoints: issue with Basic credentials, revoke with a token.

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::models::tokens::TokenResponse,
    auth::{
        current_user::{PasswordAuthenticated, TokenAuthenticated},
        token,
    },
    errors::Error,
};

/// Request a bearer token.
///
/// Requires Basic credentials for a confirmed, active account; a bearer
/// token cannot be used to mint further tokens.
#[utoipa::path(
    post,
    path = "/tokens",
    tag = "tokens",
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid or missing Basic credentials"),
    ),
    security(("basic_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn issue_token(
    State(state): State<AppState>,
    PasswordAuthenticated(identity): PasswordAuthenticated,
) -> Result<Json<TokenResponse>, Error> {
    let user = state
        .store
        .find_by_id(identity.user_id)
        .await?
        .ok_or(Error::Unauthenticated { failure: None })?;

    let token = token::issue(&user, &state.config)?;
    Ok(Json(TokenResponse { token }))
}

/// Revoke all tokens previously issued for the authenticated user.
#[utoipa::path(
    delete,
    path = "/tokens",
    tag = "tokens",
    responses(
        (status = 204, description = "All tokens revoked"),
        (status = 401, description = "Invalid or missing bearer token"),
    ),
    security(("bearer_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn revoke_token(State(state): State<AppState>, TokenAuthenticated(identity): TokenAuthenticated) -> Result<StatusCode, Error> {
    token::revoke(state.store.as_ref(), identity.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::tokens::TokenResponse,
        test_utils::{TestUser, basic_header, seeded_state},
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;

    async fn test_server() -> (TestServer, crate::AppState) {
        let state = seeded_state().await;
        let server = TestServer::new(crate::build_router(state.clone())).expect("Failed to create test server");
        (server, state)
    }

    #[tokio::test]
    async fn test_token_lifecycle() {
        let (server, state) = test_server().await;
        TestUser::confirmed("ALICE@EXAMPLE.COM").create_in(&state).await;

        // Basic credentials buy a token
        let response = server
            .post("/tokens")
            .add_header("authorization", basic_header("alice@example.com", "hunter2"))
            .await;
        response.assert_status(StatusCode::OK);
        let TokenResponse { token } = response.json();
        assert!(!token.is_empty());

        // The token authenticates API calls
        let response = server.get("/users/me").add_header("authorization", format!("Bearer {token}")).await;
        response.assert_status(StatusCode::OK);

        // Revoking kills it
        let response = server
            .delete("/tokens")
            .add_header("authorization", format!("Bearer {token}"))
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        // Subsequent use of the same token fails as invalid
        let response = server.get("/users/me").add_header("authorization", format!("Bearer {token}")).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.text().contains("invalid token"));
    }

    #[tokio::test]
    async fn test_issue_requires_basic_credentials() {
        let (server, state) = test_server().await;
        let user = TestUser::confirmed("ALICE@EXAMPLE.COM").create_in(&state).await;
        let bearer = crate::auth::token::issue(&user, &state.config).unwrap();

        // No credentials at all
        let response = server.post("/tokens").await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        // A bearer token is not enough to mint another token
        let response = server
            .post("/tokens")
            .add_header("authorization", format!("Bearer {bearer}"))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_revoke_requires_bearer_token() {
        let (server, state) = test_server().await;
        TestUser::confirmed("ALICE@EXAMPLE.COM").create_in(&state).await;

        let response = server
            .delete("/tokens")
            .add_header("authorization", basic_header("alice@example.com", "hunter2"))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unconfirmed_account_cannot_obtain_token() {
        let (server, state) = test_server().await;
        TestUser::unconfirmed("NEW@EXAMPLE.COM").create_in(&state).await;

        let response = server
            .post("/tokens")
            .add_header("authorization", basic_header("new@example.com", "hunter2"))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.text().contains("unconfirmed"));
    }

    #[tokio::test]
    async fn test_wrong_password_is_terminal_despite_valid_bearer() {
        let (server, state) = test_server().await;
        let user = TestUser::confirmed("ALICE@EXAMPLE.COM").create_in(&state).await;
        let bearer = crate::auth::token::issue(&user, &state.config).unwrap();

        let response = server
            .post("/tokens")
            .add_header("authorization", basic_header("alice@example.com", "wrong"))
            .add_header("authorization", format!("Bearer {bearer}"))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.text().contains("password could not be verified"));
    }

    #[tokio::test]
    async fn test_api_responses_carry_canonical_media_type() {
        let (server, state) = test_server().await;
        TestUser::confirmed("ALICE@EXAMPLE.COM").create_in(&state).await;

        let response = server
            .post("/tokens")
            .add_header("authorization", basic_header("alice@example.com", "hunter2"))
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "application/fhir+json");
        assert_eq!(response.headers().get("charset").unwrap(), "UTF-8");
        // API-authenticated responses never establish browser session state
        assert!(response.headers().get("set-cookie").is_none());
    }
}
