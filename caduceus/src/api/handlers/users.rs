//! User account endpoints: registration, confirmation, principal
//! introspection, listing, and password changes.

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::models::users::{
        AuthSuccessResponse, ConfirmRequest, PasswordChangeRequest, PrincipalResponse, RegisterResponse, UserRegister, UserResponse,
    },
    auth::{current_user::CurrentIdentity, password, token},
    db::models::users::{UserCreateDBRequest, UserPasswordUpdateDBRequest},
    errors::{AuthFailure, Error},
};

fn check_password_length(password: &str, state: &AppState) -> Result<(), Error> {
    let password_config = &state.config.auth.password;
    if password.len() < password_config.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", password_config.min_length),
        });
    }
    if password.len() > password_config.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", password_config.max_length),
        });
    }
    Ok(())
}

/// Register a new user account.
///
/// The account starts unconfirmed with the default role. The returned
/// confirmation token must be redeemed before the account can
/// authenticate.
#[utoipa::path(
    post,
    path = "/users",
    request_body = UserRegister,
    tag = "users",
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "An account with this email already exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<UserRegister>) -> Result<(StatusCode, Json<RegisterResponse>), Error> {
    let email = request.email.trim().to_uppercase();
    if email.is_empty() {
        return Err(Error::BadRequest {
            message: "An email address is required".to_string(),
        });
    }
    check_password_length(&request.password, &state)?;

    // Hash the password on a blocking thread to avoid blocking the async runtime
    let password = request.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let create_request = UserCreateDBRequest {
        first_name: request.first_name,
        last_name: request.last_name,
        email,
        password_hash: Some(password_hash),
        confirmed: false,
        active: true,
        role_id: None,
        token_secret: token::generate_token_secret(),
    };

    let created_user = state.store.create_user(&create_request).await?;
    let confirmation_token = token::issue_confirmation(created_user.id, &state.config)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse::from(created_user),
            confirmation_token,
        }),
    ))
}

/// Redeem an account-confirmation token.
#[utoipa::path(
    post,
    path = "/users/confirm",
    request_body = ConfirmRequest,
    tag = "users",
    responses(
        (status = 200, description = "Account confirmed", body = AuthSuccessResponse),
        (status = 400, description = "Invalid or expired confirmation token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn confirm_account(State(state): State<AppState>, Json(request): Json<ConfirmRequest>) -> Result<Json<AuthSuccessResponse>, Error> {
    let user_id = token::verify_confirmation(&request.token, &state.config)?;
    state.store.confirm_user(user_id).await?;

    Ok(Json(AuthSuccessResponse {
        message: "Account confirmed".to_string(),
    }))
}

/// The resolved identity of the authenticated caller: user id, role, and
/// the aggregated permission set.
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Resolved identity", body = PrincipalResponse),
        (status = 401, description = "Not authenticated"),
    ),
    security(("basic_auth" = []), ("bearer_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn current_principal(CurrentIdentity(identity): CurrentIdentity) -> Json<PrincipalResponse> {
    Json(PrincipalResponse {
        user_id: identity.user_id,
        email: identity.email.clone(),
        role: identity.role.clone(),
        permissions: identity.permissions.iter().cloned().collect(),
    })
}

/// List all user accounts. Requires the `user:read` permission.
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing the user:read permission"),
    ),
    security(("basic_auth" = []), ("bearer_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>, CurrentIdentity(identity): CurrentIdentity) -> Result<Json<Vec<UserResponse>>, Error> {
    identity.require_permission("user:read", "users")?;

    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

enum PasswordChangeOutcome {
    WrongCurrent,
    Reused,
    Accepted(String),
}

/// Change the authenticated user's password.
///
/// The new password must differ from both the current password and the
/// immediately previous one; the outgoing hash is retained for that
/// comparison.
#[utoipa::path(
    put,
    path = "/users/me/password",
    request_body = PasswordChangeRequest,
    tag = "users",
    responses(
        (status = 200, description = "Password changed", body = AuthSuccessResponse),
        (status = 400, description = "Invalid new password"),
        (status = 401, description = "Current password is incorrect"),
    ),
    security(("basic_auth" = []), ("bearer_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(request): Json<PasswordChangeRequest>,
) -> Result<Json<AuthSuccessResponse>, Error> {
    check_password_length(&request.new_password, &state)?;

    let user = state
        .store
        .find_by_id(identity.user_id)
        .await?
        .ok_or(Error::Unauthenticated { failure: None })?;

    let stored_hash = user.password_hash.clone();
    let previous_hash = user.previous_password_hash.clone();
    let current = request.current_password.clone();
    let new = request.new_password.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        if !password::verify(stored_hash.as_deref(), &current) {
            return Ok(PasswordChangeOutcome::WrongCurrent);
        }
        if password::verify(stored_hash.as_deref(), &new) || password::verify_last(previous_hash.as_deref(), &new) {
            return Ok(PasswordChangeOutcome::Reused);
        }
        password::hash_string(&new).map(PasswordChangeOutcome::Accepted)
    })
    .await
    .map_err(|e| Error::Internal {
        operation: format!("spawn password hashing task: {e}"),
    })??;

    let new_hash = match outcome {
        PasswordChangeOutcome::WrongCurrent => return Err(Error::auth(AuthFailure::InvalidCredentials)),
        PasswordChangeOutcome::Reused => {
            return Err(Error::BadRequest {
                message: "New password must differ from previously used passwords".to_string(),
            });
        }
        PasswordChangeOutcome::Accepted(hash) => hash,
    };

    state
        .store
        .update_password(user.id, &UserPasswordUpdateDBRequest { password_hash: new_hash })
        .await?;

    Ok(Json(AuthSuccessResponse {
        message: "Password changed successfully".to_string(),
    }))
}
