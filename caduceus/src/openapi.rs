//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::api::models::{
    tokens::TokenResponse,
    users::{
        AuthSuccessResponse, ConfirmRequest, PasswordChangeRequest, PrincipalResponse, RegisterResponse, UserRegister, UserResponse,
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::tokens::issue_token,
        crate::api::handlers::tokens::revoke_token,
        crate::api::handlers::users::register,
        crate::api::handlers::users::confirm_account,
        crate::api::handlers::users::current_principal,
        crate::api::handlers::users::list_users,
        crate::api::handlers::users::change_password,
    ),
    components(schemas(
        TokenResponse,
        UserRegister,
        UserResponse,
        RegisterResponse,
        ConfirmRequest,
        AuthSuccessResponse,
        PasswordChangeRequest,
        PrincipalResponse,
    )),
    tags(
        (name = "tokens", description = "Bearer token lifecycle"),
        (name = "users", description = "User account management"),
    )
)]
pub struct ApiDoc;
