//! Request-scoped identity and permission resolution.
//!
//! Once the dispatcher has established who the caller is, [`resolve`]
//! loads the user's role and aggregates the permission set it grants. The
//! result is an explicit [`Principal`] value attached to the request
//! context; there is no process-wide current-user state.

use std::collections::BTreeSet;

use crate::{
    db::models::users::UserDBResponse,
    errors::Error,
    store::CredentialStore,
    types::UserId,
};

/// Which verification path established the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Basic,
    Token,
}

/// A resolved identity: the user-id need, the coarse role need, and one
/// fine-grained need per permission the role grants.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
    pub role: String,
    pub permissions: BTreeSet<String>,
    pub method: AuthMethod,
}

impl Identity {
    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }

    /// Check a fine-grained permission, failing with 403 when absent.
    pub fn require_permission(&self, name: &str, resource: &str) -> Result<(), Error> {
        if self.has_permission(name) {
            Ok(())
        } else {
            Err(Error::InsufficientPermissions {
                required: name.to_string(),
                resource: resource.to_string(),
            })
        }
    }
}

/// The outcome of authentication for one request.
#[derive(Debug, Clone, Default)]
pub enum Principal {
    /// No credentials were presented; endpoint policy decides the outcome
    #[default]
    Anonymous,
    Authenticated(Identity),
}

/// Resolve the identity for an authenticated user.
///
/// Runs exactly once per authenticated request and is idempotent: the
/// same user yields the same permission set. A user referencing a missing
/// role is a data-integrity incident; resolution fails closed rather than
/// guessing at permissions.
pub async fn resolve(store: &dyn CredentialStore, user: &UserDBResponse, method: AuthMethod) -> Result<Identity, Error> {
    let role = store.role_by_id(user.role_id).await?.ok_or_else(|| Error::Integrity {
        detail: format!("user {} references missing role {}", user.id, user.role_id),
    })?;

    let permissions: BTreeSet<String> = store.permissions_for_role(role.id).await?.into_iter().collect();

    Ok(Identity {
        user_id: user.id,
        email: user.email.clone(),
        role: role.name,
        permissions,
        method,
    })
}
