//! The credential store seam.
//!
//! The authentication pipeline consumes user, role, and permission records
//! but never owns them. [`CredentialStore`] captures exactly the lookup and
//! mutation operations the pipeline needs, so handlers and the dispatcher
//! stay independent of the backing storage. [`PgStore`] is the production
//! implementation over PostgreSQL; tests use the in-memory store from
//! [`crate::test_utils`].

use crate::{
    db::{
        errors::Result,
        handlers::{Roles, Users},
        models::{
            roles::RoleDBResponse,
            users::{UserCreateDBRequest, UserDBResponse, UserPasswordUpdateDBRequest},
        },
    },
    types::{RoleId, UserId},
};
use sqlx::PgPool;

#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by a normalized email address, restricted to active
    /// email records.
    async fn find_by_active_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Create a user. An unknown or absent role id resolves to the default
    /// role; the created user always has exactly one role.
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    async fn list_users(&self) -> Result<Vec<UserDBResponse>>;

    async fn confirm_user(&self, id: UserId) -> Result<()>;

    async fn update_password(&self, id: UserId, request: &UserPasswordUpdateDBRequest) -> Result<()>;

    /// Rotate the user's token secret. The write must be durable before
    /// this returns: every previously issued token fails verification
    /// afterwards.
    async fn rotate_token_secret(&self, id: UserId, token_secret: &str) -> Result<()>;

    async fn role_by_id(&self, id: RoleId) -> Result<Option<RoleDBResponse>>;

    async fn role_by_name(&self, name: &str) -> Result<Option<RoleDBResponse>>;

    async fn default_role(&self) -> Result<RoleDBResponse>;

    async fn permissions_for_role(&self, id: RoleId) -> Result<Vec<String>>;
}

/// PostgreSQL-backed credential store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Seed the permission registry and role catalog (idempotent).
    pub async fn initialize_catalog(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Roles::new(&mut conn).initialize().await
    }
}

#[async_trait::async_trait]
impl CredentialStore for PgStore {
    async fn find_by_active_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_by_active_email(email).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_by_id(id).await
    }

    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).create(request).await
    }

    async fn list_users(&self) -> Result<Vec<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).list().await
    }

    async fn confirm_user(&self, id: UserId) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).confirm(id).await
    }

    async fn update_password(&self, id: UserId, request: &UserPasswordUpdateDBRequest) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).update_password(id, request).await
    }

    async fn rotate_token_secret(&self, id: UserId, token_secret: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).rotate_token_secret(id, token_secret).await
    }

    async fn role_by_id(&self, id: RoleId) -> Result<Option<RoleDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Roles::new(&mut conn).get_by_id(id).await
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<RoleDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Roles::new(&mut conn).get_by_name(name).await
    }

    async fn default_role(&self) -> Result<RoleDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Roles::new(&mut conn).default_role().await
    }

    async fn permissions_for_role(&self, id: RoleId) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        Roles::new(&mut conn).permissions_for_role(id).await
    }
}
