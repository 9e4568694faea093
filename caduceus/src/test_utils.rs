//! Test utilities: an in-memory credential store and fixtures (available
//! with the `test-utils` feature).

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;

use crate::{
    AppState,
    auth::{password, token},
    config::Config,
    db::{
        errors::{DbError, Result},
        models::{
            roles::{ROLE_CATALOG, RoleDBResponse},
            users::{UserCreateDBRequest, UserDBResponse, UserPasswordUpdateDBRequest},
        },
    },
    store::CredentialStore,
    types::{RoleId, UserId},
};

/// Standard test configuration (no database, fixed secret).
pub fn test_config() -> Config {
    Config {
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Config::default()
    }
}

/// HTTP Basic authorization header value for `email:password`.
pub fn basic_header(email: &str, password: &str) -> String {
    format!("Basic {}", general_purpose::STANDARD.encode(format!("{email}:{password}")))
}

struct EmailRow {
    user_id: UserId,
    email: String,
    active: bool,
}

#[derive(Default)]
struct MemoryInner {
    users: BTreeMap<UserId, UserDBResponse>,
    emails: Vec<EmailRow>,
    roles: Vec<RoleDBResponse>,
    role_permissions: BTreeMap<RoleId, Vec<String>>,
    next_user_id: UserId,
}

/// In-memory credential store mirroring the semantics of the
/// PostgreSQL-backed one, seeded with the role catalog on construction.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut inner = MemoryInner {
            next_user_id: 1,
            ..Default::default()
        };

        for (index, role) in ROLE_CATALOG.iter().enumerate() {
            let id = index as RoleId + 1;
            inner.roles.push(RoleDBResponse {
                id,
                name: role.name.to_string(),
                level: role.level,
                is_default: role.is_default,
            });
            let mut permissions: Vec<String> = role.permissions.iter().map(|p| p.to_string()).collect();
            permissions.sort();
            inner.role_permissions.insert(id, permissions);
        }

        Self { inner: Mutex::new(inner) }
    }

    /// Deactivate every email record of a user, making it invisible to
    /// Basic-auth lookups.
    pub fn deactivate_email(&self, user_id: UserId) {
        let mut inner = self.inner.lock().unwrap();
        for row in inner.emails.iter_mut().filter(|row| row.user_id == user_id) {
            row.active = false;
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_active_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let inner = self.inner.lock().unwrap();
        let user = inner
            .emails
            .iter()
            .find(|row| row.active && row.email == email)
            .and_then(|row| inner.users.get(&row.user_id))
            .cloned();
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.get(&id).cloned())
    }

    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut inner = self.inner.lock().unwrap();

        if inner.emails.iter().any(|row| row.email == request.email) {
            return Err(DbError::UniqueViolation {
                constraint: Some("email_addresses_email_key".to_string()),
                table: Some("email_addresses".to_string()),
                message: format!("duplicate email {}", request.email),
            });
        }

        // Unknown or absent role ids resolve to the default role
        let role_id = request
            .role_id
            .filter(|id| inner.roles.iter().any(|role| role.id == *id))
            .unwrap_or_else(|| inner.roles.iter().find(|role| role.is_default).expect("catalog seeded").id);

        let id = inner.next_user_id;
        inner.next_user_id += 1;

        let now = Utc::now();
        let user = UserDBResponse {
            id,
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
            password_hash: request.password_hash.clone(),
            previous_password_hash: None,
            confirmed: request.confirmed,
            active: request.active,
            role_id,
            token_secret: request.token_secret.clone(),
            created_at: now,
            updated_at: now,
        };

        inner.users.insert(id, user.clone());
        inner.emails.push(EmailRow {
            user_id: id,
            email: request.email.clone(),
            active: true,
        });

        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<UserDBResponse>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.values().cloned().collect())
    }

    async fn confirm_user(&self, id: UserId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&id).ok_or(DbError::NotFound)?;
        user.confirmed = true;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_password(&self, id: UserId, request: &UserPasswordUpdateDBRequest) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&id).ok_or(DbError::NotFound)?;
        user.previous_password_hash = user.password_hash.take();
        user.password_hash = Some(request.password_hash.clone());
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn rotate_token_secret(&self, id: UserId, token_secret: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&id).ok_or(DbError::NotFound)?;
        user.token_secret = token_secret.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn role_by_id(&self, id: RoleId) -> Result<Option<RoleDBResponse>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.roles.iter().find(|role| role.id == id).cloned())
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<RoleDBResponse>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.roles.iter().find(|role| role.name == name).cloned())
    }

    async fn default_role(&self) -> Result<RoleDBResponse> {
        let inner = self.inner.lock().unwrap();
        inner.roles.iter().find(|role| role.is_default).cloned().ok_or(DbError::NotFound)
    }

    async fn permissions_for_role(&self, id: RoleId) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.role_permissions.get(&id).cloned().unwrap_or_default())
    }
}

/// Fluent builder for seeding test users. The default password is
/// `hunter2`.
pub struct TestUser {
    email: String,
    password: Option<String>,
    confirmed: bool,
    active: bool,
    role: Option<&'static str>,
}

impl TestUser {
    pub fn confirmed(email: &str) -> Self {
        Self {
            email: email.to_string(),
            password: Some("hunter2".to_string()),
            confirmed: true,
            active: true,
            role: None,
        }
    }

    pub fn unconfirmed(email: &str) -> Self {
        Self {
            confirmed: false,
            ..Self::confirmed(email)
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_role(mut self, role: &'static str) -> Self {
        self.role = Some(role);
        self
    }

    /// An unsaved record with placeholder ids, for tests that need a user
    /// the store has never seen.
    pub fn record(&self) -> UserDBResponse {
        let now = Utc::now();
        UserDBResponse {
            id: 0,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: self.email.clone(),
            password_hash: None,
            previous_password_hash: None,
            confirmed: self.confirmed,
            active: self.active,
            role_id: 1,
            token_secret: token::generate_token_secret(),
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create(&self, store: &dyn CredentialStore) -> UserDBResponse {
        let role_id = match self.role {
            Some(name) => Some(store.role_by_name(name).await.unwrap().expect("role exists in catalog").id),
            None => None,
        };
        let password_hash = self.password.as_deref().map(|p| password::hash_string(p).unwrap());

        store
            .create_user(&UserCreateDBRequest {
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: self.email.clone(),
                password_hash,
                confirmed: self.confirmed,
                active: self.active,
                role_id,
                token_secret: token::generate_token_secret(),
            })
            .await
            .expect("Failed to create test user")
    }

    pub async fn create_in(&self, state: &AppState) -> UserDBResponse {
        self.create(state.store.as_ref()).await
    }
}

/// A freshly seeded in-memory store.
pub fn seeded_store() -> MemoryStore {
    MemoryStore::new()
}

/// App state over a fresh seeded in-memory store.
pub async fn seeded_state() -> AppState {
    AppState {
        store: Arc::new(MemoryStore::new()),
        config: test_config(),
    }
}

/// Like [`seeded_state`], but hands back the concrete store for tests
/// that need to mutate it directly.
pub async fn seeded_state_with_store() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        store: store.clone(),
        config: test_config(),
    };
    (state, store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_role_id_falls_back_to_default_role() {
        let store = seeded_store();
        let highest = store.role_by_name("Super Admin").await.unwrap().unwrap().id;

        let user = store
            .create_user(&UserCreateDBRequest {
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: "FALLBACK@EXAMPLE.COM".to_string(),
                password_hash: None,
                confirmed: false,
                active: true,
                role_id: Some(highest + 1),
                token_secret: token::generate_token_secret(),
            })
            .await
            .unwrap();

        let role = store.role_by_id(user.role_id).await.unwrap().unwrap();
        assert!(role.is_default);
        assert_eq!(role.name, "User");
        assert_ne!(user.role_id, highest + 1);
    }

    #[tokio::test]
    async fn test_absent_role_id_resolves_to_default_role() {
        let store = seeded_store();
        let user = TestUser::confirmed("NOROLE@EXAMPLE.COM").create(&store).await;

        let default = store.default_role().await.unwrap();
        assert_eq!(user.role_id, default.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_unique_violation() {
        let store = seeded_store();
        TestUser::confirmed("DUP@EXAMPLE.COM").create(&store).await;

        let result = store
            .create_user(&UserCreateDBRequest {
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: "DUP@EXAMPLE.COM".to_string(),
                password_hash: None,
                confirmed: false,
                active: true,
                role_id: None,
                token_secret: token::generate_token_secret(),
            })
            .await;

        assert!(matches!(result, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_password_update_retains_previous_hash() {
        let store = seeded_store();
        let user = TestUser::confirmed("ROTATE@EXAMPLE.COM").create(&store).await;
        let old_hash = user.password_hash.clone().unwrap();

        store
            .update_password(
                user.id,
                &UserPasswordUpdateDBRequest {
                    password_hash: "new-hash".to_string(),
                },
            )
            .await
            .unwrap();

        let updated = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(updated.password_hash.as_deref(), Some("new-hash"));
        assert_eq!(updated.previous_password_hash.as_deref(), Some(old_hash.as_str()));
    }
}
