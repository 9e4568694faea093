//! Database repository for users.

use crate::{
    db::{
        errors::{DbError, Result},
        models::users::{UserCreateDBRequest, UserDBResponse, UserPasswordUpdateDBRequest},
    },
    types::{RoleId, UserId},
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection, Row};
use tracing::instrument;

// Database entity model: a user row joined with its active email address
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub previous_password_hash: Option<String>,
    pub confirmed: bool,
    pub active: bool,
    pub role_id: RoleId,
    pub token_secret: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            previous_password_hash: user.previous_password_hash,
            confirmed: user.confirmed,
            active: user.active,
            role_id: user.role_id,
            token_secret: user.token_secret,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

const SELECT_USER: &str = r#"
    SELECT u.id, u.first_name, u.last_name, e.email,
           u.password_hash, u.previous_password_hash,
           u.confirmed, u.active, u.role_id, u.token_secret,
           u.created_at, u.updated_at
    FROM users u
    JOIN email_addresses e ON e.user_id = u.id AND e.active = TRUE
"#;

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut tx = self.db.begin().await?;

        // Resolve the role: an unknown or absent id falls back to the default role
        let requested: Option<RoleId> = match request.role_id {
            Some(id) => sqlx::query_scalar::<_, RoleId>("SELECT id FROM roles WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?,
            None => None,
        };
        let role_id = match requested {
            Some(id) => id,
            None => sqlx::query_scalar::<_, RoleId>("SELECT id FROM roles WHERE is_default = TRUE")
                .fetch_one(&mut *tx)
                .await?,
        };

        let row = sqlx::query(
            r#"
            INSERT INTO users (first_name, last_name, password_hash, confirmed, active, role_id, token_secret)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.password_hash)
        .bind(request.confirmed)
        .bind(request.active)
        .bind(role_id)
        .bind(&request.token_secret)
        .fetch_one(&mut *tx)
        .await?;

        let id: UserId = row.get("id");
        let created_at: DateTime<Utc> = row.get("created_at");
        let updated_at: DateTime<Utc> = row.get("updated_at");

        sqlx::query("INSERT INTO email_addresses (user_id, email, active) VALUES ($1, $2, TRUE)")
            .bind(id)
            .bind(&request.email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(UserDBResponse {
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
            created_at,
            updated_at,
        })
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE u.id = $1 ORDER BY e.id LIMIT 1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(UserDBResponse::from))
    }

    /// Look up a user through its email address, restricted to active email
    /// records. Callers are expected to pass an already-normalized address.
    #[instrument(skip(self, email), err)]
    pub async fn get_by_active_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE e.email = $1 LIMIT 1"))
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(UserDBResponse::from))
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<UserDBResponse>> {
        let users = sqlx::query_as::<_, User>(&format!("{SELECT_USER} ORDER BY u.id"))
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(UserDBResponse::from).collect())
    }

    #[instrument(skip(self), err)]
    pub async fn confirm(&mut self, id: UserId) -> Result<()> {
        let result = sqlx::query("UPDATE users SET confirmed = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Replace the password hash, retaining the outgoing hash as the
    /// previous-password hash.
    #[instrument(skip(self, request), err)]
    pub async fn update_password(&mut self, id: UserId, request: &UserPasswordUpdateDBRequest) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET previous_password_hash = password_hash,
                password_hash = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&request.password_hash)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Rotate the per-user token secret. Committing this write invalidates
    /// every token issued under the previous secret.
    #[instrument(skip(self, token_secret), err)]
    pub async fn rotate_token_secret(&mut self, id: UserId, token_secret: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET token_secret = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(token_secret)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
