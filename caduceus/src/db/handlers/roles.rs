//! Database repository for roles and the application-permission registry.

use crate::{
    db::{
        errors::{DbError, Result},
        models::roles::{APP_PERMISSIONS, ROLE_CATALOG, RoleDBResponse},
    },
    types::RoleId,
};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

pub struct Roles<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Roles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: RoleId) -> Result<Option<RoleDBResponse>> {
        let role = sqlx::query_as::<_, RoleDBResponse>("SELECT id, name, level, is_default FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(role)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<RoleDBResponse>> {
        let role = sqlx::query_as::<_, RoleDBResponse>("SELECT id, name, level, is_default FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(role)
    }

    /// The role flagged `is_default = TRUE`. The catalog guarantees exactly
    /// one such row once seeded.
    #[instrument(skip(self), err)]
    pub async fn default_role(&mut self) -> Result<RoleDBResponse> {
        let role = sqlx::query_as::<_, RoleDBResponse>("SELECT id, name, level, is_default FROM roles WHERE is_default = TRUE")
            .fetch_optional(&mut *self.db)
            .await?;

        role.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), err)]
    pub async fn permissions_for_role(&mut self, id: RoleId) -> Result<Vec<String>> {
        let permissions = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.name
            FROM app_permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(permissions)
    }

    /// Seed the fixed permission registry and role catalog. Idempotent:
    /// existing rows are updated in place, grants are added but never
    /// removed.
    #[instrument(skip(self), err)]
    pub async fn initialize(&mut self) -> Result<()> {
        let mut tx = self.db.begin().await?;

        for name in APP_PERMISSIONS {
            sqlx::query("INSERT INTO app_permissions (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        for role in ROLE_CATALOG {
            sqlx::query(
                r#"
                INSERT INTO roles (name, level, is_default)
                VALUES ($1, $2, $3)
                ON CONFLICT (name) DO UPDATE SET level = EXCLUDED.level, is_default = EXCLUDED.is_default
                "#,
            )
            .bind(role.name)
            .bind(role.level)
            .bind(role.is_default)
            .execute(&mut *tx)
            .await?;

            let role_id = sqlx::query_scalar::<_, RoleId>("SELECT id FROM roles WHERE name = $1")
                .bind(role.name)
                .fetch_one(&mut *tx)
                .await?;

            for permission in role.permissions {
                sqlx::query(
                    r#"
                    INSERT INTO role_permissions (role_id, permission_id)
                    SELECT $1, id FROM app_permissions WHERE name = $2
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(role_id)
                .bind(permission)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
