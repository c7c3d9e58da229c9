/*
 * Responsibility
 * - permissions / users_permissions 向け SQLx 操作
 * - permission codes are seeded by migration; users only reference them
 */
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::PermissionSet,
    repos::{PermissionStore, RepoError, RepoResult},
};

#[derive(Clone)]
pub struct PermissionRepo {
    db: PgPool,
}

impl PermissionRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionStore for PermissionRepo {
    async fn get_all_for_user(&self, user_id: Uuid) -> RepoResult<PermissionSet> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT permissions.code
            FROM permissions
            INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
            WHERE users_permissions.user_id = $1
            ORDER BY permissions.code
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(PermissionSet::new(codes))
    }

    async fn add_for_user(&self, user_id: Uuid, codes: &[&'static str]) -> RepoResult<()> {
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO users_permissions (user_id, permission_id)
            SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(codes)
        .execute(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(())
    }
}
