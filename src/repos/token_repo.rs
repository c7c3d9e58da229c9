/*
 * Responsibility
 * - tokens テーブル向け SQLx 操作
 * - only the SHA-256 hash is stored; the plaintext never reaches the DB
 * - user_id FK is ON DELETE CASCADE
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{Scope, Token, User},
    repos::{RepoError, RepoResult, TokenStore, user_repo::UserRow},
};

#[derive(Clone)]
pub struct TokenRepo {
    db: PgPool,
}

impl TokenRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for TokenRepo {
    async fn insert(&self, token: &Token) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tokens (hash, user_id, expiry, scope)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.hash)
        .bind(token.user_id)
        .bind(token.expiry)
        .bind(token.scope.as_str())
        .execute(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(())
    }

    async fn lookup(&self, hash: &[u8], scope: Scope, now: DateTime<Utc>) -> RepoResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT users.id, users.created_at, users.name, users.email,
                   users.password_hash, users.activated, users.version
            FROM users
            INNER JOIN tokens ON users.id = tokens.user_id
            WHERE tokens.hash = $1
              AND tokens.scope = $2
              AND tokens.expiry > $3
            "#,
        )
        .bind(hash)
        .bind(scope.as_str())
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        row.map(User::from).ok_or(RepoError::NotFound)
    }

    async fn delete_all_for_scope(&self, scope: Scope, user_id: Uuid) -> RepoResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM tokens
            WHERE scope = $1 AND user_id = $2
            "#,
        )
        .bind(scope.as_str())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(result.rows_affected())
    }
}
