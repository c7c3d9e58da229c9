/*
 * Responsibility
 * - users テーブル向け SQLx 操作
 * - email is stored lowercased; the unique index backs DuplicateEmail
 * - update is optimistic on version (EditConflict when the row moved on)
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use crate::{
    models::User,
    repos::{RepoError, RepoResult, UserStore},
    services::auth::password::PasswordCredential,
};

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            name: row.name,
            email: row.email,
            password: PasswordCredential::from_hash(row.password_hash),
            activated: row.activated,
            version: row.version,
        }
    }
}

/// Columns the database fills on insert.
#[derive(Debug, FromRow)]
struct InsertedUser {
    id: Uuid,
    created_at: DateTime<Utc>,
    version: i32,
}

impl InsertedUser {
    fn apply(self, user: &mut User) {
        user.id = self.id;
        user.created_at = self.created_at;
        user.version = self.version;
    }
}

async fn insert_user<'e, E>(executor: E, user: &User) -> RepoResult<InsertedUser>
where
    E: PgExecutor<'e>,
{
    let hash = user
        .password
        .hash()
        .map_err(|_| RepoError::MissingPasswordHash)?;

    sqlx::query_as::<_, InsertedUser>(
        r#"
        INSERT INTO users (name, email, password_hash, activated)
        VALUES ($1, lower($2), $3, $4)
        RETURNING id, created_at, version
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(hash)
    .bind(user.activated)
    .fetch_one(executor)
    .await
    .map_err(RepoError::from_sqlx)
}

#[derive(Clone)]
pub struct UserRepo {
    db: PgPool,
}

impl UserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for UserRepo {
    async fn insert(&self, user: &mut User) -> RepoResult<()> {
        let row = insert_user(&self.db, user).await?;
        row.apply(user);
        Ok(())
    }

    async fn insert_with_permissions(
        &self,
        user: &mut User,
        codes: &[&'static str],
    ) -> RepoResult<()> {
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();

        let mut tx = self.db.begin().await.map_err(RepoError::from_sqlx)?;

        let row = insert_user(&mut *tx, user).await?;

        sqlx::query(
            r#"
            INSERT INTO users_permissions (user_id, permission_id)
            SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
            "#,
        )
        .bind(row.id)
        .bind(codes)
        .execute(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        // Dropping `tx` on any early return rolls the user row back
        tx.commit().await.map_err(RepoError::from_sqlx)?;

        row.apply(user);
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> RepoResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, created_at, name, email, password_hash, activated, version
            FROM users
            WHERE email = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        row.map(User::from).ok_or(RepoError::NotFound)
    }

    async fn update(&self, user: &mut User) -> RepoResult<()> {
        let hash = user
            .password
            .hash()
            .map_err(|_| RepoError::MissingPasswordHash)?;

        let version = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE users
            SET name = $1, email = lower($2), password_hash = $3, activated = $4,
                version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING version
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(hash)
        .bind(user.activated)
        .bind(user.id)
        .bind(user.version)
        .fetch_optional(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        // No row: deleted or someone else bumped the version first
        user.version = version.ok_or(RepoError::EditConflict)?;
        Ok(())
    }
}
