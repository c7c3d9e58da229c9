/*
 * Responsibility
 * - POST /v1/users (登録), PUT /v1/users/activated (有効化), GET /v1/users/me/permissions
 * - 登録時の activation token 発行と welcome 通知は background task で行う
 * - user 行と初期 permission は同じ transaction で書く (片方だけ残さない)
 */
use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde_json::json;

use crate::{
    api::v1::{
        dto::users::{ActivateUserRequest, PermissionsResponse, RegisterUserRequest, UserResponse},
        extractors::{ApiJson, AuthCtx},
    },
    error::AppError,
    middleware::auth::gates::load_permissions,
    models::{Scope, User},
    services::notifier::USER_WELCOME,
    state::AppState,
};

/// Granted to every newly registered user.
pub const DEFAULT_PERMISSIONS: &[&str] = &["movie:read"];

pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    req.validate()?;

    let mut user = User::new(req.name, req.email);
    user.password.set_blocking(req.password).await?;

    state
        .users
        .insert_with_permissions(&mut user, DEFAULT_PERMISSIONS)
        .await?;

    tracing::info!(user_id = %user.id, "user registered");

    let tokens = state.tokens.clone();
    let notifier = Arc::clone(&state.notifier);
    let ttl = state.config.activation_token_ttl;
    let (user_id, email) = (user.id, user.email.clone());

    state.tasks.spawn(USER_WELCOME, async move {
        let token = tokens.issue(user_id, ttl, Scope::Activation).await?;
        let data = json!({
            "activationToken": token.plaintext,
            "userID": user_id,
        });
        notifier.send(&email, USER_WELCOME, &data).await?;
        Ok(())
    });

    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

pub async fn activate_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ActivateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    req.validate()?;

    let mut user = match state.tokens.resolve(Scope::Activation, &req.token).await {
        Ok(user) => user,
        Err(crate::services::auth::TokenError::NotFound) => {
            return Err(AppError::failed_validation(
                "token",
                "invalid or expired activation token",
            ));
        }
        Err(err) => return Err(err.into()),
    };

    user.activated = true;
    state.users.update(&mut user).await?;

    state
        .tokens
        .delete_all_for_scope(Scope::Activation, user.id)
        .await?;

    tracing::info!(user_id = %user.id, "user activated");
    Ok(Json(UserResponse { user }))
}

pub async fn list_my_permissions(
    State(state): State<AppState>,
    ctx: AuthCtx,
) -> Result<Json<PermissionsResponse>, AppError> {
    let user = ctx.require_user()?;
    let permissions = load_permissions(
        state.permissions.as_ref(),
        user.id,
        state.config.store_timeout,
    )
    .await?;

    Ok(Json(PermissionsResponse { permissions }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::Config,
        models::{Identity, PermissionSet},
        repos::{
            MemoryStore, MockPermissionStore, PermissionStore, RepoResult, UserStore,
        },
        services::notifier::LogNotifier,
        state::Repositories,
    };

    fn state_with(permissions: Arc<dyn PermissionStore>) -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let repos = Repositories {
            users: store.clone(),
            tokens: store.clone(),
            permissions,
            movies: store.clone(),
            pool: None,
        };
        let mut config = Config::default();
        config.store_timeout = Duration::from_millis(50);

        let notifier = Arc::new(LogNotifier::new("test@example.com"));
        (AppState::new(config, repos, notifier), store)
    }

    fn alice() -> RegisterUserRequest {
        RegisterUserRequest {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            password: "pa55word-long".into(),
        }
    }

    #[tokio::test]
    async fn registration_grants_defaults_with_the_user_row() {
        // A broken standalone permission store must not matter to registration
        let mut permissions = MockPermissionStore::new();
        permissions.expect_add_for_user().never();
        let (state, store) = state_with(Arc::new(permissions));

        let (status, Json(body)) = register_user(State(state.clone()), ApiJson(alice()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let granted = PermissionStore::get_all_for_user(store.as_ref(), body.user.id)
            .await
            .unwrap();
        assert!(granted.includes("movie:read"));

        state.tasks.wait_idle(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_registration_adds_no_grants_and_spawns_nothing() {
        let (state, store) = state_with(Arc::new(MemoryStore::new()));

        let mut taken = User::new("Alice", "alice@example.com");
        taken.password.set("pa55word-long").unwrap();
        UserStore::insert(store.as_ref(), &mut taken).await.unwrap();

        assert!(matches!(
            register_user(State(state.clone()), ApiJson(alice())).await,
            Err(AppError::FailedValidation(_))
        ));
        assert_eq!(state.tasks.outstanding(), 0);

        // Only the original row remains, with no stray grants
        let granted = PermissionStore::get_all_for_user(store.as_ref(), taken.id)
            .await
            .unwrap();
        assert!(granted.codes().is_empty());
    }

    struct StalledPermissions;

    #[async_trait]
    impl PermissionStore for StalledPermissions {
        async fn get_all_for_user(&self, _user_id: Uuid) -> RepoResult<PermissionSet> {
            std::future::pending().await
        }

        async fn add_for_user(&self, _user_id: Uuid, _codes: &[&'static str]) -> RepoResult<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn listing_permissions_is_bounded_by_the_store_timeout() {
        let (state, _) = state_with(Arc::new(StalledPermissions));

        let mut user = User::new("Alice", "alice@example.com");
        user.activated = true;
        let ctx = AuthCtx(Identity::User(user));

        assert!(matches!(
            list_my_permissions(State(state), ctx).await,
            Err(AppError::Internal)
        ));
    }
}
