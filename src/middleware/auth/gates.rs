//! Per-route authorization gates.
//!
//! `activated()` admits activated users only. `permitted(code)` runs the same
//! activation check first and then looks up `code` in the caller's
//! permissions, fetched fresh for every request.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, FromFnLayer, Next},
    response::Response,
};
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Identity, PermissionSet, User},
    repos::PermissionStore,
    state::AppState,
};

/// Anonymous → AuthenticationRequired; not activated → InactiveAccount.
pub fn check_activated(identity: &Identity) -> Result<&User, AppError> {
    let user = identity.user().ok_or(AppError::AuthenticationRequired)?;
    if !user.activated {
        return Err(AppError::InactiveAccount);
    }
    Ok(user)
}

/// Fetches the user's permissions fresh, bounded by `store_timeout`.
pub async fn load_permissions(
    permissions: &dyn PermissionStore,
    user_id: Uuid,
    store_timeout: Duration,
) -> Result<PermissionSet, AppError> {
    match tokio::time::timeout(store_timeout, permissions.get_all_for_user(user_id)).await {
        Ok(Ok(set)) => Ok(set),
        Ok(Err(err)) => {
            error!(%user_id, error = ?err, "Failed to load permissions");
            Err(AppError::Internal)
        }
        Err(_) => {
            error!(%user_id, "Loading permissions timed out");
            Err(AppError::Internal)
        }
    }
}

pub async fn check_permission(
    permissions: &dyn PermissionStore,
    user: &User,
    code: &str,
    store_timeout: Duration,
) -> Result<(), AppError> {
    let granted = load_permissions(permissions, user.id, store_timeout).await?;

    if !granted.includes(code) {
        debug!(user_id = %user.id, code, "Permission denied");
        return Err(AppError::NotPermitted);
    }
    Ok(())
}

fn identity_of(req: &Request<Body>) -> Identity {
    req.extensions().get::<Identity>().cloned().unwrap_or_default()
}

pub async fn require_activated_user(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    check_activated(&identity_of(&req))?;
    Ok(next.run(req).await)
}

/// State for one `require_permission` gate.
#[derive(Clone)]
pub struct PermissionGate {
    permissions: Arc<dyn PermissionStore>,
    code: &'static str,
    store_timeout: Duration,
}

pub async fn require_permission(
    State(gate): State<PermissionGate>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = identity_of(&req);
    let user = check_activated(&identity)?;

    check_permission(gate.permissions.as_ref(), user, gate.code, gate.store_timeout).await?;
    Ok(next.run(req).await)
}

type GateFuture = Pin<Box<dyn Future<Output = Result<Response, AppError>> + Send>>;
type ActivatedFn = fn(Request<Body>, Next) -> GateFuture;
type PermittedFn = fn(State<PermissionGate>, Request<Body>, Next) -> GateFuture;

/// Layer for routes that need an activated account.
pub fn activated() -> FromFnLayer<ActivatedFn, (), (Request<Body>,)> {
    let gate: ActivatedFn = |req, next| Box::pin(require_activated_user(req, next));
    middleware::from_fn(gate)
}

/// Layer for routes that need the permission `code`.
pub fn permitted(
    state: &AppState,
    code: &'static str,
) -> FromFnLayer<PermittedFn, PermissionGate, (State<PermissionGate>, Request<Body>)> {
    let gate = PermissionGate {
        permissions: Arc::clone(&state.permissions),
        code,
        store_timeout: state.config.store_timeout,
    };
    let check: PermittedFn = |gate, req, next| Box::pin(require_permission(gate, req, next));
    middleware::from_fn_with_state(gate, check)
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::repos::{MockPermissionStore, RepoError};

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn user(activated: bool) -> User {
        let mut user = User::new("Alice", "alice@example.com");
        user.id = uuid::Uuid::new_v4();
        user.activated = activated;
        user
    }

    #[test]
    fn anonymous_needs_authentication() {
        assert!(matches!(
            check_activated(&Identity::Anonymous),
            Err(AppError::AuthenticationRequired)
        ));
    }

    #[test]
    fn inactive_user_is_refused() {
        assert!(matches!(
            check_activated(&Identity::User(user(false))),
            Err(AppError::InactiveAccount)
        ));
        assert!(check_activated(&Identity::User(user(true))).is_ok());
    }

    #[tokio::test]
    async fn permission_is_fetched_and_checked() {
        let alice = user(true);
        let mut store = MockPermissionStore::new();
        store
            .expect_get_all_for_user()
            .with(eq(alice.id))
            .times(2)
            .returning(|_| Ok(["movie:read"].into_iter().collect::<PermissionSet>()));

        assert!(check_permission(&store, &alice, "movie:read", TIMEOUT).await.is_ok());
        assert!(matches!(
            check_permission(&store, &alice, "movie:delete", TIMEOUT).await,
            Err(AppError::NotPermitted)
        ));
    }

    #[tokio::test]
    async fn store_failure_is_an_internal_error() {
        let alice = user(true);
        let mut store = MockPermissionStore::new();
        store
            .expect_get_all_for_user()
            .returning(|_| Err(RepoError::Timeout));

        assert!(matches!(
            check_permission(&store, &alice, "movie:read", TIMEOUT).await,
            Err(AppError::Internal)
        ));
    }
}
