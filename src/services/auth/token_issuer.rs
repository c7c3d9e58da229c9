//! Opaque bearer tokens for activation and authentication.
//!
//! A token is 16 bytes from the OS CSPRNG, base32 encoded without padding
//! (26 characters). Only `sha256(plaintext)` is persisted; resolution hashes the
//! presented plaintext and looks up `(hash, scope, expiry > now)`.
//! Every store call is bounded by `store_timeout`.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{Duration as ChronoDuration, Utc};
use data_encoding::BASE32_NOPAD;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    models::{Scope, Token, User},
    repos::{RepoError, TokenStore},
};

/// Length of the base32 plaintext produced for 16 random bytes.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

const TOKEN_ENTROPY_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum TokenError {
    /// No unexpired token with this hash in this scope.
    #[error("token not found")]
    NotFound,
    #[error("token store timed out")]
    Timeout,
    #[error("failed to read random bytes: {0}")]
    Entropy(String),
    #[error("token ttl out of range")]
    InvalidTtl,
    #[error("token store error: {0}")]
    Store(#[source] RepoError),
}

impl From<RepoError> for TokenError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => TokenError::NotFound,
            RepoError::Timeout => TokenError::Timeout,
            other => TokenError::Store(other),
        }
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn TokenStore>,
    store_timeout: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn TokenStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Generate, persist and return a token. The returned value is the only
    /// place the plaintext ever exists.
    pub async fn issue(
        &self,
        user_id: Uuid,
        ttl: Duration,
        scope: Scope,
    ) -> Result<Token, TokenError> {
        let ttl = ChronoDuration::from_std(ttl).map_err(|_| TokenError::InvalidTtl)?;
        let plaintext = generate_plaintext()?;

        let token = Token {
            hash: hash_token(&plaintext),
            plaintext,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        };

        debug!(user_id = %user_id, scope = %scope, expiry = %token.expiry, "Issuing token");

        self.bounded(self.store.insert(&token)).await.map_err(|e| {
            error!(user_id = %user_id, scope = %scope, error = ?e, "Failed to insert token");
            e
        })?;

        Ok(token)
    }

    /// Syntactic check only; never touches the store.
    pub fn validate_plaintext(plaintext: &str) -> Result<(), &'static str> {
        if plaintext.is_empty() {
            return Err("must be provided");
        }
        if plaintext.len() != TOKEN_PLAINTEXT_LEN {
            return Err("must be 26 bytes long");
        }
        Ok(())
    }

    /// The owner of an unexpired token of `scope`. Unknown, expired and
    /// wrong-scope tokens all yield `TokenError::NotFound`.
    pub async fn resolve(&self, scope: Scope, plaintext: &str) -> Result<User, TokenError> {
        let hash = hash_token(plaintext);
        self.bounded(self.store.lookup(&hash, scope, Utc::now()))
            .await
    }

    pub async fn delete_all_for_scope(
        &self,
        scope: Scope,
        user_id: Uuid,
    ) -> Result<u64, TokenError> {
        let deleted = self
            .bounded(self.store.delete_all_for_scope(scope, user_id))
            .await?;

        debug!(user_id = %user_id, scope = %scope, deleted, "Deleted tokens");
        Ok(deleted)
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, TokenError>
    where
        F: Future<Output = Result<T, RepoError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(TokenError::from),
            Err(_) => Err(TokenError::Timeout),
        }
    }
}

fn generate_plaintext() -> Result<String, TokenError> {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::Entropy(e.to_string()))?;

    Ok(BASE32_NOPAD.encode(&bytes))
}

/// sha256(plaintext) -> raw 32 bytes (stored as BYTEA)
pub fn hash_token(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::repos::{MemoryStore, RepoResult, UserStore};

    const HOUR: Duration = Duration::from_secs(3600);

    async fn issuer_with_user() -> (TokenIssuer, User) {
        let store = Arc::new(MemoryStore::new());
        let mut user = User::new("Alice", "alice@example.com");
        user.password.set("pa55word-long").unwrap();
        UserStore::insert(store.as_ref(), &mut user).await.unwrap();

        (TokenIssuer::new(store, Duration::from_secs(1)), user)
    }

    #[tokio::test]
    async fn issued_plaintext_is_26_base32_chars() {
        let (issuer, user) = issuer_with_user().await;

        let token = issuer
            .issue(user.id, HOUR, Scope::Authentication)
            .await
            .unwrap();

        assert_eq!(token.plaintext.len(), TOKEN_PLAINTEXT_LEN);
        assert!(
            token
                .plaintext
                .chars()
                .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c))
        );
        assert_eq!(token.hash, hash_token(&token.plaintext));
        assert!(TokenIssuer::validate_plaintext(&token.plaintext).is_ok());
    }

    #[tokio::test]
    async fn two_issues_never_collide() {
        let (issuer, user) = issuer_with_user().await;

        let a = issuer.issue(user.id, HOUR, Scope::Activation).await.unwrap();
        let b = issuer.issue(user.id, HOUR, Scope::Activation).await.unwrap();

        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hash, b.hash);
    }

    #[tokio::test]
    async fn resolve_is_scoped() {
        let (issuer, user) = issuer_with_user().await;
        let token = issuer.issue(user.id, HOUR, Scope::Activation).await.unwrap();

        let owner = issuer
            .resolve(Scope::Activation, &token.plaintext)
            .await
            .unwrap();
        assert_eq!(owner.id, user.id);

        assert!(matches!(
            issuer
                .resolve(Scope::Authentication, &token.plaintext)
                .await,
            Err(TokenError::NotFound)
        ));
    }

    #[tokio::test]
    async fn zero_ttl_token_is_already_expired() {
        let (issuer, user) = issuer_with_user().await;
        let token = issuer
            .issue(user.id, Duration::ZERO, Scope::Authentication)
            .await
            .unwrap();

        assert!(matches!(
            issuer
                .resolve(Scope::Authentication, &token.plaintext)
                .await,
            Err(TokenError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_all_for_scope_revokes_resolution() {
        let (issuer, user) = issuer_with_user().await;
        let auth = issuer
            .issue(user.id, HOUR, Scope::Authentication)
            .await
            .unwrap();
        let activation = issuer.issue(user.id, HOUR, Scope::Activation).await.unwrap();

        let deleted = issuer
            .delete_all_for_scope(Scope::Authentication, user.id)
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        assert!(
            issuer
                .resolve(Scope::Authentication, &auth.plaintext)
                .await
                .is_err()
        );
        assert!(
            issuer
                .resolve(Scope::Activation, &activation.plaintext)
                .await
                .is_ok()
        );
    }

    #[test]
    fn validate_plaintext_checks_presence_then_length() {
        assert_eq!(
            TokenIssuer::validate_plaintext(""),
            Err("must be provided")
        );
        assert_eq!(
            TokenIssuer::validate_plaintext("ABC"),
            Err("must be 26 bytes long")
        );
        assert_eq!(
            TokenIssuer::validate_plaintext("ABCDEFGHIJKLMNOPQRSTUVWXYZ"),
            Ok(())
        );
    }

    struct SlowStore;

    #[async_trait]
    impl TokenStore for SlowStore {
        async fn insert(&self, _token: &Token) -> RepoResult<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn lookup(
            &self,
            _hash: &[u8],
            _scope: Scope,
            _now: DateTime<Utc>,
        ) -> RepoResult<User> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(RepoError::NotFound)
        }

        async fn delete_all_for_scope(&self, _scope: Scope, _user_id: Uuid) -> RepoResult<u64> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(0)
        }
    }

    #[tokio::test]
    async fn slow_store_surfaces_timeout() {
        let issuer = TokenIssuer::new(Arc::new(SlowStore), Duration::from_millis(20));

        assert!(matches!(
            issuer
                .resolve(Scope::Authentication, "ABCDEFGHIJKLMNOPQRSTUVWXYZ")
                .await,
            Err(TokenError::Timeout)
        ));
        assert!(matches!(
            issuer.issue(Uuid::new_v4(), HOUR, Scope::Activation).await,
            Err(TokenError::Timeout)
        ));
    }
}
