//! Password hashing (Argon2id, PHC string format).
//!
//! Parameters are the `argon2` crate defaults (m = 19 MiB, t = 2, p = 1) with a
//! fresh 16-byte salt from the OS RNG per call. The parameters are encoded in
//! the PHC string, so verification keeps working if the defaults change later.

use std::{fmt, sync::OnceLock};

use argon2::{
    Argon2,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hash is not set")]
    Unset,
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    Malformed(String),
    #[error("password hashing task failed: {0}")]
    Task(String),
}

/// Holds only the derived hash of a user's password.
#[derive(Clone, Default)]
pub struct PasswordCredential {
    hash: Option<String>,
}

impl fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredential")
            .field("is_set", &self.hash.is_some())
            .finish()
    }
}

impl PasswordCredential {
    /// Wrap a hash loaded from storage.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
        }
    }

    /// Hash `plaintext` and keep the result. The plaintext is not retained.
    pub fn set(&mut self, plaintext: &str) -> Result<(), PasswordError> {
        self.hash = Some(hash_password(plaintext)?);
        Ok(())
    }

    /// `set` on the blocking pool.
    pub async fn set_blocking(&mut self, plaintext: String) -> Result<(), PasswordError> {
        let hash = tokio::task::spawn_blocking(move || hash_password(&plaintext))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))??;
        self.hash = Some(hash);
        Ok(())
    }

    /// `matches` on the blocking pool.
    pub async fn matches_blocking(&self, candidate: String) -> Result<bool, PasswordError> {
        let hash = self.hash()?.to_owned();
        tokio::task::spawn_blocking(move || verify_password(&hash, &candidate))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))?
    }

    pub fn hash(&self) -> Result<&str, PasswordError> {
        self.hash.as_deref().ok_or(PasswordError::Unset)
    }

    pub fn is_set(&self) -> bool {
        self.hash.is_some()
    }

    /// `Ok(false)` for a wrong password; `Err` only when the stored hash is
    /// unset or cannot be parsed.
    pub fn matches(&self, candidate: &str) -> Result<bool, PasswordError> {
        verify_password(self.hash()?, candidate)
    }
}

pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

pub fn verify_password(hash: &str, candidate: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::Malformed(e.to_string()))?;

    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Malformed(e.to_string())),
    }
}

/// Hash used when there is no account to check against. Created on first use
/// so it carries the same parameters as real hashes.
fn placeholder_hash() -> Result<&'static str, PasswordError> {
    static PLACEHOLDER: OnceLock<String> = OnceLock::new();

    if let Some(hash) = PLACEHOLDER.get() {
        return Ok(hash);
    }
    let hash = hash_password("placeholder-credential")?;
    Ok(PLACEHOLDER.get_or_init(|| hash))
}

/// One verification's worth of work against a placeholder hash, on the
/// blocking pool. Login runs this for unknown emails so they take as long as
/// a wrong password.
pub async fn verify_placeholder_blocking(candidate: String) -> Result<(), PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(placeholder_hash()?, &candidate))
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))??;
    Ok(())
}
