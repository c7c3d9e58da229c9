/**
 * Responsibility
 * - repo が上位に伝える意味の定義
 * - NotFound / DuplicateEmail / EditConflict are part of the store contracts;
 *   everything else is an opaque backend failure
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("edit conflict")]
    EditConflict,
    #[error("password hash is not set")]
    MissingPasswordHash,
    #[error("store operation timed out")]
    Timeout,
    #[error("db error")]
    Db(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

const UNIQUE_VIOLATION: &str = "23505";
const USERS_EMAIL_KEY: &str = "users_email_key";

impl RepoError {
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(dbe) = &e
            && dbe.code().as_deref() == Some(UNIQUE_VIOLATION)
            && dbe.constraint() == Some(USERS_EMAIL_KEY)
        {
            return RepoError::DuplicateEmail;
        }
        if let sqlx::Error::RowNotFound = e {
            return RepoError::NotFound;
        }
        RepoError::Db(e)
    }
}
