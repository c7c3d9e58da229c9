use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::services::auth::password::PasswordCredential;

/// A registered account.
///
/// `id`, `created_at` and `version` are assigned by the store on insert.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: PasswordCredential,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            created_at: Utc::now(),
            name: name.into(),
            email: email.into(),
            password: PasswordCredential::default(),
            activated: false,
            version: 0,
        }
    }
}

/// Who is calling: attached to request extensions by the access middleware.
#[derive(Debug, Clone, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    User(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::User(user) => Some(user),
        }
    }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self::User(user)
    }
}
