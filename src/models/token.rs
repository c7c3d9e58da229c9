use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purpose tag of an opaque token. A token issued for one scope never
/// resolves under another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Authentication => "authentication",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown token scope: {0}")]
pub struct UnknownScope(pub String);

impl FromStr for Scope {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activation" => Ok(Self::Activation),
            "authentication" => Ok(Self::Authentication),
            other => Err(UnknownScope(other.to_string())),
        }
    }
}

/// An issued bearer credential.
///
/// `plaintext` exists only in the value returned to the caller at issue time;
/// stores persist `hash`, `user_id`, `expiry` and `scope`.
#[derive(Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: Uuid,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: Scope,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the plaintext
        f.debug_struct("Token")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}
