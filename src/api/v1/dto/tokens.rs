use serde::{Deserialize, Serialize};

use crate::api::v1::validator::{Validator, validate_email, validate_password_plaintext};
use crate::error::AppError;
use crate::models::Token;

#[derive(Debug, Deserialize)]
pub struct CreateAuthTokenRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl CreateAuthTokenRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        validate_email(&mut v, &self.email);
        validate_password_plaintext(&mut v, &self.password);
        v.finish()
    }
}

#[derive(Debug, Serialize)]
pub struct AuthTokenResponse {
    pub authentication_token: Token,
}
