/*
 * Responsibility
 * - Users の request/response DTO
 * - validate() は field ごとのメッセージを Validator に集める
 */
use serde::{Deserialize, Serialize};

use crate::api::v1::validator::{Validator, validate_email, validate_password_plaintext};
use crate::models::{PermissionSet, User};
use crate::services::auth::TokenIssuer;

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        let mut v = Validator::new();
        v.check(!self.name.is_empty(), "name", "must be provided");
        v.check(
            self.name.len() <= 500,
            "name",
            "must not be more than 500 bytes long",
        );
        validate_email(&mut v, &self.email);
        validate_password_plaintext(&mut v, &self.password);
        v.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct ActivateUserRequest {
    #[serde(default)]
    pub token: String,
}

impl ActivateUserRequest {
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        let mut v = Validator::new();
        if let Err(message) = TokenIssuer::validate_plaintext(&self.token) {
            v.add_error("token", message);
        }
        v.finish()
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub permissions: PermissionSet,
}
