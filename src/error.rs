/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body / WWW-Authenticate)
 * - RepoError / TokenError / PasswordError を統一的に変換 (500 系は変換時にログ)
 */
use std::collections::BTreeMap;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::repos::RepoError;
use crate::services::auth::{password::PasswordError, token_issuer::TokenError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("the request contains invalid fields")]
    FailedValidation(FieldErrors),
    #[error("the requested resource could not be found")]
    NotFound,
    #[error("the method is not supported for this resource")]
    MethodNotAllowed,
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,
    #[error("invalid authentication credentials")]
    InvalidCredentials,
    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,
    #[error("your user account must be activated to access this resource")]
    InactiveAccount,
    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("the server encountered a problem and could not process your request")]
    Internal,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn failed_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.into(), message.into());
        Self::FailedValidation(fields)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::EditConflict => StatusCode::CONFLICT,
            AppError::InvalidCredentials
            | AppError::InvalidAuthenticationToken
            | AppError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            AppError::InactiveAccount | AppError::NotPermitted => StatusCode::FORBIDDEN,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::FailedValidation(_) => "FAILED_VALIDATION",
            AppError::NotFound => "NOT_FOUND",
            AppError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            AppError::EditConflict => "EDIT_CONFLICT",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::InvalidAuthenticationToken => "INVALID_AUTHENTICATION_TOKEN",
            AppError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            AppError::InactiveAccount => "INACTIVE_ACCOUNT",
            AppError::NotPermitted => "NOT_PERMITTED",
            AppError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AppError::Internal => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.to_string();
        let bearer_challenge = matches!(self, AppError::InvalidAuthenticationToken);

        let fields = match self {
            AppError::FailedValidation(fields) => Some(fields),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                fields,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if bearer_challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => AppError::NotFound,
            RepoError::EditConflict => AppError::EditConflict,
            RepoError::DuplicateEmail => AppError::failed_validation(
                "email",
                "a user with this email address already exists",
            ),
            other => {
                error!(error = ?other, "Store operation failed");
                AppError::Internal
            }
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        error!(error = ?e, "Token operation failed");
        AppError::Internal
    }
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        error!(error = ?e, "Password operation failed");
        AppError::Internal
    }
}
