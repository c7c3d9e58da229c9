use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// `Json<T>` whose rejections use the app's error envelope (400 BAD_REQUEST).
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_error(rejection)),
        }
    }
}

fn json_error(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            AppError::bad_request("body must be sent with Content-Type: application/json")
        }
        JsonRejection::JsonSyntaxError(_) => {
            AppError::bad_request("body contains badly-formed JSON")
        }
        JsonRejection::JsonDataError(err) => AppError::bad_request(err.body_text()),
        other => AppError::bad_request(other.body_text()),
    }
}
