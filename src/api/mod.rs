//! REST API module.
//!
//! Handlers return the `{"success": true, "data": ...}` envelope on success and
//! [`AppError`](crate::errors::AppError) otherwise.

mod applications;
mod auth;
mod candidates;
mod hr;
mod jobs;
mod matching;
mod uploads;

pub use applications::*;
pub use auth::*;
pub use candidates::*;
pub use hr::*;
pub use jobs::*;
pub use matching::*;
pub use uploads::PROFILE_PICTURE_DIR;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            status: StatusCode::OK,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::new(data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// 200 response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// 201 response.
pub fn created<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::created(data))
}

/// Canonical form of an email address used as an account key.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Reject a path ID that cannot name a record.
pub(crate) fn require_valid_id(id: &str, message: &str) -> Result<(), AppError> {
    if crate::models::is_valid_id(id) {
        Ok(())
    } else {
        Err(AppError::BadRequest(message.to_string()))
    }
}

/// `top_n` query parameter within `1..=max`, or `default` when absent.
pub(crate) fn bounded_top_n(value: Option<usize>, default: usize, max: usize) -> Result<usize, AppError> {
    match value {
        None => Ok(default),
        Some(n) if (1..=max).contains(&n) => Ok(n),
        Some(_) => Err(AppError::Validation(format!(
            "top_n must be between 1 and {}",
            max
        ))),
    }
}
