//! Bearer-token authentication.
//!
//! Handlers declare the caller they need through extractors: [`CurrentUser`] for any
//! signed-in account, [`CandidateAuth`] and [`HrAuth`] for role-restricted routes.

mod password;
mod token;

pub use password::*;
pub use token::*;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::Role;
use crate::AppState;

const INVALID_CREDENTIALS: &str = "Could not validate credentials";

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Raw bearer token, kept for logout
    pub token: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let claims = state
            .tokens
            .decode(&token)
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if state
            .repo
            .is_token_blacklisted(&token_fingerprint(&token))
            .await?
        {
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        Ok(CurrentUser {
            email: claims.sub,
            name: claims.name,
            role: claims.role,
            token,
        })
    }
}

/// A caller signed in with a candidate account.
#[derive(Debug, Clone)]
pub struct CandidateAuth(pub CurrentUser);

impl FromRequestParts<AppState> for CandidateAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Candidate {
            return Err(AppError::Forbidden(
                "Not authorized. Candidate access required.".to_string(),
            ));
        }
        Ok(CandidateAuth(user))
    }
}

/// A caller signed in with an HR account.
#[derive(Debug, Clone)]
pub struct HrAuth(pub CurrentUser);

impl FromRequestParts<AppState> for HrAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Hr {
            return Err(AppError::Forbidden(
                "Not authorized. HR access required.".to_string(),
            ));
        }
        Ok(HrAuth(user))
    }
}

/// Perform constant-time string comparison.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    a_bytes.ct_eq(b_bytes).into()
}
