//! Password policy, hashing and password-reset codes.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use super::constant_time_compare;
use crate::errors::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

pub const RESET_CODE_LENGTH: usize = 6;
pub const RESET_CODE_EXPIRY_MINUTES: i64 = 15;

/// Check the length policy. Lengths are counted in characters.
pub fn validate_password(password: &str) -> Result<(), AppError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must not exceed {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Hash a password into an Argon2id PHC string.
///
/// Runs on the blocking pool since Argon2 is deliberately slow.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

/// Verify a password against a stored PHC string. A malformed hash never matches.
pub async fn verify_password(password: String, password_hash: String) -> bool {
    tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&password_hash) else {
            tracing::warn!("Stored password hash is malformed");
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .unwrap_or(false)
}

/// Generate a numeric reset code.
pub fn generate_reset_code() -> String {
    let mut rng = rand::rng();
    (0..RESET_CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Expiry timestamp for a code issued at `now`.
pub fn reset_code_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(RESET_CODE_EXPIRY_MINUTES)
}

/// Outcome of checking a submitted reset code against the stored one.
#[derive(Debug, PartialEq, Eq)]
pub enum ResetCodeCheck {
    Valid,
    NoRequest,
    Invalid,
    Expired,
}

impl ResetCodeCheck {
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            ResetCodeCheck::Valid => Ok(()),
            ResetCodeCheck::NoRequest => {
                Err(AppError::BadRequest("No reset request found".to_string()))
            }
            ResetCodeCheck::Invalid => Err(AppError::BadRequest("Invalid code".to_string())),
            ResetCodeCheck::Expired => Err(AppError::BadRequest("Code expired".to_string())),
        }
    }
}

/// Compare a submitted code with the stored code and expiry.
pub fn check_reset_code(
    stored_code: Option<&str>,
    stored_expiry: Option<&str>,
    submitted: &str,
    now: DateTime<Utc>,
) -> ResetCodeCheck {
    let (Some(code), Some(expiry)) = (stored_code, stored_expiry) else {
        return ResetCodeCheck::NoRequest;
    };

    if !constant_time_compare(code, submitted) {
        return ResetCodeCheck::Invalid;
    }

    match DateTime::parse_from_rfc3339(expiry) {
        Ok(expires_at) if now <= expires_at.with_timezone(&Utc) => ResetCodeCheck::Valid,
        _ => ResetCodeCheck::Expired,
    }
}
