//! Authentication request and response bodies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub role: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub role: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredResponse {
    pub message: String,
    pub access_token: String,
    pub token_type: &'static str,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub role: String,
    pub email: String,
    pub name: String,
}

/// Login and password-reset columns of a user row.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub reset_code: Option<String>,
    pub reset_code_expiry: Option<String>,
}
