//! Authentication API endpoints.

use axum::{extract::State, Json};
use chrono::Utc;

use super::{created, normalize_email, success, ApiResult};
use crate::auth::{
    check_reset_code, generate_reset_code, hash_password, reset_code_expiry, validate_password,
    verify_password, CurrentUser, token_fingerprint,
};
use crate::errors::AppError;
use crate::mail::send_reset_code;
use crate::models::{
    Credentials, ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse,
    RegisterCandidateRequest, RegisterHrRequest, RegisteredResponse, ResetPasswordRequest, Role,
    VerifyCodeRequest,
};
use crate::AppState;

const TOKEN_TYPE: &str = "bearer";

/// Loose shape check: one `@` with a dotted domain and no whitespace.
fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid email address".to_string()))
    }
}

fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    validate_email(email)?;
    validate_password(password)
}

/// POST /auth/register/candidate - Create a candidate account.
pub async fn register_candidate(
    State(state): State<AppState>,
    Json(mut request): Json<RegisterCandidateRequest>,
) -> ApiResult<RegisteredResponse> {
    let email = normalize_email(&request.email);
    validate_registration(&request.name, &email, &request.password)?;
    for skill in &request.skills {
        skill.validate().map_err(AppError::Validation)?;
    }

    if state.repo.email_exists(Role::Candidate, &email).await? {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    let password_hash = hash_password(std::mem::take(&mut request.password)).await?;
    let candidate = state
        .repo
        .create_candidate(&request, &email, &password_hash)
        .await?;
    let access_token = state
        .tokens
        .issue(&candidate.email, Role::Candidate, &candidate.name)?;

    tracing::info!(email = %candidate.email, "Candidate registered");

    created(RegisteredResponse {
        message: "Candidate registered successfully".to_string(),
        access_token,
        token_type: TOKEN_TYPE,
        user_id: candidate.id,
    })
}

/// POST /auth/register/hr - Create an HR account.
pub async fn register_hr(
    State(state): State<AppState>,
    Json(mut request): Json<RegisterHrRequest>,
) -> ApiResult<RegisteredResponse> {
    let email = normalize_email(&request.email);
    validate_registration(&request.name, &email, &request.password)?;

    if state.repo.email_exists(Role::Hr, &email).await? {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    let password_hash = hash_password(std::mem::take(&mut request.password)).await?;
    let hr = state.repo.create_hr(&request, &email, &password_hash).await?;
    let access_token = state.tokens.issue(&hr.email, Role::Hr, &hr.name)?;

    tracing::info!(email = %hr.email, "HR user registered");

    created(RegisteredResponse {
        message: "HR registered successfully".to_string(),
        access_token,
        token_type: TOKEN_TYPE,
        user_id: hr.id,
    })
}

/// POST /auth/login - Exchange credentials for an access token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let role = Role::from_login(&request.role);
    let email = normalize_email(&request.email);

    let credentials = state
        .repo
        .get_credentials(role, &email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Incorrect email".to_string()))?;

    if !verify_password(request.password, credentials.password_hash.clone()).await {
        tracing::info!(email = %email, "Rejected login with wrong password");
        return Err(AppError::Unauthorized("Incorrect password".to_string()));
    }

    let access_token = state
        .tokens
        .issue(&credentials.email, role, &credentials.name)?;

    success(LoginResponse {
        access_token,
        token_type: TOKEN_TYPE,
        role: role.as_str().to_string(),
        email: credentials.email,
        name: credentials.name,
    })
}

async fn find_user(state: &AppState, role: Role, email: &str) -> Result<Credentials, AppError> {
    state
        .repo
        .get_credentials(role, email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// POST /auth/forgot-password - Email a one-time reset code.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<MessageResponse> {
    let role = Role::from_login(&request.role);
    let email = normalize_email(&request.email);
    let user = find_user(&state, role, &email).await?;

    let code = generate_reset_code();
    let expires_at = reset_code_expiry(Utc::now()).to_rfc3339();
    state
        .repo
        .set_reset_code(role, &user.email, &code, &expires_at)
        .await?;

    send_reset_code(state.mailer.as_ref(), &user.email, &code).await;

    success(MessageResponse::new("Reset code sent to email"))
}

/// POST /auth/verify-reset-code - Check a reset code without consuming it.
pub async fn verify_reset_code(
    State(state): State<AppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> ApiResult<MessageResponse> {
    let role = Role::from_login(&request.role);
    let user = find_user(&state, role, &normalize_email(&request.email)).await?;

    check_reset_code(
        user.reset_code.as_deref(),
        user.reset_code_expiry.as_deref(),
        request.code.trim(),
        Utc::now(),
    )
    .into_result()?;

    success(MessageResponse::new("Code verified successfully"))
}

/// POST /auth/reset-password - Set a new password using a reset code.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<MessageResponse> {
    let role = Role::from_login(&request.role);
    let user = find_user(&state, role, &normalize_email(&request.email)).await?;

    check_reset_code(
        user.reset_code.as_deref(),
        user.reset_code_expiry.as_deref(),
        request.code.trim(),
        Utc::now(),
    )
    .into_result()?;
    validate_password(&request.new_password)?;

    let password_hash = hash_password(request.new_password).await?;
    state
        .repo
        .reset_password(role, &user.email, &password_hash)
        .await?;

    tracing::info!(email = %user.email, "Password reset");
    success(MessageResponse::new("Password reset successfully"))
}

/// POST /auth/logout - Revoke the bearer token.
pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> ApiResult<MessageResponse> {
    state
        .repo
        .blacklist_token(&token_fingerprint(&user.token))
        .await?;

    success(MessageResponse::new(format!(
        "Logout successful for {}",
        user.email
    )))
}
