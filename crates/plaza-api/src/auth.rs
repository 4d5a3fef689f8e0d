use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use plaza_db::models::UserRow;
use plaza_types::api::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, ProfileResponse,
    RegisterRequest, ResetPasswordRequest, UserResponse, VerifyResetTokenResponse,
};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::tokens;

const FORGOT_PASSWORD_ACK: &str =
    "If an account with that email exists, we have sent a password reset link.";

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.is_empty()
        || req.email.is_empty()
        || req.password.is_empty()
        || req.first_name.is_empty()
        || req.last_name.is_empty()
    {
        return Err(ApiError::Validation("All fields are required".to_string()));
    }

    let email = req.email.to_lowercase();

    // One probe covers both unique fields; the message says which collided.
    if let Some((existing_email, _)) = state.db.find_existing_identity(&email, &req.username)? {
        return Err(if existing_email == email {
            ApiError::DuplicateUser("Email already registered")
        } else {
            ApiError::DuplicateUser("Username already taken")
        });
    }

    let user = UserRow {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        email,
        password: hash_password(&req.password)?,
        first_name: req.first_name,
        last_name: req.last_name,
        last_login: None,
        reset_token_hash: None,
        reset_token_expires: None,
        created_at: Utc::now().to_rfc3339(),
    };
    state.db.create_user(&user)?;

    let public = public_user(&user)?;
    let token = tokens::create_session_token(&state.jwt_secret, public.id, &public.username)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            user: public,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    // Unknown email and wrong password are indistinguishable.
    let user = state
        .db
        .find_user_by_email(&req.email.to_lowercase())?
        .ok_or(ApiError::InvalidCredentials)?;

    verify_password(&req.password, &user.password)?;

    state
        .db
        .touch_last_login(&user.id, &Utc::now().to_rfc3339())?;

    let public = public_user(&user)?;
    let token = tokens::create_session_token(&state.jwt_secret, public.id, &public.username)?;

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        user: public,
        token,
    }))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.is_empty() {
        return Err(ApiError::Validation("Email is required".to_string()));
    }

    // Unknown emails get the same acknowledgment (enumeration safety).
    let Some(user) = state.db.find_user_by_email(&req.email.to_lowercase())? else {
        return Ok(Json(MessageResponse {
            message: FORGOT_PASSWORD_ACK.to_string(),
        }));
    };

    let reset = tokens::issue_reset_token();
    state
        .db
        .set_reset_token(&user.id, &reset.hash, &reset.expires.to_rfc3339())?;

    // Dispatch failure on the request path is surfaced, unlike the
    // confirmation path in reset_password.
    if let Err(e) = state
        .mailer
        .send_password_reset(&user.email, &user.first_name, &reset.plain)
        .await
    {
        warn!("Failed to send reset email to {}: {:#}", user.email, e);
        return Err(ApiError::ServiceUnavailable(
            "Failed to send reset email. Please try again later.",
        ));
    }

    Ok(Json(MessageResponse {
        message: FORGOT_PASSWORD_ACK.to_string(),
    }))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.password.is_empty() || req.confirm_password.is_empty() {
        return Err(ApiError::Validation(
            "Password and confirm password are required".to_string(),
        ));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::Validation("Passwords do not match".to_string()));
    }
    if req.password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    let hashed = tokens::hash_reset_token(&token);
    let user = state
        .db
        .find_user_by_reset_token(&hashed, &Utc::now().to_rfc3339())?
        .ok_or(ApiError::TokenInvalid)?;

    // Password update and token clearing are a single UPDATE.
    let password_hash = hash_password(&req.password)?;
    state
        .db
        .update_password_clearing_reset(&user.id, &password_hash)?;

    // Best-effort: the reset already succeeded, a failed courtesy email
    // must not roll it back.
    if let Err(e) = state
        .mailer
        .send_password_reset_confirmation(&user.email, &user.first_name)
        .await
    {
        warn!(
            "Failed to send reset confirmation to {}: {:#}",
            user.email, e
        );
    }

    Ok(Json(MessageResponse {
        message: "Password has been reset successfully! You can now log in with your new password."
            .to_string(),
    }))
}

pub async fn verify_reset_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let hashed = tokens::hash_reset_token(&token);
    let user = state
        .db
        .find_user_by_reset_token(&hashed, &Utc::now().to_rfc3339())?
        .ok_or(ApiError::TokenInvalid)?;

    Ok(Json(VerifyResetTokenResponse {
        message: "Token is valid".to_string(),
        email: mask_email(&user.email),
    }))
}

pub async fn profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .find_user_by_id(&user.id.to_string())?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(ProfileResponse {
        user: public_user(&row)?,
    }))
}

fn hash_password(plain: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow!("password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(plain: &str, stored: &str) -> Result<(), ApiError> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| ApiError::Internal(anyhow!("corrupt hash: {}", e)))?;

    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .map_err(|_| ApiError::InvalidCredentials)
}

fn public_user(user: &UserRow) -> Result<UserResponse, ApiError> {
    let id = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow!("corrupt user id '{}': {}", user.id, e)))?;

    Ok(UserResponse {
        id,
        username: user.username.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        full_name: user.full_name(),
    })
}

/// Keeps the first character of the local part, masks the rest.
fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().unwrap_or('*');
            format!("{}***@{}", first, domain)
        }
        None => "***".to_string(),
    }
}
