use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde_json::{json, Value};
use shared::utils::{jwt, token_extraction, validation};

use crate::config::AppState;
use crate::domain::pricing::UserType;
use crate::domain::user::{LoginRequest, ProfileResponse, RegisterRequest, UpdateProfileRequest};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::repositories::user_repo;
use crate::utils::hash;

const MAX_ADDRESS_LEN: usize = 500;

/// Register a customer account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Accounts",
    summary = "Register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = serde_json::Value),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Username or email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mobile = request.validate().map_err(AppError::validation)?;

    let password_hash = hash::hash_password(&request.password)
        .map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))?;

    let user_id = user_repo::create(
        &state.db,
        request.username.trim(),
        request.email.trim(),
        &password_hash,
        mobile.as_deref(),
    )
    .await?;

    tracing::info!("👤 New account registered: {} ({})", request.username.trim(), user_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Account created, you can now sign in",
            "data": { "user_id": user_id }
        })),
    ))
}

/// Sign in and receive an access token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Accounts",
    summary = "Login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token issued", body = serde_json::Value),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let client_ip = token_extraction::extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());

    let account = user_repo::find_by_login(&state.db, &request.username_or_email)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid username or password"))?;

    let valid = hash::verify_password(&request.password, &account.password_hash)
        .map_err(|e| AppError::internal(format!("Password verification failed: {}", e)))?;
    if !valid {
        tracing::warn!("Failed login for account {} from {}", account.id, client_ip);
        return Err(AppError::unauthorized("Invalid username or password"));
    }

    if !account.is_active {
        return Err(AppError::forbidden("This account has been disabled"));
    }

    let role = account.role();
    let (token, _jti) = jwt::generate_access_token(
        account.id,
        &account.email,
        role,
        &state.config.jwt_secret,
        state.config.jwt_access_expiry,
    )?;

    user_repo::touch_last_login(&state.db, account.id).await?;
    tracing::info!("🔓 User {} signed in as {} from {}", account.id, role, client_ip);

    Ok(Json(json!({
        "success": true,
        "data": {
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": state.config.jwt_access_expiry,
            "role": role,
            "user_type": UserType::for_role(role),
            "user": ProfileResponse::from(&account)
        }
    })))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/profile",
    tag = "Accounts",
    summary = "Get profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_profile(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let account = user_repo::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Account not found"))?;

    Ok(Json(json!({
        "success": true,
        "data": ProfileResponse::from(&account)
    })))
}

/// Update mobile number and address
#[utoipa::path(
    put,
    path = "/api/profile",
    tag = "Accounts",
    summary = "Update profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = serde_json::Value),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let mobile = match request.mobile.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        Some(raw) => Some(
            validation::normalize_mobile(raw)
                .ok_or_else(|| AppError::validation("Invalid mobile number"))?,
        ),
        None => None,
    };

    let address = request
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(validation::sanitize_html);
    if address.as_ref().is_some_and(|a| a.chars().count() > MAX_ADDRESS_LEN) {
        return Err(AppError::validation("Address is too long"));
    }

    user_repo::update_profile(&state.db, auth.user_id, mobile.as_deref(), address.as_deref()).await?;

    let account = user_repo::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Account not found"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated",
        "data": ProfileResponse::from(&account)
    })))
}
