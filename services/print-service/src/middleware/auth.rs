// JWT authentication for the print service
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use shared::models::claims::Role;
use shared::utils::{jwt, token_extraction};

use crate::{config::AppState, error::AppError};

// Routes reachable without a token
const PUBLIC_PATHS: [&str; 8] = [
    "/health",
    "/info",
    "/api/auth/register",
    "/api/auth/login",
    "/api/services",
    "/api/locations",
    "/api/pricing/quote",
    "/api/payments/webhook",
];

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || path.starts_with("/docs") || path.starts_with("/api-docs")
}

// Authenticated caller, taken from the token claims
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

// Staff-only routes
#[derive(Debug, Clone)]
pub struct AuthStaff {
    pub user_id: i32,
}

// Dealer dashboard; staff may act as any dealer
#[derive(Debug, Clone)]
pub struct AuthDealer {
    pub user_id: i32,
    pub is_staff: bool,
}

#[derive(Debug, Clone)]
pub struct AuthDelivery {
    pub user_id: i32,
    pub is_staff: bool,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts<'life0, 'life1>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

// Present on public routes when the caller sent a valid token
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl<S> axum::extract::FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts<'life0, 'life1>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(parts.extensions.get::<AuthUser>().cloned()))
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthStaff
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts<'life0, 'life1>(
        parts: &'life0 mut axum::http::request::Parts,
        state: &'life1 S,
    ) -> Result<Self, Self::Rejection> {
        let auth_user = AuthUser::from_request_parts(parts, state).await?;

        if auth_user.role != Role::Staff {
            return Err(AppError::forbidden("Staff access required"));
        }

        Ok(AuthStaff {
            user_id: auth_user.user_id,
        })
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthDealer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts<'life0, 'life1>(
        parts: &'life0 mut axum::http::request::Parts,
        state: &'life1 S,
    ) -> Result<Self, Self::Rejection> {
        let auth_user = AuthUser::from_request_parts(parts, state).await?;

        match auth_user.role {
            Role::Dealer | Role::Staff => Ok(AuthDealer {
                user_id: auth_user.user_id,
                is_staff: auth_user.is_staff(),
            }),
            _ => Err(AppError::forbidden("Dealer access required")),
        }
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthDelivery
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts<'life0, 'life1>(
        parts: &'life0 mut axum::http::request::Parts,
        state: &'life1 S,
    ) -> Result<Self, Self::Rejection> {
        let auth_user = AuthUser::from_request_parts(parts, state).await?;

        match auth_user.role {
            Role::Delivery | Role::Staff => Ok(AuthDelivery {
                user_id: auth_user.user_id,
                is_staff: auth_user.is_staff(),
            }),
            _ => Err(AppError::forbidden("Delivery access required")),
        }
    }
}

// Bearer token from the Authorization header
fn extract_jwt_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = token_extraction::extract_auth_header(headers)
        .ok_or_else(|| AppError::unauthorized("Authorization header with a Bearer token is required"))?;

    token_extraction::extract_bearer_token(&auth_header)
        .ok_or_else(|| AppError::unauthorized("Bearer token format required"))
}

fn decode_user(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let claims = jwt::validate_token(token, secret)
        .map_err(|_| AppError::unauthorized("Token is invalid or expired"))?;

    Ok(AuthUser {
        user_id: claims.sub,
        email: claims.email.clone(),
        role: claims.role(),
    })
}

// JWT authentication middleware
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();

    if is_public_path(&path) {
        // optional identity, a bad token on a public route is ignored
        if let Ok(token) = extract_jwt_token(request.headers()) {
            if let Ok(auth_user) = decode_user(&token, &state.config.jwt_secret) {
                request.extensions_mut().insert(auth_user);
            }
        }
        return Ok(next.run(request).await);
    }

    let token = extract_jwt_token(request.headers())?;
    let auth_user = decode_user(&token, &state.config.jwt_secret)?;

    request.extensions_mut().insert(auth_user.clone());

    tracing::debug!(
        "User authenticated - ID: {}, Role: {}, Endpoint: {}",
        auth_user.user_id,
        auth_user.role,
        path
    );

    Ok(next.run(request).await)
}
