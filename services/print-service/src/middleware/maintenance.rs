// Maintenance switch: only staff keep working while MAINTENANCE_MODE is on
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{config::AppState, error::AppError, middleware::auth::AuthUser};

// Still answered during maintenance so staff can sign in and health checks stay green
fn bypasses_maintenance(path: &str) -> bool {
    matches!(path, "/health" | "/info" | "/api/auth/login")
}

pub fn is_blocked(enabled: bool, path: &str, caller: Option<&AuthUser>) -> bool {
    if !enabled || bypasses_maintenance(path) {
        return false;
    }
    !caller.map(AuthUser::is_staff).unwrap_or(false)
}

pub async fn maintenance_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let blocked = is_blocked(
        state.config.maintenance_mode,
        request.uri().path(),
        request.extensions().get::<AuthUser>(),
    );

    if blocked {
        tracing::debug!("Maintenance mode: rejecting {}", request.uri().path());
        return Err(AppError::MaintenanceError);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::claims::Role;

    fn caller(role: Role) -> AuthUser {
        AuthUser {
            user_id: 1,
            email: "ops@fastcopy.in".to_string(),
            role,
        }
    }

    #[test]
    fn test_disabled_never_blocks() {
        assert!(!is_blocked(false, "/api/cart", None));
    }

    #[test]
    fn test_only_staff_pass() {
        assert!(is_blocked(true, "/api/cart", None));
        assert!(is_blocked(true, "/api/cart", Some(&caller(Role::Dealer))));
        assert!(!is_blocked(true, "/api/cart", Some(&caller(Role::Staff))));
        assert!(!is_blocked(true, "/health", None));
        assert!(!is_blocked(true, "/api/auth/login", None));
    }
}
