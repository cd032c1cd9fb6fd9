use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::config::AppState;
use crate::domain::coupon::CreateCouponRequest;
use crate::domain::order::{OrderFilter, OrderResponse, PaymentStatus, StatusActor, UpdateStatusRequest};
use crate::domain::pricing::PricingConfig;
use crate::domain::retention::{cleanup_potential, run_cleanup, CleanupOptions, RetentionPolicy};
use crate::domain::user::{ProfileResponse, UpdateRolesRequest};
use crate::error::AppError;
use crate::handlers::cart_handlers::resolve_location;
use crate::handlers::fulfilment_handlers::{parse_status, transition_order};
use crate::middleware::auth::AuthStaff;
use crate::repositories::{catalog_repo, coupon_repo, user_repo};

// Canonical spellings so the SQL filter matches stored values
fn normalize_filter(filter: OrderFilter) -> Result<OrderFilter, AppError> {
    let status = match filter.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_status(raw)?.as_str().to_string()),
        None => None,
    };
    let payment_status = match filter.payment_status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            PaymentStatus::parse(raw)
                .ok_or_else(|| AppError::validation(format!("Unknown payment status: {}", raw)))?
                .as_str()
                .to_string(),
        ),
        None => None,
    };

    Ok(OrderFilter { status, payment_status })
}

/// All orders, optionally filtered
#[utoipa::path(
    get,
    path = "/api/admin/orders",
    tag = "Administration",
    summary = "List orders",
    params(OrderFilter),
    responses(
        (status = 200, description = "Orders, newest first", body = Vec<OrderResponse>),
        (status = 400, description = "Unknown status filter"),
        (status = 403, description = "Staff access required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_orders(
    _staff: AuthStaff,
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Value>, AppError> {
    let filter = normalize_filter(filter)?;
    let orders = state.orders.list_filtered(&filter).await?;
    let data: Vec<OrderResponse> = orders.iter().map(OrderResponse::from).collect();

    Ok(Json(json!({
        "success": true,
        "data": data
    })))
}

/// Staff status update
#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    tag = "Administration",
    summary = "Update order status",
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Transition not allowed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_order_status(
    staff: AuthStaff,
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let order = state
        .orders
        .find_by_id(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    let updated = transition_order(&state, &order, StatusActor::Staff, &request.status).await?;
    tracing::debug!("Staff {} updated order {}", staff.user_id, updated.id);

    Ok(Json(json!({
        "success": true,
        "message": format!("Order moved to {}", updated.status),
        "data": OrderResponse::from(&updated)
    })))
}

/// Current pricing configuration
#[utoipa::path(
    get,
    path = "/api/admin/pricing",
    tag = "Administration",
    summary = "Get pricing",
    responses(
        (status = 200, description = "Pricing configuration", body = PricingConfig),
        (status = 403, description = "Staff access required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_pricing(
    _staff: AuthStaff,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let pricing = catalog_repo::load_pricing(&state.db).await?;

    Ok(Json(json!({
        "success": true,
        "data": pricing
    })))
}

/// Replace the pricing configuration
#[utoipa::path(
    put,
    path = "/api/admin/pricing",
    tag = "Administration",
    summary = "Update pricing",
    description = "Binding tiers must be strictly ascending and every rate non-negative",
    request_body = PricingConfig,
    responses(
        (status = 200, description = "Pricing saved", body = serde_json::Value),
        (status = 400, description = "Invalid configuration"),
        (status = 403, description = "Staff access required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_pricing(
    staff: AuthStaff,
    State(state): State<AppState>,
    Json(pricing): Json<PricingConfig>,
) -> Result<Json<Value>, AppError> {
    pricing.validate()?;
    catalog_repo::save_pricing(&state.db, &pricing).await?;

    tracing::info!("💰 Pricing configuration updated by staff {}", staff.user_id);

    Ok(Json(json!({
        "success": true,
        "message": "Pricing updated",
        "data": pricing
    })))
}

/// All coupons
#[utoipa::path(
    get,
    path = "/api/admin/coupons",
    tag = "Administration",
    summary = "List coupons",
    responses(
        (status = 200, description = "Coupons", body = serde_json::Value),
        (status = 403, description = "Staff access required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_coupons(
    _staff: AuthStaff,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let coupons = coupon_repo::list_all(&state.db).await?;

    Ok(Json(json!({
        "success": true,
        "data": coupons
    })))
}

/// Create a coupon
#[utoipa::path(
    post,
    path = "/api/admin/coupons",
    tag = "Administration",
    summary = "Create coupon",
    request_body = CreateCouponRequest,
    responses(
        (status = 201, description = "Coupon created", body = serde_json::Value),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Code already exists")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_coupon(
    staff: AuthStaff,
    State(state): State<AppState>,
    Json(request): Json<CreateCouponRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    request.validate().map_err(AppError::validation)?;
    let coupon = coupon_repo::create(&state.db, &request).await?;

    tracing::info!("🎟️ Coupon {} created by staff {}", coupon.code, staff.user_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Coupon created",
            "data": coupon
        })),
    ))
}

/// Set dealer and delivery flags
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/roles",
    tag = "Administration",
    summary = "Update user roles",
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    request_body = UpdateRolesRequest,
    responses(
        (status = 200, description = "Roles updated", body = ProfileResponse),
        (status = 400, description = "Unknown location"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_user_roles(
    staff: AuthStaff,
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Json(request): Json<UpdateRolesRequest>,
) -> Result<Json<Value>, AppError> {
    if user_repo::find_by_id(&state.db, user_id).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }

    let active = catalog_repo::list_active_locations(&state.db).await?;
    let mut locations = Vec::with_capacity(request.locations.len());
    for requested in &request.locations {
        if let Some(name) = resolve_location(Some(requested), &active)? {
            if !locations.contains(&name) {
                locations.push(name);
            }
        }
    }

    user_repo::set_roles(&state.db, user_id, request.is_dealer, request.is_delivery, &locations).await?;

    let account = user_repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    tracing::info!(
        "🔑 Staff {} set roles of user {}: {} at {:?}",
        staff.user_id,
        user_id,
        account.role(),
        account.dealer_locations
    );

    Ok(Json(json!({
        "success": true,
        "message": "Roles updated, they apply from the user's next sign in",
        "data": ProfileResponse::from(&account)
    })))
}

/// Run the file retention sweep now
#[utoipa::path(
    post,
    path = "/api/admin/cleanup",
    tag = "Administration",
    summary = "Run file cleanup",
    description = "Deletes files past their retention window. Order rows are kept",
    request_body = CleanupOptions,
    responses(
        (status = 200, description = "Cleanup report", body = serde_json::Value),
        (status = 400, description = "Invalid options"),
        (status = 403, description = "Staff access required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn run_file_cleanup(
    staff: AuthStaff,
    State(state): State<AppState>,
    Json(options): Json<CleanupOptions>,
) -> Result<Json<Value>, AppError> {
    options.validate().map_err(AppError::validation)?;

    tracing::info!("🧹 Cleanup requested by staff {} (dry_run={})", staff.user_id, options.dry_run);

    let report = run_cleanup(
        &state.orders,
        &state.storage,
        &RetentionPolicy::default(),
        &options,
        Utc::now(),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "data": report
    })))
}

/// Storage usage and what a cleanup would free
#[utoipa::path(
    get,
    path = "/api/admin/storage-stats",
    tag = "Administration",
    summary = "Storage statistics",
    responses(
        (status = 200, description = "Storage statistics", body = serde_json::Value),
        (status = 403, description = "Staff access required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn storage_stats(
    _staff: AuthStaff,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let stats = state.storage.stats();
    let potential = cleanup_potential(
        &state.orders,
        &state.storage,
        &RetentionPolicy::default(),
        Utc::now(),
    )
    .await?;
    let by_status = state.orders.status_file_counts().await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "order_mb": stats.order_mb(),
            "temp_mb": stats.temp_mb(),
            "total_mb": stats.total_mb(),
            "storage": stats,
            "orders_by_status": by_status,
            "cleanup_potential": potential
        }
    })))
}
