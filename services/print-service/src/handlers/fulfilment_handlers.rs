use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::AppState;
use crate::domain::order::{
    check_transition, Order, OrderResponse, OrderStatus, PaymentStatus, StatusActor,
    UpdateStatusRequest,
};
use crate::error::AppError;
use crate::middleware::auth::{AuthDealer, AuthDelivery};
use crate::repositories::{catalog_repo, user_repo};

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct DashboardQuery {
    /// Order status to filter on
    pub status: Option<String>,
}

pub(crate) fn parse_status(raw: &str) -> Result<OrderStatus, AppError> {
    OrderStatus::parse(raw).ok_or_else(|| AppError::validation(format!("Unknown order status: {}", raw)))
}

/// Validate and apply a dashboard status change. The update is guarded on the
/// status that was checked, so two people clicking at once cannot both win.
pub(crate) async fn transition_order(
    state: &AppState,
    order: &Order,
    actor: StatusActor,
    requested: &str,
) -> Result<Order, AppError> {
    let next = parse_status(requested)?;
    let current = order.order_status();
    check_transition(actor, current, order.payment(), next)?;

    let updated = state
        .orders
        .update_status(order.id, current.as_str(), next.as_str())
        .await?
        .ok_or_else(|| AppError::conflict("The order was updated by someone else, please refresh"))?;

    tracing::info!(
        "📦 Order {} moved {} -> {} ({:?})",
        updated.order_code,
        current,
        next,
        actor
    );

    Ok(updated)
}

// Locations the dashboard covers: the account's own, or every active one for staff
async fn dashboard_locations(state: &AppState, user_id: i32, is_staff: bool) -> Result<Vec<String>, AppError> {
    if is_staff {
        let active = catalog_repo::list_active_locations(&state.db).await?;
        return Ok(active.into_iter().map(|l| l.name).collect());
    }

    let account = user_repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Account not found"))?;
    Ok(account.dealer_locations)
}

async fn dashboard_orders(
    state: &AppState,
    user_id: i32,
    is_staff: bool,
    query: &DashboardQuery,
) -> Result<Vec<OrderResponse>, AppError> {
    let statuses = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => vec![parse_status(raw)?.as_str().to_string()],
        None => Vec::new(),
    };

    let locations = dashboard_locations(state, user_id, is_staff).await?;
    if locations.is_empty() {
        return Ok(Vec::new());
    }

    let orders = state.orders.list_paid_at_locations(&locations, &statuses).await?;
    Ok(orders.iter().map(OrderResponse::from).collect())
}

// Dashboards only show paid orders at the caller's locations; anything else is not found
fn ensure_on_dashboard(
    payment: PaymentStatus,
    location: Option<&str>,
    locations: Option<&[String]>,
) -> Result<(), AppError> {
    if payment != PaymentStatus::Success {
        return Err(AppError::not_found("Order not found"));
    }

    // None means every location (staff)
    let Some(locations) = locations else {
        return Ok(());
    };
    let served = location
        .map(|loc| locations.iter().any(|l| l.eq_ignore_ascii_case(loc)))
        .unwrap_or(false);
    if !served {
        return Err(AppError::forbidden("This order is not at one of your locations"));
    }

    Ok(())
}

async fn load_dashboard_order(
    state: &AppState,
    user_id: i32,
    is_staff: bool,
    order_id: i32,
) -> Result<Order, AppError> {
    let order = state
        .orders
        .find_by_id(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    if is_staff {
        ensure_on_dashboard(order.payment(), order.location.as_deref(), None)?;
    } else {
        let locations = dashboard_locations(state, user_id, false).await?;
        ensure_on_dashboard(order.payment(), order.location.as_deref(), Some(locations.as_slice()))?;
    }

    Ok(order)
}

/// Dealer dashboard
#[utoipa::path(
    get,
    path = "/api/dealer/orders",
    tag = "Fulfilment",
    summary = "Orders at my locations",
    description = "Paid orders at the dealer's assigned locations",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Orders", body = Vec<OrderResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Dealer access required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_dealer_orders(
    auth: AuthDealer,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Value>, AppError> {
    let data = dashboard_orders(&state, auth.user_id, auth.is_staff, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": data
    })))
}

/// Dealer status update
#[utoipa::path(
    patch,
    path = "/api/dealer/orders/{id}/status",
    tag = "Fulfilment",
    summary = "Update order status (dealer)",
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderResponse),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Not at one of the dealer's locations"),
        (status = 409, description = "Transition not allowed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_dealer_order(
    auth: AuthDealer,
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let order = load_dashboard_order(&state, auth.user_id, auth.is_staff, order_id).await?;
    let actor = if auth.is_staff { StatusActor::Staff } else { StatusActor::Dealer };
    let updated = transition_order(&state, &order, actor, &request.status).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Order moved to {}", updated.status),
        "data": OrderResponse::from(&updated)
    })))
}

/// Delivery dashboard
#[utoipa::path(
    get,
    path = "/api/delivery/orders",
    tag = "Fulfilment",
    summary = "Orders to deliver",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Orders", body = Vec<OrderResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Delivery access required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_delivery_orders(
    auth: AuthDelivery,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Value>, AppError> {
    let data = dashboard_orders(&state, auth.user_id, auth.is_staff, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": data
    })))
}

/// Delivery status update, Ready -> OutForDelivery -> Delivered only
#[utoipa::path(
    patch,
    path = "/api/delivery/orders/{id}/status",
    tag = "Fulfilment",
    summary = "Update order status (delivery)",
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderResponse),
        (status = 403, description = "Transition not allowed for delivery staff"),
        (status = 409, description = "Order changed or not paid")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_delivery_order(
    auth: AuthDelivery,
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let order = load_dashboard_order(&state, auth.user_id, auth.is_staff, order_id).await?;
    let updated = transition_order(&state, &order, StatusActor::Delivery, &request.status).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Order moved to {}", updated.status),
        "data": OrderResponse::from(&updated)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_accepts_dashboard_spelling() {
        assert_eq!(parse_status("out for delivery").unwrap(), OrderStatus::OutForDelivery);
        assert!(matches!(parse_status("lost"), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_dashboard_orders_must_be_paid_and_local() {
        let mine = vec!["Main Campus".to_string()];

        assert!(ensure_on_dashboard(PaymentStatus::Success, Some("main campus"), Some(mine.as_slice())).is_ok());
        assert!(matches!(
            ensure_on_dashboard(PaymentStatus::Pending, Some("Main Campus"), Some(mine.as_slice())),
            Err(AppError::NotFoundError(_))
        ));
        assert!(matches!(
            ensure_on_dashboard(PaymentStatus::Success, Some("North Gate"), Some(mine.as_slice())),
            Err(AppError::ForbiddenError(_))
        ));
        assert!(matches!(
            ensure_on_dashboard(PaymentStatus::Success, None, Some(mine.as_slice())),
            Err(AppError::ForbiddenError(_))
        ));

        // staff cover every location but still only act on paid orders
        assert!(ensure_on_dashboard(PaymentStatus::Success, Some("North Gate"), None).is_ok());
        assert!(matches!(
            ensure_on_dashboard(PaymentStatus::Pending, Some("North Gate"), None),
            Err(AppError::NotFoundError(_))
        ));
    }
}
