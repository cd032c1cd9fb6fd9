use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

use crate::config::AppState;
use crate::domain::order::{Order, OrderResponse};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::utils::storage::{extension_of, StorageError};

// Owner or staff; anyone else gets a 404
async fn load_visible_order(state: &AppState, auth: &AuthUser, order_id: i32) -> Result<Order, AppError> {
    let order = state
        .orders
        .find_by_id(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    if order.owner_id != auth.user_id && !auth.is_staff() {
        return Err(AppError::not_found("Order not found"));
    }

    Ok(order)
}

fn content_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// Order history of the caller
#[utoipa::path(
    get,
    path = "/api/orders",
    tag = "Orders",
    summary = "List my orders",
    description = "Newest first",
    responses(
        (status = 200, description = "Order history", body = Vec<OrderResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_my_orders(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let orders = state.orders.list_for_owner(auth.user_id).await?;
    let data: Vec<OrderResponse> = orders.iter().map(OrderResponse::from).collect();

    Ok(Json(json!({
        "success": true,
        "data": data
    })))
}

/// Order details
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "Orders",
    summary = "Get order",
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order", body = OrderResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_order(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let order = load_visible_order(&state, &auth, order_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": OrderResponse::from(&order)
    })))
}

/// Download the order's document
#[utoipa::path(
    get,
    path = "/api/orders/{id}/download",
    tag = "Orders",
    summary = "Download order file",
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order or file not found"),
        (status = 410, description = "File removed by the retention policy")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn download_order_file(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
) -> Result<Response, AppError> {
    let order = load_visible_order(&state, &auth, order_id).await?;

    if let Some(purged_at) = order.file_purged_at {
        return Err(AppError::gone(format!(
            "The file for order {} was removed on {}",
            order.order_code,
            purged_at.format("%Y-%m-%d")
        )));
    }

    let file_path = order
        .file_path
        .as_deref()
        .ok_or_else(|| AppError::not_found("This order has no file attached"))?;

    let content = match state.storage.read(file_path) {
        Ok(bytes) => bytes,
        Err(StorageError::NotFound(_)) => {
            tracing::error!(
                "📁 File for order {} is missing on disk: {}",
                order.order_code,
                file_path
            );
            return Err(AppError::not_found("File not found"));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&order.file_name).to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&order.file_name)),
        ],
        content,
    )
        .into_response())
}
