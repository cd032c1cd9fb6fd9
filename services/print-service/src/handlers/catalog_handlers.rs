use axum::{extract::State, response::Json};
use axum_extra::extract::Multipart;
use chrono::Utc;
use serde_json::{json, Value};
use shared::models::claims::Role;

use crate::config::{AppConfig, AppState};
use crate::domain::catalog::catalog;
use crate::domain::pricing::{quote, QuoteInput, UserType};
use crate::error::AppError;
use crate::handlers::upload::read_upload;
use crate::middleware::auth::MaybeAuthUser;
use crate::repositories::catalog_repo;
use crate::utils::money::format_rupees;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Print Service",
    summary = "Health check",
    description = "Database and media storage health",
    responses(
        (status = 200, description = "Service health", body = serde_json::Value)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let health = state.health_check().await;

    Ok(Json(json!({
        "status": health.overall.clone(),
        "service": "print-service",
        "checks": health,
        "timestamp": Utc::now(),
        "version": state.config.app_version,
    })))
}

/// Get service information
#[utoipa::path(
    get,
    path = "/info",
    tag = "Print Service",
    summary = "Get service information",
    description = "Print service details and enabled features",
    responses(
        (status = 200, description = "Service information retrieved successfully", body = serde_json::Value)
    )
)]
pub async fn get_service_info(
    State(config): State<AppConfig>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({
        "service": "print-service",
        "version": config.app_version,
        "environment": config.environment,
        "is_production": config.is_production(),
        "maintenance_mode": config.maintenance_mode,
        "max_upload_mb": config.max_upload_mb,
        "features": [
            "Server-side pricing with customer and dealer rate tables",
            "PDF page counting",
            "Cart checkout with coupons",
            "HMAC SHA256 webhook verification",
            "Dealer and delivery dashboards",
            "File retention sweeps"
        ],
        "timestamp": Utc::now()
    })))
}

/// List print services
#[utoipa::path(
    get,
    path = "/api/services",
    tag = "Catalog",
    summary = "List services",
    responses(
        (status = 200, description = "Service catalog", body = serde_json::Value)
    )
)]
pub async fn list_services() -> Result<Json<Value>, AppError> {
    Ok(Json(json!({
        "success": true,
        "data": catalog()
    })))
}

/// List pickup locations
#[utoipa::path(
    get,
    path = "/api/locations",
    tag = "Catalog",
    summary = "List active locations",
    responses(
        (status = 200, description = "Active locations", body = serde_json::Value),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_locations(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let locations = catalog_repo::list_active_locations(&state.db).await?;

    Ok(Json(json!({
        "success": true,
        "data": locations
    })))
}

/// Price a print job
#[utoipa::path(
    post,
    path = "/api/pricing/quote",
    tag = "Catalog",
    summary = "Quote a print job",
    description = "Prices a job with the caller's rate table; anonymous callers get customer rates",
    request_body = QuoteInput,
    responses(
        (status = 200, description = "Price breakdown", body = serde_json::Value),
        (status = 400, description = "Invalid print options")
    )
)]
pub async fn quote_price(
    State(state): State<AppState>,
    MaybeAuthUser(caller): MaybeAuthUser,
    Json(input): Json<QuoteInput>,
) -> Result<Json<Value>, AppError> {
    let user_type = UserType::for_role(caller.map(|c| c.role).unwrap_or(Role::Customer));
    let pricing = catalog_repo::load_pricing(&state.db).await?;
    let result = quote(pricing.table(user_type), &input)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "user_type": user_type,
            "total_display": format_rupees(result.total),
            "quote": result
        }
    })))
}

/// Count pages of a document
#[utoipa::path(
    post,
    path = "/api/documents/page-count",
    tag = "Catalog",
    summary = "Count document pages",
    description = "PDFs are counted from their page tree, images count as one page. Word files need a client supplied count",
    request_body(content_type = "multipart/form-data", content = String),
    responses(
        (status = 200, description = "Page count", body = serde_json::Value),
        (status = 400, description = "Unsupported or unreadable file"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn count_document_pages(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = read_upload(multipart, state.config.max_upload_bytes()).await?;
    let (file_name, kind) = form.document()?;
    let pages = form.page_count(kind)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "file_name": file_name,
            "kind": kind,
            "pages": pages,
            "needs_manual_count": pages.is_none()
        }
    })))
}
