use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::config::AppState;
use crate::domain::checkout::{
    apply_outcome, begin_checkout, refresh_status, CheckoutCustomer, CheckoutRequest,
    CheckoutStore, PaymentOutcome,
};
use crate::domain::coupon::{CouponError, ValidateCouponRequest};
use crate::domain::payment::{recover_transaction_id, WebhookPayload};
use crate::domain::pricing::UserType;
use crate::error::AppError;
use crate::handlers::cart_handlers::resolve_location;
use crate::handlers::gateway_service::verify_signature;
use crate::middleware::auth::AuthUser;
use crate::repositories::{catalog_repo, coupon_repo, user_repo};
use crate::utils::money::format_rupees;

const SIGNATURE_HEADER: &str = "x-signature";

/// Check out the cart
#[utoipa::path(
    post,
    path = "/api/checkout",
    tag = "Checkout",
    summary = "Check out the cart",
    description = "Locks the cart, re-prices every item, applies the coupon and opens a payment session. A fully discounted cart is confirmed without payment",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout started", body = serde_json::Value),
        (status = 400, description = "Empty cart, bad coupon or invalid location"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Payment gateway unavailable, please retry")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn checkout(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<Value>, AppError> {
    let account = user_repo::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Account not found"))?;

    let location = match request.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(requested) => {
            let active = catalog_repo::list_active_locations(&state.db).await?;
            resolve_location(Some(requested), &active)?
        }
        None => None,
    };
    let request = CheckoutRequest {
        coupon_code: request.coupon_code,
        location,
    };

    let customer = CheckoutCustomer {
        user_id: account.id,
        email: account.email.clone(),
        user_type: UserType::for_role(account.role()),
    };
    let pricing = catalog_repo::load_pricing(&state.db).await?;

    let started = begin_checkout(
        &state.orders,
        state.gateway.as_ref(),
        &state.storage,
        &pricing,
        &customer,
        &request,
        &state.config.checkout_urls(),
    )
    .await?;

    let message = if started.paid {
        "Order confirmed"
    } else {
        "Checkout started, continue to payment"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": started
    })))
}

/// Payment gateway webhook
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    tag = "Checkout",
    summary = "Payment gateway webhook",
    description = "Signed with a hex HMAC-SHA256 of the raw body in the X-Signature header. Duplicate deliveries are acknowledged without side effects",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Webhook processed", body = serde_json::Value),
        (status = 400, description = "Malformed payload without a transaction id"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 404, description = "Unknown transaction")
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = extract_signature(&headers)?;

    if !verify_signature(&state.config.gateway_secret_key, &body, &signature) {
        tracing::warn!("🚫 Webhook rejected: invalid signature");
        return Err(AppError::unauthorized("Invalid webhook signature"));
    }

    let (transaction_id, outcome) = match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => {
            tracing::info!(
                "📨 Webhook received: transaction={}, status={}",
                payload.transaction_id,
                payload.status
            );
            let outcome = PaymentOutcome::from_gateway(&payload.status, payload.gateway_ref);
            (payload.transaction_id, outcome)
        }
        Err(e) => {
            tracing::error!("Malformed webhook payload: {}", e);
            let transaction_id = recover_transaction_id(&body)
                .ok_or_else(|| AppError::validation("Malformed webhook payload"))?;
            let outcome = PaymentOutcome::Failure {
                reason: format!("malformed webhook payload: {}", e),
            };
            (transaction_id, outcome)
        }
    };

    let report = apply_outcome(&state.orders, &state.storage, &transaction_id, outcome).await?;

    let message = if report.already_processed {
        "Already processed"
    } else {
        "Webhook processed"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": report
    })))
}

/// Poll the payment status of a checkout
#[utoipa::path(
    get,
    path = "/api/payments/{transaction_id}/status",
    tag = "Checkout",
    summary = "Check payment status",
    description = "Asks the gateway for the latest status and applies it, used by the payment return page",
    params(
        ("transaction_id" = String, Path, description = "Checkout transaction ID")
    ),
    responses(
        (status = 200, description = "Current payment status", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown transaction")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn payment_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let batch = state.orders.find_batch(&transaction_id).await?;
    let owner_id = batch
        .first()
        .map(|order| order.owner_id)
        .ok_or_else(|| AppError::not_found("Transaction not found"))?;

    // other users' transactions look the same as unknown ones
    if owner_id != auth.user_id && !auth.is_staff() {
        return Err(AppError::not_found("Transaction not found"));
    }

    let report = refresh_status(
        &state.orders,
        state.gateway.as_ref(),
        &state.storage,
        &transaction_id,
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "data": report
    })))
}

/// Preview a coupon discount
#[utoipa::path(
    post,
    path = "/api/coupons/validate",
    tag = "Checkout",
    summary = "Validate coupon",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Discount preview", body = serde_json::Value),
        (status = 400, description = "Coupon not usable"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn validate_coupon(
    _auth: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<Value>, AppError> {
    if request.amount_paise < 0 {
        return Err(AppError::validation("Amount cannot be negative"));
    }

    let coupon = coupon_repo::find_by_code(&state.db, &request.code)
        .await?
        .ok_or(CouponError::Unknown)?;

    let discount = coupon.discount_for(request.amount_paise, Utc::now())?;
    let payable = request.amount_paise - discount;

    Ok(Json(json!({
        "success": true,
        "data": {
            "code": coupon.code,
            "discount_type": coupon.discount_type,
            "discount_paise": discount,
            "payable_paise": payable,
            "discount_display": format_rupees(discount),
            "payable_display": format_rupees(payable)
        }
    })))
}

// Webhook signature from the headers
fn extract_signature(headers: &HeaderMap) -> crate::error::AppResult<String> {
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::unauthorized("Missing signature header"))
}
