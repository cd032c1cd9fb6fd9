// API routes for the print service with OpenAPI documentation
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    routing::{delete, get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::{AppState, HealthStatus},
    handlers::{
        admin_handlers, auth_handlers, cart_handlers, catalog_handlers, checkout_handlers,
        fulfilment_handlers, order_handlers,
    },
    middleware::{auth::jwt_auth_middleware, maintenance::maintenance_middleware},
};

// Room for the multipart envelope around the largest allowed file
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

// Security scheme modifier for Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Service
        catalog_handlers::health_check,
        catalog_handlers::get_service_info,

        // Accounts
        auth_handlers::register,
        auth_handlers::login,
        auth_handlers::get_profile,
        auth_handlers::update_profile,

        // Catalog & pricing
        catalog_handlers::list_services,
        catalog_handlers::list_locations,
        catalog_handlers::quote_price,
        catalog_handlers::count_document_pages,

        // Cart
        cart_handlers::add_to_cart,
        cart_handlers::get_cart,
        cart_handlers::remove_cart_item,

        // Checkout & payments
        checkout_handlers::checkout,
        checkout_handlers::payment_webhook,
        checkout_handlers::payment_status,
        checkout_handlers::validate_coupon,

        // Orders
        order_handlers::list_my_orders,
        order_handlers::get_order,
        order_handlers::download_order_file,

        // Fulfilment
        fulfilment_handlers::list_dealer_orders,
        fulfilment_handlers::update_dealer_order,
        fulfilment_handlers::list_delivery_orders,
        fulfilment_handlers::update_delivery_order,

        // Administration
        admin_handlers::list_orders,
        admin_handlers::update_order_status,
        admin_handlers::get_pricing,
        admin_handlers::update_pricing,
        admin_handlers::list_coupons,
        admin_handlers::create_coupon,
        admin_handlers::update_user_roles,
        admin_handlers::run_file_cleanup,
        admin_handlers::storage_stats
    ),
    modifiers(&SecurityAddon),
    components(
        schemas(
            HealthStatus,
            crate::domain::user::RegisterRequest,
            crate::domain::user::LoginRequest,
            crate::domain::user::UpdateProfileRequest,
            crate::domain::user::UpdateRolesRequest,
            crate::domain::user::ProfileResponse,
            crate::domain::catalog::CatalogEntry,
            crate::domain::catalog::Location,
            crate::domain::catalog::ServiceKind,
            crate::domain::pricing::QuoteInput,
            crate::domain::pricing::Quote,
            crate::domain::pricing::PricingConfig,
            crate::domain::pricing::UserType,
            crate::domain::cart::CartItem,
            crate::domain::cart::CartSummary,
            crate::domain::checkout::CheckoutRequest,
            crate::domain::checkout::CheckoutStarted,
            crate::domain::checkout::ReconcileReport,
            crate::domain::payment::WebhookPayload,
            crate::domain::payment::GatewayOutcome,
            crate::domain::coupon::ValidateCouponRequest,
            crate::domain::coupon::CreateCouponRequest,
            crate::domain::coupon::Coupon,
            crate::domain::order::OrderResponse,
            crate::domain::order::OrderStatus,
            crate::domain::order::PaymentStatus,
            crate::domain::order::UpdateStatusRequest,
            crate::domain::retention::CleanupOptions,
            crate::domain::retention::CleanupReport,
            crate::domain::retention::CleanupPotential,
            crate::domain::retention::StatusFileCount,
            crate::utils::storage::StorageStats
        )
    ),
    tags(
        (name = "Print Service", description = "Health and service information"),
        (name = "Accounts", description = "Registration, login and profiles"),
        (name = "Catalog", description = "Services, locations, quotes and page counting"),
        (name = "Cart", description = "Staged print jobs"),
        (name = "Checkout", description = "Checkout, payment webhook and status polling"),
        (name = "Orders", description = "Customer order history and downloads"),
        (name = "Fulfilment", description = "Dealer and delivery dashboards"),
        (name = "Administration", description = "Staff tools: orders, pricing, coupons, roles and storage")
    ),
    info(
        title = "FastCopy - Print Service API",
        description = "Print shop ordering backend\n\n## Features\n\n- 🖨️ Server-side pricing with customer and dealer rate tables\n- 🛒 Cart checkout with coupons\n- 💳 Signed payment webhooks with idempotent reconciliation\n- 🚚 Dealer and delivery dashboards\n- 🧹 File retention sweeps\n\n## Authentication\n\nSend the access token from `/api/auth/login` as `Authorization: Bearer {token}`.",
        version = "1.0.0"
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub struct ApiDoc;

// Every /api route; authentication is decided per path by the middleware
fn build_api_routes(state: AppState) -> Router<AppState> {
    let upload_limit = state.config.max_upload_bytes() + MULTIPART_OVERHEAD;

    Router::new()
        // Accounts
        .route("/api/auth/register", post(auth_handlers::register))
        .route("/api/auth/login", post(auth_handlers::login))
        .route(
            "/api/profile",
            get(auth_handlers::get_profile).put(auth_handlers::update_profile),
        )

        // Catalog & pricing
        .route("/api/services", get(catalog_handlers::list_services))
        .route("/api/locations", get(catalog_handlers::list_locations))
        .route("/api/pricing/quote", post(catalog_handlers::quote_price))
        .route("/api/documents/page-count", post(catalog_handlers::count_document_pages))

        // Cart
        .route(
            "/api/cart",
            get(cart_handlers::get_cart).post(cart_handlers::add_to_cart),
        )
        .route("/api/cart/{item_id}", delete(cart_handlers::remove_cart_item))

        // Checkout & payments
        .route("/api/checkout", post(checkout_handlers::checkout))
        .route("/api/coupons/validate", post(checkout_handlers::validate_coupon))
        .route("/api/payments/webhook", post(checkout_handlers::payment_webhook))
        .route(
            "/api/payments/{transaction_id}/status",
            get(checkout_handlers::payment_status),
        )

        // Orders
        .route("/api/orders", get(order_handlers::list_my_orders))
        .route("/api/orders/{id}", get(order_handlers::get_order))
        .route("/api/orders/{id}/download", get(order_handlers::download_order_file))

        // Fulfilment
        .route("/api/dealer/orders", get(fulfilment_handlers::list_dealer_orders))
        .route(
            "/api/dealer/orders/{id}/status",
            patch(fulfilment_handlers::update_dealer_order),
        )
        .route("/api/delivery/orders", get(fulfilment_handlers::list_delivery_orders))
        .route(
            "/api/delivery/orders/{id}/status",
            patch(fulfilment_handlers::update_delivery_order),
        )

        // Administration
        .route("/api/admin/orders", get(admin_handlers::list_orders))
        .route(
            "/api/admin/orders/{id}/status",
            patch(admin_handlers::update_order_status),
        )
        .route(
            "/api/admin/pricing",
            get(admin_handlers::get_pricing).put(admin_handlers::update_pricing),
        )
        .route(
            "/api/admin/coupons",
            get(admin_handlers::list_coupons).post(admin_handlers::create_coupon),
        )
        .route("/api/admin/users/{id}/roles", put(admin_handlers::update_user_roles))
        .route("/api/admin/cleanup", post(admin_handlers::run_file_cleanup))
        .route("/api/admin/storage-stats", get(admin_handlers::storage_stats))
        .layer(DefaultBodyLimit::max(upload_limit))
        // maintenance runs after authentication so staff can be recognised
        .layer(axum::middleware::from_fn_with_state(state.clone(), maintenance_middleware))
        .layer(axum::middleware::from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let origin = match frontend_url.trim_end_matches('/').parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!("⚠️  FRONTEND_URL is not a valid origin, CORS will reject browsers");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

// Full application: routes, docs and the middleware stack
pub fn create_app(state: AppState) -> Router {
    if state.config.is_production() {
        tracing::warn!("Running in PRODUCTION mode - strict validation enabled");
    } else {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if state.config.maintenance_mode {
        tracing::warn!("🚧 MAINTENANCE_MODE is on, only staff requests are served");
    }

    let cors = cors_layer(&state.config.frontend_url);

    Router::new()
        .route("/health", get(catalog_handlers::health_check))
        .route("/info", get(catalog_handlers::get_service_info))
        .merge(build_api_routes(state.clone()))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(not_found_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(30),
                ))
                .layer(cors)
                .layer(axum::middleware::from_fn(security_headers_middleware)),
        )
        .with_state(state)
}

async fn not_found_handler() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "API endpoint not found")
}

// Security headers for every response
async fn security_headers_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl axum::response::IntoResponse, std::convert::Infallible> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    let csp = std::env::var("CSP_POLICY").unwrap_or_else(|_| {
        "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; connect-src 'self'; frame-ancestors 'none'".to_string()
    });
    if let Ok(value) = HeaderValue::from_str(&csp) {
        headers.insert("Content-Security-Policy", value);
    }

    let env = std::env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());

    match env.as_str() {
        "production" => {
            headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
            headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
            headers.insert(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=31536000; includeSubDomains"),
            );
            headers.insert(
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            );
        }
        _ => {
            headers.insert("X-Frame-Options", HeaderValue::from_static("SAMEORIGIN"));
            headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
        }
    }

    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
    }

    let version = std::env::var("APP_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
    if let Ok(value) = HeaderValue::from_str(&version) {
        headers.insert("X-Print-Service-Version", value);
    }

    headers.remove(header::SERVER);

    Ok(response)
}
