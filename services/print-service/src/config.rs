// Print Service Configuration
use sqlx::{postgres::PgConnectOptions, postgres::PgPoolOptions, PgPool};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::checkout::{CheckoutUrls, PaymentGateway};
use crate::handlers::gateway_service::GatewayClient;
use crate::repositories::order_repo::OrderRepository;
use crate::utils::storage::FileStorage;

// Application configuration from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub jwt_secret: String,
    pub jwt_access_expiry: i64,
    pub media_root: String,
    pub max_upload_mb: u64,
    pub gateway_api_url: String,
    pub gateway_merchant_id: String,
    pub gateway_secret_key: String,
    pub gateway_redirect_url: String,
    pub gateway_callback_url: String,
    pub checkout_expiry_minutes: i64,
    pub frontend_url: String,
    pub maintenance_mode: bool,
    pub disable_scheduler: bool,
    pub app_version: String,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    // Load configuration from the environment with validation
    pub fn from_env() -> Result<Self, String> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set")?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| "JWT_SECRET must be set")?;

        if !cfg!(debug_assertions) && jwt_secret.contains("change-this") {
            return Err("JWT_SECRET is still the default! Change it for production".to_string());
        }

        let server_host = env::var("PRINT_SERVICE_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env_parsed("PRINT_SERVICE_PORT", 8080u16)?;

        let environment = env::var("RUST_ENV")
            .unwrap_or_else(|_| "development".to_string());

        let jwt_access_expiry = env_parsed("JWT_ACCESS_TOKEN_EXPIRY", 86_400i64)?;

        let media_root = env::var("MEDIA_ROOT")
            .unwrap_or_else(|_| "./media".to_string());

        let max_upload_mb = env_parsed("MAX_UPLOAD_MB", 50u64)?;

        let gateway_api_url = env::var("GATEWAY_API_URL")
            .map_err(|_| "GATEWAY_API_URL must be set")?;

        let gateway_merchant_id = env::var("GATEWAY_MERCHANT_ID")
            .map_err(|_| "GATEWAY_MERCHANT_ID must be set")?;

        let gateway_secret_key = env::var("GATEWAY_SECRET_KEY")
            .map_err(|_| "GATEWAY_SECRET_KEY must be set")?;

        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let gateway_redirect_url = env::var("GATEWAY_REDIRECT_URL")
            .unwrap_or_else(|_| format!("{}/payment/return", frontend_url.trim_end_matches('/')));

        let gateway_callback_url = env::var("GATEWAY_CALLBACK_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}/api/payments/webhook", server_port));

        let checkout_expiry_minutes = env_parsed("CHECKOUT_EXPIRY_MINUTES", 30i64)?;
        if checkout_expiry_minutes <= 0 {
            return Err("CHECKOUT_EXPIRY_MINUTES must be positive".to_string());
        }

        let app_version = env::var("APP_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        Ok(AppConfig {
            database_url,
            server_host,
            server_port,
            environment,
            jwt_secret,
            jwt_access_expiry,
            media_root,
            max_upload_mb,
            gateway_api_url,
            gateway_merchant_id,
            gateway_secret_key,
            gateway_redirect_url,
            gateway_callback_url,
            checkout_expiry_minutes,
            frontend_url,
            maintenance_mode: env_flag("MAINTENANCE_MODE"),
            disable_scheduler: env_flag("DISABLE_SCHEDULER"),
            app_version,
        })
    }

    // Helper to check production mode
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn host(&self) -> &str {
        &self.server_host
    }

    pub fn port(&self) -> u16 {
        self.server_port
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize) * 1024 * 1024
    }

    pub fn checkout_urls(&self) -> CheckoutUrls {
        CheckoutUrls {
            redirect_url: self.gateway_redirect_url.clone(),
            callback_url: self.gateway_callback_url.clone(),
        }
    }
}

// Settings for the cleanup command, which never talks to the gateway
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_url: String,
    pub media_root: String,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set")?;

        let media_root = env::var("MEDIA_ROOT")
            .unwrap_or_else(|_| "./media".to_string());

        Ok(StorageConfig {
            database_url,
            media_root,
        })
    }
}

// Initialise the database connection pool
pub async fn init_db_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    tracing::info!("🔌 Initializing Print Service database connection...");

    // Parse connection options and disable prepared statements
    let options = PgConnectOptions::from_str(database_url)?
        .statement_cache_capacity(0);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(3)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect_with(options)
        .await?;

    tracing::info!("✅ Print Service database pool initialized");
    Ok(pool)
}

// Health check database connection
pub async fn check_db_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1")
        .fetch_optional(pool)
        .await
        .is_ok()
}

// Application state shared with every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: AppConfig,
    pub storage: FileStorage,
    pub orders: OrderRepository,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl axum::extract::FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl axum::extract::FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl axum::extract::FromRef<AppState> for FileStorage {
    fn from_ref(state: &AppState) -> Self {
        state.storage.clone()
    }
}

impl AppState {
    // Initialise application state
    pub async fn new(config: AppConfig) -> Result<Self, String> {
        let db = init_db_pool(&config.database_url)
            .await
            .map_err(|e| format!("Failed to init database: {}", e))?;

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        let storage = FileStorage::new(&config.media_root);
        storage
            .ensure_layout()
            .map_err(|e| format!("Failed to prepare MEDIA_ROOT: {}", e))?;

        let gateway = GatewayClient::new(
            http_client,
            &config.gateway_api_url,
            &config.gateway_merchant_id,
            &config.gateway_secret_key,
        );

        let orders = OrderRepository::new(db.clone());

        Ok(AppState {
            db,
            config,
            storage,
            orders,
            gateway: Arc::new(gateway),
        })
    }

    // Health check of every dependency
    pub async fn health_check(&self) -> HealthStatus {
        let db_healthy = check_db_health(&self.db).await;
        let storage_healthy = self.storage.root().is_dir();

        HealthStatus {
            database: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
            storage: if storage_healthy { "healthy" } else { "unhealthy" }.to_string(),
            overall: if db_healthy && storage_healthy { "healthy" } else { "degraded" }.to_string(),
        }
    }
}

// Response for the health check endpoint
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct HealthStatus {
    pub database: String,
    pub storage: String,
    pub overall: String,
}
