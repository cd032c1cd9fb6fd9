use dotenvy::dotenv;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use print_service::{
    config::{AppConfig, AppState},
    error::{AppError, AppResult},
    routes::create_app,
    scheduler::PrintScheduler,
};

#[tokio::main]
async fn main() -> AppResult<()> {
    match dotenv() {
        Ok(path) => println!("✅ Environment loaded from: {:?}", path),
        Err(e) => println!("⚠️  No .env file loaded ({}), using process environment", e),
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "print_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()
        .map_err(|e| AppError::InternalError(format!("Config error: {}", e)))?;

    tracing::info!("🖨️  Starting FastCopy Print Service v{}", config.app_version);
    tracing::info!("📊 Database: {}", mask_connection_string(&config.database_url));
    tracing::info!("🌍 Environment: {}", config.environment);
    tracing::info!("📁 Media root: {}", config.media_root);
    tracing::info!("🔗 Host: {}:{}", config.host(), config.port());

    if config.is_production() && config.jwt_secret.contains("change-this") {
        tracing::warn!("⚠️  JWT_SECRET still has its placeholder value in production");
    }

    let app_state = AppState::new(config.clone())
        .await
        .map_err(|e| AppError::InternalError(format!("State initialization failed: {}", e)))?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;
    tracing::info!("✅ Database migrations applied");

    PrintScheduler::new(app_state.clone()).start();

    let app = create_app(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host(), config.port())
        .parse()
        .map_err(|e| AppError::InternalError(format!("Invalid server address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("🌐 Server running on http://{}", addr);
    tracing::info!("📚 API Docs: http://{}/docs", addr);
    tracing::info!("🏥 Health Check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::InternalError(format!("Server error: {}", e)))?;

    tracing::info!("👋 Print Service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("🛑 Shutdown signal received, finishing in-flight requests");
}

// Hide the password part of a connection string
fn mask_connection_string(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            match credentials.find(':') {
                Some(colon) => format!(
                    "{}{}:****{}",
                    &url[..scheme_end + 3],
                    &credentials[..colon],
                    &url[at..]
                ),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}
