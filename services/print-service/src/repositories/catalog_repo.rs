use sqlx::{types::Json, PgPool};

use crate::{
    domain::{catalog::Location, pricing::PricingConfig},
    error::AppError,
};

pub async fn list_active_locations(pool: &PgPool) -> Result<Vec<Location>, AppError> {
    let locations = sqlx::query_as::<_, Location>(
        "SELECT id, name FROM locations WHERE is_active = TRUE ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(locations)
}

// The singleton pricing row, or the built-in rates when none was saved
pub async fn load_pricing(pool: &PgPool) -> Result<PricingConfig, AppError> {
    let row: Option<(Json<PricingConfig>,)> =
        sqlx::query_as("SELECT config FROM pricing_config WHERE id = 1")
            .fetch_optional(pool)
            .await?;

    match row {
        Some((Json(config),)) => Ok(config),
        None => Ok(PricingConfig::default()),
    }
}

pub async fn save_pricing(pool: &PgPool, config: &PricingConfig) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO pricing_config (id, config) VALUES (1, $1)
         ON CONFLICT (id) DO UPDATE SET config = EXCLUDED.config, updated_at = NOW()",
    )
    .bind(Json(config))
    .execute(pool)
    .await?;

    Ok(())
}
