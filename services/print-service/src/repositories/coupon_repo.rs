use sqlx::PgPool;

use crate::{
    domain::coupon::{normalize_code, Coupon, CreateCouponRequest},
    error::AppError,
    utils::money::to_numeric,
};

const COUPON_COLUMNS: &str = "id, code, discount_type, discount_value, \
    (max_discount * 100)::BIGINT AS max_discount_paise, \
    (min_order * 100)::BIGINT AS min_order_paise, \
    valid_from, valid_until, usage_limit, times_used, is_active, created_at";

pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Coupon>, AppError> {
    let sql = format!("SELECT {} FROM coupons WHERE code = $1", COUPON_COLUMNS);

    let coupon = sqlx::query_as::<_, Coupon>(&sql)
        .bind(normalize_code(code))
        .fetch_optional(pool)
        .await?;

    Ok(coupon)
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Coupon>, AppError> {
    let sql = format!("SELECT {} FROM coupons ORDER BY created_at DESC", COUPON_COLUMNS);

    let coupons = sqlx::query_as::<_, Coupon>(&sql).fetch_all(pool).await?;
    Ok(coupons)
}

pub async fn create(pool: &PgPool, request: &CreateCouponRequest) -> Result<Coupon, AppError> {
    let sql = format!(
        "INSERT INTO coupons (
            code, discount_type, discount_value, max_discount, min_order,
            valid_from, valid_until, usage_limit
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}",
        COUPON_COLUMNS
    );

    let result = sqlx::query_as::<_, Coupon>(&sql)
        .bind(normalize_code(&request.code))
        .bind(request.discount_type.as_str())
        .bind(request.discount_value)
        .bind(request.max_discount_paise.map(to_numeric))
        .bind(to_numeric(request.min_order_paise))
        .bind(request.valid_from)
        .bind(request.valid_until)
        .bind(request.usage_limit)
        .fetch_one(pool)
        .await;

    match result {
        Ok(coupon) => Ok(coupon),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(AppError::conflict(format!(
            "Coupon {} already exists",
            normalize_code(&request.code)
        ))),
        Err(e) => Err(e.into()),
    }
}

// Count one use of a coupon; the guard keeps times_used within usage_limit
pub async fn redeem(pool: &PgPool, code: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE coupons SET times_used = times_used + 1
         WHERE code = $1 AND (usage_limit IS NULL OR times_used < usage_limit)",
    )
    .bind(normalize_code(code))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
