use sqlx::PgPool;

use crate::{domain::user::Account, error::AppError};

const ACCOUNT_SELECT: &str = "SELECT u.id, u.username, u.email, u.password_hash, u.is_staff, u.is_active,
        p.mobile, p.address,
        COALESCE(p.is_dealer, FALSE) AS is_dealer,
        COALESCE(p.is_delivery, FALSE) AS is_delivery,
        COALESCE(p.dealer_locations, '{}') AS dealer_locations,
        u.last_login_at, u.created_at
    FROM users u
    LEFT JOIN user_profiles p ON p.user_id = u.id";

pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Account>, AppError> {
    let sql = format!("{} WHERE u.id = $1", ACCOUNT_SELECT);

    let account = sqlx::query_as::<_, Account>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(account)
}

// Login accepts either the username or the email, case-insensitively
pub async fn find_by_login(pool: &PgPool, username_or_email: &str) -> Result<Option<Account>, AppError> {
    let sql = format!(
        "{} WHERE LOWER(u.username) = LOWER($1) OR LOWER(u.email) = LOWER($1)",
        ACCOUNT_SELECT
    );

    let account = sqlx::query_as::<_, Account>(&sql)
        .bind(username_or_email.trim())
        .fetch_optional(pool)
        .await?;

    Ok(account)
}

// Create user and profile in one transaction
pub async fn create(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
    mobile: Option<&str>,
) -> Result<i32, AppError> {
    let mut tx = pool.begin().await?;

    let exists: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($2))",
    )
    .bind(username)
    .bind(email)
    .fetch_one(&mut *tx)
    .await?;

    if exists.0 {
        return Err(AppError::conflict("Username or email is already registered"));
    }

    let inserted: Result<(i32,), sqlx::Error> = sqlx::query_as(
        "INSERT INTO users (username, email, password_hash) VALUES ($1, LOWER($2), $3) RETURNING id",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_one(&mut *tx)
    .await;

    // a concurrent registration can still win the unique index
    let (user_id,) = match inserted {
        Ok(row) => row,
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(AppError::conflict("Username or email is already registered"));
        }
        Err(e) => return Err(e.into()),
    };

    sqlx::query("INSERT INTO user_profiles (user_id, mobile) VALUES ($1, $2)")
        .bind(user_id)
        .bind(mobile)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(user_id)
}

pub async fn touch_last_login(pool: &PgPool, id: i32) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn update_profile(
    pool: &PgPool,
    id: i32,
    mobile: Option<&str>,
    address: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO user_profiles (user_id, mobile, address) VALUES ($1, $2, $3)
         ON CONFLICT (user_id) DO UPDATE
         SET mobile = EXCLUDED.mobile, address = EXCLUDED.address, updated_at = NOW()",
    )
    .bind(id)
    .bind(mobile)
    .bind(address)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_roles(
    pool: &PgPool,
    id: i32,
    is_dealer: bool,
    is_delivery: bool,
    locations: &[String],
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO user_profiles (user_id, is_dealer, is_delivery, dealer_locations) VALUES ($1, $2, $3, $4)
         ON CONFLICT (user_id) DO UPDATE
         SET is_dealer = EXCLUDED.is_dealer,
             is_delivery = EXCLUDED.is_delivery,
             dealer_locations = EXCLUDED.dealer_locations,
             updated_at = NOW()",
    )
    .bind(id)
    .bind(is_dealer)
    .bind(is_delivery)
    .bind(locations)
    .execute(pool)
    .await?;

    Ok(())
}
