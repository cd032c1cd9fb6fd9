use sqlx::PgPool;

use crate::{
    domain::cart::{CartItem, NewCartItem},
    error::AppError,
    utils::money::to_numeric,
};

pub(crate) const CART_COLUMNS: &str = "id, user_id, service, file_path, file_name, pages, copies, \
    print_mode, sides, color_pages, location, (price * 100)::BIGINT AS price_paise, \
    checkout_txn, created_at";

// Insert a staged print job
pub async fn insert_item(pool: &PgPool, item: &NewCartItem) -> Result<CartItem, AppError> {
    let sql = format!(
        "INSERT INTO cart_items (
            user_id, service, file_path, file_name, pages, copies,
            print_mode, sides, color_pages, location, price
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}",
        CART_COLUMNS
    );

    let row = sqlx::query_as::<_, CartItem>(&sql)
        .bind(item.user_id)
        .bind(item.service.as_str())
        .bind(&item.file_path)
        .bind(&item.file_name)
        .bind(item.pages as i32)
        .bind(item.copies as i32)
        .bind(item.print_mode.as_str())
        .bind(item.sides.as_str())
        .bind(&item.color_pages)
        .bind(&item.location)
        .bind(to_numeric(item.price_paise))
        .fetch_one(pool)
        .await?;

    Ok(row)
}

// Items visible in the cart, i.e. not held by a checkout
pub async fn list_unlocked(pool: &PgPool, user_id: i32) -> Result<Vec<CartItem>, AppError> {
    let sql = format!(
        "SELECT {} FROM cart_items
         WHERE user_id = $1 AND checkout_txn IS NULL
         ORDER BY created_at ASC, id ASC",
        CART_COLUMNS
    );

    let items = sqlx::query_as::<_, CartItem>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(items)
}

pub async fn find_owned(pool: &PgPool, id: i32, user_id: i32) -> Result<Option<CartItem>, AppError> {
    let sql = format!(
        "SELECT {} FROM cart_items WHERE id = $1 AND user_id = $2",
        CART_COLUMNS
    );

    let item = sqlx::query_as::<_, CartItem>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(item)
}

// Remove an unlocked item; locked items are left untouched
pub async fn delete_unlocked(pool: &PgPool, id: i32, user_id: i32) -> Result<Option<CartItem>, AppError> {
    let sql = format!(
        "DELETE FROM cart_items
         WHERE id = $1 AND user_id = $2 AND checkout_txn IS NULL
         RETURNING {}",
        CART_COLUMNS
    );

    let item = sqlx::query_as::<_, CartItem>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(item)
}
