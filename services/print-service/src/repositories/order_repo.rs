use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    domain::{
        cart::CartItem,
        checkout::CheckoutStore,
        coupon::Coupon,
        order::{NewOrder, Order, OrderFilter},
        retention::{PurgeCandidate, RetentionCategory, RetentionStore, StatusFileCount, TempReferences},
    },
    error::AppError,
    repositories::{cart_repo::CART_COLUMNS, coupon_repo},
    utils::money::to_numeric,
};

const ORDER_COLUMNS: &str = "id, order_code, owner_id, cart_item_id, service, file_path, file_name, \
    pages, copies, print_mode, sides, color_pages, location, \
    (price * 100)::BIGINT AS price_paise, (discount * 100)::BIGINT AS discount_paise, \
    coupon_code, status, payment_status, transaction_id, gateway_ref, file_purged_at, \
    created_at, updated_at";

// Repository for order rows and the cart rows a checkout touches
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Order history of a customer, newest first
    pub async fn list_for_owner(&self, owner_id: i32) -> Result<Vec<Order>, AppError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
            ORDER_COLUMNS
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Order>, AppError> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);

        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    // Staff view with optional status filters
    pub async fn list_filtered(&self, filter: &OrderFilter) -> Result<Vec<Order>, AppError> {
        let sql = format!(
            "SELECT {} FROM orders
             WHERE ($1::TEXT IS NULL OR status = $1)
               AND ($2::TEXT IS NULL OR payment_status = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT 500",
            ORDER_COLUMNS
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(&filter.status)
            .bind(&filter.payment_status)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    // Paid orders at the given locations, for dealer and delivery dashboards
    pub async fn list_paid_at_locations(
        &self,
        locations: &[String],
        statuses: &[String],
    ) -> Result<Vec<Order>, AppError> {
        let locations: Vec<String> = locations.iter().map(|l| l.to_lowercase()).collect();
        let sql = format!(
            "SELECT {} FROM orders
             WHERE payment_status = 'Success'
               AND LOWER(location) = ANY($1)
               AND (cardinality($2::TEXT[]) = 0 OR status = ANY($2))
             ORDER BY created_at DESC, id DESC",
            ORDER_COLUMNS
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(&locations)
            .bind(statuses)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    /// Move an order to `next` only if it is still in `current`.
    pub async fn update_status(
        &self,
        id: i32,
        current: &str,
        next: &str,
    ) -> Result<Option<Order>, AppError> {
        let sql = format!(
            "UPDATE orders SET status = $3, updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {}",
            ORDER_COLUMNS
        );

        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(current)
            .bind(next)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    pub async fn status_file_counts(&self) -> Result<Vec<StatusFileCount>, AppError> {
        let counts = sqlx::query_as::<_, StatusFileCount>(
            "SELECT status,
                    COUNT(*)::BIGINT AS orders,
                    COUNT(*) FILTER (WHERE file_path IS NOT NULL AND file_path <> '')::BIGINT AS with_files
             FROM orders
             GROUP BY status
             ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}

fn by_id(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by_key(|o| o.id);
    orders
}

#[async_trait]
impl CheckoutStore for OrderRepository {
    async fn lock_cart(&self, user_id: i32, transaction_id: &str) -> Result<Vec<CartItem>, AppError> {
        let sql = format!(
            "UPDATE cart_items SET checkout_txn = $2
             WHERE user_id = $1 AND checkout_txn IS NULL
             RETURNING {}",
            CART_COLUMNS
        );

        let mut items = sqlx::query_as::<_, CartItem>(&sql)
            .bind(user_id)
            .bind(transaction_id)
            .fetch_all(&self.pool)
            .await?;
        items.sort_by_key(|i| i.id);

        Ok(items)
    }

    async fn unlock_cart(&self, transaction_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE cart_items SET checkout_txn = NULL WHERE checkout_txn = $1")
            .bind(transaction_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_locked_cart(&self, transaction_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE checkout_txn = $1")
            .bind(transaction_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, AppError> {
        coupon_repo::find_by_code(&self.pool, code).await
    }

    async fn redeem_coupon(&self, code: &str) -> Result<bool, AppError> {
        coupon_repo::redeem(&self.pool, code).await
    }

    async fn create_orders(&self, orders: &[NewOrder]) -> Result<Vec<Order>, AppError> {
        let sql = format!(
            "INSERT INTO orders (
                order_code, owner_id, cart_item_id, service, file_path, file_name,
                pages, copies, print_mode, sides, color_pages, location,
                price, discount, coupon_code, transaction_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}",
            ORDER_COLUMNS
        );

        // all rows of a batch or none
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(orders.len());

        for order in orders {
            let row = sqlx::query_as::<_, Order>(&sql)
                .bind(&order.order_code)
                .bind(order.owner_id)
                .bind(order.cart_item_id)
                .bind(&order.service)
                .bind(&order.file_path)
                .bind(&order.file_name)
                .bind(order.pages)
                .bind(order.copies)
                .bind(&order.print_mode)
                .bind(&order.sides)
                .bind(&order.color_pages)
                .bind(&order.location)
                .bind(to_numeric(order.price_paise))
                .bind(to_numeric(order.discount_paise))
                .bind(&order.coupon_code)
                .bind(&order.transaction_id)
                .fetch_one(&mut *tx)
                .await?;
            created.push(row);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn set_gateway_ref(&self, transaction_id: &str, gateway_ref: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE orders SET gateway_ref = $2, updated_at = NOW() WHERE transaction_id = $1")
            .bind(transaction_id)
            .bind(gateway_ref)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_batch(&self, transaction_id: &str) -> Result<Vec<Order>, AppError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE transaction_id = $1 ORDER BY id",
            ORDER_COLUMNS
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(transaction_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    async fn mark_batch_paid(
        &self,
        transaction_id: &str,
        gateway_ref: Option<&str>,
    ) -> Result<Vec<Order>, AppError> {
        let sql = format!(
            "UPDATE orders
             SET payment_status = 'Success',
                 gateway_ref = COALESCE($2, gateway_ref),
                 updated_at = NOW()
             WHERE transaction_id = $1 AND payment_status = 'Pending'
             RETURNING {}",
            ORDER_COLUMNS
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(transaction_id)
            .bind(gateway_ref)
            .fetch_all(&self.pool)
            .await?;

        Ok(by_id(orders))
    }

    async fn mark_batch_failed(&self, transaction_id: &str) -> Result<Vec<Order>, AppError> {
        let sql = format!(
            "UPDATE orders
             SET payment_status = 'Failed',
                 status = 'Cancelled',
                 file_path = NULL,
                 updated_at = NOW()
             WHERE transaction_id = $1 AND payment_status = 'Pending'
             RETURNING {}",
            ORDER_COLUMNS
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(transaction_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(by_id(orders))
    }

    async fn set_order_file(&self, order_id: i32, file_path: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE orders SET file_path = $2, updated_at = NOW() WHERE id = $1")
            .bind(order_id)
            .bind(file_path)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn stale_batches(&self, older_than: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT transaction_id FROM orders
             WHERE payment_status = 'Pending' AND created_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(txn,)| txn).collect())
    }
}

fn category_clause(category: RetentionCategory) -> &'static str {
    match category {
        RetentionCategory::Delivered => "status = 'Delivered'",
        RetentionCategory::Cancelled => {
            "status IN ('Cancelled', 'Rejected') AND payment_status <> 'Failed'"
        }
        RetentionCategory::Failed => "payment_status = 'Failed'",
    }
}

#[async_trait]
impl RetentionStore for OrderRepository {
    async fn purge_candidates(
        &self,
        category: RetentionCategory,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PurgeCandidate>, AppError> {
        let sql = format!(
            "SELECT id, order_code, file_path, status, updated_at FROM orders
             WHERE {}
               AND file_path IS NOT NULL AND file_path <> ''
               AND updated_at < $1
             ORDER BY updated_at ASC",
            category_clause(category)
        );

        let candidates = sqlx::query_as::<_, PurgeCandidate>(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        Ok(candidates)
    }

    async fn mark_purged(&self, order_id: i32, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE orders SET file_path = NULL, file_purged_at = $2 WHERE id = $1")
            .bind(order_id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn temp_references(&self) -> Result<TempReferences, AppError> {
        let cart: Vec<(String,)> =
            sqlx::query_as("SELECT file_path FROM cart_items WHERE file_path LIKE 'temp/%'")
                .fetch_all(&self.pool)
                .await?;

        let orders: Vec<(String,)> =
            sqlx::query_as("SELECT file_path FROM orders WHERE file_path LIKE 'temp/%'")
                .fetch_all(&self.pool)
                .await?;

        Ok(TempReferences {
            cart: cart.into_iter().map(|(p,)| p).collect(),
            orders: orders.into_iter().map(|(p,)| p).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_clauses_follow_domain_rules() {
        assert!(category_clause(RetentionCategory::Delivered).contains("'Delivered'"));
        assert!(category_clause(RetentionCategory::Cancelled).contains("<> 'Failed'"));
        assert!(category_clause(RetentionCategory::Failed).starts_with("payment_status"));
    }

    #[test]
    fn test_money_columns_are_read_as_paise() {
        assert!(ORDER_COLUMNS.contains("AS price_paise"));
        assert!(ORDER_COLUMNS.contains("AS discount_paise"));
        assert!(CART_COLUMNS.contains("AS price_paise"));
    }
}
