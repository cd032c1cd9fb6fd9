//! Checkout and payment reconciliation.
//!
//! A checkout locks the caller's cart items under a fresh transaction id,
//! turns them into Pending orders and opens a gateway session for the batch.
//! The webhook, the status poll and the stale-checkout sweep all funnel into
//! [`apply_outcome`], which transitions rows with a guarded update so only the
//! delivery that actually moved the rows runs the side effects.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::cart::CartItem;
use crate::domain::coupon::{allocate_discount, normalize_code, Coupon};
use crate::domain::order::{
    generate_order_code, generate_transaction_id, NewOrder, Order, PaymentStatus,
};
use crate::domain::payment::{
    map_gateway_status, GatewayError, GatewayOutcome, GatewaySession, GatewayTransaction,
    SessionRequest,
};
use crate::domain::pricing::{quote, PricingConfig, UserType};
use crate::error::{AppError, AppResult};
use crate::utils::money::format_rupees;
use crate::utils::storage::FileStorage;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError>;

    async fn fetch_status(&self, transaction_id: &str) -> Result<GatewayTransaction, GatewayError>;
}

/// Persistence needed by the checkout flow.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Tag every unlocked cart item of the user with the transaction id.
    async fn lock_cart(&self, user_id: i32, transaction_id: &str) -> AppResult<Vec<CartItem>>;

    async fn unlock_cart(&self, transaction_id: &str) -> AppResult<u64>;

    async fn delete_locked_cart(&self, transaction_id: &str) -> AppResult<u64>;

    async fn find_coupon(&self, code: &str) -> AppResult<Option<Coupon>>;

    /// Count one use unless the usage limit is already reached. `false` when no use was counted.
    async fn redeem_coupon(&self, code: &str) -> AppResult<bool>;

    async fn create_orders(&self, orders: &[NewOrder]) -> AppResult<Vec<Order>>;

    async fn set_gateway_ref(&self, transaction_id: &str, gateway_ref: &str) -> AppResult<()>;

    async fn find_batch(&self, transaction_id: &str) -> AppResult<Vec<Order>>;

    /// Pending -> Success. Returns only the rows this call transitioned.
    async fn mark_batch_paid(
        &self,
        transaction_id: &str,
        gateway_ref: Option<&str>,
    ) -> AppResult<Vec<Order>>;

    /// Pending -> Failed/Cancelled, clearing the file reference. Returns only
    /// the rows this call transitioned.
    async fn mark_batch_failed(&self, transaction_id: &str) -> AppResult<Vec<Order>>;

    async fn set_order_file(&self, order_id: i32, file_path: &str) -> AppResult<()>;

    /// Transaction ids whose orders are still Pending and older than the cutoff.
    async fn stale_batches(&self, older_than: DateTime<Utc>) -> AppResult<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct CheckoutCustomer {
    pub user_id: i32,
    pub email: String,
    pub user_type: UserType,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub coupon_code: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub redirect_url: String,
    pub callback_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutStarted {
    pub transaction_id: String,
    pub order_codes: Vec<String>,
    pub subtotal_paise: i64,
    pub discount_paise: i64,
    pub total_paise: i64,
    pub total_display: String,
    pub paid: bool,
    pub payment_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Success { gateway_ref: Option<String> },
    Pending,
    Failure { reason: String },
}

impl PaymentOutcome {
    pub fn from_gateway(status: &str, gateway_ref: Option<String>) -> Self {
        match map_gateway_status(status) {
            GatewayOutcome::Success => PaymentOutcome::Success { gateway_ref },
            GatewayOutcome::Pending => PaymentOutcome::Pending,
            GatewayOutcome::Failure => PaymentOutcome::Failure {
                reason: format!("gateway reported {}", status),
            },
        }
    }

    fn kind(&self) -> GatewayOutcome {
        match self {
            PaymentOutcome::Success { .. } => GatewayOutcome::Success,
            PaymentOutcome::Pending => GatewayOutcome::Pending,
            PaymentOutcome::Failure { .. } => GatewayOutcome::Failure,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconcileReport {
    pub transaction_id: String,
    pub outcome: GatewayOutcome,
    pub payment_status: String,
    pub transitioned: usize,
    pub already_processed: bool,
    pub owner_id: i32,
    pub files_promoted: usize,
    pub promotion_failures: usize,
    pub cart_items_affected: u64,
}

impl ReconcileReport {
    fn unchanged(transaction_id: &str, outcome: GatewayOutcome, first: &Order, processed: bool) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            outcome,
            payment_status: first.payment_status.clone(),
            transitioned: 0,
            already_processed: processed,
            owner_id: first.owner_id,
            files_promoted: 0,
            promotion_failures: 0,
            cart_items_affected: 0,
        }
    }
}

struct PreparedBatch {
    orders: Vec<NewOrder>,
    subtotal: i64,
    discount: i64,
}

async fn prepare_batch(
    store: &dyn CheckoutStore,
    pricing: &PricingConfig,
    customer: &CheckoutCustomer,
    request: &CheckoutRequest,
    transaction_id: &str,
    items: &[CartItem],
    now: DateTime<Utc>,
) -> AppResult<PreparedBatch> {
    let table = pricing.table(customer.user_type);

    // never trust the price stored at upload time
    let mut prices = Vec::with_capacity(items.len());
    for item in items {
        let priced = quote(table, &item.quote_input()?)?;
        prices.push(priced.total);
    }
    let subtotal: i64 = prices.iter().sum();

    let coupon_code = request
        .coupon_code
        .as_deref()
        .map(normalize_code)
        .filter(|c| !c.is_empty());

    let discount = match &coupon_code {
        Some(code) => {
            let coupon = store
                .find_coupon(code)
                .await?
                .ok_or_else(|| AppError::validation("Coupon code is not valid"))?;
            coupon.discount_for(subtotal, now)?
        }
        None => 0,
    };
    let shares = allocate_discount(&prices, discount);

    let location = request
        .location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);

    let orders = items
        .iter()
        .zip(prices.iter().zip(shares.iter()))
        .enumerate()
        .map(|(index, (item, (price, share)))| NewOrder {
            order_code: generate_order_code(transaction_id, index),
            owner_id: customer.user_id,
            cart_item_id: Some(item.id),
            service: item.service.clone(),
            file_path: Some(item.file_path.clone()),
            file_name: item.file_name.clone(),
            pages: item.pages,
            copies: item.copies,
            print_mode: item.print_mode.clone(),
            sides: item.sides.clone(),
            color_pages: item.color_pages.clone(),
            location: location.clone().or_else(|| item.location.clone()),
            price_paise: *price,
            discount_paise: *share,
            coupon_code: coupon_code.clone().filter(|_| discount > 0),
            transaction_id: transaction_id.to_string(),
        })
        .collect();

    Ok(PreparedBatch {
        orders,
        subtotal,
        discount,
    })
}

async fn release_cart(store: &dyn CheckoutStore, transaction_id: &str) {
    match store.unlock_cart(transaction_id).await {
        Ok(n) => tracing::info!("↩️ Released {} cart item(s) held by {}", n, transaction_id),
        Err(e) => tracing::error!("❌ Failed to release cart items of {}: {}", transaction_id, e),
    }
}

/// Turn the caller's cart into a Pending batch and open a gateway session.
pub async fn begin_checkout(
    store: &dyn CheckoutStore,
    gateway: &dyn PaymentGateway,
    storage: &FileStorage,
    pricing: &PricingConfig,
    customer: &CheckoutCustomer,
    request: &CheckoutRequest,
    urls: &CheckoutUrls,
) -> AppResult<CheckoutStarted> {
    let now = Utc::now();
    let transaction_id = generate_transaction_id(now);

    let items = store.lock_cart(customer.user_id, &transaction_id).await?;
    if items.is_empty() {
        return Err(AppError::validation("Your cart is empty"));
    }
    tracing::info!(
        "🛒 Checkout {} started by user {} with {} item(s)",
        transaction_id,
        customer.user_id,
        items.len()
    );

    let batch = match prepare_batch(store, pricing, customer, request, &transaction_id, &items, now).await {
        Ok(batch) => batch,
        Err(e) => {
            release_cart(store, &transaction_id).await;
            return Err(e);
        }
    };

    let orders = match store.create_orders(&batch.orders).await {
        Ok(orders) => orders,
        Err(e) => {
            release_cart(store, &transaction_id).await;
            return Err(e);
        }
    };

    let total = batch.subtotal - batch.discount;
    let mut started = CheckoutStarted {
        transaction_id: transaction_id.clone(),
        order_codes: orders.iter().map(|o| o.order_code.clone()).collect(),
        subtotal_paise: batch.subtotal,
        discount_paise: batch.discount,
        total_paise: total,
        total_display: format_rupees(total),
        paid: false,
        payment_url: None,
    };

    if total == 0 {
        tracing::info!("🎟️ Batch {} fully discounted, finalising without gateway", transaction_id);
        apply_outcome(
            store,
            storage,
            &transaction_id,
            PaymentOutcome::Success { gateway_ref: None },
        )
        .await?;
        started.paid = true;
        return Ok(started);
    }

    let session_request = SessionRequest {
        transaction_id: transaction_id.clone(),
        amount_paise: total,
        currency: "INR".to_string(),
        customer_email: customer.email.clone(),
        description: format!("FastCopy order of {} item(s)", orders.len()),
        redirect_url: urls.redirect_url.clone(),
        callback_url: urls.callback_url.clone(),
    };

    match gateway.create_session(&session_request).await {
        Ok(session) => {
            store
                .set_gateway_ref(&transaction_id, &session.gateway_ref)
                .await?;
            tracing::info!(
                "💳 Gateway session {} opened for {} ({})",
                session.gateway_ref,
                transaction_id,
                format_rupees(total)
            );
            started.payment_url = session.payment_url;
            Ok(started)
        }
        Err(e) => {
            tracing::error!("❌ Gateway session for {} failed: {}", transaction_id, e);
            apply_outcome(
                store,
                storage,
                &transaction_id,
                PaymentOutcome::Failure {
                    reason: e.to_string(),
                },
            )
            .await?;
            Err(AppError::gateway(e.to_string()))
        }
    }
}

async fn already_processed(
    store: &dyn CheckoutStore,
    transaction_id: &str,
    outcome: GatewayOutcome,
) -> AppResult<ReconcileReport> {
    let batch = store.find_batch(transaction_id).await?;
    let first = batch
        .first()
        .ok_or_else(|| AppError::not_found(format!("Unknown transaction {}", transaction_id)))?;

    if outcome == GatewayOutcome::Success && first.payment() == PaymentStatus::Failed {
        tracing::warn!(
            "⚠️ Success for {} arrived after the batch had failed, leaving it Failed",
            transaction_id
        );
    } else {
        tracing::info!(
            "🔁 Batch {} already processed ({})",
            transaction_id,
            first.payment_status
        );
    }

    Ok(ReconcileReport::unchanged(transaction_id, outcome, first, true))
}

/// Apply a payment result to a batch. Safe to call any number of times.
pub async fn apply_outcome(
    store: &dyn CheckoutStore,
    storage: &FileStorage,
    transaction_id: &str,
    outcome: PaymentOutcome,
) -> AppResult<ReconcileReport> {
    let kind = outcome.kind();

    match outcome {
        PaymentOutcome::Pending => {
            let batch = store.find_batch(transaction_id).await?;
            let first = batch.first().ok_or_else(|| {
                AppError::not_found(format!("Unknown transaction {}", transaction_id))
            })?;
            Ok(ReconcileReport::unchanged(transaction_id, kind, first, false))
        }

        PaymentOutcome::Success { gateway_ref } => {
            let rows = store
                .mark_batch_paid(transaction_id, gateway_ref.as_deref())
                .await?;
            if rows.is_empty() {
                return already_processed(store, transaction_id, kind).await;
            }
            let owner_id = rows[0].owner_id;
            let now = Utc::now();

            let mut files_promoted = 0;
            let mut promotion_failures = 0;
            for order in &rows {
                let Some(path) = order.file_path.as_deref() else {
                    continue;
                };
                if !FileStorage::is_temp_path(path) {
                    continue;
                }
                match storage.promote(path, &order.order_code, &order.file_name, now) {
                    Ok(permanent) => {
                        store.set_order_file(order.id, &permanent).await?;
                        files_promoted += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ Could not promote {} for order {}: {}",
                            path,
                            order.order_code,
                            e
                        );
                        promotion_failures += 1;
                    }
                }
            }

            let cleared = store.delete_locked_cart(transaction_id).await?;

            if let Some(code) = rows.iter().find_map(|o| o.coupon_code.clone()) {
                // the limit is checked at checkout, but another batch may have used the last slot since
                if !store.redeem_coupon(&code).await? {
                    tracing::warn!(
                        "🎟️ Coupon {} hit its usage limit before batch {} was paid, use not counted",
                        code,
                        transaction_id
                    );
                }
            }

            tracing::info!(
                "✅ Batch {} paid: {} order(s) for user {}, {} file(s) promoted, {} cart item(s) cleared",
                transaction_id,
                rows.len(),
                owner_id,
                files_promoted,
                cleared
            );

            Ok(ReconcileReport {
                transaction_id: transaction_id.to_string(),
                outcome: kind,
                payment_status: PaymentStatus::Success.as_str().to_string(),
                transitioned: rows.len(),
                already_processed: false,
                owner_id,
                files_promoted,
                promotion_failures,
                cart_items_affected: cleared,
            })
        }

        PaymentOutcome::Failure { reason } => {
            let rows = store.mark_batch_failed(transaction_id).await?;
            if rows.is_empty() {
                return already_processed(store, transaction_id, kind).await;
            }
            let owner_id = rows[0].owner_id;
            let restored = store.unlock_cart(transaction_id).await?;

            tracing::warn!(
                "💸 Batch {} failed ({}): {} order(s) cancelled, {} cart item(s) restored for user {}",
                transaction_id,
                reason,
                rows.len(),
                restored,
                owner_id
            );

            Ok(ReconcileReport {
                transaction_id: transaction_id.to_string(),
                outcome: kind,
                payment_status: PaymentStatus::Failed.as_str().to_string(),
                transitioned: rows.len(),
                already_processed: false,
                owner_id,
                files_promoted: 0,
                promotion_failures: 0,
                cart_items_affected: restored,
            })
        }
    }
}

/// Ask the gateway about a batch and reconcile. A gateway that cannot be
/// reached leaves the batch Pending.
pub async fn refresh_status(
    store: &dyn CheckoutStore,
    gateway: &dyn PaymentGateway,
    storage: &FileStorage,
    transaction_id: &str,
) -> AppResult<ReconcileReport> {
    let batch = store.find_batch(transaction_id).await?;
    let first = batch
        .first()
        .ok_or_else(|| AppError::not_found(format!("Unknown transaction {}", transaction_id)))?;

    match first.payment() {
        PaymentStatus::Success => {
            return Ok(ReconcileReport::unchanged(transaction_id, GatewayOutcome::Success, first, true))
        }
        PaymentStatus::Failed => {
            return Ok(ReconcileReport::unchanged(transaction_id, GatewayOutcome::Failure, first, true))
        }
        PaymentStatus::Pending => {}
    }

    match gateway.fetch_status(transaction_id).await {
        Ok(remote) => {
            let outcome = PaymentOutcome::from_gateway(&remote.status, remote.gateway_ref);
            apply_outcome(store, storage, transaction_id, outcome).await
        }
        Err(e) => {
            tracing::warn!("⚠️ Status check for {} failed: {}", transaction_id, e);
            Ok(ReconcileReport::unchanged(transaction_id, GatewayOutcome::Pending, first, false))
        }
    }
}

/// Settle batches left Pending past the checkout window. Paid ones are
/// finalised; anything else is failed and the carts restored.
pub async fn expire_stale_checkouts(
    store: &dyn CheckoutStore,
    gateway: &dyn PaymentGateway,
    storage: &FileStorage,
    older_than: DateTime<Utc>,
) -> AppResult<usize> {
    let stale = store.stale_batches(older_than).await?;
    let mut settled = 0;

    for transaction_id in stale {
        let outcome = match gateway.fetch_status(&transaction_id).await {
            Ok(remote) => match PaymentOutcome::from_gateway(&remote.status, remote.gateway_ref) {
                PaymentOutcome::Success { gateway_ref } => PaymentOutcome::Success { gateway_ref },
                _ => PaymentOutcome::Failure {
                    reason: format!("checkout expired with gateway status {}", remote.status),
                },
            },
            Err(e) => PaymentOutcome::Failure {
                reason: format!("checkout expired, gateway unreachable: {}", e),
            },
        };

        match apply_outcome(store, storage, &transaction_id, outcome).await {
            Ok(report) if report.transitioned > 0 => settled += 1,
            Ok(_) => {}
            Err(e) => tracing::error!("❌ Failed to settle stale batch {}: {}", transaction_id, e),
        }
    }

    Ok(settled)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::order::{check_transition, OrderStatus, StatusActor, TransitionError};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryCheckoutStore {
        pub cart: Mutex<Vec<CartItem>>,
        pub orders: Mutex<Vec<Order>>,
        pub coupons: Mutex<Vec<Coupon>>,
    }

    impl MemoryCheckoutStore {
        pub fn add_cart_item(&self, user_id: i32, file_path: &str, pages: i32) -> i32 {
            let mut cart = self.cart.lock().unwrap();
            let id = cart.len() as i32 + 1;
            cart.push(CartItem {
                id,
                user_id,
                service: "Printing".to_string(),
                file_path: file_path.to_string(),
                file_name: format!("doc{}.pdf", id),
                pages,
                copies: 1,
                print_mode: "bw".to_string(),
                sides: "single".to_string(),
                color_pages: None,
                location: Some("Main Campus".to_string()),
                // stale upload-time price, checkout must re-price
                price_paise: 1,
                checkout_txn: None,
                created_at: Utc::now(),
            });
            id
        }

        fn visible_cart(&self, user_id: i32) -> Vec<CartItem> {
            self.cart
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.user_id == user_id && i.checkout_txn.is_none())
                .cloned()
                .collect()
        }

        fn batch(&self, transaction_id: &str) -> Vec<Order> {
            self.orders
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.transaction_id == transaction_id)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl CheckoutStore for MemoryCheckoutStore {
        async fn lock_cart(&self, user_id: i32, transaction_id: &str) -> AppResult<Vec<CartItem>> {
            let mut cart = self.cart.lock().unwrap();
            let mut locked = Vec::new();
            for item in cart
                .iter_mut()
                .filter(|i| i.user_id == user_id && i.checkout_txn.is_none())
            {
                item.checkout_txn = Some(transaction_id.to_string());
                locked.push(item.clone());
            }
            Ok(locked)
        }

        async fn unlock_cart(&self, transaction_id: &str) -> AppResult<u64> {
            let mut cart = self.cart.lock().unwrap();
            let mut n = 0;
            for item in cart
                .iter_mut()
                .filter(|i| i.checkout_txn.as_deref() == Some(transaction_id))
            {
                item.checkout_txn = None;
                n += 1;
            }
            Ok(n)
        }

        async fn delete_locked_cart(&self, transaction_id: &str) -> AppResult<u64> {
            let mut cart = self.cart.lock().unwrap();
            let before = cart.len();
            cart.retain(|i| i.checkout_txn.as_deref() != Some(transaction_id));
            Ok((before - cart.len()) as u64)
        }

        async fn find_coupon(&self, code: &str) -> AppResult<Option<Coupon>> {
            Ok(self
                .coupons
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.code == code)
                .cloned())
        }

        async fn redeem_coupon(&self, code: &str) -> AppResult<bool> {
            let mut coupons = self.coupons.lock().unwrap();
            match coupons
                .iter_mut()
                .find(|c| c.code == code && c.usage_limit.map_or(true, |limit| c.times_used < limit))
            {
                Some(c) => {
                    c.times_used += 1;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn create_orders(&self, new_orders: &[NewOrder]) -> AppResult<Vec<Order>> {
            let mut orders = self.orders.lock().unwrap();
            let mut created = Vec::new();
            for new in new_orders {
                let order = Order {
                    id: orders.len() as i32 + 1,
                    order_code: new.order_code.clone(),
                    owner_id: new.owner_id,
                    cart_item_id: new.cart_item_id,
                    service: new.service.clone(),
                    file_path: new.file_path.clone(),
                    file_name: new.file_name.clone(),
                    pages: new.pages,
                    copies: new.copies,
                    print_mode: new.print_mode.clone(),
                    sides: new.sides.clone(),
                    color_pages: new.color_pages.clone(),
                    location: new.location.clone(),
                    price_paise: new.price_paise,
                    discount_paise: new.discount_paise,
                    coupon_code: new.coupon_code.clone(),
                    status: "Pending".to_string(),
                    payment_status: "Pending".to_string(),
                    transaction_id: new.transaction_id.clone(),
                    gateway_ref: None,
                    file_purged_at: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                };
                orders.push(order.clone());
                created.push(order);
            }
            Ok(created)
        }

        async fn set_gateway_ref(&self, transaction_id: &str, gateway_ref: &str) -> AppResult<()> {
            for o in self
                .orders
                .lock()
                .unwrap()
                .iter_mut()
                .filter(|o| o.transaction_id == transaction_id)
            {
                o.gateway_ref = Some(gateway_ref.to_string());
            }
            Ok(())
        }

        async fn find_batch(&self, transaction_id: &str) -> AppResult<Vec<Order>> {
            Ok(self.batch(transaction_id))
        }

        async fn mark_batch_paid(
            &self,
            transaction_id: &str,
            gateway_ref: Option<&str>,
        ) -> AppResult<Vec<Order>> {
            let mut orders = self.orders.lock().unwrap();
            let mut moved = Vec::new();
            for o in orders
                .iter_mut()
                .filter(|o| o.transaction_id == transaction_id && o.payment_status == "Pending")
            {
                o.payment_status = "Success".to_string();
                if let Some(r) = gateway_ref {
                    o.gateway_ref = Some(r.to_string());
                }
                moved.push(o.clone());
            }
            Ok(moved)
        }

        async fn mark_batch_failed(&self, transaction_id: &str) -> AppResult<Vec<Order>> {
            let mut orders = self.orders.lock().unwrap();
            let mut moved = Vec::new();
            for o in orders
                .iter_mut()
                .filter(|o| o.transaction_id == transaction_id && o.payment_status == "Pending")
            {
                o.payment_status = "Failed".to_string();
                o.status = "Cancelled".to_string();
                o.file_path = None;
                moved.push(o.clone());
            }
            Ok(moved)
        }

        async fn set_order_file(&self, order_id: i32, file_path: &str) -> AppResult<()> {
            if let Some(o) = self.orders.lock().unwrap().iter_mut().find(|o| o.id == order_id) {
                o.file_path = Some(file_path.to_string());
            }
            Ok(())
        }

        async fn stale_batches(&self, older_than: DateTime<Utc>) -> AppResult<Vec<String>> {
            let mut ids: Vec<String> = self
                .orders
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.payment_status == "Pending" && o.created_at < older_than)
                .map(|o| o.transaction_id.clone())
                .collect();
            ids.dedup();
            Ok(ids)
        }
    }

    fn customer() -> CheckoutCustomer {
        CheckoutCustomer {
            user_id: 7,
            email: "asha@example.in".to_string(),
            user_type: UserType::Customer,
        }
    }

    fn urls() -> CheckoutUrls {
        CheckoutUrls {
            redirect_url: "http://localhost:3000/payment/return".to_string(),
            callback_url: "http://localhost:8080/api/payments/webhook".to_string(),
        }
    }

    fn coupon(code: &str, discount_type: &str, value: i32) -> Coupon {
        Coupon {
            id: 1,
            code: code.to_string(),
            discount_type: discount_type.to_string(),
            discount_value: value,
            max_discount_paise: None,
            min_order_paise: 0,
            valid_from: None,
            valid_until: None,
            usage_limit: None,
            times_used: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn gateway_accepting() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_session().times(1).returning(|req| {
            Ok(GatewaySession {
                gateway_ref: format!("gw_{}", req.transaction_id),
                payment_url: Some("https://pay.example/checkout/1".to_string()),
            })
        });
        gateway
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        storage: FileStorage,
        store: MemoryCheckoutStore,
        temp_paths: Vec<String>,
    }

    fn fixture(items: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let store = MemoryCheckoutStore::default();
        let mut temp_paths = Vec::new();
        for i in 0..items {
            let path = storage
                .save_temp(&format!("doc{}.pdf", i + 1), b"%PDF-1.4")
                .unwrap();
            store.add_cart_item(7, &path, 10);
            temp_paths.push(path);
        }
        Fixture {
            _dir: dir,
            storage,
            store,
            temp_paths,
        }
    }

    #[tokio::test]
    async fn test_checkout_creates_pending_batch_and_locks_cart() {
        let fx = fixture(2);
        let gateway = gateway_accepting();

        let started = begin_checkout(
            &fx.store,
            &gateway,
            &fx.storage,
            &PricingConfig::default(),
            &customer(),
            &CheckoutRequest::default(),
            &urls(),
        )
        .await
        .unwrap();

        // 10 bw single-sided pages at the customer rate, re-priced server side
        assert_eq!(started.subtotal_paise, 2 * 10 * 200);
        assert_eq!(started.total_paise, started.subtotal_paise);
        assert!(!started.paid);
        assert!(started.payment_url.is_some());

        let batch = fx.store.batch(&started.transaction_id);
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|o| o.payment_status == "Pending" && o.status == "Pending"));
        assert!(batch.iter().all(|o| o.gateway_ref.is_some()));
        assert!(fx.store.visible_cart(7).is_empty());
    }

    #[tokio::test]
    async fn test_success_is_applied_exactly_once() {
        let fx = fixture(2);
        fx.store.coupons.lock().unwrap().push(coupon("SAVE10", "percent", 10));
        let gateway = gateway_accepting();

        let request = CheckoutRequest {
            coupon_code: Some("save10".to_string()),
            location: None,
        };
        let started = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &customer(), &request, &urls(),
        )
        .await
        .unwrap();
        assert_eq!(started.discount_paise, 400);

        let success = PaymentOutcome::Success {
            gateway_ref: Some("gw_1".to_string()),
        };
        let first = apply_outcome(&fx.store, &fx.storage, &started.transaction_id, success.clone())
            .await
            .unwrap();
        assert_eq!(first.transitioned, 2);
        assert_eq!(first.files_promoted, 2);
        assert_eq!(first.cart_items_affected, 2);
        assert_eq!(first.owner_id, 7);

        let second = apply_outcome(&fx.store, &fx.storage, &started.transaction_id, success)
            .await
            .unwrap();
        assert_eq!(second.transitioned, 0);
        assert!(second.already_processed);

        let batch = fx.store.batch(&started.transaction_id);
        assert!(batch.iter().all(|o| o.payment_status == "Success" && o.status == "Pending"));
        for order in &batch {
            let path = order.file_path.as_deref().unwrap();
            assert!(path.starts_with("orders/"));
            assert!(fx.storage.exists(path));
        }
        assert_eq!(batch.iter().map(|o| o.discount_paise).sum::<i64>(), 400);
        assert!(fx.store.cart.lock().unwrap().is_empty());
        assert_eq!(fx.store.coupons.lock().unwrap()[0].times_used, 1);
    }

    #[tokio::test]
    async fn test_failure_restores_cart_without_data_loss() {
        let fx = fixture(2);
        let gateway = gateway_accepting();
        let before = fx.store.visible_cart(7);

        let started = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &customer(),
            &CheckoutRequest::default(), &urls(),
        )
        .await
        .unwrap();

        let report = apply_outcome(
            &fx.store,
            &fx.storage,
            &started.transaction_id,
            PaymentOutcome::Failure { reason: "DECLINED".to_string() },
        )
        .await
        .unwrap();
        assert_eq!(report.transitioned, 2);
        assert_eq!(report.cart_items_affected, 2);

        let batch = fx.store.batch(&started.transaction_id);
        assert!(batch.iter().all(|o| {
            o.payment_status == "Failed" && o.order_status() == OrderStatus::Cancelled && o.file_path.is_none()
        }));

        let after = fx.store.visible_cart(7);
        assert_eq!(after.len(), before.len());
        for (a, b) in after.iter().zip(before.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.file_path, b.file_path);
            assert_eq!(a.pages, b.pages);
        }
        for path in &fx.temp_paths {
            assert!(fx.storage.exists(path));
        }

        // a late success does not resurrect the batch
        let late = apply_outcome(
            &fx.store,
            &fx.storage,
            &started.transaction_id,
            PaymentOutcome::Success { gateway_ref: None },
        )
        .await
        .unwrap();
        assert!(late.already_processed);
        assert_eq!(late.payment_status, "Failed");
    }

    #[tokio::test]
    async fn test_gateway_error_fails_batch_and_returns_502() {
        let fx = fixture(1);
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_session()
            .times(1)
            .returning(|_| Err(GatewayError::Transport("connection refused".to_string())));

        let result = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &customer(),
            &CheckoutRequest::default(), &urls(),
        )
        .await;
        assert!(matches!(result, Err(AppError::GatewayError(_))));

        let orders = fx.store.orders.lock().unwrap().clone();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].payment_status, "Failed");
        assert_eq!(fx.store.visible_cart(7).len(), 1);
    }

    #[tokio::test]
    async fn test_zero_total_skips_gateway() {
        let fx = fixture(1);
        fx.store.coupons.lock().unwrap().push(coupon("FREEPRINT", "flat", 1_000_000));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_session().times(0);

        let request = CheckoutRequest {
            coupon_code: Some("FREEPRINT".to_string()),
            location: Some("City Centre".to_string()),
        };
        let started = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &customer(), &request, &urls(),
        )
        .await
        .unwrap();

        assert!(started.paid);
        assert_eq!(started.total_paise, 0);
        let batch = fx.store.batch(&started.transaction_id);
        assert_eq!(batch[0].payment_status, "Success");
        assert_eq!(batch[0].location.as_deref(), Some("City Centre"));
        assert_eq!(batch[0].amount_due(), 0);
    }

    #[tokio::test]
    async fn test_empty_cart_and_bad_coupon() {
        let fx = fixture(0);
        let gateway = MockPaymentGateway::new();
        let result = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &customer(),
            &CheckoutRequest::default(), &urls(),
        )
        .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        let fx = fixture(1);
        let request = CheckoutRequest {
            coupon_code: Some("NOPE".to_string()),
            location: None,
        };
        let result = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &customer(), &request, &urls(),
        )
        .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        // lock released, nothing created
        assert_eq!(fx.store.visible_cart(7).len(), 1);
        assert!(fx.store.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_status_uses_gateway() {
        let fx = fixture(1);
        let mut gateway = gateway_accepting();
        gateway.expect_fetch_status().times(1).returning(|txn| {
            Ok(GatewayTransaction {
                transaction_id: txn.to_string(),
                status: "CAPTURED".to_string(),
                gateway_ref: Some("gw_poll".to_string()),
            })
        });

        let started = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &customer(),
            &CheckoutRequest::default(), &urls(),
        )
        .await
        .unwrap();

        let report = refresh_status(&fx.store, &gateway, &fx.storage, &started.transaction_id)
            .await
            .unwrap();
        assert_eq!(report.outcome, GatewayOutcome::Success);
        assert_eq!(report.transitioned, 1);

        // settled batches are answered from the database
        let again = refresh_status(&fx.store, &gateway, &fx.storage, &started.transaction_id)
            .await
            .unwrap();
        assert!(again.already_processed);
    }

    #[tokio::test]
    async fn test_stale_checkouts_are_settled() {
        let fx = fixture(1);
        let mut gateway = gateway_accepting();
        gateway
            .expect_fetch_status()
            .returning(|_| Err(GatewayError::Transport("timeout".to_string())));

        let started = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &customer(),
            &CheckoutRequest::default(), &urls(),
        )
        .await
        .unwrap();

        // nothing is old enough yet
        let cutoff_past = Utc::now() - chrono::Duration::minutes(30);
        assert_eq!(
            expire_stale_checkouts(&fx.store, &gateway, &fx.storage, cutoff_past).await.unwrap(),
            0
        );

        let cutoff_future = Utc::now() + chrono::Duration::minutes(1);
        assert_eq!(
            expire_stale_checkouts(&fx.store, &gateway, &fx.storage, cutoff_future).await.unwrap(),
            1
        );
        assert_eq!(fx.store.batch(&started.transaction_id)[0].payment_status, "Failed");
        assert_eq!(fx.store.visible_cart(7).len(), 1);
    }

    #[tokio::test]
    async fn test_coupon_limit_holds_across_concurrent_batches() {
        let fx = fixture(1);
        let second = fx.storage.save_temp("notes.pdf", b"%PDF-1.4").unwrap();
        fx.store.add_cart_item(8, &second, 10);

        let mut limited = coupon("ONCE", "flat", 100);
        limited.usage_limit = Some(1);
        fx.store.coupons.lock().unwrap().push(limited);

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_session().times(2).returning(|req| {
            Ok(GatewaySession {
                gateway_ref: format!("gw_{}", req.transaction_id),
                payment_url: Some("https://pay.example/checkout/1".to_string()),
            })
        });

        let request = CheckoutRequest {
            coupon_code: Some("ONCE".to_string()),
            location: None,
        };
        let other = CheckoutCustomer {
            user_id: 8,
            email: "ravi@example.in".to_string(),
            user_type: UserType::Customer,
        };

        // both checkouts see an unused coupon
        let first = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &customer(), &request, &urls(),
        )
        .await
        .unwrap();
        let second = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &other, &request, &urls(),
        )
        .await
        .unwrap();
        assert_eq!(first.discount_paise, 100);
        assert_eq!(second.discount_paise, 100);

        let success = PaymentOutcome::Success { gateway_ref: None };
        let (a, b) = tokio::join!(
            apply_outcome(&fx.store, &fx.storage, &first.transaction_id, success.clone()),
            apply_outcome(&fx.store, &fx.storage, &second.transaction_id, success),
        );
        assert_eq!(a.unwrap().transitioned, 1);
        assert_eq!(b.unwrap().transitioned, 1);

        assert_eq!(fx.store.coupons.lock().unwrap()[0].times_used, 1);
    }

    #[tokio::test]
    async fn test_in_flight_batch_cannot_be_cancelled() {
        let fx = fixture(1);
        let gateway = gateway_accepting();

        let started = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &customer(),
            &CheckoutRequest::default(), &urls(),
        )
        .await
        .unwrap();

        let order = fx.store.batch(&started.transaction_id).remove(0);
        for actor in [StatusActor::Staff, StatusActor::Dealer] {
            for next in [OrderStatus::Cancelled, OrderStatus::Rejected] {
                assert_eq!(
                    check_transition(actor, order.order_status(), order.payment(), next),
                    Err(TransitionError::PaymentInProgress)
                );
            }
        }

        // the webhook lands first: the order is paid and can now be cancelled
        apply_outcome(&fx.store, &fx.storage, &started.transaction_id, PaymentOutcome::Success { gateway_ref: None })
            .await
            .unwrap();
        let paid = fx.store.batch(&started.transaction_id).remove(0);
        assert_eq!(paid.payment(), PaymentStatus::Success);
        assert_eq!(paid.order_status(), OrderStatus::Pending);
        assert_eq!(
            check_transition(StatusActor::Staff, paid.order_status(), paid.payment(), OrderStatus::Cancelled),
            Ok(())
        );
    }

    #[tokio::test]
    async fn test_failed_batch_stays_cancelled() {
        let fx = fixture(1);
        let gateway = gateway_accepting();

        let started = begin_checkout(
            &fx.store, &gateway, &fx.storage, &PricingConfig::default(), &customer(),
            &CheckoutRequest::default(), &urls(),
        )
        .await
        .unwrap();

        apply_outcome(
            &fx.store,
            &fx.storage,
            &started.transaction_id,
            PaymentOutcome::Failure { reason: "DECLINED".to_string() },
        )
        .await
        .unwrap();

        let failed = fx.store.batch(&started.transaction_id).remove(0);
        assert_eq!(
            check_transition(StatusActor::Staff, failed.order_status(), failed.payment(), OrderStatus::Cancelled),
            Err(TransitionError::Terminal(OrderStatus::Cancelled))
        );

        // a success arriving after the failure leaves the order unpaid
        let late = apply_outcome(&fx.store, &fx.storage, &started.transaction_id, PaymentOutcome::Success { gateway_ref: None })
            .await
            .unwrap();
        assert!(late.already_processed);
        let still = fx.store.batch(&started.transaction_id).remove(0);
        assert_eq!(still.payment(), PaymentStatus::Failed);
        assert_eq!(still.order_status(), OrderStatus::Cancelled);
    }
}
