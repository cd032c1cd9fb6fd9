use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::money::format_rupees;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Ready,
    OutForDelivery,
    Delivered,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Ready => "Ready",
            OrderStatus::OutForDelivery => "OutForDelivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "ready" => Some(OrderStatus::Ready),
            "outfordelivery" => Some(OrderStatus::OutForDelivery),
            "delivered" => Some(OrderStatus::Delivered),
            "rejected" => Some(OrderStatus::Rejected),
            "cancelled" | "canceled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Rejected | OrderStatus::Cancelled
        )
    }

    // position along the fulfilment path, None for the exits
    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Ready => Some(2),
            OrderStatus::OutForDelivery => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Rejected | OrderStatus::Cancelled => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Success => "Success",
            PaymentStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "success" => Some(PaymentStatus::Success),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusActor {
    Staff,
    Dealer,
    Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("order is already {0} and can no longer change")]
    Terminal(OrderStatus),

    #[error("order is already {0}")]
    Unchanged(OrderStatus),

    #[error("order cannot move back from {from} to {to}")]
    Backwards { from: OrderStatus, to: OrderStatus },

    #[error("order has not been paid yet")]
    Unpaid,

    #[error("payment for this order is still in progress")]
    PaymentInProgress,

    #[error("delivery staff can only move Ready -> OutForDelivery -> Delivered")]
    NotAllowed,
}

/// Validate a status change requested from a dashboard.
pub fn check_transition(
    actor: StatusActor,
    current: OrderStatus,
    payment: PaymentStatus,
    next: OrderStatus,
) -> Result<(), TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::Terminal(current));
    }
    if current == next {
        return Err(TransitionError::Unchanged(current));
    }

    if actor == StatusActor::Delivery {
        let allowed = matches!(
            (current, next),
            (OrderStatus::Ready, OrderStatus::OutForDelivery)
                | (OrderStatus::OutForDelivery, OrderStatus::Delivered)
        );
        if !allowed {
            return Err(TransitionError::NotAllowed);
        }
        if payment != PaymentStatus::Success {
            return Err(TransitionError::Unpaid);
        }
        return Ok(());
    }

    match (current.rank(), next.rank()) {
        // reject or cancel; a batch still waiting on the gateway is settled by reconciliation
        (_, None) if payment == PaymentStatus::Pending => Err(TransitionError::PaymentInProgress),
        (_, None) => Ok(()),
        (Some(from), Some(to)) if to > from => {
            if payment != PaymentStatus::Success {
                return Err(TransitionError::Unpaid);
            }
            Ok(())
        }
        _ => Err(TransitionError::Backwards {
            from: current,
            to: next,
        }),
    }
}

/// `TXN<yyyymmddHHMMSS><6 random digits>`
pub fn generate_transaction_id(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::rng().random_range(0..1_000_000);
    format!("TXN{}{:06}", now.format("%Y%m%d%H%M%S"), suffix)
}

pub fn generate_order_code(transaction_id: &str, index: usize) -> String {
    let digits = transaction_id.trim_start_matches("TXN");
    format!("FC{}-{:02}", digits, index + 1)
}

// One row per physical print job
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Order {
    pub id: i32,
    pub order_code: String,
    pub owner_id: i32,
    pub cart_item_id: Option<i32>,
    pub service: String,
    pub file_path: Option<String>,
    pub file_name: String,
    pub pages: i32,
    pub copies: i32,
    pub print_mode: String,
    pub sides: String,
    pub color_pages: Option<String>,
    pub location: Option<String>,
    pub price_paise: i64,
    pub discount_paise: i64,
    pub coupon_code: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub transaction_id: String,
    pub gateway_ref: Option<String>,
    pub file_purged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn order_status(&self) -> OrderStatus {
        OrderStatus::parse(&self.status).unwrap_or(OrderStatus::Pending)
    }

    pub fn payment(&self) -> PaymentStatus {
        PaymentStatus::parse(&self.payment_status).unwrap_or(PaymentStatus::Pending)
    }

    pub fn amount_due(&self) -> i64 {
        self.price_paise - self.discount_paise
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_code: String,
    pub owner_id: i32,
    pub cart_item_id: Option<i32>,
    pub service: String,
    pub file_path: Option<String>,
    pub file_name: String,
    pub pages: i32,
    pub copies: i32,
    pub print_mode: String,
    pub sides: String,
    pub color_pages: Option<String>,
    pub location: Option<String>,
    pub price_paise: i64,
    pub discount_paise: i64,
    pub coupon_code: Option<String>,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: i32,
    pub order_code: String,
    pub owner_id: i32,
    pub service: String,
    pub file_name: String,
    pub file_available: bool,
    pub pages: i32,
    pub copies: i32,
    pub print_mode: String,
    pub sides: String,
    pub color_pages: Option<String>,
    pub location: Option<String>,
    pub price_paise: i64,
    pub discount_paise: i64,
    pub amount_paise: i64,
    pub amount_display: String,
    pub coupon_code: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub transaction_id: String,
    pub file_purged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            order_code: order.order_code.clone(),
            owner_id: order.owner_id,
            service: order.service.clone(),
            file_name: order.file_name.clone(),
            file_available: order.file_path.is_some(),
            pages: order.pages,
            copies: order.copies,
            print_mode: order.print_mode.clone(),
            sides: order.sides.clone(),
            color_pages: order.color_pages.clone(),
            location: order.location.clone(),
            price_paise: order.price_paise,
            discount_paise: order.discount_paise,
            amount_paise: order.amount_due(),
            amount_display: format_rupees(order.amount_due()),
            coupon_code: order.coupon_code.clone(),
            status: order.status.clone(),
            payment_status: order.payment_status.clone(),
            transaction_id: order.transaction_id.clone(),
            file_purged_at: order.file_purged_at,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub payment_status: Option<String>,
}
