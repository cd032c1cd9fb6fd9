use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percent,
    Flat,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percent => "percent",
            DiscountType::Flat => "flat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percent" => Some(DiscountType::Percent),
            "flat" => Some(DiscountType::Flat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponError {
    #[error("coupon code is not valid")]
    Unknown,

    #[error("coupon is no longer active")]
    Inactive,

    #[error("coupon is not valid yet")]
    NotYetValid,

    #[error("coupon has expired")]
    Expired,

    #[error("coupon usage limit has been reached")]
    UsageLimitReached,

    #[error("order total must be at least {min_paise} paise to use this coupon")]
    BelowMinimum { min_paise: i64 },
}

// `discount_value` is a percentage for percent coupons and paise for flat ones
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Coupon {
    pub id: i32,
    pub code: String,
    pub discount_type: String,
    pub discount_value: i32,
    pub max_discount_paise: Option<i64>,
    pub min_order_paise: i64,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
    pub times_used: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl Coupon {
    /// Discount in paise this coupon grants on `subtotal`, never more than the subtotal.
    pub fn discount_for(&self, subtotal: i64, now: DateTime<Utc>) -> Result<i64, CouponError> {
        if !self.is_active {
            return Err(CouponError::Inactive);
        }
        if self.valid_from.is_some_and(|from| now < from) {
            return Err(CouponError::NotYetValid);
        }
        if self.valid_until.is_some_and(|until| now > until) {
            return Err(CouponError::Expired);
        }
        if self.usage_limit.is_some_and(|limit| self.times_used >= limit) {
            return Err(CouponError::UsageLimitReached);
        }
        if subtotal < self.min_order_paise {
            return Err(CouponError::BelowMinimum {
                min_paise: self.min_order_paise,
            });
        }

        let value = i64::from(self.discount_value);
        let discount = match DiscountType::parse(&self.discount_type) {
            Some(DiscountType::Percent) => {
                let raw = subtotal * value / 100;
                match self.max_discount_paise {
                    Some(cap) => raw.min(cap),
                    None => raw,
                }
            }
            Some(DiscountType::Flat) => value,
            None => 0,
        };

        Ok(discount.clamp(0, subtotal))
    }
}

/// Split `discount` across rows in proportion to their amounts. The rounding
/// remainder goes to the last row; a row never gets more than its own amount.
pub fn allocate_discount(amounts: &[i64], discount: i64) -> Vec<i64> {
    let total: i64 = amounts.iter().sum();
    if amounts.is_empty() || total <= 0 || discount <= 0 {
        return vec![0; amounts.len()];
    }
    let discount = discount.min(total);

    let mut shares: Vec<i64> = amounts
        .iter()
        .map(|a| ((i128::from(*a) * i128::from(discount)) / i128::from(total)) as i64)
        .collect();

    let mut remainder = discount - shares.iter().sum::<i64>();
    for (share, amount) in shares.iter_mut().zip(amounts).rev() {
        if remainder == 0 {
            break;
        }
        let room = amount - *share;
        let take = remainder.min(room);
        *share += take;
        remainder -= take;
    }

    shares
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub amount_paise: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCouponRequest {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i32,
    pub max_discount_paise: Option<i64>,
    #[serde(default)]
    pub min_order_paise: i64,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
}

impl CreateCouponRequest {
    pub fn validate(&self) -> Result<(), String> {
        let code = normalize_code(&self.code);
        if code.len() < 3 || code.len() > 32 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err("Coupon code must be 3-32 letters or digits".to_string());
        }
        match self.discount_type {
            DiscountType::Percent if !(1..=100).contains(&self.discount_value) => {
                return Err("Percentage must be between 1 and 100".to_string());
            }
            DiscountType::Flat if self.discount_value <= 0 => {
                return Err("Flat discount must be positive".to_string());
            }
            _ => {}
        }
        if self.max_discount_paise.is_some_and(|m| m <= 0) || self.min_order_paise < 0 {
            return Err("Discount cap and minimum order cannot be negative".to_string());
        }
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if until <= from {
                return Err("valid_until must be after valid_from".to_string());
            }
        }
        if self.usage_limit.is_some_and(|l| l <= 0) {
            return Err("Usage limit must be positive".to_string());
        }
        Ok(())
    }
}
