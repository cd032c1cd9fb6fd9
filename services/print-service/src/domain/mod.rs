pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupon;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod retention;
pub mod user;
