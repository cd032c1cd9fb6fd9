pub mod cart_repo;
pub mod catalog_repo;
pub mod coupon_repo;
pub mod order_repo;
pub mod user_repo;
