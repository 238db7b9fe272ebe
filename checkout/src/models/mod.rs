// gok_checkout/src/models/mod.rs

//! Contains data structures representing stored entities.

pub mod bank_config;
pub mod coupon;
pub mod coupon_usage;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;

pub use bank_config::{BankConfigUpdate, BankTransferConfig, NewBankConfig};
pub use coupon::{Coupon, CouponStatus, CouponType, DiscountType, NewCoupon};
pub use coupon_usage::CouponUsage;
pub use order::{CustomerInfo, Order, OrderStatus};
pub use order_item::OrderItem;
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use product::Product;
