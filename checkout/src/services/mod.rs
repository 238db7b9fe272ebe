// gok_checkout/src/services/mod.rs

//! Checkout domain services: coupons, orders, payments and QR rendering.

pub mod coupon_engine;
pub mod order_assembler;
pub mod payment_orchestrator;
pub mod qr;

pub use coupon_engine::{CouponApplication, CouponEngine, CouponQuote, CouponRejection, CouponValidation};
pub use order_assembler::{OrderAssembler, OrderDiscount, OrderLine, PricedCart};
pub use payment_orchestrator::PaymentOrchestrator;
pub use qr::{QrRenderer, VietQr};
