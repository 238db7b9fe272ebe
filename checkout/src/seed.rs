// gok_checkout/src/seed.rs

//! Demo catalogue, coupons and receiving account used by `SEED_DB=true`.

use crate::errors::Result;
use crate::models::{CouponType, DiscountType, NewBankConfig, NewCoupon, Product};
use crate::state::AppState;
use chrono::Duration;
use rust_decimal_macros::dec;
use tracing::info;
use uuid::Uuid;

pub const WELCOME_COUPON: &str = "SAVE10";
pub const GIFT_CARD_COUPON: &str = "GIFT200K";

#[derive(Debug, Clone)]
pub struct SeedSummary {
  pub product_ids: Vec<Uuid>,
  /// False when the store already held seed data.
  pub created: bool,
}

pub async fn seed_store(state: &AppState) -> Result<SeedSummary> {
  let now = state.clock.now();
  let mut uow = state.store.begin().await?;
  if uow.coupon_by_code(WELCOME_COUPON).await?.is_some() {
    info!("Seed data already present, skipping.");
    return Ok(SeedSummary {
      product_ids: Vec::new(),
      created: false,
    });
  }

  let catalogue = [
    ("Ca phe sua da", dec!(45000), 100),
    ("Bac xiu", dec!(50000), 80),
    ("Tra dao cam sa", dec!(55000), 60),
    ("Banh mi thit", dec!(35000), 40),
  ];
  let mut product_ids = Vec::with_capacity(catalogue.len());
  for (name, price, stock) in catalogue {
    let product = Product::new(name, price, stock, now);
    uow.add_product(&product).await?;
    product_ids.push(product.id);
  }
  uow.commit().await?;

  state
    .coupons
    .create_coupon(NewCoupon {
      code: WELCOME_COUPON.to_string(),
      name: "10% off your order".to_string(),
      description: Some("Capped at 50,000 VND".to_string()),
      coupon_type: CouponType::OneTime,
      discount_type: DiscountType::Percentage,
      discount_value: dec!(10),
      max_discount_amount: Some(dec!(50000)),
      min_order_amount: Some(dec!(100000)),
      initial_balance: None,
      is_system_coupon: true,
      user_id: None,
      start_date: now - Duration::days(1),
      end_date: now + Duration::days(90),
      max_usage_count: Some(1000),
      image_url: None,
    })
    .await?;

  state
    .coupons
    .create_coupon(NewCoupon {
      code: GIFT_CARD_COUPON.to_string(),
      name: "200K gift balance".to_string(),
      description: None,
      coupon_type: CouponType::Gradual,
      discount_type: DiscountType::FixedAmount,
      discount_value: dec!(200000),
      max_discount_amount: None,
      min_order_amount: None,
      initial_balance: Some(dec!(200000)),
      is_system_coupon: true,
      user_id: None,
      start_date: now - Duration::days(1),
      end_date: now + Duration::days(365),
      max_usage_count: None,
      image_url: None,
    })
    .await?;

  state
    .payments
    .create_bank_config(NewBankConfig {
      bank_code: "VCB".to_string(),
      bank_name: "Vietcombank".to_string(),
      account_number: "0071000123456".to_string(),
      account_name: "GOKCAFE JSC".to_string(),
      is_active: true,
      display_order: 0,
    })
    .await?;

  info!(products = product_ids.len(), "Seeded demo data.");
  Ok(SeedSummary {
    product_ids,
    created: true,
  })
}
