// gok_checkout/src/models/order_item.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Priced line of an order. Written once with its order and never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub product_name: String,
  pub unit_price: Decimal,
  pub quantity: i32,
  pub total_price: Decimal,
}

impl OrderItem {
  pub fn new(order_id: Uuid, product_id: Uuid, product_name: String, unit_price: Decimal, quantity: i32) -> Self {
    Self {
      id: Uuid::new_v4(),
      order_id,
      product_id,
      product_name,
      unit_price,
      quantity,
      total_price: unit_price * Decimal::from(quantity),
    }
  }
}
