// gok_checkout/src/lib.rs

//! Checkout and settlement core for the GokCafe storefront.
//!
//! Coupons are validated and redeemed by `CouponEngine`, orders are priced and
//! reserved by `OrderAssembler`, and `PaymentOrchestrator` opens bank-transfer
//! or cash payments and drives their state machine. The `checkout` pipeline
//! sequences all three on top of `gok_flow`.

pub mod cache;
pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod seed;
pub mod services;
pub mod state;
pub mod store;
pub mod web;

use crate::config::AppConfig;
use crate::errors::Result;
use crate::store::{MemoryStore, PgStore, Store};
use std::sync::Arc;

/// Postgres when `DATABASE_URL` is set, otherwise an in-process store.
pub async fn connect_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
  match config.database_url.as_deref() {
    Some(url) => Ok(Arc::new(PgStore::connect(url).await?)),
    None => {
      tracing::warn!("DATABASE_URL not set; using the in-memory store.");
      Ok(Arc::new(MemoryStore::new()))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Product;
  use crate::store::UnitOfWork;
  use chrono::Utc;
  use rust_decimal_macros::dec;

  #[tokio::test]
  async fn connect_store_falls_back_to_memory_without_a_database_url() {
    let config = AppConfig::from_lookup(|_| None).unwrap();
    let store = connect_store(&config).await.unwrap();

    let product = Product::new("Bac xiu", dec!(50000), 3, Utc::now());
    let mut uow = store.begin().await.unwrap();
    uow.add_product(&product).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    assert_eq!(uow.product(product.id).await.unwrap().map(|p| p.stock_quantity), Some(3));
  }
}
