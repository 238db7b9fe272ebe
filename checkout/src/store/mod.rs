// gok_checkout/src/store/mod.rs

//! Persistence seam: a `Store` hands out units of work, each of which reads
//! and stages changes that become visible together on `commit`.
//!
//! Every mutable row carries a `version`. `update_*` bumps the caller's copy;
//! the update or the commit fails with `AppError::Conflict` if the stored row
//! moved since it was read. Dropping a unit without committing discards its changes.

pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::{
  BankTransferConfig, Coupon, CouponType, CouponUsage, Order, OrderStatus, Payment, Product,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[async_trait]
pub trait Store: Send + Sync {
  async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

#[async_trait]
pub trait UnitOfWork: Send {
  // --- Products ---
  /// Returns the product whatever its active/deleted flags.
  async fn product(&mut self, id: Uuid) -> Result<Option<Product>>;
  async fn add_product(&mut self, product: &Product) -> Result<()>;
  async fn update_product(&mut self, product: &mut Product) -> Result<()>;

  // --- Orders (loaded with their items) ---
  async fn order(&mut self, id: Uuid) -> Result<Option<Order>>;
  async fn order_by_number(&mut self, order_number: &str) -> Result<Option<Order>>;
  async fn orders(&mut self, query: &OrderQuery) -> Result<Page<Order>>;
  /// Inserts the order together with its items.
  async fn add_order(&mut self, order: &Order) -> Result<()>;
  /// Updates the order header; items are immutable.
  async fn update_order(&mut self, order: &mut Order) -> Result<()>;

  // --- Coupons (soft-deleted rows are invisible) ---
  async fn coupon(&mut self, id: Uuid) -> Result<Option<Coupon>>;
  /// Case-insensitive code match.
  async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>>;
  async fn coupons(&mut self, query: &CouponQuery) -> Result<Page<Coupon>>;
  async fn add_coupon(&mut self, coupon: &Coupon) -> Result<()>;
  async fn update_coupon(&mut self, coupon: &mut Coupon) -> Result<()>;
  async fn add_coupon_usage(&mut self, usage: &CouponUsage) -> Result<()>;
  /// Oldest first.
  async fn coupon_usages(&mut self, coupon_id: Uuid) -> Result<Vec<CouponUsage>>;

  async fn soft_delete_coupon(&mut self, coupon: &mut Coupon) -> Result<()> {
    coupon.is_deleted = true;
    coupon.is_active = false;
    self.update_coupon(coupon).await
  }

  // --- Payments ---
  async fn payment(&mut self, id: Uuid) -> Result<Option<Payment>>;
  async fn payment_by_transaction(&mut self, transaction_id: &str) -> Result<Option<Payment>>;
  /// Oldest first.
  async fn payments_for_order(&mut self, order_id: Uuid) -> Result<Vec<Payment>>;
  async fn add_payment(&mut self, payment: &Payment) -> Result<()>;
  async fn update_payment(&mut self, payment: &mut Payment) -> Result<()>;

  async fn active_payment_for_order(&mut self, order_id: Uuid) -> Result<Option<Payment>> {
    let payments = self.payments_for_order(order_id).await?;
    Ok(payments.into_iter().rev().find(Payment::is_active))
  }

  // --- Bank transfer configs (soft-deleted rows are invisible) ---
  async fn bank_config(&mut self, id: Uuid) -> Result<Option<BankTransferConfig>>;
  /// Case-insensitive code match.
  async fn bank_config_by_code(&mut self, bank_code: &str) -> Result<Option<BankTransferConfig>>;
  /// Ordered by `display_order`, then bank code.
  async fn bank_configs(&mut self, include_inactive: bool) -> Result<Vec<BankTransferConfig>>;
  async fn add_bank_config(&mut self, config: &BankTransferConfig) -> Result<()>;
  async fn update_bank_config(&mut self, config: &mut BankTransferConfig) -> Result<()>;

  async fn soft_delete_bank_config(&mut self, config: &mut BankTransferConfig) -> Result<()> {
    config.is_deleted = true;
    config.is_active = false;
    self.update_bank_config(config).await
  }

  /// First active config by display order.
  async fn default_bank_config(&mut self) -> Result<Option<BankTransferConfig>> {
    Ok(self.bank_configs(false).await?.into_iter().next())
  }

  async fn commit(self: Box<Self>) -> Result<()>;
  async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Order listing filter. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
  pub user_id: Option<Uuid>,
  pub status: Option<OrderStatus>,
  #[serde(default)]
  pub page: PageRequest,
}

/// Coupon listing filter. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponQuery {
  #[serde(default)]
  pub active_only: bool,
  pub is_system: Option<bool>,
  pub owner: Option<Uuid>,
  pub coupon_type: Option<CouponType>,
  #[serde(default)]
  pub page: PageRequest,
}

impl CouponQuery {
  pub fn matches(&self, coupon: &Coupon) -> bool {
    !coupon.is_deleted
      && (!self.active_only || coupon.is_active)
      && self.is_system.map_or(true, |system| coupon.is_system_coupon == system)
      && self.owner.map_or(true, |owner| coupon.user_id == Some(owner))
      && self.coupon_type.map_or(true, |kind| coupon.coupon_type == kind)
  }
}

impl OrderQuery {
  pub fn matches(&self, order: &Order) -> bool {
    self.user_id.map_or(true, |user| order.user_id == Some(user))
      && self.status.map_or(true, |status| order.status == status)
  }
}

/// One-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
  pub page: u32,
  pub page_size: u32,
}

impl Default for PageRequest {
  fn default() -> Self {
    Self {
      page: 1,
      page_size: DEFAULT_PAGE_SIZE,
    }
  }
}

impl PageRequest {
  pub fn new(page: u32, page_size: u32) -> Self {
    Self { page, page_size }
  }

  /// Clamps to page ≥ 1 and 1 ≤ size ≤ `MAX_PAGE_SIZE`.
  pub fn normalized(self) -> Self {
    Self {
      page: self.page.max(1),
      page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
    }
  }

  pub fn offset(self) -> u64 {
    let normalized = self.normalized();
    u64::from(normalized.page - 1) * u64::from(normalized.page_size)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
  pub page: u32,
  pub page_size: u32,
}

impl<T> Page<T> {
  /// Cuts one page out of an already filtered and sorted list.
  pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
    let request = request.normalized();
    let total = all.len() as u64;
    let items = all
      .into_iter()
      .skip(request.offset() as usize)
      .take(request.page_size as usize)
      .collect();
    Self {
      items,
      total,
      page: request.page,
      page_size: request.page_size,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_slicing() {
    let page = Page::slice((1..=45).collect::<Vec<_>>(), PageRequest::new(3, 20));
    assert_eq!(page.items, (41..=45).collect::<Vec<_>>());
    assert_eq!(page.total, 45);

    let clamped = Page::slice(vec![1, 2, 3], PageRequest::new(0, 0));
    assert_eq!(clamped.page, 1);
    assert_eq!(clamped.page_size, 1);
    assert_eq!(clamped.items, vec![1]);
  }
}
