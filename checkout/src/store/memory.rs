// gok_checkout/src/store/memory.rs

//! In-process store. Each unit of work stages its writes in an overlay; `commit`
//! validates versions and uniqueness and swaps the new tables in under one write lock.

use super::{CouponQuery, OrderQuery, Page, Store, UnitOfWork};
use crate::errors::{AppError, Result};
use crate::models::{BankTransferConfig, Coupon, CouponUsage, Order, Payment, Product};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Rows the overlay tracks by id and version.
trait Versioned: Clone {
  const ENTITY: &'static str;
  fn id(&self) -> Uuid;
  fn version(&self) -> i64;
  fn set_version(&mut self, version: i64);
}

macro_rules! versioned {
  ($ty:ty, $entity:literal) => {
    impl Versioned for $ty {
      const ENTITY: &'static str = $entity;
      fn id(&self) -> Uuid {
        self.id
      }
      fn version(&self) -> i64 {
        self.version
      }
      fn set_version(&mut self, version: i64) {
        self.version = version;
      }
    }
  };
}

versioned!(Product, "Product");
versioned!(Order, "Order");
versioned!(Coupon, "Coupon");
versioned!(Payment, "Payment");
versioned!(BankTransferConfig, "Bank config");

#[derive(Debug, Clone, Default)]
struct Tables {
  products: HashMap<Uuid, Product>,
  orders: HashMap<Uuid, Order>,
  coupons: HashMap<Uuid, Coupon>,
  coupon_usages: Vec<CouponUsage>,
  payments: HashMap<Uuid, Payment>,
  bank_configs: HashMap<Uuid, BankTransferConfig>,
}

impl Tables {
  fn check_unique(&self) -> Result<()> {
    unique("order number", self.orders.values().map(|o| o.order_number.clone()))?;
    unique("coupon code", self.coupons.values().map(|c| c.code.to_uppercase()))?;
    unique("transaction id", self.payments.values().map(|p| p.transaction_id.clone()))?;
    unique(
      "active payment for order",
      self.payments.values().filter(|p| p.is_active()).map(|p| p.order_id.to_string()),
    )?;
    unique("bank code", self.bank_configs.values().map(|b| b.bank_code.to_uppercase()))?;
    unique("account number", self.bank_configs.values().map(|b| b.account_number.clone()))?;
    Ok(())
  }
}

fn unique(what: &str, keys: impl Iterator<Item = String>) -> Result<()> {
  let mut seen = HashSet::new();
  for key in keys {
    if !seen.insert(key.clone()) {
      return Err(AppError::Conflict(format!("Duplicate {} '{}'", what, key)));
    }
  }
  Ok(())
}

#[derive(Debug, Clone)]
enum Change<T> {
  Insert(T),
  /// `base` is the committed version the first read saw.
  Update { row: T, base: i64 },
}

impl<T> Change<T> {
  fn row(&self) -> &T {
    match self {
      Change::Insert(row) | Change::Update { row, .. } => row,
    }
  }
}

#[derive(Debug)]
struct Overlay<T> {
  changes: HashMap<Uuid, Change<T>>,
}

impl<T> Default for Overlay<T> {
  fn default() -> Self {
    Self {
      changes: HashMap::new(),
    }
  }
}

impl<T: Versioned> Overlay<T> {
  fn get(&self, id: Uuid, committed: &HashMap<Uuid, T>) -> Option<T> {
    match self.changes.get(&id) {
      Some(change) => Some(change.row().clone()),
      None => committed.get(&id).cloned(),
    }
  }

  /// Committed rows with this unit's changes laid over them.
  fn merged(&self, committed: &HashMap<Uuid, T>) -> Vec<T> {
    let mut rows: Vec<T> = committed
      .values()
      .filter(|row| !self.changes.contains_key(&row.id()))
      .cloned()
      .collect();
    rows.extend(self.changes.values().map(|change| change.row().clone()));
    rows
  }

  fn insert(&mut self, row: &T, committed: &HashMap<Uuid, T>) -> Result<()> {
    if committed.contains_key(&row.id()) || self.changes.contains_key(&row.id()) {
      return Err(AppError::Conflict(format!("{} {} already exists", T::ENTITY, row.id())));
    }
    self.changes.insert(row.id(), Change::Insert(row.clone()));
    Ok(())
  }

  fn update(&mut self, row: &mut T, committed: &HashMap<Uuid, T>) -> Result<()> {
    let stale = || AppError::Conflict(format!("{} {} was modified concurrently", T::ENTITY, row.id()));
    let base = match self.changes.get(&row.id()) {
      Some(change) => {
        if change.row().version() != row.version() {
          return Err(stale());
        }
        match change {
          Change::Insert(_) => None,
          Change::Update { base, .. } => Some(*base),
        }
      }
      None => {
        let current = committed
          .get(&row.id())
          .ok_or_else(|| AppError::not_found(T::ENTITY, row.id()))?;
        if current.version() != row.version() {
          return Err(stale());
        }
        Some(row.version())
      }
    };

    row.set_version(row.version() + 1);
    let change = match base {
      None => Change::Insert(row.clone()),
      Some(base) => Change::Update { row: row.clone(), base },
    };
    self.changes.insert(row.id(), change);
    Ok(())
  }

  fn apply(self, committed: &mut HashMap<Uuid, T>) -> Result<()> {
    for (id, change) in self.changes {
      match change {
        Change::Insert(row) => {
          if committed.contains_key(&id) {
            return Err(AppError::Conflict(format!("{} {} already exists", T::ENTITY, id)));
          }
          committed.insert(id, row);
        }
        Change::Update { row, base } => match committed.get(&id) {
          Some(current) if current.version() == base => {
            committed.insert(id, row);
          }
          Some(_) => {
            return Err(AppError::Conflict(format!(
              "{} {} was modified concurrently",
              T::ENTITY,
              id
            )))
          }
          None => return Err(AppError::not_found(T::ENTITY, id)),
        },
      }
    }
    Ok(())
  }
}

/// Thread-safe in-memory [`Store`]. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
    Ok(Box::new(MemoryUnit {
      tables: Arc::clone(&self.tables),
      products: Overlay::default(),
      orders: Overlay::default(),
      coupons: Overlay::default(),
      payments: Overlay::default(),
      bank_configs: Overlay::default(),
      usages: Vec::new(),
    }))
  }
}

struct MemoryUnit {
  tables: Arc<RwLock<Tables>>,
  products: Overlay<Product>,
  orders: Overlay<Order>,
  coupons: Overlay<Coupon>,
  payments: Overlay<Payment>,
  bank_configs: Overlay<BankTransferConfig>,
  usages: Vec<CouponUsage>,
}

impl MemoryUnit {
  fn all_orders(&self) -> Vec<Order> {
    self.orders.merged(&self.tables.read().orders)
  }

  fn all_coupons(&self) -> Vec<Coupon> {
    self
      .coupons
      .merged(&self.tables.read().coupons)
      .into_iter()
      .filter(|c| !c.is_deleted)
      .collect()
  }

  fn all_payments(&self) -> Vec<Payment> {
    self.payments.merged(&self.tables.read().payments)
  }

  fn all_bank_configs(&self) -> Vec<BankTransferConfig> {
    self
      .bank_configs
      .merged(&self.tables.read().bank_configs)
      .into_iter()
      .filter(|b| !b.is_deleted)
      .collect()
  }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
  async fn product(&mut self, id: Uuid) -> Result<Option<Product>> {
    Ok(self.products.get(id, &self.tables.read().products))
  }

  async fn add_product(&mut self, product: &Product) -> Result<()> {
    let tables = self.tables.read();
    self.products.insert(product, &tables.products)
  }

  async fn update_product(&mut self, product: &mut Product) -> Result<()> {
    let tables = self.tables.read();
    self.products.update(product, &tables.products)
  }

  async fn order(&mut self, id: Uuid) -> Result<Option<Order>> {
    Ok(self.orders.get(id, &self.tables.read().orders))
  }

  async fn order_by_number(&mut self, order_number: &str) -> Result<Option<Order>> {
    Ok(self.all_orders().into_iter().find(|o| o.order_number == order_number))
  }

  async fn orders(&mut self, query: &OrderQuery) -> Result<Page<Order>> {
    let mut matching: Vec<Order> = self.all_orders().into_iter().filter(|o| query.matches(o)).collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.order_number.cmp(&a.order_number)));
    Ok(Page::slice(matching, query.page))
  }

  async fn add_order(&mut self, order: &Order) -> Result<()> {
    let tables = self.tables.read();
    self.orders.insert(order, &tables.orders)
  }

  async fn update_order(&mut self, order: &mut Order) -> Result<()> {
    let tables = self.tables.read();
    self.orders.update(order, &tables.orders)
  }

  async fn coupon(&mut self, id: Uuid) -> Result<Option<Coupon>> {
    Ok(self.coupons.get(id, &self.tables.read().coupons).filter(|c| !c.is_deleted))
  }

  async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>> {
    let wanted = code.trim();
    Ok(self.all_coupons().into_iter().find(|c| c.code.eq_ignore_ascii_case(wanted)))
  }

  async fn coupons(&mut self, query: &CouponQuery) -> Result<Page<Coupon>> {
    let mut matching: Vec<Coupon> = self.all_coupons().into_iter().filter(|c| query.matches(c)).collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.code.cmp(&b.code)));
    Ok(Page::slice(matching, query.page))
  }

  async fn add_coupon(&mut self, coupon: &Coupon) -> Result<()> {
    let tables = self.tables.read();
    self.coupons.insert(coupon, &tables.coupons)
  }

  async fn update_coupon(&mut self, coupon: &mut Coupon) -> Result<()> {
    let tables = self.tables.read();
    self.coupons.update(coupon, &tables.coupons)
  }

  async fn add_coupon_usage(&mut self, usage: &CouponUsage) -> Result<()> {
    self.usages.push(usage.clone());
    Ok(())
  }

  async fn coupon_usages(&mut self, coupon_id: Uuid) -> Result<Vec<CouponUsage>> {
    let tables = self.tables.read();
    let mut usages: Vec<CouponUsage> = tables
      .coupon_usages
      .iter()
      .chain(self.usages.iter())
      .filter(|u| u.coupon_id == coupon_id)
      .cloned()
      .collect();
    usages.sort_by_key(|u| u.used_at);
    Ok(usages)
  }

  async fn payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
    Ok(self.payments.get(id, &self.tables.read().payments))
  }

  async fn payment_by_transaction(&mut self, transaction_id: &str) -> Result<Option<Payment>> {
    Ok(self.all_payments().into_iter().find(|p| p.transaction_id == transaction_id))
  }

  async fn payments_for_order(&mut self, order_id: Uuid) -> Result<Vec<Payment>> {
    let mut payments: Vec<Payment> = self.all_payments().into_iter().filter(|p| p.order_id == order_id).collect();
    payments.sort_by_key(|p| p.created_at);
    Ok(payments)
  }

  async fn add_payment(&mut self, payment: &Payment) -> Result<()> {
    let tables = self.tables.read();
    self.payments.insert(payment, &tables.payments)
  }

  async fn update_payment(&mut self, payment: &mut Payment) -> Result<()> {
    let tables = self.tables.read();
    self.payments.update(payment, &tables.payments)
  }

  async fn bank_config(&mut self, id: Uuid) -> Result<Option<BankTransferConfig>> {
    Ok(self.bank_configs.get(id, &self.tables.read().bank_configs).filter(|b| !b.is_deleted))
  }

  async fn bank_config_by_code(&mut self, bank_code: &str) -> Result<Option<BankTransferConfig>> {
    let wanted = bank_code.trim();
    Ok(self.all_bank_configs().into_iter().find(|b| b.bank_code.eq_ignore_ascii_case(wanted)))
  }

  async fn bank_configs(&mut self, include_inactive: bool) -> Result<Vec<BankTransferConfig>> {
    let mut configs: Vec<BankTransferConfig> = self
      .all_bank_configs()
      .into_iter()
      .filter(|b| include_inactive || b.is_active)
      .collect();
    configs.sort_by(|a, b| a.display_order.cmp(&b.display_order).then_with(|| a.bank_code.cmp(&b.bank_code)));
    Ok(configs)
  }

  async fn add_bank_config(&mut self, config: &BankTransferConfig) -> Result<()> {
    let tables = self.tables.read();
    self.bank_configs.insert(config, &tables.bank_configs)
  }

  async fn update_bank_config(&mut self, config: &mut BankTransferConfig) -> Result<()> {
    let tables = self.tables.read();
    self.bank_configs.update(config, &tables.bank_configs)
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    let MemoryUnit {
      tables,
      products,
      orders,
      coupons,
      payments,
      bank_configs,
      usages,
    } = *self;

    let mut guard = tables.write();
    let mut next = guard.clone();
    products.apply(&mut next.products)?;
    orders.apply(&mut next.orders)?;
    coupons.apply(&mut next.coupons)?;
    payments.apply(&mut next.payments)?;
    bank_configs.apply(&mut next.bank_configs)?;
    next.coupon_usages.extend(usages);
    next.check_unique()?;
    *guard = next;
    debug!("memory unit of work committed");
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> Result<()> {
    debug!("memory unit of work rolled back");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;
  use rust_decimal_macros::dec;

  async fn seeded() -> (MemoryStore, Product) {
    let store = MemoryStore::new();
    let product = Product::new("Phin coffee", dec!(45000), 5, Utc::now());
    let mut uow = store.begin().await.unwrap();
    uow.add_product(&product).await.unwrap();
    uow.commit().await.unwrap();
    (store, product)
  }

  #[tokio::test]
  async fn uncommitted_changes_are_invisible_and_dropped() {
    let (store, product) = seeded().await;

    let mut writer = store.begin().await.unwrap();
    let mut staged = writer.product(product.id).await.unwrap().unwrap();
    staged.stock_quantity = 1;
    writer.update_product(&mut staged).await.unwrap();
    assert_eq!(writer.product(product.id).await.unwrap().unwrap().stock_quantity, 1);

    let mut reader = store.begin().await.unwrap();
    assert_eq!(reader.product(product.id).await.unwrap().unwrap().stock_quantity, 5);
    drop(writer);

    let mut after = store.begin().await.unwrap();
    assert_eq!(after.product(product.id).await.unwrap().unwrap().stock_quantity, 5);
  }

  #[tokio::test]
  async fn stale_version_conflicts_on_commit() {
    let (store, product) = seeded().await;

    let mut first = store.begin().await.unwrap();
    let mut second = store.begin().await.unwrap();
    let mut a = first.product(product.id).await.unwrap().unwrap();
    let mut b = second.product(product.id).await.unwrap().unwrap();

    a.stock_quantity -= 3;
    first.update_product(&mut a).await.unwrap();
    b.stock_quantity -= 4;
    second.update_product(&mut b).await.unwrap();

    first.commit().await.unwrap();
    let err = second.commit().await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let mut check = store.begin().await.unwrap();
    let stored = check.product(product.id).await.unwrap().unwrap();
    assert_eq!(stored.stock_quantity, 2);
    assert_eq!(stored.version, 1);
  }

  #[tokio::test]
  async fn repeated_updates_in_one_unit_keep_first_base() {
    let (store, product) = seeded().await;
    let mut uow = store.begin().await.unwrap();
    let mut row = uow.product(product.id).await.unwrap().unwrap();
    row.stock_quantity = 4;
    uow.update_product(&mut row).await.unwrap();
    row.stock_quantity = 3;
    uow.update_product(&mut row).await.unwrap();
    uow.commit().await.unwrap();

    let mut check = store.begin().await.unwrap();
    let stored = check.product(product.id).await.unwrap().unwrap();
    assert_eq!(stored.stock_quantity, 3);
    assert_eq!(stored.version, 2);
  }

  #[tokio::test]
  async fn updating_with_an_old_copy_fails_early() {
    let (store, product) = seeded().await;
    let mut uow = store.begin().await.unwrap();
    let mut stale = product.clone();
    stale.version = 7;
    assert!(matches!(uow.update_product(&mut stale).await, Err(AppError::Conflict(_))));
  }
}
