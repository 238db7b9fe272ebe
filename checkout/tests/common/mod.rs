// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures_util::future::BoxFuture;
use gok_checkout::clock::{Clock, ManualClock};
use gok_checkout::config::AppConfig;
use gok_checkout::errors::Result as AppResult;
use gok_checkout::models::{
  BankTransferConfig, Coupon, CouponType, CouponUsage, CustomerInfo, DiscountType, NewCoupon, Order, Payment,
  PaymentMethod, Product,
};
use gok_checkout::pipelines::CheckoutRequest;
use gok_checkout::seed::{seed_store, SeedSummary};
use gok_checkout::services::OrderLine;
use gok_checkout::state::AppState;
use gok_checkout::store::{CouponQuery, MemoryStore, OrderQuery, Page, Store, UnitOfWork};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

pub fn start_time() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
}

/// A seeded in-memory app on a manual clock.
///
/// Seed data: products `Ca phe sua da` 45,000 (stock 100) and `Bac xiu` 50,000 (stock 80)
/// among others, coupons `SAVE10` and `GIFT200K`, and one VCB receiving account.
///
/// Services run over a `ContendedStore`, so a test can queue rival writes that
/// land just before the service's own commit.
pub struct TestApp {
  pub state: AppState,
  pub clock: Arc<ManualClock>,
  pub store: Arc<MemoryStore>,
  pub rivals: RivalQueue,
  pub seed: SeedSummary,
}

impl TestApp {
  pub async fn new() -> Self {
    setup_tracing();
    let config = Arc::new(AppConfig::from_lookup(|_| None).unwrap());
    let store = Arc::new(MemoryStore::new());
    let rivals = RivalQueue::default();
    let contended = Arc::new(ContendedStore {
      inner: store.clone(),
      rivals: rivals.clone(),
    });
    let clock = Arc::new(ManualClock::new(start_time()));
    let state = AppState::new(config, contended, clock.clone());
    let seed = seed_store(&state).await.unwrap();
    Self {
      state,
      clock,
      store,
      rivals,
      seed,
    }
  }

  /// Queues a write by another customer that commits right before the next
  /// service commit, after the service has read its rows.
  pub fn rival_on_next_commit<F>(&self, write: F)
  where
    F: FnOnce(Arc<MemoryStore>) -> BoxFuture<'static, ()> + Send + 'static,
  {
    let store = self.store.clone();
    self.rivals.0.lock().push_back(Box::new(move || write(store)));
  }

  /// Rival that takes `quantity` of a product's stock.
  pub fn rival_buys(&self, product_id: Uuid, quantity: i32) {
    self.rival_on_next_commit(move |store| {
      Box::pin(async move {
        let mut uow = store.begin().await.unwrap();
        let mut product = uow.product(product_id).await.unwrap().unwrap();
        product.stock_quantity -= quantity;
        uow.update_product(&mut product).await.unwrap();
        uow.commit().await.unwrap();
      })
    });
  }

  /// Rival that redeems `amount` from a coupon (or just counts a use for one-time coupons).
  pub fn rival_redeems(&self, code: &'static str, amount: Decimal) {
    self.rival_on_next_commit(move |store| {
      Box::pin(async move {
        let mut uow = store.begin().await.unwrap();
        let mut coupon = uow.coupon_by_code(code).await.unwrap().unwrap();
        coupon.usage_count += 1;
        match coupon.coupon_type {
          CouponType::OneTime => coupon.is_used = true,
          CouponType::Gradual => {
            let left = coupon.remaining_balance.unwrap() - amount;
            coupon.remaining_balance = Some(left);
            coupon.is_used = left.is_zero();
          }
        }
        uow.update_coupon(&mut coupon).await.unwrap();
        uow.commit().await.unwrap();
      })
    });
  }

  pub fn iced_coffee(&self) -> Uuid {
    self.seed.product_ids[0]
  }

  pub fn bac_xiu(&self) -> Uuid {
    self.seed.product_ids[1]
  }

  pub async fn product(&self, id: Uuid) -> Product {
    let mut uow = self.store.begin().await.unwrap();
    uow.product(id).await.unwrap().unwrap()
  }

  pub async fn add_product(&self, name: &str, price: Decimal, stock: i32) -> Uuid {
    let product = Product::new(name, price, stock, self.clock.now());
    let mut uow = self.store.begin().await.unwrap();
    uow.add_product(&product).await.unwrap();
    uow.commit().await.unwrap();
    product.id
  }

  /// 2 iced coffees and 1 bac xiu: sub-total 140,000, tax 14,000, shipping 30,000.
  pub fn standard_lines(&self) -> Vec<OrderLine> {
    vec![OrderLine::new(self.iced_coffee(), 2), OrderLine::new(self.bac_xiu(), 1)]
  }

  pub fn checkout_request(&self, method: PaymentMethod, coupon: Option<&str>) -> CheckoutRequest {
    CheckoutRequest {
      customer: customer(None),
      items: self.standard_lines(),
      payment_method: method,
      coupon_code: coupon.map(str::to_string),
      bank_code: None,
      session_id: Some("session-1".to_string()),
    }
  }
}

pub fn customer(user_id: Option<Uuid>) -> CustomerInfo {
  CustomerInfo {
    user_id,
    name: "Tran Thi B".to_string(),
    email: Some("b.tran@example.com".to_string()),
    phone: "0912345678".to_string(),
    shipping_address: "45 Nguyen Hue, District 1".to_string(),
    notes: None,
  }
}

/// A system coupon valid for a week around `start_time()`.
pub fn new_coupon(code: &str, coupon_type: CouponType, discount_type: DiscountType, value: Decimal) -> NewCoupon {
  NewCoupon {
    code: code.to_string(),
    name: format!("Coupon {}", code),
    description: None,
    coupon_type,
    discount_type,
    discount_value: value,
    max_discount_amount: None,
    min_order_amount: None,
    initial_balance: None,
    is_system_coupon: true,
    user_id: None,
    start_date: start_time() - Duration::days(1),
    end_date: start_time() + Duration::days(7),
    max_usage_count: None,
    image_url: None,
  }
}

type Rival = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Clone, Default)]
pub struct RivalQueue(Arc<Mutex<VecDeque<Rival>>>);

impl RivalQueue {
  pub fn pending(&self) -> usize {
    self.0.lock().len()
  }
}

/// `MemoryStore` whose units run one queued rival write before committing.
pub struct ContendedStore {
  inner: Arc<MemoryStore>,
  rivals: RivalQueue,
}

#[async_trait]
impl Store for ContendedStore {
  async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
    Ok(Box::new(ContendedUnit {
      inner: self.inner.begin().await?,
      rivals: self.rivals.clone(),
    }))
  }
}

struct ContendedUnit {
  inner: Box<dyn UnitOfWork>,
  rivals: RivalQueue,
}

#[async_trait]
impl UnitOfWork for ContendedUnit {
  async fn product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
    self.inner.product(id).await
  }
  async fn add_product(&mut self, product: &Product) -> AppResult<()> {
    self.inner.add_product(product).await
  }
  async fn update_product(&mut self, product: &mut Product) -> AppResult<()> {
    self.inner.update_product(product).await
  }

  async fn order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
    self.inner.order(id).await
  }
  async fn order_by_number(&mut self, order_number: &str) -> AppResult<Option<Order>> {
    self.inner.order_by_number(order_number).await
  }
  async fn orders(&mut self, query: &OrderQuery) -> AppResult<Page<Order>> {
    self.inner.orders(query).await
  }
  async fn add_order(&mut self, order: &Order) -> AppResult<()> {
    self.inner.add_order(order).await
  }
  async fn update_order(&mut self, order: &mut Order) -> AppResult<()> {
    self.inner.update_order(order).await
  }

  async fn coupon(&mut self, id: Uuid) -> AppResult<Option<Coupon>> {
    self.inner.coupon(id).await
  }
  async fn coupon_by_code(&mut self, code: &str) -> AppResult<Option<Coupon>> {
    self.inner.coupon_by_code(code).await
  }
  async fn coupons(&mut self, query: &CouponQuery) -> AppResult<Page<Coupon>> {
    self.inner.coupons(query).await
  }
  async fn add_coupon(&mut self, coupon: &Coupon) -> AppResult<()> {
    self.inner.add_coupon(coupon).await
  }
  async fn update_coupon(&mut self, coupon: &mut Coupon) -> AppResult<()> {
    self.inner.update_coupon(coupon).await
  }
  async fn add_coupon_usage(&mut self, usage: &CouponUsage) -> AppResult<()> {
    self.inner.add_coupon_usage(usage).await
  }
  async fn coupon_usages(&mut self, coupon_id: Uuid) -> AppResult<Vec<CouponUsage>> {
    self.inner.coupon_usages(coupon_id).await
  }

  async fn payment(&mut self, id: Uuid) -> AppResult<Option<Payment>> {
    self.inner.payment(id).await
  }
  async fn payment_by_transaction(&mut self, transaction_id: &str) -> AppResult<Option<Payment>> {
    self.inner.payment_by_transaction(transaction_id).await
  }
  async fn payments_for_order(&mut self, order_id: Uuid) -> AppResult<Vec<Payment>> {
    self.inner.payments_for_order(order_id).await
  }
  async fn add_payment(&mut self, payment: &Payment) -> AppResult<()> {
    self.inner.add_payment(payment).await
  }
  async fn update_payment(&mut self, payment: &mut Payment) -> AppResult<()> {
    self.inner.update_payment(payment).await
  }

  async fn bank_config(&mut self, id: Uuid) -> AppResult<Option<BankTransferConfig>> {
    self.inner.bank_config(id).await
  }
  async fn bank_config_by_code(&mut self, bank_code: &str) -> AppResult<Option<BankTransferConfig>> {
    self.inner.bank_config_by_code(bank_code).await
  }
  async fn bank_configs(&mut self, include_inactive: bool) -> AppResult<Vec<BankTransferConfig>> {
    self.inner.bank_configs(include_inactive).await
  }
  async fn add_bank_config(&mut self, config: &BankTransferConfig) -> AppResult<()> {
    self.inner.add_bank_config(config).await
  }
  async fn update_bank_config(&mut self, config: &mut BankTransferConfig) -> AppResult<()> {
    self.inner.update_bank_config(config).await
  }

  async fn commit(self: Box<Self>) -> AppResult<()> {
    let ContendedUnit { inner, rivals } = *self;
    let rival = rivals.0.lock().pop_front();
    if let Some(rival) = rival {
      rival().await;
    }
    inner.commit().await
  }

  async fn rollback(self: Box<Self>) -> AppResult<()> {
    self.inner.rollback().await
  }
}
