// gok_checkout/src/store/postgres.rs

//! Postgres store: one sqlx transaction per unit of work.

use super::{CouponQuery, OrderQuery, Page, Store, UnitOfWork};
use crate::errors::{AppError, Result};
use crate::models::{BankTransferConfig, Coupon, CouponUsage, Order, OrderItem, Payment, Product};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgQueryResult};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

const PRODUCT_COLUMNS: &str =
  "id, name, description, price, discount_price, stock_quantity, is_active, is_deleted, version, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, order_number, user_id, customer_name, customer_email, customer_phone, \
  shipping_address, notes, sub_total, tax, shipping_fee, discount_amount, total_amount, coupon_code, status, \
  payment_method, payment_status, version, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, unit_price, quantity, total_price";

const COUPON_COLUMNS: &str = "id, code, name, description, coupon_type, discount_type, discount_value, \
  max_discount_amount, min_order_amount, initial_balance, remaining_balance, is_system_coupon, user_id, is_active, \
  start_date, end_date, max_usage_count, usage_count, is_used, image_url, is_deleted, version, created_at, updated_at";

const USAGE_COLUMNS: &str = "id, coupon_id, order_id, user_id, session_id, original_amount, discount_amount, \
  final_amount, remaining_balance_after, used_at";

const PAYMENT_COLUMNS: &str = "id, order_id, transaction_id, amount, payment_method, status, qr_code_data, \
  qr_code_image_url, bank_code, bank_name, account_number, account_name, payment_description, paid_at, expires_at, \
  version, created_at, updated_at";

const BANK_COLUMNS: &str = "id, bank_code, bank_name, account_number, account_name, is_active, display_order, \
  is_deleted, version, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  /// Connects and brings the schema up to date.
  pub async fn connect(database_url: &str) -> Result<Self> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    sqlx::migrate!("./migrations")
      .run(&pool)
      .await
      .map_err(|e| AppError::Config(format!("Database migration failed: {}", e)))?;
    info!("Connected to Postgres and applied migrations.");
    Ok(Self::new(pool))
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }
}

#[async_trait]
impl Store for PgStore {
  async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
    let tx = self.pool.begin().await?;
    Ok(Box::new(PgUnit { tx }))
  }
}

struct PgUnit {
  tx: Transaction<'static, Postgres>,
}

/// Unique violations surface as conflicts; anything else stays a database error.
fn map_db_err(err: sqlx::Error) -> AppError {
  match &err {
    sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(db.message().to_string()),
    _ => AppError::Sqlx(err),
  }
}

fn expect_one_row(result: PgQueryResult, entity: &str, id: Uuid) -> Result<()> {
  if result.rows_affected() == 1 {
    Ok(())
  } else {
    Err(AppError::Conflict(format!("{} {} was modified concurrently", entity, id)))
  }
}

impl PgUnit {
  async fn attach_items(&mut self, orders: &mut [Order]) -> Result<()> {
    if orders.is_empty() {
      return Ok(());
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = sqlx::query_as::<_, OrderItem>(&format!(
      "SELECT {} FROM order_items WHERE order_id = ANY($1) ORDER BY product_name, id",
      ORDER_ITEM_COLUMNS
    ))
    .bind(&ids)
    .fetch_all(&mut *self.tx)
    .await?;
    for order in orders.iter_mut() {
      order.items = items.iter().filter(|item| item.order_id == order.id).cloned().collect();
    }
    Ok(())
  }

  async fn single_order(&mut self, order: Option<Order>) -> Result<Option<Order>> {
    match order {
      Some(order) => {
        let mut one = [order];
        self.attach_items(&mut one).await?;
        let [order] = one;
        Ok(Some(order))
      }
      None => Ok(None),
    }
  }
}

fn push_order_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &OrderQuery) {
  if let Some(user_id) = query.user_id {
    builder.push(" AND user_id = ").push_bind(user_id);
  }
  if let Some(status) = query.status {
    builder.push(" AND status = ").push_bind(status);
  }
}

fn push_coupon_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &CouponQuery) {
  builder.push(" AND is_deleted = FALSE");
  if query.active_only {
    builder.push(" AND is_active = TRUE");
  }
  if let Some(system) = query.is_system {
    builder.push(" AND is_system_coupon = ").push_bind(system);
  }
  if let Some(owner) = query.owner {
    builder.push(" AND user_id = ").push_bind(owner);
  }
  if let Some(kind) = query.coupon_type {
    builder.push(" AND coupon_type = ").push_bind(kind);
  }
}

#[async_trait]
impl UnitOfWork for PgUnit {
  async fn product(&mut self, id: Uuid) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await?;
    Ok(product)
  }

  async fn add_product(&mut self, product: &Product) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO products ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
      PRODUCT_COLUMNS
    ))
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(product.discount_price)
    .bind(product.stock_quantity)
    .bind(product.is_active)
    .bind(product.is_deleted)
    .bind(product.version)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err)?;
    Ok(())
  }

  async fn update_product(&mut self, product: &mut Product) -> Result<()> {
    let result = sqlx::query(
      "UPDATE products SET name = $3, description = $4, price = $5, discount_price = $6, stock_quantity = $7, \
       is_active = $8, is_deleted = $9, updated_at = $10, version = version + 1 WHERE id = $1 AND version = $2",
    )
    .bind(product.id)
    .bind(product.version)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(product.discount_price)
    .bind(product.stock_quantity)
    .bind(product.is_active)
    .bind(product.is_deleted)
    .bind(product.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err)?;
    expect_one_row(result, "Product", product.id)?;
    product.version += 1;
    Ok(())
  }

  async fn order(&mut self, id: Uuid) -> Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await?;
    self.single_order(order).await
  }

  async fn order_by_number(&mut self, order_number: &str) -> Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {} FROM orders WHERE order_number = $1", ORDER_COLUMNS))
      .bind(order_number)
      .fetch_optional(&mut *self.tx)
      .await?;
    self.single_order(order).await
  }

  async fn orders(&mut self, query: &OrderQuery) -> Result<Page<Order>> {
    let request = query.page.normalized();

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders WHERE TRUE");
    push_order_filters(&mut count, query);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *self.tx).await?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM orders WHERE TRUE", ORDER_COLUMNS));
    push_order_filters(&mut select, query);
    select
      .push(" ORDER BY created_at DESC, order_number DESC LIMIT ")
      .push_bind(i64::from(request.page_size))
      .push(" OFFSET ")
      .push_bind(request.offset() as i64);
    let mut orders = select.build_query_as::<Order>().fetch_all(&mut *self.tx).await?;
    self.attach_items(&mut orders).await?;

    Ok(Page {
      items: orders,
      total: total.max(0) as u64,
      page: request.page,
      page_size: request.page_size,
    })
  }

  async fn add_order(&mut self, order: &Order) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
       $18, $19, $20)",
      ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(&order.customer_phone)
    .bind(&order.shipping_address)
    .bind(&order.notes)
    .bind(order.sub_total)
    .bind(order.tax)
    .bind(order.shipping_fee)
    .bind(order.discount_amount)
    .bind(order.total_amount)
    .bind(&order.coupon_code)
    .bind(order.status)
    .bind(order.payment_method)
    .bind(order.payment_status)
    .bind(order.version)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err)?;

    for item in &order.items {
      sqlx::query(&format!(
        "INSERT INTO order_items ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        ORDER_ITEM_COLUMNS
      ))
      .bind(item.id)
      .bind(item.order_id)
      .bind(item.product_id)
      .bind(&item.product_name)
      .bind(item.unit_price)
      .bind(item.quantity)
      .bind(item.total_price)
      .execute(&mut *self.tx)
      .await
      .map_err(map_db_err)?;
    }
    Ok(())
  }

  async fn update_order(&mut self, order: &mut Order) -> Result<()> {
    let result = sqlx::query(
      "UPDATE orders SET status = $3, payment_status = $4, payment_method = $5, notes = $6, updated_at = $7, \
       version = version + 1 WHERE id = $1 AND version = $2",
    )
    .bind(order.id)
    .bind(order.version)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.payment_method)
    .bind(&order.notes)
    .bind(order.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err)?;
    expect_one_row(result, "Order", order.id)?;
    order.version += 1;
    Ok(())
  }

  async fn coupon(&mut self, id: Uuid) -> Result<Option<Coupon>> {
    let coupon = sqlx::query_as::<_, Coupon>(&format!(
      "SELECT {} FROM coupons WHERE id = $1 AND is_deleted = FALSE",
      COUPON_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *self.tx)
    .await?;
    Ok(coupon)
  }

  async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>> {
    let coupon = sqlx::query_as::<_, Coupon>(&format!(
      "SELECT {} FROM coupons WHERE UPPER(code) = UPPER($1) AND is_deleted = FALSE",
      COUPON_COLUMNS
    ))
    .bind(code.trim())
    .fetch_optional(&mut *self.tx)
    .await?;
    Ok(coupon)
  }

  async fn coupons(&mut self, query: &CouponQuery) -> Result<Page<Coupon>> {
    let request = query.page.normalized();

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM coupons WHERE TRUE");
    push_coupon_filters(&mut count, query);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *self.tx).await?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM coupons WHERE TRUE", COUPON_COLUMNS));
    push_coupon_filters(&mut select, query);
    select
      .push(" ORDER BY created_at DESC, code LIMIT ")
      .push_bind(i64::from(request.page_size))
      .push(" OFFSET ")
      .push_bind(request.offset() as i64);
    let coupons = select.build_query_as::<Coupon>().fetch_all(&mut *self.tx).await?;

    Ok(Page {
      items: coupons,
      total: total.max(0) as u64,
      page: request.page,
      page_size: request.page_size,
    })
  }

  async fn add_coupon(&mut self, coupon: &Coupon) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO coupons ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
       $18, $19, $20, $21, $22, $23, $24)",
      COUPON_COLUMNS
    ))
    .bind(coupon.id)
    .bind(&coupon.code)
    .bind(&coupon.name)
    .bind(&coupon.description)
    .bind(coupon.coupon_type)
    .bind(coupon.discount_type)
    .bind(coupon.discount_value)
    .bind(coupon.max_discount_amount)
    .bind(coupon.min_order_amount)
    .bind(coupon.initial_balance)
    .bind(coupon.remaining_balance)
    .bind(coupon.is_system_coupon)
    .bind(coupon.user_id)
    .bind(coupon.is_active)
    .bind(coupon.start_date)
    .bind(coupon.end_date)
    .bind(coupon.max_usage_count)
    .bind(coupon.usage_count)
    .bind(coupon.is_used)
    .bind(&coupon.image_url)
    .bind(coupon.is_deleted)
    .bind(coupon.version)
    .bind(coupon.created_at)
    .bind(coupon.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err)?;
    Ok(())
  }

  async fn update_coupon(&mut self, coupon: &mut Coupon) -> Result<()> {
    let result = sqlx::query(
      "UPDATE coupons SET name = $3, description = $4, remaining_balance = $5, is_active = $6, usage_count = $7, \
       is_used = $8, image_url = $9, is_deleted = $10, updated_at = $11, version = version + 1 \
       WHERE id = $1 AND version = $2",
    )
    .bind(coupon.id)
    .bind(coupon.version)
    .bind(&coupon.name)
    .bind(&coupon.description)
    .bind(coupon.remaining_balance)
    .bind(coupon.is_active)
    .bind(coupon.usage_count)
    .bind(coupon.is_used)
    .bind(&coupon.image_url)
    .bind(coupon.is_deleted)
    .bind(coupon.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err)?;
    expect_one_row(result, "Coupon", coupon.id)?;
    coupon.version += 1;
    Ok(())
  }

  async fn add_coupon_usage(&mut self, usage: &CouponUsage) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO coupon_usages ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
      USAGE_COLUMNS
    ))
    .bind(usage.id)
    .bind(usage.coupon_id)
    .bind(usage.order_id)
    .bind(usage.user_id)
    .bind(&usage.session_id)
    .bind(usage.original_amount)
    .bind(usage.discount_amount)
    .bind(usage.final_amount)
    .bind(usage.remaining_balance_after)
    .bind(usage.used_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err)?;
    Ok(())
  }

  async fn coupon_usages(&mut self, coupon_id: Uuid) -> Result<Vec<CouponUsage>> {
    let usages = sqlx::query_as::<_, CouponUsage>(&format!(
      "SELECT {} FROM coupon_usages WHERE coupon_id = $1 ORDER BY used_at, id",
      USAGE_COLUMNS
    ))
    .bind(coupon_id)
    .fetch_all(&mut *self.tx)
    .await?;
    Ok(usages)
  }

  async fn payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
    let payment = sqlx::query_as::<_, Payment>(&format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS))
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await?;
    Ok(payment)
  }

  async fn payment_by_transaction(&mut self, transaction_id: &str) -> Result<Option<Payment>> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
      "SELECT {} FROM payments WHERE transaction_id = $1",
      PAYMENT_COLUMNS
    ))
    .bind(transaction_id)
    .fetch_optional(&mut *self.tx)
    .await?;
    Ok(payment)
  }

  async fn payments_for_order(&mut self, order_id: Uuid) -> Result<Vec<Payment>> {
    let payments = sqlx::query_as::<_, Payment>(&format!(
      "SELECT {} FROM payments WHERE order_id = $1 ORDER BY created_at, id",
      PAYMENT_COLUMNS
    ))
    .bind(order_id)
    .fetch_all(&mut *self.tx)
    .await?;
    Ok(payments)
  }

  async fn add_payment(&mut self, payment: &Payment) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO payments ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
       $18)",
      PAYMENT_COLUMNS
    ))
    .bind(payment.id)
    .bind(payment.order_id)
    .bind(&payment.transaction_id)
    .bind(payment.amount)
    .bind(payment.payment_method)
    .bind(payment.status)
    .bind(&payment.qr_code_data)
    .bind(&payment.qr_code_image_url)
    .bind(&payment.bank_code)
    .bind(&payment.bank_name)
    .bind(&payment.account_number)
    .bind(&payment.account_name)
    .bind(&payment.payment_description)
    .bind(payment.paid_at)
    .bind(payment.expires_at)
    .bind(payment.version)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err)?;
    Ok(())
  }

  async fn update_payment(&mut self, payment: &mut Payment) -> Result<()> {
    let result = sqlx::query(
      "UPDATE payments SET status = $3, paid_at = $4, updated_at = $5, version = version + 1 \
       WHERE id = $1 AND version = $2",
    )
    .bind(payment.id)
    .bind(payment.version)
    .bind(payment.status)
    .bind(payment.paid_at)
    .bind(payment.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err)?;
    expect_one_row(result, "Payment", payment.id)?;
    payment.version += 1;
    Ok(())
  }

  async fn bank_config(&mut self, id: Uuid) -> Result<Option<BankTransferConfig>> {
    let config = sqlx::query_as::<_, BankTransferConfig>(&format!(
      "SELECT {} FROM bank_transfer_configs WHERE id = $1 AND is_deleted = FALSE",
      BANK_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *self.tx)
    .await?;
    Ok(config)
  }

  async fn bank_config_by_code(&mut self, bank_code: &str) -> Result<Option<BankTransferConfig>> {
    let config = sqlx::query_as::<_, BankTransferConfig>(&format!(
      "SELECT {} FROM bank_transfer_configs WHERE UPPER(bank_code) = UPPER($1) AND is_deleted = FALSE",
      BANK_COLUMNS
    ))
    .bind(bank_code.trim())
    .fetch_optional(&mut *self.tx)
    .await?;
    Ok(config)
  }

  async fn bank_configs(&mut self, include_inactive: bool) -> Result<Vec<BankTransferConfig>> {
    let configs = sqlx::query_as::<_, BankTransferConfig>(&format!(
      "SELECT {} FROM bank_transfer_configs WHERE is_deleted = FALSE AND ($1 OR is_active) \
       ORDER BY display_order, bank_code",
      BANK_COLUMNS
    ))
    .bind(include_inactive)
    .fetch_all(&mut *self.tx)
    .await?;
    Ok(configs)
  }

  async fn add_bank_config(&mut self, config: &BankTransferConfig) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO bank_transfer_configs ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
      BANK_COLUMNS
    ))
    .bind(config.id)
    .bind(&config.bank_code)
    .bind(&config.bank_name)
    .bind(&config.account_number)
    .bind(&config.account_name)
    .bind(config.is_active)
    .bind(config.display_order)
    .bind(config.is_deleted)
    .bind(config.version)
    .bind(config.created_at)
    .bind(config.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err)?;
    Ok(())
  }

  async fn update_bank_config(&mut self, config: &mut BankTransferConfig) -> Result<()> {
    let result = sqlx::query(
      "UPDATE bank_transfer_configs SET bank_name = $3, account_number = $4, account_name = $5, is_active = $6, \
       display_order = $7, is_deleted = $8, updated_at = $9, version = version + 1 WHERE id = $1 AND version = $2",
    )
    .bind(config.id)
    .bind(config.version)
    .bind(&config.bank_name)
    .bind(&config.account_number)
    .bind(&config.account_name)
    .bind(config.is_active)
    .bind(config.display_order)
    .bind(config.is_deleted)
    .bind(config.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err)?;
    expect_one_row(result, "Bank config", config.id)?;
    config.version += 1;
    Ok(())
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    let PgUnit { tx } = *self;
    tx.commit().await.map_err(map_db_err)?;
    debug!("postgres unit of work committed");
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> Result<()> {
    let PgUnit { tx } = *self;
    tx.rollback().await?;
    debug!("postgres unit of work rolled back");
    Ok(())
  }
}
