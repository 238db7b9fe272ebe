// gok_checkout/src/services/order_assembler.rs

//! Turns priced cart lines into a persisted order with reserved stock, and
//! owns the order status machine.

use crate::clock::Clock;
use crate::config::CheckoutSettings;
use crate::errors::{AppError, Result};
use crate::models::{CustomerInfo, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, Product};
use crate::store::{OrderQuery, Page, Store, UnitOfWork};
use rand_core::{OsRng, RngCore};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const ORDER_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
  pub product_id: Uuid,
  pub quantity: i32,
}

impl OrderLine {
  pub fn new(product_id: Uuid, quantity: i32) -> Self {
    Self { product_id, quantity }
  }
}

#[derive(Debug, Clone)]
pub struct PricedLine {
  pub product: Product,
  pub quantity: i32,
  pub unit_price: Decimal,
}

/// Cart lines with their price snapshot and the order totals they produce.
#[derive(Debug, Clone)]
pub struct PricedCart {
  pub lines: Vec<PricedLine>,
  pub sub_total: Decimal,
  pub tax: Decimal,
  pub shipping_fee: Decimal,
}

impl PricedCart {
  pub fn gross_total(&self) -> Decimal {
    self.sub_total + self.tax + self.shipping_fee
  }
}

/// A coupon discount already resolved against the cart's gross total.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDiscount {
  pub coupon_code: String,
  pub amount: Decimal,
}

/// Rejects empty carts and non-positive quantities; repeated products are summed.
pub fn merge_lines(items: &[OrderLine]) -> Result<Vec<OrderLine>> {
  if items.is_empty() {
    return Err(AppError::Validation("An order needs at least one item".to_string()));
  }
  let mut merged: Vec<OrderLine> = Vec::with_capacity(items.len());
  for line in items {
    if line.quantity <= 0 {
      return Err(AppError::Validation(format!(
        "Quantity for product {} must be positive",
        line.product_id
      )));
    }
    match merged.iter_mut().find(|m| m.product_id == line.product_id) {
      Some(existing) => {
        existing.quantity = existing
          .quantity
          .checked_add(line.quantity)
          .ok_or_else(|| AppError::Validation(format!("Quantity for product {} is too large", line.product_id)))?;
      }
      None => merged.push(line.clone()),
    }
  }
  Ok(merged)
}

pub struct OrderAssembler {
  store: Arc<dyn Store>,
  clock: Arc<dyn Clock>,
  settings: CheckoutSettings,
}

impl OrderAssembler {
  pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, settings: CheckoutSettings) -> Self {
    Self { store, clock, settings }
  }

  pub fn settings(&self) -> &CheckoutSettings {
    &self.settings
  }

  /// Prices, reserves and persists an order in one unit of work.
  #[instrument(name = "OrderAssembler::create_order", skip_all, fields(lines = items.len()), err(Display))]
  pub async fn create_order(
    &self,
    customer: CustomerInfo,
    items: &[OrderLine],
    payment_method: PaymentMethod,
  ) -> Result<Order> {
    customer.validate()?;
    let mut uow = self.store.begin().await?;
    let cart = self.price_cart(uow.as_mut(), items).await?;
    let order = self.place_order(uow.as_mut(), cart, customer, payment_method, None).await?;
    uow.commit().await?;
    info!(order_id = %order.id, order_number = %order.order_number, total = %order.total_amount, "order created");
    Ok(order)
  }

  /// Read-only pricing in a throwaway unit of work.
  pub async fn quote_cart(&self, items: &[OrderLine]) -> Result<PricedCart> {
    let mut uow = self.store.begin().await?;
    let cart = self.price_cart(uow.as_mut(), items).await?;
    uow.rollback().await?;
    Ok(cart)
  }

  /// Loads every product and checks stock, failing on the first line that cannot be served.
  pub async fn price_cart(&self, uow: &mut dyn UnitOfWork, items: &[OrderLine]) -> Result<PricedCart> {
    let lines = merge_lines(items)?;
    let mut priced = Vec::with_capacity(lines.len());
    let mut sub_total = Decimal::ZERO;

    for line in lines {
      let product = uow
        .product(line.product_id)
        .await?
        .filter(Product::is_purchasable)
        .ok_or_else(|| AppError::not_found("Product", line.product_id))?;
      if product.stock_quantity < line.quantity {
        warn!(product_id = %product.id, requested = line.quantity, available = product.stock_quantity, "insufficient stock");
        return Err(AppError::BusinessRule(format!(
          "Insufficient stock for '{}': requested {}, available {}",
          product.name, line.quantity, product.stock_quantity
        )));
      }
      let unit_price = product.selling_price();
      sub_total += unit_price * Decimal::from(line.quantity);
      priced.push(PricedLine {
        product,
        quantity: line.quantity,
        unit_price,
      });
    }

    let tax = (sub_total * self.settings.tax_rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    Ok(PricedCart {
      lines: priced,
      sub_total,
      tax,
      shipping_fee: self.settings.shipping_fee,
    })
  }

  /// Decrements stock for every line and stages the order with its items in `uow`.
  pub async fn place_order(
    &self,
    uow: &mut dyn UnitOfWork,
    cart: PricedCart,
    customer: CustomerInfo,
    payment_method: PaymentMethod,
    discount: Option<OrderDiscount>,
  ) -> Result<Order> {
    let now = self.clock.now();
    let order_id = Uuid::new_v4();
    let order_number = self.next_order_number(uow).await?;
    let gross_total = cart.gross_total();
    let discount_amount = discount
      .as_ref()
      .map_or(Decimal::ZERO, |d| d.amount.clamp(Decimal::ZERO, gross_total));

    let mut items = Vec::with_capacity(cart.lines.len());
    for PricedLine {
      mut product,
      quantity,
      unit_price,
    } in cart.lines
    {
      items.push(OrderItem::new(order_id, product.id, product.name.clone(), unit_price, quantity));
      product.stock_quantity -= quantity;
      product.updated_at = now;
      uow.update_product(&mut product).await?;
    }

    let order = Order {
      id: order_id,
      order_number,
      user_id: customer.user_id,
      customer_name: customer.name.trim().to_string(),
      customer_email: customer.email.filter(|e| !e.trim().is_empty()),
      customer_phone: customer.phone.trim().to_string(),
      shipping_address: customer.shipping_address.trim().to_string(),
      notes: customer.notes,
      sub_total: cart.sub_total,
      tax: cart.tax,
      shipping_fee: cart.shipping_fee,
      discount_amount,
      total_amount: gross_total - discount_amount,
      coupon_code: discount.map(|d| d.coupon_code),
      status: OrderStatus::Pending,
      payment_method,
      payment_status: PaymentStatus::Pending,
      version: 0,
      created_at: now,
      updated_at: now,
      items,
    };
    uow.add_order(&order).await?;
    Ok(order)
  }

  async fn next_order_number(&self, uow: &mut dyn UnitOfWork) -> Result<String> {
    let stamp = self.clock.now().format("%Y%m%d%H%M%S").to_string();
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
      let candidate = format!("GC{}{:04}", stamp, OsRng.next_u32() % 10_000);
      if uow.order_by_number(&candidate).await?.is_none() {
        return Ok(candidate);
      }
    }
    Err(AppError::Conflict(format!(
      "Could not allocate a unique order number for {}",
      stamp
    )))
  }

  pub async fn get_order(&self, id: Uuid) -> Result<Order> {
    let mut uow = self.store.begin().await?;
    uow.order(id).await?.ok_or_else(|| AppError::not_found("Order", id))
  }

  pub async fn get_order_by_number(&self, order_number: &str) -> Result<Order> {
    let mut uow = self.store.begin().await?;
    uow
      .order_by_number(order_number.trim())
      .await?
      .ok_or_else(|| AppError::not_found("Order", order_number.trim()))
  }

  pub async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>> {
    let mut uow = self.store.begin().await?;
    uow.orders(query).await
  }

  /// Moves the order forward along its fulfilment chain.
  #[instrument(name = "OrderAssembler::update_status", skip(self), err(Display))]
  pub async fn update_status(&self, order_id: Uuid, new_status: &str) -> Result<Order> {
    let next: OrderStatus = new_status.parse()?;
    if next == OrderStatus::Cancelled {
      return Err(AppError::Validation(
        "Orders are cancelled through cancel_order, not a status update".to_string(),
      ));
    }

    let mut uow = self.store.begin().await?;
    let mut order = uow.order(order_id).await?.ok_or_else(|| AppError::not_found("Order", order_id))?;
    if order.status == next && !next.is_terminal() {
      return Ok(order);
    }
    if !order.status.can_advance_to(next) {
      return Err(AppError::BusinessRule(format!(
        "Order {} cannot move from {} to {}",
        order.order_number, order.status, next
      )));
    }

    let previous = order.status;
    order.status = next;
    order.updated_at = self.clock.now();
    uow.update_order(&mut order).await?;
    uow.commit().await?;
    info!(order_id = %order.id, from = %previous, to = %next, "order status changed");
    Ok(order)
  }

  /// Cancels a non-terminal order, returns its stock and fails any pending payment.
  #[instrument(name = "OrderAssembler::cancel_order", skip(self), err(Display))]
  pub async fn cancel_order(&self, order_id: Uuid) -> Result<Order> {
    let now = self.clock.now();
    let mut uow = self.store.begin().await?;
    let mut order = uow.order(order_id).await?.ok_or_else(|| AppError::not_found("Order", order_id))?;
    if !order.status.can_cancel() {
      return Err(AppError::BusinessRule(format!(
        "Order {} is {} and cannot be cancelled",
        order.order_number, order.status
      )));
    }

    for item in &order.items {
      match uow.product(item.product_id).await? {
        Some(mut product) => {
          product.stock_quantity += item.quantity;
          product.updated_at = now;
          uow.update_product(&mut product).await?;
        }
        None => warn!(product_id = %item.product_id, "product vanished; stock not restored"),
      }
    }

    for mut payment in uow.payments_for_order(order.id).await? {
      if payment.status == PaymentStatus::Pending {
        payment.status = PaymentStatus::Failed;
        payment.updated_at = now;
        uow.update_payment(&mut payment).await?;
      }
    }

    let previous = order.status;
    order.status = OrderStatus::Cancelled;
    order.payment_status = PaymentStatus::Refunded;
    order.updated_at = now;
    uow.update_order(&mut order).await?;
    uow.commit().await?;
    info!(order_id = %order.id, from = %previous, restored_lines = order.items.len(), "order cancelled");
    Ok(order)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn merging_sums_repeated_products() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let merged = merge_lines(&[OrderLine::new(a, 1), OrderLine::new(b, 2), OrderLine::new(a, 3)]).unwrap();
    assert_eq!(merged, vec![OrderLine::new(a, 4), OrderLine::new(b, 2)]);
  }

  #[test]
  fn merging_rejects_bad_carts() {
    assert!(matches!(merge_lines(&[]), Err(AppError::Validation(_))));
    assert!(matches!(
      merge_lines(&[OrderLine::new(Uuid::new_v4(), 0)]),
      Err(AppError::Validation(_))
    ));
    let id = Uuid::new_v4();
    assert!(merge_lines(&[OrderLine::new(id, i32::MAX), OrderLine::new(id, 1)]).is_err());
  }
}
