// gok_checkout/src/services/coupon_engine.rs

//! Coupon validation, discount math and redemption.
//!
//! Eligibility checks are pure and run in a fixed order so rejection reasons
//! are deterministic. Redemption touches the coupon row and the usage log in
//! the caller's unit of work; a rejected coupon is never written.

use crate::clock::Clock;
use crate::errors::{AppError, Result};
use crate::models::{Coupon, CouponType, CouponUsage, DiscountType, NewCoupon};
use crate::store::{CouponQuery, Page, Store, UnitOfWork};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const MAX_APPLY_ATTEMPTS: usize = 3;

/// Why a coupon cannot be used for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
  InvalidAmount,
  NotFound,
  Inactive,
  NotStarted,
  Expired,
  AlreadyUsed,
  UsageLimitReached,
  NotOwner,
  BelowMinimum { min_order_amount: Decimal },
}

impl fmt::Display for CouponRejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CouponRejection::InvalidAmount => f.write_str("Order amount must not be negative"),
      CouponRejection::NotFound => f.write_str("Coupon code does not exist"),
      CouponRejection::Inactive => f.write_str("Coupon is not active"),
      CouponRejection::NotStarted => f.write_str("Coupon is not valid yet"),
      CouponRejection::Expired => f.write_str("Coupon has expired"),
      CouponRejection::AlreadyUsed => f.write_str("Coupon has already been used"),
      CouponRejection::UsageLimitReached => f.write_str("Coupon usage limit reached"),
      CouponRejection::NotOwner => f.write_str("Coupon belongs to another customer"),
      CouponRejection::BelowMinimum { min_order_amount } => {
        write!(f, "Order amount must be at least {}", min_order_amount)
      }
    }
  }
}

/// Checks `coupon` against an order, in the order customers see the reasons.
pub fn check_eligibility<'c>(
  coupon: Option<&'c Coupon>,
  order_amount: Decimal,
  user_id: Option<Uuid>,
  now: DateTime<Utc>,
) -> std::result::Result<&'c Coupon, CouponRejection> {
  if order_amount < Decimal::ZERO {
    return Err(CouponRejection::InvalidAmount);
  }
  let coupon = coupon.filter(|c| !c.is_deleted).ok_or(CouponRejection::NotFound)?;
  if !coupon.is_active {
    return Err(CouponRejection::Inactive);
  }
  if now < coupon.start_date {
    return Err(CouponRejection::NotStarted);
  }
  if now > coupon.end_date {
    return Err(CouponRejection::Expired);
  }
  if coupon.is_used {
    return Err(CouponRejection::AlreadyUsed);
  }
  if coupon.usage_limit_reached() {
    return Err(CouponRejection::UsageLimitReached);
  }
  if !coupon.is_system_coupon && (user_id.is_none() || coupon.user_id != user_id) {
    return Err(CouponRejection::NotOwner);
  }
  if let Some(min_order_amount) = coupon.min_order_amount {
    if order_amount < min_order_amount {
      return Err(CouponRejection::BelowMinimum { min_order_amount });
    }
  }
  Ok(coupon)
}

/// Discount for `order_amount`, capped by the gradual balance, then the
/// coupon's maximum, then the order amount itself.
pub fn calculate_discount(coupon: &Coupon, order_amount: Decimal) -> Decimal {
  let raw = match coupon.discount_type {
    DiscountType::Percentage => (order_amount * coupon.discount_value / Decimal::ONE_HUNDRED)
      .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    DiscountType::FixedAmount => coupon.discount_value,
  };

  let mut discount = raw;
  if coupon.coupon_type == CouponType::Gradual {
    discount = discount.min(coupon.remaining_balance.unwrap_or(Decimal::ZERO));
  }
  if let Some(cap) = coupon.max_discount_amount {
    discount = discount.min(cap);
  }
  discount.min(order_amount).max(Decimal::ZERO)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponValidation {
  pub is_valid: bool,
  pub reason: Option<String>,
  pub estimated_discount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponApplication {
  pub success: bool,
  pub discount_amount: Decimal,
  pub final_amount: Decimal,
  pub remaining_balance: Option<Decimal>,
  pub notice: String,
}

impl CouponApplication {
  fn rejected(order_amount: Decimal, rejection: &CouponRejection) -> Self {
    Self {
      success: false,
      discount_amount: Decimal::ZERO,
      final_amount: order_amount,
      remaining_balance: None,
      notice: rejection.to_string(),
    }
  }
}

/// Read-only result of pricing a coupon against an amount.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponQuote {
  pub coupon: Coupon,
  pub order_amount: Decimal,
  pub discount: Decimal,
}

/// What a redemption wrote: the updated coupon and its usage row.
#[derive(Debug, Clone, PartialEq)]
pub struct Redemption {
  pub coupon: Coupon,
  pub usage: CouponUsage,
}

/// Who is redeeming, and for which order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Redeemer {
  pub order_id: Option<Uuid>,
  pub user_id: Option<Uuid>,
  pub session_id: Option<String>,
}

pub struct CouponEngine {
  store: Arc<dyn Store>,
  clock: Arc<dyn Clock>,
}

impl CouponEngine {
  pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
    Self { store, clock }
  }

  /// Read-only: reports whether `code` applies and the discount it would give.
  #[instrument(name = "CouponEngine::validate", skip(self), err(Display))]
  pub async fn validate(
    &self,
    code: &str,
    order_amount: Decimal,
    user_id: Option<Uuid>,
    _session_id: Option<&str>,
  ) -> Result<CouponValidation> {
    match self.quote(code, order_amount, user_id).await? {
      Ok(quote) => Ok(CouponValidation {
        is_valid: true,
        reason: None,
        estimated_discount: quote.discount,
      }),
      Err(rejection) => Ok(CouponValidation {
        is_valid: false,
        reason: Some(rejection.to_string()),
        estimated_discount: Decimal::ZERO,
      }),
    }
  }

  /// Loads and checks the coupon without writing; the outer `Result` carries store failures.
  pub async fn quote(
    &self,
    code: &str,
    order_amount: Decimal,
    user_id: Option<Uuid>,
  ) -> Result<std::result::Result<CouponQuote, CouponRejection>> {
    let mut uow = self.store.begin().await?;
    let coupon = uow.coupon_by_code(code).await?;
    uow.rollback().await?;
    Ok(Self::price(coupon.as_ref(), order_amount, user_id, self.clock.now()))
  }

  fn price(
    coupon: Option<&Coupon>,
    order_amount: Decimal,
    user_id: Option<Uuid>,
    now: DateTime<Utc>,
  ) -> std::result::Result<CouponQuote, CouponRejection> {
    let coupon = check_eligibility(coupon, order_amount, user_id, now)?;
    Ok(CouponQuote {
      coupon: coupon.clone(),
      order_amount,
      discount: calculate_discount(coupon, order_amount),
    })
  }

  /// Like [`quote`](Self::quote) but inside the caller's unit of work.
  pub async fn quote_in(
    &self,
    uow: &mut dyn UnitOfWork,
    code: &str,
    order_amount: Decimal,
    user_id: Option<Uuid>,
  ) -> Result<std::result::Result<CouponQuote, CouponRejection>> {
    let coupon = uow.coupon_by_code(code).await?;
    Ok(Self::price(coupon.as_ref(), order_amount, user_id, self.clock.now()))
  }

  /// Validates and redeems `code` in its own unit of work.
  ///
  /// A rejected coupon yields `success: false` and leaves the coupon and its
  /// usage log untouched. Lost optimistic races are retried.
  #[instrument(name = "CouponEngine::apply", skip(self), err(Display))]
  pub async fn apply(
    &self,
    code: &str,
    order_amount: Decimal,
    user_id: Option<Uuid>,
    session_id: Option<&str>,
  ) -> Result<CouponApplication> {
    let mut attempt = 1;
    loop {
      let mut uow = self.store.begin().await?;
      let quote = match self.quote_in(uow.as_mut(), code, order_amount, user_id).await? {
        Ok(quote) => quote,
        Err(rejection) => {
          uow.rollback().await?;
          info!(code, reason = %rejection, "coupon rejected");
          return Ok(CouponApplication::rejected(order_amount, &rejection));
        }
      };

      let redeemer = Redeemer {
        order_id: None,
        user_id,
        session_id: session_id.map(str::to_string),
      };
      let outcome = match self.redeem(uow.as_mut(), quote.coupon, order_amount, &redeemer).await {
        Ok(redemption) => uow.commit().await.map(|()| redemption),
        Err(err) => Err(err),
      };

      match outcome {
        Ok(redemption) => return Ok(Self::describe(&redemption)),
        Err(AppError::Conflict(reason)) if attempt < MAX_APPLY_ATTEMPTS => {
          warn!(code, attempt, %reason, "coupon changed while applying, retrying");
          attempt += 1;
        }
        Err(err) => return Err(err),
      }
    }
  }

  fn describe(redemption: &Redemption) -> CouponApplication {
    let usage = &redemption.usage;
    let coupon = &redemption.coupon;
    let notice = match (coupon.coupon_type, coupon.remaining_balance) {
      (CouponType::Gradual, Some(balance)) if balance.is_zero() => {
        format!("Coupon {} applied; its balance is now used up", coupon.code)
      }
      (CouponType::Gradual, Some(balance)) => format!("Coupon {} applied; remaining balance {}", coupon.code, balance),
      _ => format!("Coupon {} applied", coupon.code),
    };
    CouponApplication {
      success: true,
      discount_amount: usage.discount_amount,
      final_amount: usage.final_amount,
      remaining_balance: usage.remaining_balance_after,
      notice,
    }
  }

  /// Applies the coupon's state change and appends its usage row inside `uow`.
  ///
  /// Eligibility is re-checked against `coupon` as loaded in `uow`; an
  /// ineligible coupon is a `BusinessRule` error and nothing is staged.
  pub async fn redeem(
    &self,
    uow: &mut dyn UnitOfWork,
    mut coupon: Coupon,
    order_amount: Decimal,
    redeemer: &Redeemer,
  ) -> Result<Redemption> {
    let now = self.clock.now();
    check_eligibility(Some(&coupon), order_amount, redeemer.user_id, now)
      .map_err(|rejection| AppError::BusinessRule(format!("Coupon {}: {}", coupon.code, rejection)))?;
    let discount = calculate_discount(&coupon, order_amount);

    coupon.usage_count += 1;
    match coupon.coupon_type {
      CouponType::OneTime => coupon.is_used = true,
      CouponType::Gradual => {
        let balance = (coupon.remaining_balance.unwrap_or(Decimal::ZERO) - discount).max(Decimal::ZERO);
        coupon.remaining_balance = Some(balance);
        if balance.is_zero() {
          coupon.is_used = true;
        }
      }
    }
    coupon.updated_at = now;
    uow.update_coupon(&mut coupon).await?;

    let usage = CouponUsage {
      id: Uuid::new_v4(),
      coupon_id: coupon.id,
      order_id: redeemer.order_id,
      user_id: redeemer.user_id,
      session_id: redeemer.session_id.clone(),
      original_amount: order_amount,
      discount_amount: discount,
      final_amount: order_amount - discount,
      remaining_balance_after: match coupon.coupon_type {
        CouponType::Gradual => coupon.remaining_balance,
        CouponType::OneTime => None,
      },
      used_at: now,
    };
    uow.add_coupon_usage(&usage).await?;

    info!(
      coupon = %coupon.code,
      order_id = ?redeemer.order_id,
      %discount,
      usage_count = coupon.usage_count,
      is_used = coupon.is_used,
      "coupon redeemed"
    );
    Ok(Redemption { coupon, usage })
  }

  #[instrument(name = "CouponEngine::create_coupon", skip(self, input), fields(code = %input.code), err(Display))]
  pub async fn create_coupon(&self, input: NewCoupon) -> Result<Coupon> {
    validate_new_coupon(&input)?;
    let now = self.clock.now();
    let code = input.code.trim().to_uppercase();

    let mut uow = self.store.begin().await?;
    if uow.coupon_by_code(&code).await?.is_some() {
      return Err(AppError::Conflict(format!("Coupon code '{}' already exists", code)));
    }

    let remaining_balance = match input.coupon_type {
      CouponType::Gradual => input.initial_balance,
      CouponType::OneTime => None,
    };
    let coupon = Coupon {
      id: Uuid::new_v4(),
      code,
      name: input.name.trim().to_string(),
      description: input.description,
      coupon_type: input.coupon_type,
      discount_type: input.discount_type,
      discount_value: input.discount_value,
      max_discount_amount: input.max_discount_amount,
      min_order_amount: input.min_order_amount,
      initial_balance: remaining_balance,
      remaining_balance,
      is_system_coupon: input.is_system_coupon,
      user_id: input.user_id,
      is_active: true,
      start_date: input.start_date,
      end_date: input.end_date,
      max_usage_count: input.max_usage_count,
      usage_count: 0,
      is_used: false,
      image_url: input.image_url,
      is_deleted: false,
      version: 0,
      created_at: now,
      updated_at: now,
    };
    uow.add_coupon(&coupon).await?;
    uow.commit().await?;
    info!(coupon_id = %coupon.id, code = %coupon.code, "coupon created");
    Ok(coupon)
  }

  pub async fn get_coupon(&self, id: Uuid) -> Result<Coupon> {
    let mut uow = self.store.begin().await?;
    uow.coupon(id).await?.ok_or_else(|| AppError::not_found("Coupon", id))
  }

  pub async fn get_coupon_by_code(&self, code: &str) -> Result<Coupon> {
    let mut uow = self.store.begin().await?;
    uow
      .coupon_by_code(code)
      .await?
      .ok_or_else(|| AppError::not_found("Coupon", code.trim()))
  }

  pub async fn list_coupons(&self, query: &CouponQuery) -> Result<Page<Coupon>> {
    let mut uow = self.store.begin().await?;
    uow.coupons(query).await
  }

  #[instrument(name = "CouponEngine::deactivate_coupon", skip(self), err(Display))]
  pub async fn deactivate_coupon(&self, id: Uuid) -> Result<Coupon> {
    let mut uow = self.store.begin().await?;
    let mut coupon = uow.coupon(id).await?.ok_or_else(|| AppError::not_found("Coupon", id))?;
    if coupon.is_active {
      coupon.is_active = false;
      coupon.updated_at = self.clock.now();
      uow.update_coupon(&mut coupon).await?;
      uow.commit().await?;
      info!(coupon_id = %id, "coupon deactivated");
    }
    Ok(coupon)
  }

  #[instrument(name = "CouponEngine::delete_coupon", skip(self), err(Display))]
  pub async fn delete_coupon(&self, id: Uuid) -> Result<()> {
    let mut uow = self.store.begin().await?;
    let mut coupon = uow.coupon(id).await?.ok_or_else(|| AppError::not_found("Coupon", id))?;
    coupon.updated_at = self.clock.now();
    uow.soft_delete_coupon(&mut coupon).await?;
    uow.commit().await?;
    info!(coupon_id = %id, "coupon deleted");
    Ok(())
  }

  pub async fn usage_history(&self, coupon_id: Uuid) -> Result<Vec<CouponUsage>> {
    let mut uow = self.store.begin().await?;
    if uow.coupon(coupon_id).await?.is_none() {
      return Err(AppError::not_found("Coupon", coupon_id));
    }
    uow.coupon_usages(coupon_id).await
  }
}

fn validate_new_coupon(input: &NewCoupon) -> Result<()> {
  let mut problems: Vec<String> = Vec::new();
  let code = input.code.trim();
  if code.is_empty() {
    problems.push("code is required".into());
  } else if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
    problems.push("code may only contain letters, digits, '-' and '_'".into());
  }
  if input.name.trim().is_empty() {
    problems.push("name is required".into());
  }
  match input.discount_type {
    DiscountType::Percentage if input.discount_value <= Decimal::ZERO || input.discount_value > Decimal::ONE_HUNDRED => {
      problems.push("percentage discount must be in (0, 100]".into())
    }
    DiscountType::FixedAmount if input.discount_value <= Decimal::ZERO => {
      problems.push("fixed discount must be positive".into())
    }
    _ => {}
  }
  match (input.coupon_type, input.initial_balance) {
    (CouponType::Gradual, Some(balance)) if balance > Decimal::ZERO => {}
    (CouponType::Gradual, _) => problems.push("gradual coupons need a positive initial balance".into()),
    (CouponType::OneTime, Some(_)) => problems.push("one-time coupons do not carry a balance".into()),
    (CouponType::OneTime, None) => {}
  }
  if input.max_discount_amount.is_some_and(|cap| cap <= Decimal::ZERO) {
    problems.push("max discount amount must be positive".into());
  }
  if input.min_order_amount.is_some_and(|min| min < Decimal::ZERO) {
    problems.push("min order amount must not be negative".into());
  }
  if input.start_date >= input.end_date {
    problems.push("start date must be before end date".into());
  }
  if input.max_usage_count.is_some_and(|max| max <= 0) {
    problems.push("max usage count must be positive".into());
  }
  if !input.is_system_coupon && input.user_id.is_none() {
    problems.push("personal coupons need an owner".into());
  }

  if problems.is_empty() {
    Ok(())
  } else {
    Err(AppError::Validation(problems.join("; ")))
  }
}
