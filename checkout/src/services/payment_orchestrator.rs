// gok_checkout/src/services/payment_orchestrator.rs

//! Payment records for orders: creation with QR data for bank transfers,
//! lazy expiry, settlement and cancellation. Also manages the
//! receiving bank accounts.

use crate::cache::Cache;
use crate::clock::Clock;
use crate::config::CheckoutSettings;
use crate::errors::{AppError, Result};
use crate::models::{
  BankConfigUpdate, BankTransferConfig, NewBankConfig, OrderStatus, Payment, PaymentMethod, PaymentStatus,
};
use crate::services::qr::{bank_bin, QrRenderer};
use crate::store::{Store, UnitOfWork};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const ACTIVE_BANKS_KEY: &str = "bank_configs:active";
const TRANSACTION_ID_ATTEMPTS: u32 = 10;

pub struct PaymentOrchestrator {
  store: Arc<dyn Store>,
  clock: Arc<dyn Clock>,
  settings: CheckoutSettings,
  qr: Arc<dyn QrRenderer>,
  cache: Arc<Cache>,
}

impl PaymentOrchestrator {
  pub fn new(
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    settings: CheckoutSettings,
    qr: Arc<dyn QrRenderer>,
    cache: Arc<Cache>,
  ) -> Self {
    Self {
      store,
      clock,
      settings,
      qr,
      cache,
    }
  }

  /// Flips a pending payment past its deadline to `Failed` in `uow`. Returns whether it did.
  async fn expire_if_due(&self, uow: &mut dyn UnitOfWork, payment: &mut Payment, now: DateTime<Utc>) -> Result<bool> {
    if !payment.is_expired(now) {
      return Ok(false);
    }
    payment.status = PaymentStatus::Failed;
    payment.updated_at = now;
    uow.update_payment(payment).await?;
    info!(payment_id = %payment.id, transaction_id = %payment.transaction_id, "payment expired");
    Ok(true)
  }

  /// Loads a payment applying lazy expiry; the flip is committed before returning.
  async fn load_current(&self, payment_id: Uuid) -> Result<Payment> {
    let now = self.clock.now();
    let mut uow = self.store.begin().await?;
    let mut payment = uow
      .payment(payment_id)
      .await?
      .ok_or_else(|| AppError::not_found("Payment", payment_id))?;
    if self.expire_if_due(uow.as_mut(), &mut payment, now).await? {
      uow.commit().await?;
    } else {
      uow.rollback().await?;
    }
    Ok(payment)
  }

  #[instrument(name = "PaymentOrchestrator::create_payment", skip(self), err(Display))]
  pub async fn create_payment(
    &self,
    order_id: Uuid,
    method: PaymentMethod,
    bank_code: Option<&str>,
  ) -> Result<Payment> {
    let now = self.clock.now();
    let mut uow = self.store.begin().await?;
    let order = uow.order(order_id).await?.ok_or_else(|| AppError::not_found("Order", order_id))?;
    if order.status == OrderStatus::Cancelled {
      return Err(AppError::BusinessRule(format!(
        "Order {} is cancelled and cannot be paid",
        order.order_number
      )));
    }

    for mut existing in uow.payments_for_order(order.id).await? {
      self.expire_if_due(uow.as_mut(), &mut existing, now).await?;
      if existing.is_active() {
        return Err(AppError::Conflict(format!(
          "Order {} already has a {} payment ({})",
          order.order_number, existing.status, existing.transaction_id
        )));
      }
    }

    let transaction_id = next_transaction_id(uow.as_mut(), &order.order_number, now).await?;
    let description = format!("{} {}", self.settings.description_prefix, order.order_number);
    let mut payment = Payment {
      id: Uuid::new_v4(),
      order_id: order.id,
      transaction_id,
      amount: order.total_amount,
      payment_method: method,
      status: PaymentStatus::Pending,
      qr_code_data: None,
      qr_code_image_url: None,
      bank_code: None,
      bank_name: None,
      account_number: None,
      account_name: None,
      payment_description: description,
      paid_at: None,
      expires_at: None,
      version: 0,
      created_at: now,
      updated_at: now,
    };

    if method == PaymentMethod::BankTransfer {
      let bank = match bank_code.map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => uow
          .bank_config_by_code(code)
          .await?
          .filter(|bank| bank.is_active)
          .ok_or_else(|| AppError::not_found("Active bank config", code))?,
        None => uow
          .default_bank_config()
          .await?
          .ok_or_else(|| AppError::NotFound("No active bank account is configured".to_string()))?,
      };
      payment.qr_code_data = Some(self.qr.generate_qr_payload(
        &bank.bank_code,
        &bank.account_number,
        &bank.account_name,
        payment.amount,
        &payment.payment_description,
      )?);
      payment.qr_code_image_url = Some(self.qr.generate_qr_image_url(
        &bank.bank_code,
        &bank.account_number,
        &bank.account_name,
        payment.amount,
        &payment.payment_description,
      )?);
      payment.bank_code = Some(bank.bank_code);
      payment.bank_name = Some(bank.bank_name);
      payment.account_number = Some(bank.account_number);
      payment.account_name = Some(bank.account_name);
      payment.expires_at = Some(now + self.settings.payment_expiry);
    }

    uow.add_payment(&payment).await?;
    uow.commit().await?;
    info!(
      payment_id = %payment.id,
      order_id = %order.id,
      transaction_id = %payment.transaction_id,
      amount = %payment.amount,
      ?method,
      "payment created"
    );
    Ok(payment)
  }

  pub async fn get_payment(&self, payment_id: Uuid) -> Result<Payment> {
    self.load_current(payment_id).await
  }

  pub async fn get_payment_by_transaction(&self, transaction_id: &str) -> Result<Payment> {
    let payment_id = {
      let mut uow = self.store.begin().await?;
      uow
        .payment_by_transaction(transaction_id.trim())
        .await?
        .ok_or_else(|| AppError::not_found("Payment", transaction_id.trim()))?
        .id
    };
    self.load_current(payment_id).await
  }

  /// Payments of an order, oldest first, with lazy expiry applied.
  pub async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>> {
    let now = self.clock.now();
    let mut uow = self.store.begin().await?;
    if uow.order(order_id).await?.is_none() {
      return Err(AppError::not_found("Order", order_id));
    }
    let mut payments = uow.payments_for_order(order_id).await?;
    let mut expired_any = false;
    for payment in payments.iter_mut() {
      expired_any |= self.expire_if_due(uow.as_mut(), payment, now).await?;
    }
    if expired_any {
      uow.commit().await?;
    }
    Ok(payments)
  }

  /// Reports the payment status, failing it first if its window has closed. Never marks it paid.
  #[instrument(name = "PaymentOrchestrator::verify_payment", skip(self), err(Display))]
  pub async fn verify_payment(&self, payment_id: Uuid) -> Result<PaymentStatus> {
    let payment = self.load_current(payment_id).await?;
    debug!(payment_id = %payment.id, status = %payment.status, "payment verified");
    Ok(payment.status)
  }

  /// Settles a pending payment and confirms its order in one unit of work.
  /// A payment past its deadline is failed (and that is committed) instead.
  #[instrument(name = "PaymentOrchestrator::mark_as_paid", skip(self), err(Display))]
  pub async fn mark_as_paid(&self, payment_id: Uuid) -> Result<Payment> {
    let now = self.clock.now();
    let mut uow = self.store.begin().await?;
    let mut payment = uow
      .payment(payment_id)
      .await?
      .ok_or_else(|| AppError::not_found("Payment", payment_id))?;
    if self.expire_if_due(uow.as_mut(), &mut payment, now).await? {
      uow.commit().await?;
      return Err(AppError::BusinessRule(format!(
        "Payment {} expired and cannot be marked paid",
        payment.transaction_id
      )));
    }
    match payment.status {
      PaymentStatus::Pending => {}
      PaymentStatus::Paid => {
        return Err(AppError::Conflict(format!(
          "Payment {} is already paid",
          payment.transaction_id
        )))
      }
      PaymentStatus::Failed | PaymentStatus::Refunded => {
        return Err(AppError::BusinessRule(format!(
          "Payment {} is {} and cannot be marked paid",
          payment.transaction_id, payment.status
        )))
      }
    }

    payment.status = PaymentStatus::Paid;
    payment.paid_at = Some(now);
    payment.updated_at = now;
    uow.update_payment(&mut payment).await?;

    let mut order = uow
      .order(payment.order_id)
      .await?
      .ok_or_else(|| AppError::not_found("Order", payment.order_id))?;
    order.payment_status = PaymentStatus::Paid;
    if order.status == OrderStatus::Pending {
      order.status = OrderStatus::Confirmed;
    }
    order.updated_at = now;
    uow.update_order(&mut order).await?;
    uow.commit().await?;

    info!(payment_id = %payment.id, order_id = %order.id, order_status = %order.status, "payment marked paid");
    Ok(payment)
  }

  /// Fails a pending payment. Cancelling an already failed payment is a no-op.
  #[instrument(name = "PaymentOrchestrator::cancel_payment", skip(self), err(Display))]
  pub async fn cancel_payment(&self, payment_id: Uuid) -> Result<Payment> {
    let now = self.clock.now();
    let mut uow = self.store.begin().await?;
    let mut payment = uow
      .payment(payment_id)
      .await?
      .ok_or_else(|| AppError::not_found("Payment", payment_id))?;
    match payment.status {
      PaymentStatus::Failed => return Ok(payment),
      PaymentStatus::Paid => {
        return Err(AppError::Conflict(format!(
          "Payment {} is already paid",
          payment.transaction_id
        )))
      }
      PaymentStatus::Refunded => {
        return Err(AppError::BusinessRule(format!(
          "Payment {} was refunded",
          payment.transaction_id
        )))
      }
      PaymentStatus::Pending => {}
    }
    payment.status = PaymentStatus::Failed;
    payment.updated_at = now;
    uow.update_payment(&mut payment).await?;
    uow.commit().await?;
    info!(payment_id = %payment.id, "payment cancelled");
    Ok(payment)
  }

  // --- Bank transfer configs ---

  pub async fn list_bank_configs(&self, include_inactive: bool) -> Result<Vec<BankTransferConfig>> {
    if !include_inactive {
      if let Some(cached) = self.cache.get::<Vec<BankTransferConfig>>(ACTIVE_BANKS_KEY) {
        return Ok(cached);
      }
    }
    let mut uow = self.store.begin().await?;
    let configs = uow.bank_configs(include_inactive).await?;
    if !include_inactive {
      self.cache.set(ACTIVE_BANKS_KEY, configs.clone());
    }
    Ok(configs)
  }

  pub async fn get_bank_config(&self, id: Uuid) -> Result<BankTransferConfig> {
    let mut uow = self.store.begin().await?;
    uow.bank_config(id).await?.ok_or_else(|| AppError::not_found("Bank config", id))
  }

  #[instrument(name = "PaymentOrchestrator::create_bank_config", skip(self, input), fields(bank_code = %input.bank_code), err(Display))]
  pub async fn create_bank_config(&self, input: NewBankConfig) -> Result<BankTransferConfig> {
    let bank_code = input.bank_code.trim().to_uppercase();
    let account_number = input.account_number.trim().to_string();
    validate_bank_fields(&bank_code, &input.bank_name, &account_number, &input.account_name)?;

    let now = self.clock.now();
    let mut uow = self.store.begin().await?;
    let existing = uow.bank_configs(true).await?;
    if existing.iter().any(|b| b.bank_code.eq_ignore_ascii_case(&bank_code)) {
      return Err(AppError::Conflict(format!("Bank code '{}' is already configured", bank_code)));
    }
    if existing.iter().any(|b| b.account_number == account_number) {
      return Err(AppError::Conflict(format!(
        "Account number '{}' is already configured",
        account_number
      )));
    }

    let config = BankTransferConfig {
      id: Uuid::new_v4(),
      bank_code,
      bank_name: input.bank_name.trim().to_string(),
      account_number,
      account_name: input.account_name.trim().to_string(),
      is_active: input.is_active,
      display_order: input.display_order,
      is_deleted: false,
      version: 0,
      created_at: now,
      updated_at: now,
    };
    uow.add_bank_config(&config).await?;
    uow.commit().await?;
    self.cache.remove(ACTIVE_BANKS_KEY);
    info!(bank_config_id = %config.id, bank_code = %config.bank_code, "bank config created");
    Ok(config)
  }

  #[instrument(name = "PaymentOrchestrator::update_bank_config", skip(self, update), err(Display))]
  pub async fn update_bank_config(&self, id: Uuid, update: BankConfigUpdate) -> Result<BankTransferConfig> {
    let mut uow = self.store.begin().await?;
    let mut config = uow.bank_config(id).await?.ok_or_else(|| AppError::not_found("Bank config", id))?;

    if let Some(name) = update.bank_name {
      config.bank_name = name.trim().to_string();
    }
    if let Some(account_number) = update.account_number {
      let account_number = account_number.trim().to_string();
      if account_number != config.account_number {
        let taken = uow
          .bank_configs(true)
          .await?
          .iter()
          .any(|b| b.id != id && b.account_number == account_number);
        if taken {
          return Err(AppError::Conflict(format!(
            "Account number '{}' is already configured",
            account_number
          )));
        }
        config.account_number = account_number;
      }
    }
    if let Some(account_name) = update.account_name {
      config.account_name = account_name.trim().to_string();
    }
    if let Some(active) = update.is_active {
      config.is_active = active;
    }
    if let Some(order) = update.display_order {
      config.display_order = order;
    }
    validate_bank_fields(&config.bank_code, &config.bank_name, &config.account_number, &config.account_name)?;

    config.updated_at = self.clock.now();
    uow.update_bank_config(&mut config).await?;
    uow.commit().await?;
    self.cache.remove(ACTIVE_BANKS_KEY);
    info!(bank_config_id = %id, "bank config updated");
    Ok(config)
  }

  #[instrument(name = "PaymentOrchestrator::delete_bank_config", skip(self), err(Display))]
  pub async fn delete_bank_config(&self, id: Uuid) -> Result<()> {
    let mut uow = self.store.begin().await?;
    let mut config = uow.bank_config(id).await?.ok_or_else(|| AppError::not_found("Bank config", id))?;
    config.updated_at = self.clock.now();
    uow.soft_delete_bank_config(&mut config).await?;
    uow.commit().await?;
    self.cache.remove(ACTIVE_BANKS_KEY);
    info!(bank_config_id = %id, "bank config deleted");
    Ok(())
  }
}

/// `{orderNumber}-{unix seconds}`, with a numeric suffix if that id is taken.
async fn next_transaction_id(uow: &mut dyn UnitOfWork, order_number: &str, now: DateTime<Utc>) -> Result<String> {
  let base = format!("{}-{}", order_number, now.timestamp());
  if uow.payment_by_transaction(&base).await?.is_none() {
    return Ok(base);
  }
  for suffix in 2..=TRANSACTION_ID_ATTEMPTS {
    let candidate = format!("{}-{}", base, suffix);
    if uow.payment_by_transaction(&candidate).await?.is_none() {
      return Ok(candidate);
    }
  }
  warn!(order_number, "transaction id space exhausted for this second");
  Err(AppError::Conflict(format!(
    "Could not allocate a transaction id for order {}",
    order_number
  )))
}

fn validate_bank_fields(bank_code: &str, bank_name: &str, account_number: &str, account_name: &str) -> Result<()> {
  let mut problems = Vec::new();
  if bank_bin(bank_code).is_none() {
    problems.push(format!("unsupported bank code '{}'", bank_code));
  }
  if bank_name.trim().is_empty() {
    problems.push("bank name is required".to_string());
  }
  if account_number.is_empty() || !account_number.chars().all(|c| c.is_ascii_digit()) {
    problems.push("account number must be digits only".to_string());
  }
  if account_name.trim().is_empty() {
    problems.push("account name is required".to_string());
  }
  if problems.is_empty() {
    Ok(())
  } else {
    Err(AppError::Validation(problems.join("; ")))
  }
}
