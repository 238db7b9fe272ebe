// gok_checkout/src/web/handlers/payment_handlers.rs

use crate::models::{BankConfigUpdate, BankTransferConfig, NewBankConfig, Payment, PaymentMethod, PaymentStatus};
use crate::state::AppState;
use crate::web::ApiResponse;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
  pub order_id: Uuid,
  pub payment_method: PaymentMethod,
  #[serde(default)]
  pub bank_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
  pub payment_id: Uuid,
  pub status: PaymentStatus,
}

#[instrument(name = "handler::create_payment", skip(state))]
pub async fn create_payment(state: &AppState, req: CreatePaymentRequest) -> ApiResponse<Payment> {
  let result = state
    .payments
    .create_payment(req.order_id, req.payment_method, req.bank_code.as_deref())
    .await;
  ApiResponse::from_result(result, "Payment created")
}

pub async fn get_payment(state: &AppState, payment_id: Uuid) -> ApiResponse<Payment> {
  ApiResponse::from_result(state.payments.get_payment(payment_id).await, "Payment found")
}

pub async fn get_payment_by_transaction(state: &AppState, transaction_id: &str) -> ApiResponse<Payment> {
  ApiResponse::from_result(
    state.payments.get_payment_by_transaction(transaction_id).await,
    "Payment found",
  )
}

pub async fn order_payments(state: &AppState, order_id: Uuid) -> ApiResponse<Vec<Payment>> {
  ApiResponse::from_result(state.payments.payments_for_order(order_id).await, "Payments listed")
}

#[instrument(name = "handler::verify_payment", skip(state))]
pub async fn verify_payment(state: &AppState, payment_id: Uuid) -> ApiResponse<PaymentStatusView> {
  let result = state
    .payments
    .verify_payment(payment_id)
    .await
    .map(|status| PaymentStatusView { payment_id, status });
  ApiResponse::from_result(result, "Payment verified")
}

#[instrument(name = "handler::mark_as_paid", skip(state))]
pub async fn mark_as_paid(state: &AppState, payment_id: Uuid) -> ApiResponse<Payment> {
  ApiResponse::from_result(state.payments.mark_as_paid(payment_id).await, "Payment marked as paid")
}

#[instrument(name = "handler::cancel_payment", skip(state))]
pub async fn cancel_payment(state: &AppState, payment_id: Uuid) -> ApiResponse<Payment> {
  ApiResponse::from_result(state.payments.cancel_payment(payment_id).await, "Payment cancelled")
}

// --- Bank transfer configs ---

pub async fn list_bank_configs(state: &AppState, include_inactive: bool) -> ApiResponse<Vec<BankTransferConfig>> {
  ApiResponse::from_result(
    state.payments.list_bank_configs(include_inactive).await,
    "Bank configs listed",
  )
}

pub async fn get_bank_config(state: &AppState, id: Uuid) -> ApiResponse<BankTransferConfig> {
  ApiResponse::from_result(state.payments.get_bank_config(id).await, "Bank config found")
}

pub async fn create_bank_config(state: &AppState, req: NewBankConfig) -> ApiResponse<BankTransferConfig> {
  ApiResponse::from_result(state.payments.create_bank_config(req).await, "Bank config created")
}

pub async fn update_bank_config(state: &AppState, id: Uuid, req: BankConfigUpdate) -> ApiResponse<BankTransferConfig> {
  ApiResponse::from_result(state.payments.update_bank_config(id, req).await, "Bank config updated")
}

pub async fn delete_bank_config(state: &AppState, id: Uuid) -> ApiResponse<()> {
  ApiResponse::from_result(state.payments.delete_bank_config(id).await, "Bank config deleted")
}
