// gok_checkout/src/web/handlers/order_handlers.rs

use crate::models::{CustomerInfo, Order, PaymentMethod};
use crate::services::order_assembler::OrderLine;
use crate::state::AppState;
use crate::store::{OrderQuery, Page};
use crate::web::ApiResponse;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
  pub customer: CustomerInfo,
  pub items: Vec<OrderLine>,
  pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
  pub status: String,
}

#[instrument(name = "handler::create_order", skip_all)]
pub async fn create_order(state: &AppState, req: CreateOrderRequest) -> ApiResponse<Order> {
  let result = state.orders.create_order(req.customer, &req.items, req.payment_method).await;
  ApiResponse::from_result(result, "Order created")
}

pub async fn get_order(state: &AppState, order_id: Uuid) -> ApiResponse<Order> {
  ApiResponse::from_result(state.orders.get_order(order_id).await, "Order found")
}

pub async fn get_order_by_number(state: &AppState, order_number: &str) -> ApiResponse<Order> {
  ApiResponse::from_result(state.orders.get_order_by_number(order_number).await, "Order found")
}

pub async fn list_orders(state: &AppState, query: OrderQuery) -> ApiResponse<Page<Order>> {
  ApiResponse::from_result(state.orders.list_orders(&query).await, "Orders listed")
}

#[instrument(name = "handler::update_order_status", skip(state, req), fields(status = %req.status))]
pub async fn update_order_status(state: &AppState, order_id: Uuid, req: UpdateStatusRequest) -> ApiResponse<Order> {
  ApiResponse::from_result(
    state.orders.update_status(order_id, &req.status).await,
    "Order status updated",
  )
}

#[instrument(name = "handler::cancel_order", skip(state))]
pub async fn cancel_order(state: &AppState, order_id: Uuid) -> ApiResponse<Order> {
  ApiResponse::from_result(state.orders.cancel_order(order_id).await, "Order cancelled")
}
