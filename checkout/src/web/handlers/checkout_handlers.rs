// gok_checkout/src/web/handlers/checkout_handlers.rs

use crate::pipelines::checkout_pipeline::run_checkout;
use crate::pipelines::contexts::{CheckoutRequest, CheckoutSummary};
use crate::state::AppState;
use crate::web::ApiResponse;
use tracing::{info, instrument};

#[instrument(
  name = "handler::checkout",
  skip_all,
  fields(user_id = ?req.customer.user_id, coupon = ?req.coupon_code)
)]
pub async fn checkout(state: &AppState, req: CheckoutRequest) -> ApiResponse<CheckoutSummary> {
  info!("Checkout attempt with {} line(s)", req.items.len());
  ApiResponse::from_result(run_checkout(state, req).await, "Checkout completed")
}
