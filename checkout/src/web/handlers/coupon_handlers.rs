// gok_checkout/src/web/handlers/coupon_handlers.rs

use crate::models::{Coupon, CouponUsage, NewCoupon};
use crate::services::coupon_engine::{CouponApplication, CouponValidation};
use crate::state::AppState;
use crate::store::{CouponQuery, Page};
use crate::web::ApiResponse;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

/// Body shared by validate and apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponCheckRequest {
  pub code: String,
  pub order_amount: Decimal,
  #[serde(default)]
  pub user_id: Option<Uuid>,
  #[serde(default)]
  pub session_id: Option<String>,
}

#[instrument(name = "handler::validate_coupon", skip_all, fields(code = %req.code))]
pub async fn validate_coupon(state: &AppState, req: CouponCheckRequest) -> ApiResponse<CouponValidation> {
  match state
    .coupons
    .validate(&req.code, req.order_amount, req.user_id, req.session_id.as_deref())
    .await
  {
    Ok(validation) if validation.is_valid => ApiResponse::ok(validation, "Coupon is valid"),
    Ok(validation) => {
      let reason = validation.reason.clone().unwrap_or_default();
      ApiResponse {
        success: false,
        message: "Coupon is not valid".to_string(),
        data: Some(validation),
        errors: vec![reason],
      }
    }
    Err(err) => err.into(),
  }
}

#[instrument(name = "handler::apply_coupon", skip_all, fields(code = %req.code))]
pub async fn apply_coupon(state: &AppState, req: CouponCheckRequest) -> ApiResponse<CouponApplication> {
  match state
    .coupons
    .apply(&req.code, req.order_amount, req.user_id, req.session_id.as_deref())
    .await
  {
    Ok(application) if application.success => {
      let notice = application.notice.clone();
      ApiResponse::ok(application, notice)
    }
    Ok(application) => {
      let notice = application.notice.clone();
      ApiResponse {
        success: false,
        message: "Coupon could not be applied".to_string(),
        data: Some(application),
        errors: vec![notice],
      }
    }
    Err(err) => err.into(),
  }
}

#[instrument(name = "handler::create_coupon", skip_all, fields(code = %req.code))]
pub async fn create_coupon(state: &AppState, req: NewCoupon) -> ApiResponse<Coupon> {
  ApiResponse::from_result(state.coupons.create_coupon(req).await, "Coupon created")
}

pub async fn get_coupon(state: &AppState, coupon_id: Uuid) -> ApiResponse<Coupon> {
  ApiResponse::from_result(state.coupons.get_coupon(coupon_id).await, "Coupon found")
}

pub async fn get_coupon_by_code(state: &AppState, code: &str) -> ApiResponse<Coupon> {
  ApiResponse::from_result(state.coupons.get_coupon_by_code(code).await, "Coupon found")
}

pub async fn list_coupons(state: &AppState, query: CouponQuery) -> ApiResponse<Page<Coupon>> {
  ApiResponse::from_result(state.coupons.list_coupons(&query).await, "Coupons listed")
}

pub async fn deactivate_coupon(state: &AppState, coupon_id: Uuid) -> ApiResponse<Coupon> {
  ApiResponse::from_result(state.coupons.deactivate_coupon(coupon_id).await, "Coupon deactivated")
}

pub async fn delete_coupon(state: &AppState, coupon_id: Uuid) -> ApiResponse<()> {
  ApiResponse::from_result(state.coupons.delete_coupon(coupon_id).await, "Coupon deleted")
}

pub async fn coupon_usages(state: &AppState, coupon_id: Uuid) -> ApiResponse<Vec<CouponUsage>> {
  ApiResponse::from_result(state.coupons.usage_history(coupon_id).await, "Coupon usage listed")
}
