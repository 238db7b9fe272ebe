// gok_checkout/src/pipelines/checkout_pipeline.rs
use crate::errors::{AppError, Result};
use crate::models::{CouponUsage, Order, PaymentMethod};
use crate::pipelines::contexts::{CheckoutCtxData, CheckoutRequest, CheckoutSummary};
use crate::services::coupon_engine::Redeemer;
use crate::services::order_assembler::{merge_lines, OrderDiscount};
use crate::services::qr::bank_bin;
use crate::state::AppState;
use gok_flow::{ContextData, Flows, Pipeline, PipelineControl, SkipCondition};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

const MAX_PLACE_ATTEMPTS: usize = 3;

pub fn register_checkout_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let no_coupon: SkipCondition<CheckoutCtxData> =
    Arc::new(|ctx: ContextData<CheckoutCtxData>| ctx.with(|d| d.coupon_code().is_none()));

  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(&[
    ("validate_checkout_request", false, None),
    ("quote_coupon", true, Some(no_coupon)),
    ("place_order", false, None),
    ("open_payment", false, None),
    ("summarize_checkout", true, None),
  ]);

  // Step 1: reject malformed input before touching the store
  p.on_step("validate_checkout_request", |ctx: ContextData<CheckoutCtxData>| async move {
    let request = ctx.with(|d| d.request.clone());
    request.customer.validate()?;
    merge_lines(&request.items)?;
    if request.payment_method == PaymentMethod::BankTransfer {
      if let Some(code) = request.bank_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        if bank_bin(code).is_none() {
          return Err(AppError::Validation(format!("Unsupported bank code '{}'", code)));
        }
      }
    }
    debug!(lines = request.items.len(), method = ?request.payment_method, "checkout request accepted");
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  // Step 2: price the cart read-only and make sure the coupon applies to it
  p.on_step("quote_coupon", |ctx: ContextData<CheckoutCtxData>| async move {
    let (state, request, code) = ctx.with(|d| {
      (
        d.app_state.clone(),
        d.request.clone(),
        d.coupon_code().map(str::to_string),
      )
    });
    let Some(code) = code else {
      return Ok::<_, AppError>(PipelineControl::Continue);
    };

    let cart = state.orders.quote_cart(&request.items).await?;
    match state.coupons.quote(&code, cart.gross_total(), request.customer.user_id).await? {
      Ok(quote) => {
        info!(coupon = %quote.coupon.code, gross = %quote.order_amount, discount = %quote.discount, "coupon quoted");
        ctx.update(|d| d.coupon_quote = Some(quote));
        Ok(PipelineControl::Continue)
      }
      Err(rejection) => {
        info!(coupon = %code, reason = %rejection, "checkout coupon rejected");
        Err(AppError::BusinessRule(format!("Coupon {}: {}", code, rejection)))
      }
    }
  });

  // Step 3: stock, order and coupon redemption commit together
  p.on_step("place_order", |ctx: ContextData<CheckoutCtxData>| async move {
    let (state, request, code, quoted) = ctx.with(|d| {
      (
        d.app_state.clone(),
        d.request.clone(),
        d.coupon_code().map(str::to_string),
        d.coupon_quote.as_ref().map(|q| q.discount),
      )
    });

    let mut attempt = 1;
    let (order, usage) = loop {
      match place_once(&state, &request, code.as_deref()).await {
        Ok(placed) => break placed,
        Err(AppError::Conflict(reason)) if attempt < MAX_PLACE_ATTEMPTS => {
          warn!(attempt, %reason, "stock or coupon changed while placing the order, retrying");
          attempt += 1;
        }
        Err(err) => return Err(err),
      }
    };

    if let Some(quoted) = quoted.filter(|q| *q != order.discount_amount) {
      warn!(%quoted, placed = %order.discount_amount, "coupon discount changed between quote and placement");
    }
    info!(
      order_id = %order.id,
      order_number = %order.order_number,
      total = %order.total_amount,
      discount = %order.discount_amount,
      "checkout order placed"
    );
    ctx.update(|d| {
      d.order = Some(order);
      d.coupon_usage = usage;
    });
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  // Step 4: payment commits on its own; a failure here leaves the order pending
  p.on_step("open_payment", |ctx: ContextData<CheckoutCtxData>| async move {
    let (state, order_id, method, bank_code) = ctx.with(|d| {
      (
        d.app_state.clone(),
        d.order.as_ref().map(|o| o.id),
        d.request.payment_method,
        d.request.bank_code.clone(),
      )
    });
    let order_id =
      order_id.ok_or_else(|| AppError::Internal("open_payment ran before an order was placed".to_string()))?;

    let payment = state
      .payments
      .create_payment(order_id, method, bank_code.as_deref())
      .await
      .map_err(|err| {
        error!(%order_id, error = %err, "payment could not be opened; order stays pending");
        err
      })?;
    ctx.update(|d| d.payment = Some(payment));
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  // Step 5: flatten what the caller needs
  p.on_step("summarize_checkout", |ctx: ContextData<CheckoutCtxData>| async move {
    ctx.update(|d| {
      if let (Some(order), Some(payment)) = (&d.order, &d.payment) {
        d.summary = Some(CheckoutSummary::new(order, payment, d.coupon_usage.as_ref()));
      }
    });
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.after_step("summarize_checkout", |ctx: ContextData<CheckoutCtxData>| async move {
    ctx.with(|d| {
      if let Some(summary) = &d.summary {
        info!(
          order_number = %summary.order_number,
          transaction_id = %summary.transaction_id,
          amount = %summary.total_amount,
          "checkout complete"
        );
      }
    });
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  flows.register_pipeline(p);
}

/// One attempt at pricing, discounting, reserving and redeeming in a single unit of work.
async fn place_once(
  state: &AppState,
  request: &CheckoutRequest,
  coupon_code: Option<&str>,
) -> Result<(Order, Option<CouponUsage>)> {
  let mut uow = state.store.begin().await?;
  let cart = state.orders.price_cart(uow.as_mut(), &request.items).await?;
  let gross = cart.gross_total();
  let user_id = request.customer.user_id;

  let quote = match coupon_code {
    Some(code) => Some(
      state
        .coupons
        .quote_in(uow.as_mut(), code, gross, user_id)
        .await?
        .map_err(|rejection| AppError::BusinessRule(format!("Coupon {}: {}", code, rejection)))?,
    ),
    None => None,
  };
  let discount = quote.as_ref().map(|q| OrderDiscount {
    coupon_code: q.coupon.code.clone(),
    amount: q.discount,
  });

  let order = state
    .orders
    .place_order(uow.as_mut(), cart, request.customer.clone(), request.payment_method, discount)
    .await?;

  let usage = match quote {
    Some(quote) => {
      let redeemer = Redeemer {
        order_id: Some(order.id),
        user_id,
        session_id: request.session_id.clone(),
      };
      Some(state.coupons.redeem(uow.as_mut(), quote.coupon, gross, &redeemer).await?.usage)
    }
    None => None,
  };

  uow.commit().await?;
  Ok((order, usage))
}

/// Runs the checkout pipeline for `request` and returns its summary.
#[instrument(name = "checkout", skip_all, fields(lines = request.items.len()), err(Display))]
pub async fn run_checkout(state: &AppState, request: CheckoutRequest) -> Result<CheckoutSummary> {
  let ctx = ContextData::new(CheckoutCtxData::new(state.clone(), request));
  let outcome = state.flows.run(ctx.clone()).await?;
  if !outcome.is_completed() {
    return Err(AppError::Internal("Checkout pipeline stopped before completion".to_string()));
  }

  ctx.with(|d| match (&d.summary, &d.order, &d.payment) {
    (Some(summary), _, _) => Ok(summary.clone()),
    (None, Some(order), Some(payment)) => Ok(CheckoutSummary::new(order, payment, d.coupon_usage.as_ref())),
    _ => Err(AppError::Internal("Checkout finished without an order and payment".to_string())),
  })
}
