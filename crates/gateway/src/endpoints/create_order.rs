//! # POST /create-razorpay-order

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use drivepay_types::{CreateOrderRequest, OrderOptions, ORDER_FIELDS_REQUIRED};

use super::non_empty;
use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /create-razorpay-order — 注文作成。
///
/// 固定通貨・即時キャプチャで注文を作成し、ゲートウェイの注文オブジェクトをそのまま返す。
/// 冪等キーは付与しないため、同じorderIdで再送すると別の注文になり得る。
pub async fn handle_create_order(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let request = payload.map(|Json(body)| body).unwrap_or_else(|rejection| {
        tracing::debug!(error = %rejection, "create-razorpay-orderのボディを解釈できません");
        CreateOrderRequest::default()
    });

    // amount 0 も未指定扱い
    let (Some(order_id), Some(amount)) = (
        non_empty(request.order_id),
        request.amount.filter(|amount| *amount > 0),
    ) else {
        return Err(GatewayError::BadRequest(ORDER_FIELDS_REQUIRED.to_string()));
    };

    let payment = state.payment.as_deref().ok_or_else(|| {
        GatewayError::Internal(
            "RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET are not configured".to_string(),
        )
    })?;

    let options = OrderOptions::immediate_capture(amount, &state.currency, &order_id);
    let order = payment
        .create_order(&options)
        .await
        .inspect_err(|e| tracing::error!(error = %e, receipt = %order_id, "Razorpay注文の作成に失敗"))?;

    Ok(Json(order))
}
