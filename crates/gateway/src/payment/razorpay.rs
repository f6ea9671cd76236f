//! # Razorpay 決済ゲートウェイ実装
//!
//! Orders API (`POST /v1/orders`) をBasic認証で呼び出す。

use drivepay_types::OrderOptions;

use super::PaymentGateway;
use crate::error::GatewayError;

pub const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";

/// Razorpay APIクライアント。
pub struct RazorpayClient {
    http_client: reqwest::Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

impl RazorpayClient {
    pub fn new(http_client: reqwest::Client, key_id: String, key_secret: String) -> Self {
        Self {
            http_client,
            key_id,
            key_secret,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// 接続先を差し替える（テスト・サンドボックス用）。
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        options: &OrderOptions,
    ) -> Result<serde_json::Value, GatewayError> {
        let response = self
            .http_client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(options)
            .send()
            .await
            .map_err(|e| GatewayError::Payment(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Payment(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Payment(error_description(status, &body)));
        }

        let order: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            GatewayError::Payment(format!("failed to parse Razorpay response: {e}"))
        })?;

        tracing::info!(
            order_id = order.get("id").and_then(|v| v.as_str()).unwrap_or_default(),
            receipt = %options.receipt,
            amount = options.amount,
            "Razorpay注文を作成"
        );
        Ok(order)
    }
}

/// `{"error": {"code": ..., "description": ...}}` からdescriptionを取り出す。
fn error_description(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/description")
                .and_then(|d| d.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {status}: {body}"))
}
