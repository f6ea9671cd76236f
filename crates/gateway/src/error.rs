//! # Gateway エラー型
//!
//! 全エンドポイントで共通のエラー型。
//! レスポンスは常に `{"error": <message>}` 形式で、外部サービスのメッセージはそのまま返す。

use axum::http::StatusCode;
use axum::Json;
use drivepay_types::ErrorBody;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 不正なリクエスト（必須フィールド欠落、multipartのパース失敗）
    #[error("{0}")]
    BadRequest(String),
    /// リクエストボディが上限を超過
    #[error("{0}")]
    PayloadTooLarge(String),
    /// ストレージ（Google Drive）操作に失敗
    #[error("{0}")]
    Storage(String),
    /// 決済ゲートウェイ（Razorpay）操作に失敗
    #[error("{0}")]
    Payment(String),
    /// 内部エラー（設定不足、ローカルI/O失敗）
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Storage(_) | GatewayError::Payment(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
