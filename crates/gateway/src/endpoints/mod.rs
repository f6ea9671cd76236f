//! # Gatewayエンドポイント
//!
//! - `POST /upload` — Google Driveへのファイルアップロード
//! - `POST /grant-access` — ファイルへの閲覧権限付与
//! - `POST /create-razorpay-order` — Razorpay注文作成
//! - `GET /health` — 死活監視

pub mod create_order;
pub mod grant_access;
pub mod health;
pub mod upload;


pub use create_order::handle_create_order;
pub use grant_access::handle_grant_access;
pub use health::handle_health;
pub use upload::handle_upload;

/// 空文字列を未指定として扱う。
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
