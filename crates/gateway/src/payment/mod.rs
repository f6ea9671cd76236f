//! # 決済ゲートウェイ
//!
//! 注文作成の抽象インターフェース。Razorpay実装は `razorpay` サブモジュールを参照。

pub mod razorpay;

pub use razorpay::RazorpayClient;

use drivepay_types::OrderOptions;

use crate::error::GatewayError;

/// 決済ゲートウェイの抽象インターフェース。
///
/// 冪等キーは送信しない。同じreceiptで二度呼べば二件の注文が作られ得る。
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// 注文を作成し、ゲートウェイが返した注文オブジェクトをそのまま返す。
    async fn create_order(&self, options: &OrderOptions)
        -> Result<serde_json::Value, GatewayError>;
}
