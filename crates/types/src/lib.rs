//! # Drivepay 共有型定義
//!
//! Gatewayが受け付けるリクエストと返却するレスポンスのJSON構造を提供する。
//!
//! ## エンコーディング規則
//! - フィールド名: camelCase（既存クライアントとの互換性のため）
//! - 金額: 通貨の最小単位の整数（例: INRならパイサ）。数字のみの文字列も受け付ける

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// クライアントエラーメッセージ
// ---------------------------------------------------------------------------

/// `/upload` にファイルが含まれない場合のメッセージ
pub const NO_FILE_UPLOADED: &str = "No file uploaded.";

/// `/grant-access` の必須フィールド欠落時のメッセージ
pub const GRANT_ACCESS_FIELDS_REQUIRED: &str = "fileId and email are required";

/// `/create-razorpay-order` の必須フィールド欠落時のメッセージ
pub const ORDER_FIELDS_REQUIRED: &str = "orderId and amount are required";

// ---------------------------------------------------------------------------
// POST /upload
// ---------------------------------------------------------------------------

/// アップロード成功時のレスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// ストレージ上のファイルID
    pub id: String,
    /// 保存されたファイル名
    pub name: String,
    /// ブラウザで閲覧するためのリンク
    pub web_view_link: String,
}

// ---------------------------------------------------------------------------
// POST /grant-access
// ---------------------------------------------------------------------------

/// 閲覧権限付与リクエスト。
///
/// 欠落を400で報告するため、両フィールドともOptionで受ける。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantAccessRequest {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// 閲覧権限付与レスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantAccessResponse {
    pub success: bool,
    pub message: String,
}

impl GrantAccessResponse {
    /// 指定メールアドレスへの付与完了を表すレスポンスを構築する。
    pub fn granted(email: &str) -> Self {
        Self {
            success: true,
            message: format!("Access granted to {email}"),
        }
    }
}

// ---------------------------------------------------------------------------
// POST /create-razorpay-order
// ---------------------------------------------------------------------------

/// 注文作成リクエスト。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// 決済ゲートウェイにreceiptとして渡す注文ID
    #[serde(default)]
    pub order_id: Option<String>,
    /// 通貨の最小単位での金額
    #[serde(default, deserialize_with = "amount_from_json")]
    pub amount: Option<u64>,
}

/// 金額は整数または数字のみの文字列（`"10000"`）を受け付ける。
fn amount_from_json<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Integer(u64),
        Digits(String),
    }

    match Option::<RawAmount>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawAmount::Integer(amount)) => Ok(Some(amount)),
        Some(RawAmount::Digits(raw)) => {
            let digits = raw.trim();
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(serde::de::Error::custom(format!(
                    "amount must be an integer: {raw:?}"
                )));
            }
            digits.parse().map(Some).map_err(serde::de::Error::custom)
        }
    }
}

/// 決済ゲートウェイに送信する注文作成オプション。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOptions {
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
    /// 1 = 即時キャプチャ
    pub payment_capture: u8,
}

impl OrderOptions {
    /// 即時キャプチャの注文オプションを構築する。
    pub fn immediate_capture(amount: u64, currency: &str, receipt: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
            payment_capture: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// エラー / ヘルスチェック
// ---------------------------------------------------------------------------

/// 全エンドポイント共通のエラーレスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// `GET /health` のレスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
