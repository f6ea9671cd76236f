//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//! 設定は起動時に一度だけ読み込まれ、以後は変更されない。

use std::path::PathBuf;

use anyhow::Context;

use crate::payment::PaymentGateway;
use crate::storage::DriveStorage;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_CURRENCY: &str = "INR";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Razorpay APIキー
#[derive(Debug, Clone)]
pub struct RazorpayCredentials {
    pub key_id: String,
    pub key_secret: String,
}

/// 環境変数から読み込むGateway設定。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
    /// アップロード先フォルダ。未設定の場合 `/upload` は500を返す
    pub drive_folder_id: Option<String>,
    /// 未設定の場合 `/create-razorpay-order` は500を返す
    pub razorpay: Option<RazorpayCredentials>,
    /// Razorpay APIの接続先（未設定なら本番API）
    pub razorpay_api_base: Option<String>,
    pub currency: String,
    pub staging_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl GatewayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から構築する。空文字列は未設定として扱う。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let razorpay = match (var("RAZORPAY_KEY_ID"), var("RAZORPAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(RazorpayCredentials { key_id, key_secret }),
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "RAZORPAY_KEY_IDとRAZORPAY_KEY_SECRETの片方のみ設定されています。注文作成は無効になります"
                );
                None
            }
        };

        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAX_UPLOAD_BYTESが不正です: {raw}"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            bind_addr: var("GATEWAY_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            drive_folder_id: var("GOOGLE_DRIVE_FOLDER_ID"),
            razorpay,
            razorpay_api_base: var("RAZORPAY_API_BASE"),
            currency: var("RAZORPAY_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            staging_dir: var("UPLOAD_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            max_upload_bytes,
        })
    }
}

/// Gatewayの共有状態。
///
/// 起動時に構築したクライアントを全リクエストで読み取り専用に共有する。
pub struct GatewayState {
    /// ファイルストレージ（Google Drive等、トレイトで抽象化）
    pub storage: Box<dyn DriveStorage>,
    /// 決済ゲートウェイ（未設定ならNone）
    pub payment: Option<Box<dyn PaymentGateway>>,
    /// アップロード先フォルダID
    pub drive_folder_id: Option<String>,
    /// 注文の通貨
    pub currency: String,
    /// アップロードの一時保存先
    pub staging_dir: PathBuf,
    /// `/upload` のボディ上限（バイト）
    pub max_upload_bytes: usize,
}
