//! # サービスアカウント認証情報
//!
//! 起動時に環境変数 `GOOGLE_SERVICE_ACCOUNT_JSON` からサービスアカウント鍵を読み込む。
//! 欠落・不正な場合は起動を中止する（部分的な稼働モードは持たない）。

use jsonwebtoken::EncodingKey;
use serde::Deserialize;

/// 認証情報を格納する環境変数名
pub const SERVICE_ACCOUNT_ENV: &str = "GOOGLE_SERVICE_ACCOUNT_JSON";

/// `token_uri` が省略された場合のOAuth2トークンエンドポイント
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// 認証情報の読み込みエラー。
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Missing GOOGLE_SERVICE_ACCOUNT_JSON environment variable.")]
    Missing,
    #[error("Failed to parse GOOGLE_SERVICE_ACCOUNT_JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid private_key in GOOGLE_SERVICE_ACCOUNT_JSON: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}

/// サービスアカウント鍵（Googleが発行するJSONのうち使用するフィールド）。
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// 環境変数から読み込む。
    pub fn from_env() -> Result<Self, CredentialError> {
        Self::parse(std::env::var(SERVICE_ACCOUNT_ENV).ok().as_deref())
    }

    /// 生の設定値をパースする。空文字列は未設定として扱う。
    pub fn parse(raw: Option<&str>) -> Result<Self, CredentialError> {
        let raw = raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(CredentialError::Missing)?;

        let key: ServiceAccountKey = serde_json::from_str(raw)?;
        // 最初のリクエストではなく起動時に鍵の不正を検出する
        key.encoding_key()?;
        Ok(key)
    }

    /// RS256署名用の鍵を構築する。
    pub fn encoding_key(&self) -> Result<EncodingKey, CredentialError> {
        Ok(EncodingKey::from_rsa_pem(self.private_key.as_bytes())?)
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}
