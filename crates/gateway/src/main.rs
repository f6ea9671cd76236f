//! # Drivepay Gateway
//!
//! Google Driveへのアップロード・閲覧権限付与とRazorpay注文作成を中継するHTTP Gateway。
//!
//! ## API エンドポイント
//! - `POST /upload` — multipartファイルをGoogle Driveへ保存
//! - `POST /grant-access` — ファイルに読み取り権限を付与
//! - `POST /create-razorpay-order` — Razorpay注文を作成
//! - `GET /health` — 死活監視
//!
//! ## 起動時の前提
//! `GOOGLE_SERVICE_ACCOUNT_JSON` が無い・不正な場合は起動しない。

mod config;
mod credentials;
mod endpoints;
mod error;
mod payment;
mod routes;
mod staging;
mod storage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{GatewayConfig, GatewayState};
use crate::credentials::ServiceAccountKey;
use crate::payment::{PaymentGateway, RazorpayClient};
use crate::storage::{DriveEndpoints, GoogleDriveStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // サービスアカウント認証情報（必須）
    let credentials = ServiceAccountKey::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "サービスアカウント認証情報の読み込みに失敗");
    })?;
    tracing::info!(
        client_email = %credentials.client_email,
        "サービスアカウント認証情報を読み込みました"
    );

    let config = GatewayConfig::from_env()?;
    let http_client = reqwest::Client::new();

    let storage =
        GoogleDriveStorage::new(http_client.clone(), credentials, DriveEndpoints::default())?;

    if config.drive_folder_id.is_none() {
        tracing::warn!("GOOGLE_DRIVE_FOLDER_IDが未設定です。/uploadは失敗します");
    }

    let payment = config.razorpay.clone().map(|keys| {
        let client = RazorpayClient::new(http_client.clone(), keys.key_id, keys.key_secret);
        let client = match config.razorpay_api_base.as_deref() {
            Some(base) => client.with_base_url(base),
            None => client,
        };
        Box::new(client) as Box<dyn PaymentGateway>
    });
    if payment.is_none() {
        tracing::warn!("Razorpayのキーが未設定です。/create-razorpay-orderは失敗します");
    }

    tokio::fs::create_dir_all(&config.staging_dir).await?;

    let state = Arc::new(GatewayState {
        storage: Box::new(storage),
        payment,
        drive_folder_id: config.drive_folder_id.clone(),
        currency: config.currency.clone(),
        staging_dir: config.staging_dir.clone(),
        max_upload_bytes: config.max_upload_bytes,
    });

    let app = routes::build_router(state);

    tracing::info!(
        staging_dir = %config.staging_dir.display(),
        currency = %config.currency,
        "Gatewayを {} で起動します",
        config.bind_addr
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
