//! # ルーティング
//!
//! エンドポイント・CORS・ボディ上限・リクエストトレースを組み立てる。

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatewayState;
use crate::endpoints::{handle_create_order, handle_grant_access, handle_health, handle_upload};

/// 全エンドポイントを含むRouterを構築する。
pub fn build_router(state: Arc<GatewayState>) -> Router {
    // 任意のオリジンからのリクエストを許可
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route("/grant-access", post(handle_grant_access))
        .route("/create-razorpay-order", post(handle_create_order))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
