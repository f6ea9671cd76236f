//! # GET /health

use axum::Json;
use drivepay_types::HealthResponse;

/// GET /health — 死活監視。外部サービスには問い合わせない。
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
