//! # POST /grant-access

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use drivepay_types::{GrantAccessRequest, GrantAccessResponse, GRANT_ACCESS_FIELDS_REQUIRED};

use super::non_empty;
use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /grant-access — 閲覧権限付与。
///
/// `fileId` と `email` が揃っていなければストレージを呼ばずに400を返す。
/// ファイルの存在やメールアドレスの形式はプロバイダ側の検証に任せる。
pub async fn handle_grant_access(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<GrantAccessRequest>, JsonRejection>,
) -> Result<Json<GrantAccessResponse>, GatewayError> {
    let request = payload.map(|Json(body)| body).unwrap_or_else(|rejection| {
        tracing::debug!(error = %rejection, "grant-accessのボディを解釈できません");
        GrantAccessRequest::default()
    });

    let (Some(file_id), Some(email)) = (non_empty(request.file_id), non_empty(request.email))
    else {
        return Err(GatewayError::BadRequest(
            GRANT_ACCESS_FIELDS_REQUIRED.to_string(),
        ));
    };

    state
        .storage
        .grant_read_access(&file_id, &email)
        .await
        .inspect_err(|e| tracing::error!(error = %e, file_id = %file_id, "閲覧権限の付与に失敗"))?;

    Ok(Json(GrantAccessResponse::granted(&email)))
}
