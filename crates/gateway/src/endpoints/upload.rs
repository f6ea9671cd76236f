//! # POST /upload
//!
//! multipartで受け取ったファイルを一時保存し、Google Driveへアップロードする。

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use drivepay_types::{UploadResponse, NO_FILE_UPLOADED};

use crate::config::GatewayState;
use crate::error::GatewayError;
use crate::staging::{multipart_error, StagedFile};
use crate::storage::{DriveUpload, StoredFile};

/// ファイル本体のフィールド名
const FILE_FIELD: &str = "file";
/// 保存名を上書きするフィールド名
const DESIRED_NAME_FIELD: &str = "desiredFileName";

/// POST /upload — ファイルアップロード。
///
/// `file`（必須）と `desiredFileName`（任意）を受け取り、設定されたフォルダに保存する。
/// 一時ファイルはストレージ呼び出しの成否にかかわらず応答前に削除する。
pub async fn handle_upload(
    State(state): State<Arc<GatewayState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, GatewayError> {
    // multipart以外のボディはファイル無しとして扱う
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "uploadのボディがmultipartではありません");
        GatewayError::BadRequest(NO_FILE_UPLOADED.to_string())
    })?;

    let mut staged: Option<StagedFile> = None;
    let mut desired_name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            // ファイル名の無いパートはフォームの値でありファイルではない
            Some(FILE_FIELD) if field.file_name().is_none() => {
                tracing::debug!("ファイル名の無いfileフィールドを無視します");
            }
            Some(FILE_FIELD) if staged.is_none() => {
                staged = Some(StagedFile::write_field(&state.staging_dir, field).await?);
            }
            Some(FILE_FIELD) => {
                tracing::warn!("2つ目以降のfileフィールドを無視します");
            }
            Some(DESIRED_NAME_FIELD) => {
                desired_name = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let Some(staged) = staged else {
        return Err(GatewayError::BadRequest(NO_FILE_UPLOADED.to_string()));
    };

    let file_name = desired_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| staged.original_name().to_string());

    let result = store_staged(&state, &staged, &file_name).await;
    staged.cleanup();

    let stored = result.inspect_err(|e| tracing::error!(error = %e, "アップロードに失敗"))?;

    Ok(Json(UploadResponse {
        id: stored.id,
        name: stored.name,
        web_view_link: stored.web_view_link,
    }))
}

async fn store_staged(
    state: &GatewayState,
    staged: &StagedFile,
    file_name: &str,
) -> Result<StoredFile, GatewayError> {
    let folder_id = state.drive_folder_id.as_deref().ok_or_else(|| {
        GatewayError::Internal("GOOGLE_DRIVE_FOLDER_ID is not configured".to_string())
    })?;

    tracing::debug!(name = %file_name, bytes = staged.size(), "Google Driveへアップロード");
    state
        .storage
        .upload_file(DriveUpload {
            path: staged.path(),
            name: file_name,
            mime_type: staged.mime_type(),
            folder_id,
        })
        .await
}
