//! # アップロードの一時保存
//!
//! multipartで受け取ったファイルを共有の一時ディレクトリに一意な名前で書き出す。
//! 一時ファイルはリクエスト処理の間だけ存在し、成功・失敗どちらの経路でも削除される。
//! 明示的な `cleanup` は削除失敗をログに残し、それ以外の経路（早期return・パニック）では
//! `TempPath` のDropが削除を行う。

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use crate::error::GatewayError;

/// ファイル名が空のパートの保存名
pub const UNNAMED_UPLOAD: &str = "upload";

/// Content-Typeが付いていないパートのMIMEタイプ
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// 一時保存されたアップロードファイル。
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
    original_name: String,
    mime_type: String,
    size: u64,
}

impl StagedFile {
    /// 一時ディレクトリに空のファイルを作成し、書き込み用ハンドルと共に返す。
    pub fn create_in(
        dir: &Path,
        original_name: String,
        mime_type: String,
    ) -> Result<(Self, tokio::fs::File), GatewayError> {
        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(dir)
            .map_err(|e| GatewayError::Internal(format!("failed to create temp file: {e}")))?
            .into_parts();

        let staged = Self {
            path,
            original_name,
            mime_type,
            size: 0,
        };
        Ok((staged, tokio::fs::File::from_std(file)))
    }

    /// multipartのファイルフィールドをチャンク単位で一時ファイルへ書き出す。
    pub async fn write_field(dir: &Path, mut field: Field<'_>) -> Result<Self, GatewayError> {
        let original_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNNAMED_UPLOAD)
            .to_string();
        let mime_type = field
            .content_type()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        let (mut staged, mut file) = Self::create_in(dir, original_name, mime_type)?;

        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            file.write_all(&chunk)
                .await
                .map_err(|e| GatewayError::Internal(format!("failed to write temp file: {e}")))?;
            staged.size += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| GatewayError::Internal(format!("failed to write temp file: {e}")))?;

        tracing::debug!(
            path = %staged.path().display(),
            original_name = %staged.original_name,
            bytes = staged.size,
            "アップロードを一時保存"
        );
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// 一時ファイルを削除する。失敗はログに残すのみで呼び出し元には返さない。
    pub fn cleanup(self) {
        let path: PathBuf = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            tracing::error!(path = %path.display(), error = %e, "一時ファイルの削除に失敗");
        }
    }
}

/// multipartのパースエラーをGatewayエラーに変換する。
pub fn multipart_error(err: MultipartError) -> GatewayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::PayloadTooLarge(err.body_text())
    } else {
        GatewayError::BadRequest(err.body_text())
    }
}
