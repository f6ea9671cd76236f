//! # ファイルストレージ
//!
//! アップロードと閲覧権限付与を行うストレージの抽象インターフェース。
//! Google Drive実装は `google_drive` サブモジュールを参照。

pub mod google_drive;

pub use google_drive::{DriveEndpoints, GoogleDriveStorage};

use std::path::Path;

use crate::error::GatewayError;

/// ストレージへのアップロード要求。
pub struct DriveUpload<'a> {
    /// ローカルに一時保存されたファイル
    pub path: &'a Path,
    /// 保存するファイル名
    pub name: &'a str,
    pub mime_type: &'a str,
    /// 保存先フォルダID
    pub folder_id: &'a str,
}

/// アップロード結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub web_view_link: String,
}

/// プロバイダがリンクを返さなかった場合の閲覧URL。
pub fn fallback_view_link(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{file_id}/view")
}

/// ストレージの抽象インターフェース。
///
/// 起動時に一度だけ構築され、全リクエストから読み取り専用で共有される。
#[async_trait::async_trait]
pub trait DriveStorage: Send + Sync {
    /// ファイルを保存し、ID・名前・閲覧リンクを返す。
    async fn upload_file(&self, upload: DriveUpload<'_>) -> Result<StoredFile, GatewayError>;

    /// 指定メールアドレスに読み取り専用の権限を付与する。
    ///
    /// 同一の組み合わせでの重複呼び出しの扱いはプロバイダに委ねる。
    async fn grant_read_access(&self, file_id: &str, email: &str) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_view_link() {
        assert_eq!(
            fallback_view_link("abc123"),
            "https://drive.google.com/file/d/abc123/view"
        );
    }
}
