//! # Google Drive ストレージ実装
//!
//! Drive REST API v3 を reqwest で直接呼び出す。
//! 認証はサービスアカウント鍵で署名したJWTアサーションをアクセストークンに交換して行い、
//! 取得したトークンは有効期限の少し前までキャッシュする。

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tokio::sync::Mutex;
use tokio_util::io::ReaderStream;

use super::{fallback_view_link, DriveStorage, DriveUpload, StoredFile};
use crate::credentials::{CredentialError, ServiceAccountKey};
use crate::error::GatewayError;

/// アプリが作成したファイルのみ操作できるスコープ
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Drive APIのベースURL。
#[derive(Debug, Clone)]
pub struct DriveEndpoints {
    /// メタデータ操作（permissions等）
    pub api_base: String,
    /// メディアアップロード
    pub upload_base: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self::single(DEFAULT_API_BASE)
    }
}

impl DriveEndpoints {
    /// 両方の操作を同じホストに向ける。
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            api_base: base.clone(),
            upload_base: base,
        }
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: Option<String>,
    name: Option<String>,
    web_view_link: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PermissionRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    role: &'a str,
    email_address: &'a str,
}

/// Google Driveによるストレージ実装。
pub struct GoogleDriveStorage {
    http_client: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    endpoints: DriveEndpoints,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleDriveStorage {
    pub fn new(
        http_client: reqwest::Client,
        key: ServiceAccountKey,
        endpoints: DriveEndpoints,
    ) -> Result<Self, CredentialError> {
        let encoding_key = key.encoding_key()?;
        Ok(Self {
            http_client,
            key,
            encoding_key,
            endpoints,
            token: Mutex::new(None),
        })
    }

    /// キャッシュ済みのアクセストークンを返す。期限が近ければ取り直す。
    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<CachedToken, GatewayError> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GatewayError::Internal(format!("時刻取得失敗: {e}")))?
            .as_secs();

        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: DRIVE_FILE_SCOPE,
            aud: self.key.token_uri(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let assertion = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| GatewayError::Storage(format!("failed to sign token assertion: {e}")))?;

        let response = self
            .http_client
            .post(self.key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| GatewayError::Storage(e.to_string()))?;

        let token: TokenResponse = read_json(response).await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));
        tracing::debug!(
            expires_in = lifetime.as_secs(),
            "Google Driveのアクセストークンを取得"
        );

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait::async_trait]
impl DriveStorage for GoogleDriveStorage {
    async fn upload_file(&self, upload: DriveUpload<'_>) -> Result<StoredFile, GatewayError> {
        let file = tokio::fs::File::open(upload.path)
            .await
            .map_err(|e| GatewayError::Internal(format!("failed to open staged upload: {e}")))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| GatewayError::Internal(format!("failed to read staged upload: {e}")))?
            .len();

        let metadata = serde_json::json!({
            "name": upload.name,
            "parents": [upload.folder_id],
        });
        let boundary = format!("drivepay-{}", uuid::Uuid::new_v4().simple());
        let envelope = RelatedEnvelope::new(&boundary, &metadata, upload.mime_type);
        let content_length = envelope.overhead() + size;
        let body = envelope.wrap(file);

        let token = self.access_token().await?;
        let response = self
            .http_client
            .post(format!("{}/upload/drive/v3/files", self.endpoints.upload_base))
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,name,webViewLink"),
                ("supportsAllDrives", "true"),
            ])
            .bearer_auth(&token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .header(reqwest::header::CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::Storage(e.to_string()))?;

        let file: DriveFile = read_json(response).await?;
        let id = file.id.ok_or_else(|| {
            GatewayError::Storage("Google Drive response did not include a file id".to_string())
        })?;

        tracing::info!(
            file_id = %id,
            name = %upload.name,
            bytes = size,
            "Google Driveにファイルを保存"
        );

        Ok(StoredFile {
            web_view_link: file
                .web_view_link
                .unwrap_or_else(|| fallback_view_link(&id)),
            name: file.name.unwrap_or_else(|| upload.name.to_string()),
            id,
        })
    }

    async fn grant_read_access(&self, file_id: &str, email: &str) -> Result<(), GatewayError> {
        let mut url = reqwest::Url::parse(&format!("{}/drive/v3/files", self.endpoints.api_base))
            .map_err(|e| GatewayError::Internal(format!("invalid Drive API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::Internal("invalid Drive API base URL".to_string()))?
            .push(file_id)
            .push("permissions");

        let token = self.access_token().await?;
        let response = self
            .http_client
            .post(url)
            .query(&[("fields", "id"), ("supportsAllDrives", "true")])
            .bearer_auth(&token)
            .json(&PermissionRequest {
                kind: "user",
                role: "reader",
                email_address: email,
            })
            .send()
            .await
            .map_err(|e| GatewayError::Storage(e.to_string()))?;

        let _permission: serde_json::Value = read_json(response).await?;
        tracing::info!(file_id = %file_id, email = %email, "閲覧権限を付与");
        Ok(())
    }
}

/// `multipart/related` ボディの前後部分（メタデータパートと終端境界）。
///
/// ファイル本体はメモリに載せず、一時ファイルからストリームで間に挟む。
struct RelatedEnvelope {
    head: Bytes,
    tail: Bytes,
}

impl RelatedEnvelope {
    fn new(boundary: &str, metadata: &serde_json::Value, mime_type: &str) -> Self {
        let head = format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n"
        );
        let tail = format!("\r\n--{boundary}--\r\n");
        Self {
            head: Bytes::from(head),
            tail: Bytes::from(tail),
        }
    }

    /// 本体を除いたバイト数
    fn overhead(&self) -> u64 {
        (self.head.len() + self.tail.len()) as u64
    }

    fn into_stream<R>(
        self,
        content: R,
    ) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static
    where
        R: AsyncRead + Send + 'static,
    {
        stream::iter([Ok(self.head)])
            .chain(ReaderStream::new(content))
            .chain(stream::iter([Ok(self.tail)]))
    }

    fn wrap<R>(self, content: R) -> reqwest::Body
    where
        R: AsyncRead + Send + 'static,
    {
        reqwest::Body::wrap_stream(self.into_stream(content))
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::Storage(e.to_string()))?;

    if !status.is_success() {
        return Err(GatewayError::Storage(provider_error_message(status, &body)));
    }

    serde_json::from_str(&body)
        .map_err(|e| GatewayError::Storage(format!("failed to parse Google API response: {e}")))
}

/// Googleのエラーボディからメッセージを取り出す。
///
/// API: `{"error": {"message": ...}}`, OAuth: `{"error": "...", "error_description": ...}`
fn provider_error_message(status: reqwest::StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        let error = value.get("error")?;
        error
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| value.get("error_description").and_then(|d| d.as_str()))
            .or_else(|| error.as_str())
    });

    match message {
        Some(message) => message.to_string(),
        None => format!("HTTP {status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::body::Bytes;
    use axum::extract::{Path as UrlPath, Query, State};
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::{Form, Json};
    use jsonwebtoken::{DecodingKey, Validation};

    use crate::credentials::tests::test_key_json;

    const TEST_PUBLIC_KEY: &str = include_str!("../../tests/fixtures/service_account_pub.pem");

    /// モックGoogleサーバーの挙動と呼び出し回数。
    #[derive(Clone, Default)]
    struct MockGoogle {
        token_uri: String,
        omit_link: bool,
        reject_token: bool,
        token_requests: Arc<AtomicUsize>,
        uploads: Arc<AtomicUsize>,
        permissions: Arc<AtomicUsize>,
        received_bytes: Arc<AtomicUsize>,
    }

    async fn mock_token(
        State(mock): State<MockGoogle>,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        mock.token_requests.fetch_add(1, Ordering::SeqCst);
        if mock.reject_token {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid JWT Signature."
                })),
            );
        }

        assert_eq!(form["grant_type"], JWT_BEARER_GRANT);
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[mock.token_uri.as_str()]);
        let decoded = jsonwebtoken::decode::<serde_json::Value>(
            &form["assertion"],
            &DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();
        assert_eq!(decoded.header.kid.as_deref(), Some("test-key-id"));
        assert_eq!(decoded.claims["scope"], DRIVE_FILE_SCOPE);
        assert_eq!(
            decoded.claims["iss"],
            "uploader@drivepay-test.iam.gserviceaccount.com"
        );

        (
            StatusCode::OK,
            Json(serde_json::json!({
                "access_token": "mock-access-token",
                "expires_in": 3600,
                "token_type": "Bearer"
            })),
        )
    }

    async fn mock_upload(
        State(mock): State<MockGoogle>,
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Json<serde_json::Value> {
        assert_eq!(params["uploadType"], "multipart");
        assert_eq!(params["fields"], "id,name,webViewLink");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer mock-access-token");
        let content_type = headers[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/related; boundary="));
        assert_eq!(
            headers[header::CONTENT_LENGTH].to_str().unwrap(),
            body.len().to_string()
        );
        mock.received_bytes.store(body.len(), Ordering::SeqCst);

        let body = String::from_utf8_lossy(&body);
        assert!(body.contains(r#""name":"report.pdf""#));
        assert!(body.contains(r#""parents":["folder-1"]"#));
        assert!(body.contains("Content-Type: application/pdf"));
        assert!(body.contains("hello drive"));

        mock.uploads.fetch_add(1, Ordering::SeqCst);
        let mut file = serde_json::json!({"id": "file-1", "name": "report.pdf"});
        if !mock.omit_link {
            file["webViewLink"] =
                serde_json::Value::from("https://drive.google.com/file/d/file-1/view?usp=drivesdk");
        }
        Json(file)
    }

    async fn mock_permission(
        State(mock): State<MockGoogle>,
        UrlPath(file_id): UrlPath<String>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        assert_eq!(headers[header::AUTHORIZATION], "Bearer mock-access-token");
        mock.permissions.fetch_add(1, Ordering::SeqCst);

        if file_id == "missing" {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": {"code": 404, "message": "File not found: missing.", "errors": []}
                })),
            );
        }

        assert_eq!(
            body,
            serde_json::json!({"type": "user", "role": "reader", "emailAddress": "a@example.com"})
        );
        (StatusCode::OK, Json(serde_json::json!({"id": "perm-1"})))
    }

    /// モックGoogleサーバーを起動し、そこを向いたストレージを返す。
    async fn start_mock_google(
        omit_link: bool,
        reject_token: bool,
    ) -> (GoogleDriveStorage, MockGoogle) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

        let mock = MockGoogle {
            token_uri: format!("{base}/token"),
            omit_link,
            reject_token,
            ..Default::default()
        };

        let app = axum::Router::new()
            .route("/token", axum::routing::post(mock_token))
            .route("/upload/drive/v3/files", axum::routing::post(mock_upload))
            .route(
                "/drive/v3/files/{file_id}/permissions",
                axum::routing::post(mock_permission),
            )
            .with_state(mock.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let key = ServiceAccountKey::parse(Some(&test_key_json(Some(&mock.token_uri)))).unwrap();
        let storage =
            GoogleDriveStorage::new(reqwest::Client::new(), key, DriveEndpoints::single(&base))
                .unwrap();
        (storage, mock)
    }

    fn staged_pdf() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"hello drive").unwrap();
        file
    }

    fn pdf_upload<'a>(path: &'a std::path::Path) -> DriveUpload<'a> {
        DriveUpload {
            path,
            name: "report.pdf",
            mime_type: "application/pdf",
            folder_id: "folder-1",
        }
    }

    /// アップロードが成功し、アクセストークンが再利用されることを確認
    #[tokio::test]
    async fn test_upload_reuses_cached_token() {
        let (storage, mock) = start_mock_google(false, false).await;
        let staged = staged_pdf();

        let first = storage.upload_file(pdf_upload(staged.path())).await.unwrap();
        let second = storage.upload_file(pdf_upload(staged.path())).await.unwrap();

        assert_eq!(first.id, "file-1");
        assert_eq!(first.name, "report.pdf");
        assert_eq!(
            first.web_view_link,
            "https://drive.google.com/file/d/file-1/view?usp=drivesdk"
        );
        assert_eq!(first, second);
        assert_eq!(mock.uploads.load(Ordering::SeqCst), 2);
        assert_eq!(mock.token_requests.load(Ordering::SeqCst), 1);
    }

    /// 読み込みバッファより大きいファイルも欠けずに送られる
    #[tokio::test]
    async fn test_upload_streams_large_staged_file() {
        let (storage, mock) = start_mock_google(false, false).await;
        let staged = tempfile::NamedTempFile::new().unwrap();
        let mut content = b"hello drive".to_vec();
        content.resize(512 * 1024, b'x');
        std::fs::write(staged.path(), &content).unwrap();

        storage.upload_file(pdf_upload(staged.path())).await.unwrap();

        let received = mock.received_bytes.load(Ordering::SeqCst);
        assert!(received > content.len());
        assert!(received < content.len() + 1024);
        assert_eq!(mock.uploads.load(Ordering::SeqCst), 1);
    }

    /// リンクが返らない場合は閲覧URLを組み立てる
    #[tokio::test]
    async fn test_upload_falls_back_to_view_link() {
        let (storage, _mock) = start_mock_google(true, false).await;
        let staged = staged_pdf();

        let stored = storage.upload_file(pdf_upload(staged.path())).await.unwrap();
        assert_eq!(stored.web_view_link, "https://drive.google.com/file/d/file-1/view");
    }

    #[tokio::test]
    async fn test_upload_missing_staged_file_is_internal_error() {
        let (storage, mock) = start_mock_google(false, false).await;
        let path = std::env::temp_dir().join(format!("drivepay-missing-{}", uuid::Uuid::new_v4()));

        let result = storage.upload_file(pdf_upload(&path)).await;
        assert!(matches!(result, Err(GatewayError::Internal(_))));
        assert_eq!(mock.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_grant_read_access() {
        let (storage, mock) = start_mock_google(false, false).await;

        storage
            .grant_read_access("abc123", "a@example.com")
            .await
            .unwrap();
        assert_eq!(mock.permissions.load(Ordering::SeqCst), 1);
    }

    /// プロバイダのエラーメッセージがそのまま返ることを確認
    #[tokio::test]
    async fn test_grant_read_access_surfaces_provider_message() {
        let (storage, _mock) = start_mock_google(false, false).await;

        let err = storage
            .grant_read_access("missing", "a@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Storage(_)));
        assert_eq!(err.to_string(), "File not found: missing.");
    }

    #[tokio::test]
    async fn test_token_rejection_surfaces_description() {
        let (storage, mock) = start_mock_google(false, true).await;
        let staged = staged_pdf();

        let err = storage
            .upload_file(pdf_upload(staged.path()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid JWT Signature.");
        assert_eq!(mock.uploads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_provider_error_message_without_json() {
        let message =
            provider_error_message(reqwest::StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert_eq!(message, "HTTP 502 Bad Gateway: upstream unavailable");
    }

    #[tokio::test]
    async fn test_related_envelope_layout() {
        let metadata = serde_json::json!({"name": "a.txt", "parents": ["f"]});
        let envelope = RelatedEnvelope::new("b1", &metadata, "text/plain");
        let overhead = envelope.overhead();

        let chunks: Vec<Bytes> = envelope
            .into_stream(&b"xyz"[..])
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        let body: Vec<u8> = chunks.concat();
        assert_eq!(body.len() as u64, overhead + 3);

        let body = String::from_utf8(body).unwrap();
        assert!(body.starts_with("--b1\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n"));
        assert!(body.contains(r#"{"name":"a.txt","parents":["f"]}"#));
        assert!(body.contains("\r\n--b1\r\nContent-Type: text/plain\r\n\r\nxyz"));
        assert!(body.ends_with("\r\n--b1--\r\n"));
    }
}
