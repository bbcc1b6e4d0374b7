//! HTTP client for the HFS REST API.
//!
//! Every operation maps to a single request against the server. Folder-level
//! operations (`create_folders`, `upload_folder`) are loops over these calls,
//! see [`crate::core::transfer`].

use crate::core::session::CookieJar;
use crate::core::transfer::{ProgressFactory, TransferEngine};
use crate::core::{listing, paths, ConfigProvider, FileServer};
use crate::domain::model::{
    DownloadReceipt, FolderUploadReport, Listing, RemoteEntry, UploadMode, UploadReceipt,
    UploadStatus, UploadSummary,
};
use crate::utils::error::{HfsError, Result};
use crate::utils::output::status_label;
use crate::utils::progress::{ProgressCallback, TransferProgress};
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use futures_util::stream;
use reqwest::header::COOKIE;
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use url::Url;

pub const ANTI_CSRF_HEADER: &str = "X-Hfs-Anti-Csrf";
const USER_AGENT: &str = concat!("hfs-client/", env!("CARGO_PKG_VERSION"));
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct HfsClient {
    client: Client,
    base_url: Url,
    cookies: Arc<RwLock<CookieJar>>,
    timeout: Duration,
    progress_threshold: u64,
}

impl HfsClient {
    /// Client for `https://<domain>`.
    pub fn new(domain: &str) -> Result<Self> {
        Self::with_base_url(&format!("https://{}", domain))
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::build(
            base_url,
            Duration::from_secs(crate::config::toml_config::DEFAULT_TIMEOUT_SECONDS),
            crate::config::toml_config::DEFAULT_PROGRESS_THRESHOLD,
        )
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        Self::build(
            config.server_url(),
            Duration::from_secs(config.timeout_seconds()),
            config.progress_threshold(),
        )
    }

    fn build(base_url: &str, timeout: Duration, progress_threshold: u64) -> Result<Self> {
        validate_url("server.url", base_url)?;

        let mut base_url = Url::parse(base_url)?;
        // 確保 join 時不會吃掉最後一段路徑
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        base_url.set_query(None);

        // 登入會回 302，不跟隨轉址才拿得到 Set-Cookie
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            cookies: Arc::new(RwLock::new(CookieJar::new())),
            timeout,
            progress_threshold,
        })
    }

    /// Files at or above this size are streamed with progress reporting.
    pub fn with_progress_threshold(mut self, bytes: u64) -> Self {
        self.progress_threshold = bytes;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// A client sharing this one's connection pool but sending `cookies`
    /// instead of the session cookies.
    pub fn with_cookies(&self, cookies: CookieJar) -> Self {
        Self {
            cookies: Arc::new(RwLock::new(cookies)),
            ..self.clone()
        }
    }

    /// Log in. Status 200 or 302 is success and the cookies the server sets
    /// replace the current session.
    pub async fn authorize(&self, login: &str, password: &str) -> Result<StatusCode> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("login", &format!("{}:{}", login, password));

        tracing::info!("🔐 Authorizing as '{}' on {}", login, self);
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();

        if status != StatusCode::OK && status != StatusCode::FOUND {
            tracing::warn!("Login rejected: {}", status_label(status));
            return Err(HfsError::AuthorizationFailed(format!(
                "HTTP status code {}",
                status.as_u16()
            )));
        }

        let jar = CookieJar::from_headers(response.headers());
        if jar.is_empty() {
            tracing::warn!("Login succeeded but the server set no cookies");
        }
        tracing::debug!("Session now holds {} cookies", jar.len());
        self.set_cookie_jar(jar);

        Ok(status)
    }

    pub fn get_cookies(&self) -> HashMap<String, String> {
        self.cookie_jar().to_map()
    }

    pub fn set_cookies<I, K, V>(&self, cookies: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.set_cookie_jar(CookieJar::from_map(cookies));
    }

    pub fn cookie_jar(&self) -> CookieJar {
        self.cookies
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_cookie_jar(&self, jar: CookieJar) {
        *self
            .cookies
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = jar;
    }

    pub async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        Ok(self.list_with_permissions(path).await?.entries)
    }

    /// List a folder together with what the session may do in it.
    pub async fn list_with_permissions(&self, path: &str) -> Result<Listing> {
        let mut url = self.api_url("get_file_list")?;
        url.query_pairs_mut().append_pair("uri", path);

        tracing::debug!("GET {}", url);
        let request = self.client.get(url).timeout(self.timeout);
        let response = self.with_session(request).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                return Err(HfsError::AuthorizationFailed("Access denied".to_string()))
            }
            StatusCode::NOT_FOUND => {
                return Err(HfsError::NotExists(format!("path \"{}\" does not exist", path)))
            }
            _ => return Err(status_error(response).await),
        }

        let body = response.text().await?;
        listing::parse_file_list(&body, path)
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let response = self
            .post_api("get_file_details", &json!({ "uris": [path] }))
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(HfsError::AuthorizationFailed("Access denied".to_string()));
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: Value = response.json().await?;
        let first = body
            .get("details")
            .and_then(Value::as_array)
            .and_then(|details| details.first())
            .ok_or_else(|| HfsError::InvalidResponse {
                message: "file details response has no \"details\" entry".to_string(),
            })?;

        // false 表示不存在；物件或 null 都視為存在
        Ok(!matches!(first, Value::Bool(false)))
    }

    pub async fn create_folder(&self, folder_name: &str, root: &str) -> Result<()> {
        let response = self
            .post_api("create_folder", &json!({ "uri": root, "name": folder_name }))
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                Err(HfsError::AuthorizationFailed("Access denied".to_string()))
            }
            StatusCode::NOT_FOUND => Err(HfsError::NotExists(format!(
                "parent \"{}\" does not exist",
                root
            ))),
            StatusCode::CONFLICT => Err(HfsError::AlreadyExists(format!(
                "folder \"{}\" already exists",
                paths::join(root, folder_name)
            ))),
            status if status.is_success() => {
                tracing::info!("📁 Created folder {}", paths::join(root, folder_name));
                Ok(())
            }
            _ => Err(status_error(response).await),
        }
    }

    /// Create every missing component of `path` below `root`.
    pub async fn create_folders(&self, path: &str, root: &str) -> Result<usize> {
        TransferEngine::new(self.clone())
            .create_folders(path, root)
            .await
    }

    /// Delete a file or folder. Deleting `/` requires `force`.
    pub async fn delete(&self, path: &str, force: bool) -> Result<()> {
        if !force && paths::is_root(path) {
            return Err(HfsError::RootDeleteRefused);
        }

        let response = self.post_api("delete", &json!({ "uri": path })).await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                Err(HfsError::AuthorizationFailed("Access denied".to_string()))
            }
            // HFS 對不存在的路徑回 500
            StatusCode::NOT_FOUND | StatusCode::INTERNAL_SERVER_ERROR => Err(
                HfsError::NotExists(format!("path \"{}\" does not exist", path)),
            ),
            status if status.is_success() => {
                tracing::info!("🗑️ Deleted {}", path);
                Ok(())
            }
            _ => Err(status_error(response).await),
        }
    }

    /// Rename `uri` to the new name `dest` inside the same folder.
    pub async fn rename(&self, uri: &str, dest: &str) -> Result<()> {
        let response = self
            .post_api("rename", &json!({ "uri": uri, "dest": dest }))
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                Err(HfsError::AuthorizationFailed("Access denied".to_string()))
            }
            StatusCode::NOT_FOUND => Err(HfsError::NotExists(format!(
                "path \"{}\" does not exist",
                uri
            ))),
            status if status.is_success() => {
                tracing::info!("✏️ Renamed {} to {}", uri, dest);
                Ok(())
            }
            _ => Err(status_error(response).await),
        }
    }

    pub async fn move_path(&self, from: &str, to: &str) -> Result<()> {
        self.move_paths(&[from], to).await
    }

    /// Move several entries into the folder `to`.
    pub async fn move_paths(&self, from: &[&str], to: &str) -> Result<()> {
        let response = self
            .post_api("move_files", &json!({ "uri_from": from, "uri_to": to }))
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                return Err(HfsError::AuthorizationFailed("Access denied".to_string()))
            }
            StatusCode::NOT_FOUND => {
                return Err(HfsError::NotExists(format!(
                    "path \"{}\" does not exist",
                    from.join("\", \"")
                )))
            }
            status if status.is_success() => {}
            _ => return Err(status_error(response).await),
        }

        let body = response.text().await?;
        let failed = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("errors").and_then(Value::as_array).cloned())
            .map(|errors| errors.iter().filter(|e| is_truthy(e)).count())
            .unwrap_or(0);

        if failed > 0 {
            tracing::warn!("Server reported {} failed moves: {}", failed, body);
            return Err(HfsError::MoveFailed {
                failed,
                total: from.len(),
            });
        }

        tracing::info!("📦 Moved {} item(s) to {}", from.len(), to);
        Ok(())
    }

    /// Upload one local file.
    ///
    /// An empty `remote_path` uploads to `/<file name>`; a path ending in `/`
    /// names the target folder. Missing remote folders are created by the
    /// server.
    pub async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        existing: UploadMode,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadReceipt> {
        let metadata = match tokio::fs::metadata(local_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HfsError::LocalNotFound(local_path.display().to_string()))
            }
            Err(e) => return Err(HfsError::IoError(e)),
        };
        if metadata.is_dir() {
            return Err(HfsError::NotAFile(local_path.display().to_string()));
        }

        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| HfsError::LocalNotFound(local_path.display().to_string()))?;

        let remote_path = if remote_path.is_empty() || remote_path.ends_with('/') {
            paths::join(remote_path, &file_name)
        } else {
            paths::normalize(remote_path)
        };

        let mut url = self.file_url(&remote_path)?;
        url.query_pairs_mut()
            .append_pair("existing", existing.as_query());

        let size = metadata.len();
        let cancelled = Arc::new(AtomicBool::new(false));
        let body = if size < self.progress_threshold {
            Body::from(tokio::fs::read(local_path).await?)
        } else {
            let file = tokio::fs::File::open(local_path).await?;
            streaming_body(file, size, file_name, progress, cancelled.clone())
        };

        tracing::debug!("PUT {} ({} bytes)", url, size);
        let request = self.client.put(url).body(body);
        let response = match self.with_session(request).send().await {
            Ok(response) => response,
            Err(_) if cancelled.load(Ordering::SeqCst) => {
                return Err(HfsError::Cancelled(local_path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let http_status = response.status();
        let status = match http_status {
            StatusCode::UNAUTHORIZED => {
                return Err(HfsError::AuthorizationFailed("Access denied".to_string()))
            }
            StatusCode::CONFLICT if existing == UploadMode::Skip => UploadStatus::Skipped,
            s if s.is_success() => UploadStatus::Uploaded,
            _ => return Err(status_error(response).await),
        };

        tracing::info!("⬆️ {} -> {} [{}]", local_path.display(), remote_path, status_label(http_status));
        Ok(UploadReceipt {
            local_path: local_path.display().to_string(),
            remote_path,
            bytes: size,
            http_status: http_status.as_u16(),
            status,
        })
    }

    /// Upload a local folder as `<remote_path>/<folder name>`.
    pub async fn upload_folder(
        &self,
        local_path: &Path,
        remote_path: &str,
        existing: UploadMode,
    ) -> Result<FolderUploadReport> {
        TransferEngine::new(self.clone())
            .upload_folder(local_path, remote_path, existing)
            .await
    }

    /// Same as [`upload_folder`](Self::upload_folder) with a progress bar per
    /// large file.
    pub async fn upload_folder_with_progress(
        &self,
        local_path: &Path,
        remote_path: &str,
        existing: UploadMode,
        progress: ProgressFactory,
    ) -> Result<FolderUploadReport> {
        TransferEngine::new(self.clone())
            .with_progress(progress)
            .upload_folder(local_path, remote_path, existing)
            .await
    }

    /// Upload a file or a folder depending on what `local_path` is.
    pub async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        existing: UploadMode,
        progress: Option<ProgressFactory>,
    ) -> Result<UploadSummary> {
        let metadata = match tokio::fs::metadata(local_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HfsError::LocalNotFound(local_path.display().to_string()))
            }
            Err(e) => return Err(HfsError::IoError(e)),
        };

        let mut engine = TransferEngine::new(self.clone());
        if let Some(factory) = progress {
            engine = engine.with_progress(factory);
        }

        if metadata.is_file() {
            let callback = engine.progress_for(&local_path.display().to_string());
            let receipt = self
                .upload_file(local_path, remote_path, existing, callback)
                .await?;
            Ok(UploadSummary::File(receipt))
        } else {
            let remote_path = if remote_path.is_empty() { "/" } else { remote_path };
            let report = engine.upload_folder(local_path, remote_path, existing).await?;
            Ok(UploadSummary::Folder(report))
        }
    }

    /// Download a remote file to `local_path`, creating parent folders.
    pub async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        mut progress: Option<ProgressCallback>,
    ) -> Result<DownloadReceipt> {
        let remote_path = paths::normalize(remote_path);
        let url = self.file_url(&remote_path)?;

        tracing::debug!("GET {}", url);
        let request = self.client.get(url);
        let response = self.with_session(request).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                return Err(HfsError::AuthorizationFailed("Access denied".to_string()))
            }
            StatusCode::NOT_FOUND => {
                return Err(HfsError::NotExists(format!(
                    "path \"{}\" does not exist",
                    remote_path
                )))
            }
            status if status.is_success() => {}
            _ => return Err(status_error(response).await),
        }

        if let Some(parent) = local_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // 先寫到 .part，完整收到後才改名；任何錯誤都刪掉殘檔
        let part_path = partial_path(local_path);
        let done = match write_response(response, &part_path, &remote_path, &mut progress).await {
            Ok(done) => done,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&part_path).await {
                    tracing::debug!("Could not remove {}: {}", part_path.display(), cleanup);
                }
                return Err(e);
            }
        };
        tokio::fs::rename(&part_path, local_path).await?;

        tracing::info!("⬇️ {} -> {} ({} bytes)", remote_path, local_path.display(), done);
        Ok(DownloadReceipt {
            remote_path,
            local_path: local_path.display().to_string(),
            bytes: done,
        })
    }

    fn api_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base_url.join(&format!("~/api/{}", endpoint))?)
    }

    /// URL of a remote file, each path segment percent-encoded.
    fn file_url(&self, remote_path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HfsError::InvalidConfigValueError {
                field: "server.url".to_string(),
                value: self.base_url.to_string(),
                reason: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(paths::components(remote_path));
        Ok(url)
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match self.cookie_jar().header_value() {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }

    async fn post_api(&self, endpoint: &str, payload: &Value) -> Result<Response> {
        let url = self.api_url(endpoint)?;
        tracing::debug!("POST {} {}", url, payload);

        let request = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(ANTI_CSRF_HEADER, "1")
            .json(payload);

        Ok(self.with_session(request).send().await?)
    }
}

impl fmt::Display for HfsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HFS instance at {}",
            self.base_url.host_str().unwrap_or("<unknown>")
        )
    }
}

#[async_trait]
impl FileServer for HfsClient {
    async fn create_folder(&self, folder_name: &str, root: &str) -> Result<()> {
        HfsClient::create_folder(self, folder_name, root).await
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        existing: UploadMode,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadReceipt> {
        HfsClient::upload_file(self, local_path, remote_path, existing, progress).await
    }
}

async fn status_error(response: Response) -> HfsError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    HfsError::HttpStatus { status, body }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn partial_path(local_path: &Path) -> PathBuf {
    let mut name = local_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    local_path.with_file_name(name)
}

/// Stream the body into `path`. Returns the byte count once the whole
/// announced length has arrived.
async fn write_response(
    mut response: Response,
    path: &Path,
    remote_path: &str,
    progress: &mut Option<ProgressCallback>,
) -> Result<u64> {
    let total = response.content_length().unwrap_or(0);
    let name = paths::split_parent(remote_path).1;
    let mut file = tokio::fs::File::create(path).await?;
    let mut done: u64 = 0;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        done += chunk.len() as u64;

        if let Some(callback) = progress.as_mut() {
            if !callback(&TransferProgress::new(done, total, name.clone())) {
                return Err(HfsError::Cancelled(remote_path.to_string()));
            }
        }
    }
    file.flush().await?;

    if total > 0 && done != total {
        return Err(HfsError::IncompleteTransfer {
            path: remote_path.to_string(),
            expected: total,
            received: done,
        });
    }

    // 長度未知時補一次完成回報，讓進度列結束在新的一行
    if total == 0 {
        if let Some(callback) = progress.as_mut() {
            callback(&TransferProgress::new(done, done, name));
        }
    }
    Ok(done)
}

/// 背景任務分塊讀檔並回報進度，回呼傳回 false 時中止上傳
fn streaming_body(
    mut file: tokio::fs::File,
    total: u64,
    filename: String,
    mut progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
) -> Body {
    let (tx, rx) = mpsc::channel::<std::io::Result<Vec<u8>>>(4);

    tokio::spawn(async move {
        let mut done: u64 = 0;
        loop {
            let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
            let n = match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            };
            buf.truncate(n);
            done += n as u64;

            if let Some(callback) = progress.as_mut() {
                if !callback(&TransferProgress::new(done, total, filename.clone())) {
                    cancelled.store(true, Ordering::SeqCst);
                    let _ = tx
                        .send(Err(std::io::Error::new(
                            std::io::ErrorKind::Interrupted,
                            "upload cancelled",
                        )))
                        .await;
                    break;
                }
            }

            if tx.send(Ok(buf)).await.is_err() {
                break;
            }
        }
    });

    let chunks = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    Body::wrap_stream(chunks)
}
