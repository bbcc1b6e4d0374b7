//! Multi-request operations built on top of single server calls.
//!
//! Nothing here is transactional: a folder upload that fails half-way leaves
//! the files already sent on the server.

use crate::core::{paths, walk, FileServer};
use crate::domain::model::{
    FailedFolder, FailedUpload, FolderUploadReport, UploadMode, UploadStatus,
};
use crate::utils::error::{HfsError, Result};
use crate::utils::output::status_marker;
use crate::utils::progress::ProgressCallback;
use reqwest::StatusCode;
use std::path::Path;
use std::sync::Arc;

/// Builds a progress callback for the named file.
pub type ProgressFactory = Arc<dyn Fn(&str) -> ProgressCallback + Send + Sync>;

pub struct TransferEngine<F: FileServer> {
    server: F,
    progress: Option<ProgressFactory>,
}

impl<F: FileServer> TransferEngine<F> {
    pub fn new(server: F) -> Self {
        Self {
            server,
            progress: None,
        }
    }

    pub fn with_progress(mut self, factory: ProgressFactory) -> Self {
        self.progress = Some(factory);
        self
    }

    pub fn progress_for(&self, name: &str) -> Option<ProgressCallback> {
        self.progress.as_ref().map(|factory| factory(name))
    }

    /// Create each component of `path` under `root`, parents first. Folders
    /// that already exist are left alone. Returns how many were created.
    pub async fn create_folders(&self, path: &str, root: &str) -> Result<usize> {
        let mut parent = paths::normalize(root);
        let mut created = 0;

        for component in paths::components(path) {
            match self.server.create_folder(&component, &parent).await {
                Ok(()) => created += 1,
                Err(HfsError::AlreadyExists(_)) => {
                    tracing::debug!("{} already exists", paths::join(&parent, &component));
                }
                Err(e) => return Err(e),
            }
            parent = paths::join(&parent, &component);
        }

        Ok(created)
    }

    /// Upload every file under `local_path` to `<remote_path>/<folder name>/…`,
    /// one request per file.
    ///
    /// An authorization failure stops the run; any other per-file failure is
    /// recorded in the report and the remaining files are still attempted.
    pub async fn upload_folder(
        &self,
        local_path: &Path,
        remote_path: &str,
        existing: UploadMode,
    ) -> Result<FolderUploadReport> {
        let metadata = match tokio::fs::metadata(local_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HfsError::LocalNotFound(local_path.display().to_string()))
            }
            Err(e) => return Err(HfsError::IoError(e)),
        };
        if !metadata.is_dir() {
            return Err(HfsError::NotADirectory(local_path.display().to_string()));
        }

        // `.` 或 `..` 沒有檔名，先轉成絕對路徑
        let local_root = tokio::fs::canonicalize(local_path).await?;
        let folder_name = local_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let remote_root = paths::join(remote_path, &folder_name);

        let entries = walk::local_walk(&local_root, true)?;
        let (dirs, files): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.is_dir);

        tracing::info!(
            "📤 Uploading {} files from {} to {}",
            files.len(),
            local_root.display(),
            remote_root
        );

        let mut report = FolderUploadReport {
            remote_root: remote_root.clone(),
            ..Default::default()
        };

        for (index, entry) in files.iter().enumerate() {
            let remote_file = paths::join(&remote_root, &entry.relative);
            tracing::debug!("[{}/{}] {}", index + 1, files.len(), remote_file);

            let callback = self.progress_for(&entry.relative);
            match self
                .server
                .upload_file(&entry.path, &remote_file, existing, callback)
                .await
            {
                Ok(receipt) => {
                    let marker = StatusCode::from_u16(receipt.http_status)
                        .map(status_marker)
                        .unwrap_or("ℹ️");
                    tracing::info!("{} {} ({:?})", marker, remote_file, receipt.status);
                    match receipt.status {
                        UploadStatus::Uploaded => report.uploaded.push(receipt),
                        UploadStatus::Skipped => report.skipped.push(receipt),
                    }
                }
                Err(e @ HfsError::AuthorizationFailed(_)) => {
                    tracing::error!("❌ {}: {}; aborting folder upload", remote_file, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("⚠️ {}: {}", remote_file, e);
                    report.failed.push(FailedUpload {
                        local_path: entry.path.display().to_string(),
                        remote_path: remote_file,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // 伺服器只在上傳檔案時建立資料夾，空資料夾要另外建
        let mut empty_dirs: Vec<String> = dirs
            .iter()
            .filter(|d| {
                let prefix = format!("{}/", d.relative);
                !files.iter().any(|f| f.relative.starts_with(&prefix))
            })
            .map(|d| d.relative.clone())
            .collect();
        if files.is_empty() && empty_dirs.is_empty() {
            empty_dirs.push(String::new());
        }

        if !empty_dirs.is_empty() {
            // remote_path 由呼叫端保證存在，只建立 <folder name>
            let parent = paths::normalize(remote_path);
            match self.server.create_folder(&folder_name, &parent).await {
                Ok(()) | Err(HfsError::AlreadyExists(_)) => {
                    self.create_empty_dirs(&remote_root, empty_dirs, &mut report)
                        .await?;
                }
                Err(e @ HfsError::AuthorizationFailed(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!("⚠️ Could not create {}: {}", remote_root, e);
                    report.failed_folders.push(FailedFolder {
                        remote_path: remote_root.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "📊 Folder upload finished: {} uploaded, {} skipped, {} failed",
            report.uploaded.len(),
            report.skipped.len(),
            report.failed.len() + report.failed_folders.len()
        );
        Ok(report)
    }

    async fn create_empty_dirs(
        &self,
        remote_root: &str,
        relatives: Vec<String>,
        report: &mut FolderUploadReport,
    ) -> Result<()> {
        for relative in relatives {
            let target = paths::join(remote_root, &relative);
            if relative.is_empty() {
                report.created_folders.push(target);
                continue;
            }
            match self.create_folders(&relative, remote_root).await {
                Ok(_) => report.created_folders.push(target),
                Err(e @ HfsError::AuthorizationFailed(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!("⚠️ Could not create {}: {}", target, e);
                    report.failed_folders.push(FailedFolder {
                        remote_path: target,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::UploadReceipt;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MockServer {
        folders: Mutex<HashSet<String>>,
        folder_calls: Mutex<Vec<(String, String)>>,
        uploads: Mutex<Vec<String>>,
        fail_on: Option<String>,
        forbid_folders: bool,
        deny_all: bool,
        skip_all: bool,
    }

    #[async_trait]
    impl FileServer for MockServer {
        async fn create_folder(&self, folder_name: &str, root: &str) -> Result<()> {
            self.folder_calls
                .lock()
                .unwrap()
                .push((folder_name.to_string(), root.to_string()));
            let full = paths::join(root, folder_name);
            if self.forbid_folders {
                return Err(HfsError::HttpStatus {
                    status: 403,
                    body: String::new(),
                });
            }
            if !self.folders.lock().unwrap().insert(full.clone()) {
                return Err(HfsError::AlreadyExists(full));
            }
            Ok(())
        }

        async fn upload_file(
            &self,
            local_path: &Path,
            remote_path: &str,
            _existing: UploadMode,
            _progress: Option<ProgressCallback>,
        ) -> Result<UploadReceipt> {
            if self.deny_all {
                return Err(HfsError::AuthorizationFailed("Access denied".to_string()));
            }
            if self.fail_on.as_deref() == Some(remote_path) {
                return Err(HfsError::HttpStatus {
                    status: 507,
                    body: "disk full".to_string(),
                });
            }
            self.uploads.lock().unwrap().push(remote_path.to_string());
            Ok(UploadReceipt {
                local_path: local_path.display().to_string(),
                remote_path: remote_path.to_string(),
                bytes: 1,
                http_status: if self.skip_all { 409 } else { 201 },
                status: if self.skip_all {
                    UploadStatus::Skipped
                } else {
                    UploadStatus::Uploaded
                },
            })
        }
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("photos");
        std::fs::create_dir_all(root.join("2024/march")).unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();
        std::fs::write(root.join("cover.jpg"), b"x").unwrap();
        std::fs::write(root.join("2024/march/a.jpg"), b"x").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_create_folders_tolerates_existing() {
        let engine = TransferEngine::new(MockServer::default());
        engine
            .server
            .folders
            .lock()
            .unwrap()
            .insert("/a1".to_string());

        let created = engine.create_folders("a1/a2/a3", "/").await.unwrap();
        assert_eq!(created, 2);

        let calls = engine.server.folder_calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("a1".to_string(), "/".to_string()),
                ("a2".to_string(), "/a1".to_string()),
                ("a3".to_string(), "/a1/a2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_upload_folder_maps_relative_paths() {
        let dir = sample_tree();
        let engine = TransferEngine::new(MockServer::default());

        let report = engine
            .upload_folder(&dir.path().join("photos"), "/backup", UploadMode::Skip)
            .await
            .unwrap();

        assert_eq!(report.remote_root, "/backup/photos");
        assert!(report.is_success());
        let uploads = engine.server.uploads.lock().unwrap().clone();
        assert_eq!(
            uploads,
            vec!["/backup/photos/2024/march/a.jpg", "/backup/photos/cover.jpg"]
        );
        assert_eq!(report.created_folders, vec!["/backup/photos/empty"]);
    }

    #[tokio::test]
    async fn test_upload_folder_records_failures_and_continues() {
        let dir = sample_tree();
        let engine = TransferEngine::new(MockServer {
            fail_on: Some("/photos/2024/march/a.jpg".to_string()),
            ..Default::default()
        });

        let report = engine
            .upload_folder(&dir.path().join("photos"), "/", UploadMode::Overwrite)
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.uploaded.len(), 1);
        assert!(report.failed[0].reason.contains("507"));
        assert_eq!(report.total_files(), 2);
    }

    #[tokio::test]
    async fn test_upload_folder_only_creates_its_own_root() {
        let dir = sample_tree();
        let engine = TransferEngine::new(MockServer::default());

        engine
            .upload_folder(&dir.path().join("photos"), "/backup", UploadMode::Skip)
            .await
            .unwrap();

        let calls = engine.server.folder_calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("photos".to_string(), "/backup".to_string()),
                ("empty".to_string(), "/backup/photos".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_folder_creation_failure_keeps_report() {
        let dir = sample_tree();
        let engine = TransferEngine::new(MockServer {
            forbid_folders: true,
            ..Default::default()
        });

        let report = engine
            .upload_folder(&dir.path().join("photos"), "/backup", UploadMode::Skip)
            .await
            .unwrap();

        assert_eq!(report.uploaded.len(), 2);
        assert!(report.created_folders.is_empty());
        assert_eq!(report.failed_folders.len(), 1);
        assert_eq!(report.failed_folders[0].remote_path, "/backup/photos");
        assert!(report.failed_folders[0].reason.contains("403"));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_upload_folder_aborts_on_authorization_failure() {
        let dir = sample_tree();
        let engine = TransferEngine::new(MockServer {
            deny_all: true,
            ..Default::default()
        });

        let err = engine
            .upload_folder(&dir.path().join("photos"), "/", UploadMode::Skip)
            .await
            .unwrap_err();
        assert!(matches!(err, HfsError::AuthorizationFailed(_)));
    }

    #[tokio::test]
    async fn test_upload_folder_counts_skipped() {
        let dir = sample_tree();
        let engine = TransferEngine::new(MockServer {
            skip_all: true,
            ..Default::default()
        });

        let report = engine
            .upload_folder(&dir.path().join("photos"), "/", UploadMode::Skip)
            .await
            .unwrap();
        assert_eq!(report.skipped.len(), 2);
        assert!(report.uploaded.is_empty());
    }

    #[tokio::test]
    async fn test_upload_folder_rejects_files_and_missing_paths() {
        let dir = sample_tree();
        let engine = TransferEngine::new(MockServer::default());

        let err = engine
            .upload_folder(&dir.path().join("photos/cover.jpg"), "/", UploadMode::Skip)
            .await
            .unwrap_err();
        assert!(matches!(err, HfsError::NotADirectory(_)));

        let err = engine
            .upload_folder(&dir.path().join("missing"), "/", UploadMode::Skip)
            .await
            .unwrap_err();
        assert!(matches!(err, HfsError::LocalNotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_folder_creates_remote_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("blank")).unwrap();
        let engine = TransferEngine::new(MockServer::default());

        let report = engine
            .upload_folder(&dir.path().join("blank"), "/", UploadMode::Skip)
            .await
            .unwrap();
        assert_eq!(report.total_files(), 0);
        assert_eq!(report.created_folders, vec!["/blank"]);
        assert!(engine.server.folders.lock().unwrap().contains("/blank"));
    }
}
