use crate::domain::model::{UploadMode, UploadReceipt};
use crate::utils::error::Result;
use crate::utils::progress::ProgressCallback;
use async_trait::async_trait;
use std::path::Path;

pub trait ConfigProvider: Send + Sync {
    fn server_url(&self) -> &str;
    fn timeout_seconds(&self) -> u64;
    fn progress_threshold(&self) -> u64;
    fn upload_mode(&self) -> UploadMode;
}

/// The subset of server operations folder transfers are built from.
#[async_trait]
pub trait FileServer: Send + Sync {
    async fn create_folder(&self, folder_name: &str, root: &str) -> Result<()>;

    async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        existing: UploadMode,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadReceipt>;
}
