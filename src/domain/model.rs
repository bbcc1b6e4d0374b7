use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A file or folder on the HFS server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Entry name, without the trailing `/` HFS uses to mark folders
    pub name: String,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    /// Folder that was listed to obtain this entry
    pub path: String,
    pub is_directory: bool,
    pub comment: Option<String>,
}

impl RemoteEntry {
    /// Full remote path of the entry.
    pub fn full_path(&self) -> String {
        crate::core::paths::join(&self.path, &self.name)
    }
}

impl fmt::Display for RemoteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_directory { "folder" } else { "file" };
        write!(
            f,
            "HFSPath {} \"{}/{}\", ",
            kind,
            self.path.trim_end_matches('/'),
            self.name
        )?;
        if !self.is_directory {
            write!(f, "size={}, ", self.size)?;
        }
        match &self.modified_at {
            Some(ts) => write!(f, "modified_at=<{}>", ts.to_rfc3339())?,
            None => write!(f, "modified_at=<unknown>")?,
        }
        if let Some(comment) = &self.comment {
            write!(f, " ({})", comment)?;
        }
        Ok(())
    }
}

/// Permissions the server reports alongside a folder listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_archive: bool,
    pub can_upload: bool,
    pub can_delete: bool,
    pub can_overwrite: bool,
    pub can_comment: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub entries: Vec<RemoteEntry>,
    pub permissions: Permissions,
}

/// What the server should do when the upload target already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Overwrite,
    #[default]
    Skip,
}

impl UploadMode {
    /// Value of the `existing` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            UploadMode::Overwrite => "overwrite",
            UploadMode::Skip => "skip",
        }
    }
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

impl FromStr for UploadMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(UploadMode::Overwrite),
            "skip" => Ok(UploadMode::Skip),
            other => Err(format!(
                "unsupported upload mode '{}', expected 'overwrite' or 'skip'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    Uploaded,
    /// Target existed and the server kept it (`existing=skip`)
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub local_path: String,
    pub remote_path: String,
    pub bytes: u64,
    pub http_status: u16,
    pub status: UploadStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUpload {
    pub local_path: String,
    pub remote_path: String,
    pub reason: String,
}

/// Remote folder that could not be created during a folder upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFolder {
    pub remote_path: String,
    pub reason: String,
}

/// Outcome of a folder upload. Files are processed one after another and
/// there is no rollback: whatever reached the server stays there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderUploadReport {
    pub remote_root: String,
    /// Remote folders created for local folders that hold no files
    pub created_folders: Vec<String>,
    pub uploaded: Vec<UploadReceipt>,
    pub skipped: Vec<UploadReceipt>,
    pub failed: Vec<FailedUpload>,
    pub failed_folders: Vec<FailedFolder>,
}

impl FolderUploadReport {
    pub fn total_files(&self) -> usize {
        self.uploaded.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.failed_folders.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.uploaded.iter().map(|r| r.bytes).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadSummary {
    File(UploadReceipt),
    Folder(FolderUploadReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadReceipt {
    pub remote_path: String,
    pub local_path: String,
    pub bytes: u64,
}
