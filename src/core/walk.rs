use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub path: PathBuf,
    /// Path relative to the walk root, `/`-separated
    pub relative: String,
    pub is_dir: bool,
}

/// 遞迴列出 `root` 底下所有檔案，`include_dirs` 時也包含資料夾（不含 root 本身）
pub fn local_walk(root: &Path, include_dirs: bool) -> Result<Vec<LocalEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let is_dir = entry.file_type().is_dir();
        if is_dir && !include_dirs {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        entries.push(LocalEntry {
            path: entry.path().to_path_buf(),
            relative,
            is_dir,
        });
    }

    tracing::debug!("Walked {} entries under {}", entries.len(), root.display());
    Ok(entries)
}
