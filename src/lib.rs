//! Client for the REST API of HFS (HTTP File Server).
//!
//! ```no_run
//! use hfs_client::{HfsClient, UploadMode};
//! use std::path::Path;
//!
//! # async fn example() -> hfs_client::Result<()> {
//! let hfs = HfsClient::new("files.example.com")?;
//! hfs.authorize("admin", "password").await?;
//!
//! for entry in hfs.list("/").await? {
//!     println!("{}", entry);
//! }
//!
//! hfs.upload_file(Path::new("disk.img"), "/a1/a2/disk.img", UploadMode::Overwrite, None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, Command};
pub use config::toml_config::TomlConfig;

pub use core::client::HfsClient;
pub use core::session::{CookieJar, SessionFile};
pub use core::transfer::{ProgressFactory, TransferEngine};
pub use domain::model::{
    DownloadReceipt, FailedFolder, FolderUploadReport, Listing, Permissions, RemoteEntry, UploadMode,
    UploadReceipt, UploadStatus, UploadSummary,
};
pub use utils::error::{HfsError, Result};
