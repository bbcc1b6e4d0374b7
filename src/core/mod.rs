pub mod client;
pub mod listing;
pub mod paths;
pub mod session;
pub mod transfer;
pub mod walk;

pub use crate::domain::model::{
    DownloadReceipt, FolderUploadReport, Listing, Permissions, RemoteEntry, UploadMode,
    UploadReceipt, UploadStatus, UploadSummary,
};
pub use crate::domain::ports::{ConfigProvider, FileServer};
pub use crate::utils::error::Result;
