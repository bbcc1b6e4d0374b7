use crate::config::toml_config::{AuthConfig, SessionConfig, TomlConfig};
use crate::domain::model::UploadMode;
use crate::utils::error::{HfsError, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "hfs.toml";
pub const PASSWORD_ENV: &str = "HFS_PASSWORD";

#[derive(Debug, Clone, Parser)]
#[command(name = "hfs")]
#[command(about = "Command line client for HFS (HTTP File Server)")]
pub struct CliConfig {
    /// Path to TOML configuration file (defaults to ./hfs.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Server URL, e.g. https://files.example.com
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Account name used by `login`
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Password used by `login` (falls back to $HFS_PASSWORD)
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Where the session cookies are stored
    #[arg(long, global = true)]
    pub session_file: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Log in and store the session cookies
    Login,
    /// Forget the stored session
    Logout,
    /// Print the session cookies
    Cookies,
    /// List a remote folder
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Also print what the session may do in the folder
        #[arg(long)]
        permissions: bool,
    },
    /// Check whether a remote path exists
    Exists { path: String },
    /// Create a remote folder
    Mkdir {
        path: String,
        /// Create missing parent folders too
        #[arg(short, long)]
        parents: bool,
    },
    /// Delete a remote file or folder
    Rm {
        path: String,
        /// Do not ask before deleting "/"
        #[arg(short, long)]
        force: bool,
    },
    /// Upload a local file or folder
    Upload {
        local: PathBuf,
        /// Remote target; a folder upload lands in <remote>/<folder name>
        #[arg(default_value = "")]
        remote: String,
        /// What to do when the target exists: skip or overwrite
        #[arg(long)]
        existing: Option<UploadMode>,
        #[arg(long)]
        no_progress: bool,
    },
    /// Download a remote file
    Download {
        remote: String,
        /// Local destination (defaults to the remote file name)
        local: Option<PathBuf>,
        #[arg(long)]
        no_progress: bool,
    },
    /// Rename a remote file or folder
    Rename { path: String, new_name: String },
    /// Move remote entries; the last path is the destination folder
    Mv {
        #[arg(num_args = 2.., required = true)]
        paths: Vec<String>,
    },
}

impl CliConfig {
    /// 合併設定檔與命令列參數，命令列優先
    pub fn resolve(&self) -> Result<TomlConfig> {
        self.resolve_with(std::env::var(PASSWORD_ENV).ok())
    }

    pub fn resolve_with(&self, password_env: Option<String>) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                tracing::debug!("Using {}", DEFAULT_CONFIG_FILE);
                TomlConfig::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => {
                let url = self.url.clone().ok_or_else(|| HfsError::MissingConfigError {
                    field: "server.url (pass --url or a config file)".to_string(),
                })?;
                TomlConfig::for_url(url)
            }
        };

        if let Some(url) = &self.url {
            config.server.url = url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.server.timeout_seconds = Some(timeout);
        }

        if let Some(user) = &self.user {
            let password = config.auth.as_ref().and_then(|a| a.password.clone());
            config.auth = Some(AuthConfig {
                username: user.clone(),
                password,
            });
        }
        let password = self.password.clone().or(password_env);
        if let (Some(password), Some(auth)) = (password, config.auth.as_mut()) {
            auth.password = Some(password);
        }

        if let Some(file) = &self.session_file {
            let persist = config.session.as_ref().and_then(|s| s.persist);
            config.session = Some(SessionConfig {
                file: Some(file.clone()),
                persist,
            });
        }

        Ok(config)
    }
}
