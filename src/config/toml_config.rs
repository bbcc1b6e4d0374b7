use crate::core::ConfigProvider;
use crate::domain::model::UploadMode;
use crate::utils::error::{HfsError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_PROGRESS_THRESHOLD: u64 = 1024 * 1024;
pub const DEFAULT_SESSION_FILE: &str = ".hfs-session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub auth: Option<AuthConfig>,
    pub upload: Option<UploadConfig>,
    pub session: Option<SessionConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub existing: Option<UploadMode>,
    pub progress_threshold_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub file: Option<String>,
    pub persist: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl TomlConfig {
    /// 只有伺服器位址的最小配置
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            server: ServerConfig {
                url: url.into(),
                timeout_seconds: None,
            },
            auth: None,
            upload: None,
            session: None,
            logging: None,
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(HfsError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| HfsError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${HFS_PASSWORD})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| HfsError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn username(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.username.as_str())
    }

    pub fn password(&self) -> Option<&str> {
        self.auth.as_ref().and_then(|a| a.password.as_deref())
    }

    pub fn session_file(&self) -> &str {
        self.session
            .as_ref()
            .and_then(|s| s.file.as_deref())
            .unwrap_or(DEFAULT_SESSION_FILE)
    }

    pub fn persist_session(&self) -> bool {
        self.session
            .as_ref()
            .and_then(|s| s.persist)
            .unwrap_or(true)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_url("server.url", &self.server.url)?;

        if let Some(timeout) = self.server.timeout_seconds {
            validate_range("server.timeout_seconds", timeout, 1, 3600)?;
        }

        if let Some(auth) = &self.auth {
            validate_non_empty_string("auth.username", &auth.username)?;
            if let Some(password) = &auth.password {
                if password.starts_with("${") && password.ends_with('}') {
                    return Err(HfsError::InvalidConfigValueError {
                        field: "auth.password".to_string(),
                        value: password.clone(),
                        reason: "environment variable is not set".to_string(),
                    });
                }
            }
        }

        if let Some(threshold) = self
            .upload
            .as_ref()
            .and_then(|u| u.progress_threshold_bytes)
        {
            validate_range("upload.progress_threshold_bytes", threshold, 1, u64::MAX)?;
        }

        validate_path("session.file", self.session_file())?;

        if let Some(level) = self.log_level() {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if !valid_levels.contains(&level) {
                return Err(HfsError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.to_string(),
                    reason: format!("Valid levels: {}", valid_levels.join(", ")),
                });
            }
        }

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn server_url(&self) -> &str {
        &self.server.url
    }

    fn timeout_seconds(&self) -> u64 {
        self.server.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    fn progress_threshold(&self) -> u64 {
        self.upload
            .as_ref()
            .and_then(|u| u.progress_threshold_bytes)
            .unwrap_or(DEFAULT_PROGRESS_THRESHOLD)
    }

    fn upload_mode(&self) -> UploadMode {
        self.upload
            .as_ref()
            .and_then(|u| u.existing)
            .unwrap_or_default()
    }
}
