use thiserror::Error;

#[derive(Error, Debug)]
pub enum HfsError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Directory walk failed: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Does not exist: {0}")]
    NotExists(String),

    #[error("Server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid response from server: {message}")]
    InvalidResponse { message: String },

    #[error("Move failed for {failed} of {total} items")]
    MoveFailed { failed: usize, total: usize },

    #[error("Refusing to delete \"/\" without force")]
    RootDeleteRefused,

    #[error("Local path \"{0}\" does not exist")]
    LocalNotFound(String),

    #[error("Local path \"{0}\" is a directory")]
    NotAFile(String),

    #[error("Local path \"{0}\" is not a directory")]
    NotADirectory(String),

    #[error("Transfer of \"{0}\" cancelled")]
    Cancelled(String),

    #[error("Transfer of \"{path}\" incomplete: received {received} of {expected} bytes")]
    IncompleteTransfer {
        path: String,
        expected: u64,
        received: u64,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Authorization,
    Remote,
    LocalFilesystem,
    Configuration,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl HfsError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            HfsError::ApiError(_) | HfsError::UrlError(_) => ErrorCategory::Network,
            HfsError::AuthorizationFailed(_) => ErrorCategory::Authorization,
            HfsError::AlreadyExists(_)
            | HfsError::NotExists(_)
            | HfsError::HttpStatus { .. }
            | HfsError::MoveFailed { .. }
            | HfsError::RootDeleteRefused => ErrorCategory::Remote,
            HfsError::IncompleteTransfer { .. } => ErrorCategory::Network,
            HfsError::IoError(_)
            | HfsError::WalkError(_)
            | HfsError::LocalNotFound(_)
            | HfsError::NotAFile(_)
            | HfsError::NotADirectory(_)
            | HfsError::Cancelled(_) => ErrorCategory::LocalFilesystem,
            HfsError::ConfigValidationError { .. }
            | HfsError::InvalidConfigValueError { .. }
            | HfsError::MissingConfigError { .. } => ErrorCategory::Configuration,
            HfsError::SerializationError(_) | HfsError::InvalidResponse { .. } => {
                ErrorCategory::Data
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HfsError::AlreadyExists(_) | HfsError::Cancelled(_) => ErrorSeverity::Low,
            HfsError::ApiError(_) | HfsError::IncompleteTransfer { .. } => ErrorSeverity::Medium,
            HfsError::HttpStatus { status, .. } if *status >= 500 => ErrorSeverity::Medium,
            HfsError::IoError(_) | HfsError::WalkError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// CLI 退出碼；Low 代表操作沒有執行（已存在、被取消），仍需非零
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 5,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check the server URL and your network connection",
            ErrorCategory::Authorization => {
                "Run `hfs login` again or check the account's permissions"
            }
            ErrorCategory::Remote => "Check the remote path with `hfs ls` and try again",
            ErrorCategory::LocalFilesystem => "Check the local path and its permissions",
            ErrorCategory::Configuration => "Fix the configuration file or command line flags",
            ErrorCategory::Data => "The server response was unexpected; check the HFS version",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            HfsError::ApiError(e) if e.is_timeout() => "The server did not respond in time".to_string(),
            HfsError::ApiError(e) if e.is_connect() => "Could not connect to the server".to_string(),
            HfsError::AuthorizationFailed(_) => format!("Access denied ({})", self),
            HfsError::HttpStatus { status, .. } => {
                format!("The server rejected the request with HTTP {}", status)
            }
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HfsError>;
