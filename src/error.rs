use serde::Serialize;
use std::fmt;

/// Application error types surfaced to callers as user-facing messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    /// Errors related to local file storage
    Storage(String),
    /// Input rejected before any persistence happened
    Validation(String),
    /// A reminder or task could not be resolved
    NotFound(String),
    /// The scheduled instance already has a taken/skipped record
    AlreadyCompleted(String),
    /// Errors reported by the notification service
    Notification(String),
    /// Errors related to the remote document store
    Network(String),
    /// The remote copy changed since it was last read
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::AlreadyCompleted(msg) => write!(f, "Already completed: {}", msg),
            AppError::Notification(msg) => write!(f, "Notification error: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Storage(error.to_string())
    }
}

// Convenience constructors
impl AppError {
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        AppError::Storage(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn already_completed<S: Into<String>>(msg: S) -> Self {
        AppError::AlreadyCompleted(msg.into())
    }

    pub fn notification<S: Into<String>>(msg: S) -> Self {
        AppError::Notification(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        AppError::Network(msg.into())
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        AppError::Conflict(msg.into())
    }

    /// Errors from the remote copy. Storage writes report these only after
    /// the local save went through.
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Conflict(_))
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;

/// The `{success, data, error}` object handed back to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AppError>,
}

impl<T> From<AppResult<T>> for ActionResult<T> {
    fn from(result: AppResult<T>) -> Self {
        match result {
            Ok(data) => ActionResult {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(error) => ActionResult {
                success: false,
                data: None,
                error: Some(error),
            },
        }
    }
}
