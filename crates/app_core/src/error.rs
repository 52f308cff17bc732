//! Application error types

use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Recoverable Errors (logged or shown, session continues) =====
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No folder is open")]
    NoSession,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    // ===== Fatal Errors (startup aborts) =====
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Init(String),
}

impl AppError {
    /// Is this error recoverable?
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Io(_) | AppError::NotFound(_) | AppError::NoSession
                | AppError::Persistence(_)
                | AppError::Metadata(_)
        )
    }

    /// Is this a fatal error?
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Get a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(what) => format!("Not found: {}", what),
            AppError::NoSession => "Open a folder first.".to_string(),
            AppError::Persistence(_) => "Could not save changes. They have been reverted.".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<app_db::DbError> for AppError {
    fn from(e: app_db::DbError) -> Self {
        match e {
            app_db::DbError::NotFound(msg) => AppError::NotFound(msg),
            app_db::DbError::Io(e) => AppError::Io(e),
            _ => AppError::Persistence(e.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Persistence(format!("background task failed: {}", e))
    }
}
