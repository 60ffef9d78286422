// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Process error: {0}")]
    Process(#[from] crate::port::ProcessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True for errors raised before the child process was ever started
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            AppError::Process(crate::port::ProcessError::LaunchFailed(_))
        )
    }
}
