// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
///
/// Only `Config` is fatal to a batch. Per-command problems (launch errors,
/// non-zero exits, timeouts) are folded into the `RunReport` instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// True for errors that must abort the run before any work starts
    pub fn is_config(&self) -> bool {
        matches!(self, AppError::Config(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
