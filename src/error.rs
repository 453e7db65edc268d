use std::path::PathBuf;

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// The kernel lacks the gadget interface this operation needs
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The caller asked for a combination the device model cannot express
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Image not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;
