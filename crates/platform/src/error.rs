//! Error types for setapp-platform

use thiserror::Error;

/// Errors that can occur in platform operations
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("failed to determine home directory")]
    NoHomeDirectory,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("unknown shell '{0}' (supported: bash, csh)")]
    UnknownShell(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
