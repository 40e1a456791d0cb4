//! Error types for setapp-core

use thiserror::Error;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// The catalog failed structural validation. Every violation found is
    /// collected; no partial catalog is produced.
    #[error("catalog validation failed with {} violation(s)", violations.len())]
    Validation { violations: Vec<String> },

    #[error("unknown application '{0}'")]
    UnknownApplication(String),

    #[error("unknown version '{version}' for application '{application}'")]
    UnknownVersion {
        application: String,
        version: String,
    },

    #[error("'{application}/{version}' has no entry for OS '{os}'")]
    UnsupportedOs {
        application: String,
        version: String,
        os: String,
    },

    #[error("nothing is loaded: {0} is not set in the environment")]
    NothingLoaded(&'static str),
}
