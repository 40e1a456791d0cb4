//! Platform glue for setapp
//!
//! This crate provides the pieces outside the delta engine:
//! - OS-release detection (canonicalization happens through the catalog's
//!   alias table)
//! - Shell-specific rendering of computed deltas
//! - The file locations setapp reads and writes, with atomic replacement
//!   of the generated script

mod error;
mod os;
mod paths;
mod shell;

pub use error::PlatformError;
pub use os::{fallback_os, os_release};
pub use paths::{env_script_file, system_catalog_file, user_catalog_file, write_script};
pub use shell::{Shell, render_script};

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;
