//! Catalog and output file locations, plus atomic script replacement

use crate::error::PlatformError;
use crate::shell::Shell;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default system-wide catalog file
pub const SYSTEM_CATALOG: &str = "/etc/setapp/inputs.yaml";

const CONFIG_FILE_VAR: &str = "SETAPP_CONFIG_FILE";
const ENV_FILE_VAR: &str = "SETAPP_ENV_FILE";

/// System-wide catalog file; `SETAPP_CONFIG_FILE` overrides the default
pub fn system_catalog_file() -> PathBuf {
    env::var_os(CONFIG_FILE_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SYSTEM_CATALOG))
}

/// Per-user override catalog, `~/.config/setapp/inputs.yaml`
pub fn user_catalog_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/setapp/inputs.yaml"))
}

/// Shell script the computed delta is written to; `SETAPP_ENV_FILE`
/// overrides the default `~/.setapp.{sh,csh}`
pub fn env_script_file(shell: Shell) -> Result<PathBuf, PlatformError> {
    if let Some(path) = env::var_os(ENV_FILE_VAR) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or(PlatformError::NoHomeDirectory)?;
    Ok(home.join(format!(".setapp.{}", shell.script_extension())))
}

/// Write `content` to `path`, replacing the file atomically.
///
/// The script is staged in a temporary file in the target directory and
/// renamed into place, so a crash mid-write never leaves a partial file.
pub fn write_script(path: &Path, content: &str) -> Result<(), PlatformError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| PlatformError::InvalidPath(path.display().to_string()))?;
    fs::create_dir_all(dir)?;

    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(content.as_bytes())?;
    staged.persist(path).map_err(|e| PlatformError::Io(e.error))?;
    debug!(path = %path.display(), "wrote environment script");
    Ok(())
}
