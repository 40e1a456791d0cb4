//! Catalog loading from YAML sources
//!
//! Sources load in a fixed order: the system-wide file, then the per-user
//! override (whose application keys fully replace system ones). A missing
//! or unparsable source is reported and treated as empty rather than
//! aborting, mirroring the tolerant-merge contract; `--validate` goes
//! through the strict path instead.

use anyhow::{Context, Result};
use setapp_core::{Catalog, CatalogSource, CoreError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read one catalog source strictly: any failure is an error
pub fn read_source(path: &Path) -> Result<CatalogSource> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read catalog file {}", path.display()))?;
    let document = serde_yaml::from_str(&text)
        .with_context(|| format!("cannot parse catalog file {}", path.display()))?;
    Ok(CatalogSource::new(path, document))
}

/// Collect the catalog sources to load, tolerating missing or broken files.
///
/// With `infile` set, only that file is considered. Silently proceeding on
/// a broken primary catalog can mask real misconfiguration, so every skip
/// is logged.
fn load_sources(infile: Option<&Path>) -> Vec<CatalogSource> {
    let mut paths: Vec<PathBuf> = Vec::new();
    match infile {
        Some(path) => paths.push(path.to_path_buf()),
        None => {
            paths.push(setapp_platform::system_catalog_file());
            if let Some(user) = setapp_platform::user_catalog_file()
                && user.exists()
            {
                paths.push(user);
            }
        }
    }

    let mut sources = Vec::new();
    for path in paths {
        match read_source(&path) {
            Ok(source) => {
                debug!(file = %path.display(), "loaded catalog source");
                sources.push(source);
            }
            Err(e) => warn!(
                file = %path.display(),
                error = %e,
                "skipping catalog source"
            ),
        }
    }
    sources
}

/// Load and validate the merged catalog
pub fn load_catalog(infile: Option<&Path>) -> Result<Catalog, CoreError> {
    Catalog::build(&load_sources(infile))
}
