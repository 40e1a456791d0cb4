//! Token parsing and application/version resolution
//!
//! Resolution is pure: it reads the catalog and never mutates anything.

use crate::catalog::{Catalog, OsEntry};
use crate::error::CoreError;

/// A user-supplied token, split but not yet checked against the catalog.
///
/// Grammar: `["+"] application ["/" version]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub application: &'a str,
    pub version: Option<&'a str>,
    /// Leading `+` was present
    pub front: bool,
}

/// A resolved application request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSelection {
    pub application: String,
    pub version: String,
    /// Treat this application's Append mutations as Prefix, for the
    /// current call only
    pub front: bool,
}

impl AppSelection {
    /// The `app/version` form used by the registry variable
    pub fn registry_segment(&self) -> String {
        format!("{}/{}", self.application, self.version)
    }
}

/// Split a raw token into its parts
pub fn parse_token(raw: &str) -> Token<'_> {
    let (front, rest) = match raw.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    match rest.split_once('/') {
        Some((application, version)) => Token {
            application,
            version: Some(version),
            front,
        },
        None => Token {
            application: rest,
            version: None,
            front,
        },
    }
}

/// Resolve a token against the catalog and the current OS.
///
/// A token without a version resolves to the application's declared
/// default version.
pub fn resolve<'c>(
    catalog: &'c Catalog,
    raw: &str,
    current_os: &str,
) -> Result<(AppSelection, &'c OsEntry), CoreError> {
    let token = parse_token(raw);
    let entry = catalog
        .get(token.application)
        .ok_or_else(|| CoreError::UnknownApplication(token.application.to_string()))?;
    let version = token.version.unwrap_or(&entry.default_version);
    let version_entry =
        entry
            .versions
            .get(version)
            .ok_or_else(|| CoreError::UnknownVersion {
                application: token.application.to_string(),
                version: version.to_string(),
            })?;
    let os_entry = version_entry
        .get(current_os)
        .ok_or_else(|| CoreError::UnsupportedOs {
            application: token.application.to_string(),
            version: version.to_string(),
            os: current_os.to_string(),
        })?;

    let selection = AppSelection {
        application: token.application.to_string(),
        version: version.to_string(),
        front: token.front,
    };
    Ok((selection, os_entry))
}
