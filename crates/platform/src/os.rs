//! OS-release detection
//!
//! setapp catalogs key their per-OS entries by canonical names that the
//! alias table maps raw OS-release strings onto. This module only supplies
//! the raw string; the lookup itself lives with the catalog.

use sysinfo::System;
use tracing::debug;

/// Raw OS-release string for alias-table lookup, e.g. a kernel release
/// like `"6.8.0-45-generic"`.
pub fn os_release() -> String {
    let release = System::kernel_version().unwrap_or_else(|| fallback_os().to_string());
    debug!(release = %release, "detected OS release");
    release
}

/// Compile-time OS name, used when no kernel release is available and as
/// the last-resort alias-table key.
pub const fn fallback_os() -> &'static str {
    if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else {
        "unknown"
    }
}
