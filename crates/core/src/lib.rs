//! setapp-core: the environment-delta engine for setapp
//!
//! This crate resolves application/version requests against a validated
//! catalog and computes the ordered, conflict-aware environment-variable
//! changes needed to load or unload applications for a shell session.
//! It never emits shell syntax; rendering is the caller's concern.

pub mod catalog;
pub mod delta;
pub mod env;
mod error;
pub mod resolver;

pub use catalog::{
    Catalog, CatalogEntry, CatalogSource, MutationMode, OsAliasTable, OsEntry, VarMutation,
    VersionEntry,
};
pub use delta::{EnvDelta, VarChange, compute_add, compute_remove};
pub use env::{EnvironmentSnapshot, REGISTRY_VAR, Segment, is_list_valued, normalize};
pub use error::CoreError;
pub use resolver::{AppSelection, Token, parse_token, resolve};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
