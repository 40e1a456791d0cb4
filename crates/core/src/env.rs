//! Environment snapshot capture and normalization
//!
//! The ambient process environment is captured once per invocation, with
//! PATH-like variables pre-split into ordered, deduplicated segment lists.
//! Snapshots are read-only inputs to the delta engine; applying a delta
//! produces a fresh copy, never an in-place mutation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The registry variable recording currently-loaded `app/version` pairs
pub const REGISTRY_VAR: &str = "SETAPP_TOOLS";

/// True if the variable's value is a colon-joined ordered list
pub fn is_list_valued(name: &str) -> bool {
    name.ends_with("PATH") || name.contains("LICENSE_FILE") || name == REGISTRY_VAR
}

/// Normalize a raw variable value into its segment list.
///
/// List-valued variables split on `:`, drop empty segments, and drop
/// duplicates (first occurrence wins, order preserved). Everything else is
/// a single-element list, never split.
pub fn normalize(raw: &str, list_valued: bool) -> Vec<String> {
    if !list_valued {
        return vec![raw.to_string()];
    }
    let mut segments: Vec<String> = Vec::new();
    for segment in raw.split(':') {
        if segment.is_empty() || segments.iter().any(|s| s == segment) {
            continue;
        }
        segments.push(segment.to_string());
    }
    segments
}

/// One element of a computed variable value.
///
/// `Inherit` stands for whatever value the live shell already holds; the
/// renderer emits an indirect reference (`${VAR}`) for it rather than a
/// copied literal, so session values not captured in the snapshot survive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Literal(String),
    Inherit,
}

impl Segment {
    pub fn literal(value: impl Into<String>) -> Self {
        Segment::Literal(value.into())
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Segment::Literal(value) => Some(value),
            Segment::Inherit => None,
        }
    }
}

/// The ambient environment, captured once per invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    vars: BTreeMap<String, Vec<String>>,
}

impl EnvironmentSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current process environment
    pub fn capture() -> Self {
        let mut snapshot = Self::new();
        for (name, value) in std::env::vars() {
            snapshot.set(&name, &value);
        }
        snapshot
    }

    /// Insert a variable from its raw string value, normalizing it
    pub fn set(&mut self, name: &str, raw: &str) {
        let segments = normalize(raw, is_list_valued(name));
        self.vars.insert(name.to_string(), segments);
    }

    /// Insert a variable from pre-split segments
    pub fn set_segments(&mut self, name: impl Into<String>, segments: Vec<String>) {
        self.vars.insert(name.into(), segments);
    }

    pub fn remove(&mut self, name: &str) {
        self.vars.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.vars.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
