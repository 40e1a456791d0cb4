//! Delta computation: the environment changes produced by loading or
//! unloading applications
//!
//! `compute_add` and `compute_remove` take the catalog, the request tokens,
//! the current OS, and a read-only snapshot of the ambient environment, and
//! return only the variables that change. Adds are all-or-nothing; removals
//! skip and report unresolvable items.

use crate::catalog::{Catalog, MutationMode, OsEntry};
use crate::env::{EnvironmentSnapshot, REGISTRY_VAR, Segment};
use crate::error::CoreError;
use crate::resolver::{self, AppSelection};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// The computed value for a single touched variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarChange {
    /// Set the variable to these segments, colon-joined when rendered
    Set(Vec<Segment>),
    /// The variable lost every segment; render an explicit unset
    Unset,
}

/// Output of the delta engine: the variables that changed, and nothing else
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvDelta {
    changes: BTreeMap<String, VarChange>,
}

impl EnvDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, variable: impl Into<String>, change: VarChange) {
        self.changes.insert(variable.into(), change);
    }

    pub fn get(&self, variable: &str) -> Option<&VarChange> {
        self.changes.get(variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VarChange)> {
        self.changes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Produce the snapshot that results from applying this delta to `base`.
    ///
    /// `Inherit` segments resolve to the variable's base value, or to
    /// nothing when the variable is unset there. A variable left with zero
    /// segments disappears from the result.
    pub fn apply_to(&self, base: &EnvironmentSnapshot) -> EnvironmentSnapshot {
        let mut next = base.clone();
        for (variable, change) in &self.changes {
            match change {
                VarChange::Unset => next.remove(variable),
                VarChange::Set(segments) => {
                    let mut resolved: Vec<String> = Vec::new();
                    for segment in segments {
                        match segment {
                            Segment::Literal(value) => {
                                if !value.is_empty() && !resolved.iter().any(|s| s == value) {
                                    resolved.push(value.clone());
                                }
                            }
                            Segment::Inherit => {
                                if let Some(existing) = base.get(variable) {
                                    for value in existing {
                                        if !resolved.iter().any(|s| s == value) {
                                            resolved.push(value.clone());
                                        }
                                    }
                                }
                            }
                        }
                    }
                    if resolved.is_empty() {
                        next.remove(variable);
                    } else {
                        next.set_segments(variable.clone(), resolved);
                    }
                }
            }
        }
        next
    }
}

/// Per-variable mutation groups accumulated across one add call, each in
/// token order
#[derive(Debug, Default)]
struct PendingMutations {
    appends: Vec<String>,
    prefixes: Vec<String>,
    overwrites: Vec<String>,
}

/// Compute the delta produced by loading `tokens`, in order.
///
/// The whole call fails if any token fails to resolve. A token whose
/// (application, version) pair was already processed earlier in the same
/// call is skipped, so a repeated token is idempotent. Per variable, the
/// grouped application order is: appends to the back, prefixes to the
/// front (last prefix ends up frontmost), then overwrites (last one wins,
/// replacing the whole list). A variable whose computed value reproduces
/// the snapshot exactly is left out of the delta.
pub fn compute_add<S: AsRef<str>>(
    catalog: &Catalog,
    tokens: &[S],
    current_os: &str,
    base_env: &EnvironmentSnapshot,
) -> Result<EnvDelta, CoreError> {
    // Resolve everything up front: an add is all-or-nothing.
    let mut resolved: Vec<(AppSelection, &OsEntry)> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for token in tokens {
        let (selection, entry) = resolver::resolve(catalog, token.as_ref(), current_os)?;
        let key = (selection.application.clone(), selection.version.clone());
        if !seen.insert(key) {
            debug!(token = token.as_ref(), "already processed in this call, skipping");
            continue;
        }
        resolved.push((selection, entry));
    }

    let mut pending: BTreeMap<String, PendingMutations> = BTreeMap::new();
    for (selection, entry) in &resolved {
        for mutation in &entry.env {
            // Front-insertion intent turns Append into Prefix for this
            // call only; the catalog itself is untouched.
            let mode = match (selection.front, mutation.mode) {
                (true, MutationMode::Append) => MutationMode::Prefix,
                (_, mode) => mode,
            };
            let slot = pending.entry(mutation.variable.clone()).or_default();
            match mode {
                MutationMode::Append => slot.appends.push(mutation.value.clone()),
                MutationMode::Prefix => slot.prefixes.push(mutation.value.clone()),
                MutationMode::Overwrite => slot.overwrites.push(mutation.value.clone()),
            }
        }
    }

    let mut delta = EnvDelta::new();
    for (variable, group) in pending {
        let segments = if let Some(last) = group.overwrites.last() {
            vec![Segment::literal(last)]
        } else {
            let mut segments: Vec<Segment> = match base_env.get(&variable) {
                Some(existing) => existing.iter().cloned().map(Segment::Literal).collect(),
                // Chain onto whatever the live shell already has.
                None => vec![Segment::Inherit],
            };
            for value in group.appends {
                segments.push(Segment::Literal(value));
            }
            for value in group.prefixes {
                segments.insert(0, Segment::Literal(value));
            }
            dedupe(segments)
        };
        // Re-adding a loaded application must not re-export values the
        // shell already holds.
        if matches_base(&segments, base_env.get(&variable)) {
            continue;
        }
        delta.insert(variable, VarChange::Set(segments));
    }

    // Registry bookkeeping: record each resolved pair, append semantics,
    // skipping pairs already present.
    let mut registry: Vec<Segment> = match base_env.get(REGISTRY_VAR) {
        Some(existing) => existing.iter().cloned().map(Segment::Literal).collect(),
        None => vec![Segment::Inherit],
    };
    for (selection, _) in &resolved {
        let pair = selection.registry_segment();
        if !registry
            .iter()
            .any(|s| s.as_literal() == Some(pair.as_str()))
        {
            registry.push(Segment::Literal(pair));
        }
    }
    if !matches_base(&registry, base_env.get(REGISTRY_VAR)) {
        delta.insert(REGISTRY_VAR, VarChange::Set(registry));
    }

    Ok(delta)
}

/// Compute the delta produced by unloading `tokens`.
///
/// The set of currently-loaded applications comes from the registry
/// variable; stale registry segments and unknown removal tokens are
/// reported and skipped, never fatal. A value also declared by an
/// application that stays loaded is never deleted. The registry variable
/// itself is read but not rewritten.
pub fn compute_remove<S: AsRef<str>>(
    catalog: &Catalog,
    tokens: &[S],
    current_os: &str,
    base_env: &EnvironmentSnapshot,
) -> Result<EnvDelta, CoreError> {
    let Some(registry) = base_env.get(REGISTRY_VAR) else {
        return Err(CoreError::NothingLoaded(REGISTRY_VAR));
    };

    let mut loaded: Vec<(AppSelection, &OsEntry)> = Vec::new();
    for segment in registry {
        match resolver::resolve(catalog, segment, current_os) {
            Ok(pair) => loaded.push(pair),
            Err(e) => warn!(
                segment = %segment,
                error = %e,
                "skipping unresolvable registry entry"
            ),
        }
    }

    // Removal targets are base application names; versions are ignored.
    let mut targets: BTreeSet<String> = BTreeSet::new();
    if tokens.iter().any(|t| t.as_ref() == "all") {
        targets.extend(loaded.iter().map(|(s, _)| s.application.clone()));
    } else {
        for token in tokens {
            let parsed = resolver::parse_token(token.as_ref());
            if catalog.get(parsed.application).is_none() {
                warn!(
                    token = token.as_ref(),
                    "skipping unknown application in removal request"
                );
                continue;
            }
            targets.insert(parsed.application.to_string());
        }
    }

    // Removing something that is not loaded is a no-op, not an error.
    let (removed, kept): (Vec<_>, Vec<_>) = loaded
        .into_iter()
        .partition(|(s, _)| targets.contains(&s.application));

    // Values still required by applications that stay loaded.
    let mut keep_vars: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    for (_, entry) in &kept {
        for mutation in &entry.env {
            keep_vars
                .entry(mutation.variable.as_str())
                .or_default()
                .insert(mutation.value.as_str());
        }
    }

    let mut working: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut touched: BTreeSet<String> = BTreeSet::new();
    for (_, entry) in &removed {
        for mutation in &entry.env {
            let still_required = keep_vars
                .get(mutation.variable.as_str())
                .is_some_and(|keep| keep.contains(mutation.value.as_str()));
            if still_required {
                continue;
            }
            let segments = working.entry(mutation.variable.clone()).or_insert_with(|| {
                base_env
                    .get(&mutation.variable)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default()
            });
            let before = segments.len();
            segments.retain(|s| s != &mutation.value);
            if segments.len() != before {
                touched.insert(mutation.variable.clone());
            }
        }
    }

    let mut delta = EnvDelta::new();
    for variable in touched {
        let segments = working.remove(&variable).unwrap_or_default();
        if segments.is_empty() {
            delta.insert(variable, VarChange::Unset);
        } else {
            delta.insert(
                variable,
                VarChange::Set(segments.into_iter().map(Segment::Literal).collect()),
            );
        }
    }
    Ok(delta)
}

/// True when a computed segment list reproduces the base value exactly
fn matches_base(segments: &[Segment], base: Option<&[String]>) -> bool {
    match base {
        None => segments == [Segment::Inherit],
        Some(base) => {
            segments.len() == base.len()
                && segments
                    .iter()
                    .zip(base)
                    .all(|(segment, value)| segment.as_literal() == Some(value.as_str()))
        }
    }
}

/// Order-preserving dedup; the first occurrence of a segment wins
fn dedupe(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        let duplicate = match &segment {
            Segment::Literal(value) => out.iter().any(|s| s.as_literal() == Some(value)),
            Segment::Inherit => out.contains(&Segment::Inherit),
        };
        if !duplicate {
            out.push(segment);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSource;

    const CATALOG: &str = r#"
alpha:
  name: Alpha
  default_version: "1.0"
  versions:
    "1.0":
      linux:
        env:
          - PATH: /opt/alpha/1.0/bin
          - PATH: /shared/bin
          - MANPATH: /opt/alpha/1.0/man
beta:
  name: Beta
  default_version: "2.0"
  versions:
    "2.0":
      linux:
        env:
          - PATH+: /opt/beta/2.0/bin
          - PATH: /shared/bin
gamma:
  name: Gamma
  default_version: "3.0"
  versions:
    "3.0":
      linux:
        env:
          - PATH+: /opt/gamma/3.0/bin
          - EDITOR!: gvim
"#;

    fn catalog() -> Catalog {
        let source = CatalogSource::new("test.yaml", serde_yaml::from_str(CATALOG).unwrap());
        Catalog::build(&[source]).unwrap()
    }

    fn literals(change: &VarChange) -> Vec<&str> {
        match change {
            VarChange::Set(segments) => segments.iter().filter_map(Segment::as_literal).collect(),
            VarChange::Unset => panic!("expected a set change"),
        }
    }

    #[test]
    fn test_add_appends_after_existing_value() {
        let mut env = EnvironmentSnapshot::new();
        env.set("PATH", "/usr/bin");
        let delta = compute_add(&catalog(), &["alpha"], "linux", &env).unwrap();
        assert_eq!(
            literals(delta.get("PATH").unwrap()),
            ["/usr/bin", "/opt/alpha/1.0/bin", "/shared/bin"]
        );
        assert_eq!(
            literals(delta.get(REGISTRY_VAR).unwrap()),
            ["alpha/1.0"]
        );
    }

    #[test]
    fn test_add_absent_variable_starts_from_inherit_placeholder() {
        let delta =
            compute_add(&catalog(), &["alpha"], "linux", &EnvironmentSnapshot::new()).unwrap();
        let VarChange::Set(segments) = delta.get("MANPATH").unwrap() else {
            panic!("expected set");
        };
        assert_eq!(
            segments.as_slice(),
            [Segment::Inherit, Segment::literal("/opt/alpha/1.0/man")]
        );
    }

    #[test]
    fn test_add_is_all_or_nothing() {
        let env = EnvironmentSnapshot::new();
        let err = compute_add(&catalog(), &["alpha", "nosuch"], "linux", &env).unwrap_err();
        assert!(matches!(err, CoreError::UnknownApplication(_)));
    }

    #[test]
    fn test_add_duplicate_token_is_idempotent() {
        let env = EnvironmentSnapshot::new();
        let once = compute_add(&catalog(), &["alpha"], "linux", &env).unwrap();
        let twice = compute_add(&catalog(), &["alpha", "alpha"], "linux", &env).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_add_re_adding_loaded_application_changes_nothing() {
        let env0 = EnvironmentSnapshot::new();
        let env1 = compute_add(&catalog(), &["alpha", "beta"], "linux", &env0)
            .unwrap()
            .apply_to(&env0);
        let env2 = compute_add(&catalog(), &["alpha"], "linux", &env1)
            .unwrap()
            .apply_to(&env1);
        assert_eq!(env1, env2);
    }

    #[test]
    fn test_add_of_loaded_application_emits_no_changes() {
        let env0 = EnvironmentSnapshot::new();
        let env1 = compute_add(&catalog(), &["alpha"], "linux", &env0)
            .unwrap()
            .apply_to(&env0);

        // Everything alpha sets is already in place; no variable changed,
        // so nothing gets re-exported.
        let delta = compute_add(&catalog(), &["alpha"], "linux", &env1).unwrap();
        assert!(delta.is_empty(), "{delta:?}");
    }

    #[test]
    fn test_add_later_prefix_lands_frontmost() {
        let env = EnvironmentSnapshot::new();
        let delta = compute_add(&catalog(), &["beta", "gamma"], "linux", &env).unwrap();
        let path = literals(delta.get("PATH").unwrap());
        let beta = path.iter().position(|s| *s == "/opt/beta/2.0/bin").unwrap();
        let gamma = path.iter().position(|s| *s == "/opt/gamma/3.0/bin").unwrap();
        assert!(gamma < beta, "{path:?}");
    }

    #[test]
    fn test_front_insertion_overrides_append_for_one_call() {
        let mut env = EnvironmentSnapshot::new();
        env.set("PATH", "/usr/bin");

        let fronted = compute_add(&catalog(), &["+alpha"], "linux", &env).unwrap();
        let path = literals(fronted.get("PATH").unwrap());
        assert_eq!(path, ["/shared/bin", "/opt/alpha/1.0/bin", "/usr/bin"]);

        // The catalog is unchanged: a plain token still appends.
        let plain = compute_add(&catalog(), &["alpha"], "linux", &env).unwrap();
        let path = literals(plain.get("PATH").unwrap());
        assert_eq!(path, ["/usr/bin", "/opt/alpha/1.0/bin", "/shared/bin"]);
    }

    #[test]
    fn test_overwrite_replaces_entire_value() {
        let mut env = EnvironmentSnapshot::new();
        env.set("EDITOR", "vi");
        let delta = compute_add(&catalog(), &["gamma"], "linux", &env).unwrap();
        assert_eq!(
            delta.get("EDITOR").unwrap(),
            &VarChange::Set(vec![Segment::literal("gvim")])
        );
    }

    #[test]
    fn test_registry_skips_already_loaded_pairs() {
        let mut env = EnvironmentSnapshot::new();
        env.set(REGISTRY_VAR, "alpha/1.0");
        let delta = compute_add(&catalog(), &["alpha", "beta"], "linux", &env).unwrap();
        assert_eq!(
            literals(delta.get(REGISTRY_VAR).unwrap()),
            ["alpha/1.0", "beta/2.0"]
        );
    }

    #[test]
    fn test_remove_with_empty_registry_fails() {
        let err = compute_remove(&catalog(), &["alpha"], "linux", &EnvironmentSnapshot::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::NothingLoaded(_)));
    }

    #[test]
    fn test_remove_preserves_values_shared_with_kept_applications() {
        let env0 = EnvironmentSnapshot::new();
        let env1 = compute_add(&catalog(), &["alpha", "beta"], "linux", &env0)
            .unwrap()
            .apply_to(&env0);

        let delta = compute_remove(&catalog(), &["alpha"], "linux", &env1).unwrap();
        let path = literals(delta.get("PATH").unwrap());
        assert!(!path.contains(&"/opt/alpha/1.0/bin"));
        // Beta still needs /shared/bin; it must survive alpha's removal.
        assert!(path.contains(&"/shared/bin"));
        // MANPATH loses its only segment and becomes an explicit unset.
        assert_eq!(delta.get("MANPATH").unwrap(), &VarChange::Unset);
        // The registry variable is read, never rewritten.
        assert!(delta.get(REGISTRY_VAR).is_none());
    }

    #[test]
    fn test_add_then_remove_round_trips() {
        let env0 = EnvironmentSnapshot::new();
        let env1 = compute_add(&catalog(), &["alpha"], "linux", &env0)
            .unwrap()
            .apply_to(&env0);
        let env2 = compute_remove(&catalog(), &["alpha"], "linux", &env1)
            .unwrap()
            .apply_to(&env1);
        assert!(env2.get("PATH").is_none());
        assert!(env2.get("MANPATH").is_none());
    }

    #[test]
    fn test_remove_all_clears_every_touched_variable() {
        let env0 = EnvironmentSnapshot::new();
        let env1 = compute_add(&catalog(), &["alpha", "beta", "gamma"], "linux", &env0)
            .unwrap()
            .apply_to(&env0);

        let delta = compute_remove(&catalog(), &["all"], "linux", &env1).unwrap();
        assert_eq!(delta.get("PATH").unwrap(), &VarChange::Unset);
        assert_eq!(delta.get("MANPATH").unwrap(), &VarChange::Unset);
        assert_eq!(delta.get("EDITOR").unwrap(), &VarChange::Unset);
    }

    #[test]
    fn test_remove_unknown_or_unloaded_items_are_skipped() {
        let env0 = EnvironmentSnapshot::new();
        let env1 = compute_add(&catalog(), &["alpha"], "linux", &env0)
            .unwrap()
            .apply_to(&env0);

        // "nosuch" is unknown, "beta" is known but not loaded; neither aborts.
        let delta = compute_remove(&catalog(), &["nosuch", "beta"], "linux", &env1).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn test_remove_tolerates_stale_registry_segments() {
        let env0 = EnvironmentSnapshot::new();
        let mut env1 = compute_add(&catalog(), &["alpha"], "linux", &env0)
            .unwrap()
            .apply_to(&env0);
        env1.set(REGISTRY_VAR, "alpha/1.0:ghost/9.9");

        let delta = compute_remove(&catalog(), &["alpha"], "linux", &env1).unwrap();
        assert_eq!(delta.get("MANPATH").unwrap(), &VarChange::Unset);
    }
}
