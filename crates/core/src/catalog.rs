//! Catalog types and construction
//!
//! A catalog is the immutable, validated result of merging one or more raw
//! YAML documents describing applications, their versions, and the per-OS
//! environment effects of loading them. Later sources shallow-override
//! earlier ones per application key; `OS_aliases` declarations merge
//! additively with later documents winning per key.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level document key carrying OS alias declarations
pub const OS_ALIASES_KEY: &str = "OS_aliases";

/// Per-OS entry fields the validator accepts
const RECOGNIZED_FIELDS: [&str; 5] = ["env", "alias_sh", "alias_csh", "function_def", "doc"];

/// How a declared value combines with the existing variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationMode {
    /// Push to the end of the existing segment list
    Append,
    /// Insert at the front of the existing segment list
    Prefix,
    /// Replace the entire value
    Overwrite,
}

impl MutationMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MutationMode::Append => "append",
            MutationMode::Prefix => "prefix",
            MutationMode::Overwrite => "overwrite",
        }
    }
}

impl std::fmt::Display for MutationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single environment-variable effect declared by a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarMutation {
    /// Variable name with the mode suffix stripped
    pub variable: String,
    pub mode: MutationMode,
    pub value: String,
}

impl VarMutation {
    /// Decode a raw `key: value` pair from a catalog `env` list.
    ///
    /// A trailing `+` on the key selects Prefix, a trailing `!` selects
    /// Overwrite, a bare name selects Append. The suffix is stripped here
    /// and nothing downstream re-inspects it.
    pub fn decode(raw_key: &str, value: impl Into<String>) -> Self {
        let (variable, mode) = if let Some(stripped) = raw_key.strip_suffix('+') {
            (stripped, MutationMode::Prefix)
        } else if let Some(stripped) = raw_key.strip_suffix('!') {
            (stripped, MutationMode::Overwrite)
        } else {
            (raw_key, MutationMode::Append)
        };
        Self {
            variable: variable.to_string(),
            mode,
            value: value.into(),
        }
    }
}

/// Per-OS payload of a version entry
///
/// The alias and function pairs are opaque to the core; they are carried
/// through to the renderer untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsEntry {
    /// Ordered environment-variable mutations
    pub env: Vec<VarMutation>,
    /// Aliases for sh-family shells, as (name, body) pairs
    pub alias_sh: Vec<(String, String)>,
    /// Aliases for csh-family shells, as (name, body) pairs
    pub alias_csh: Vec<(String, String)>,
    /// Shell function definitions, as (name, body) pairs
    pub function_def: Vec<(String, String)>,
    /// Free-form documentation line
    pub doc: Option<String>,
    /// Source file this entry came from (diagnostics only)
    pub origin: PathBuf,
}

/// Mapping from canonical OS name to its entry for one version
pub type VersionEntry = BTreeMap<String, OsEntry>;

/// One application in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Display name
    pub name: String,
    /// Version used when a token carries none; must exist in `versions`
    pub default_version: String,
    pub versions: BTreeMap<String, VersionEntry>,
}

/// Mapping from raw OS-release string to canonical OS name
///
/// Seeded with the built-in defaults, extended by `OS_aliases` declarations
/// in catalog documents. The table is a value threaded through
/// [`Catalog::build`] and returned inside the catalog, never ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsAliasTable {
    aliases: BTreeMap<String, String>,
}

impl Default for OsAliasTable {
    fn default() -> Self {
        // Plain OS names map to themselves so a catalog keyed by "linux"
        // or "darwin" works without an OS_aliases block.
        let mut aliases = BTreeMap::new();
        for os in ["linux", "darwin", "windows"] {
            aliases.insert(os.to_string(), os.to_string());
        }
        Self { aliases }
    }
}

impl OsAliasTable {
    /// Look up the canonical name for a raw OS-release string
    pub fn canonical(&self, raw: &str) -> Option<&str> {
        self.aliases.get(raw).map(String::as_str)
    }

    /// True if `name` appears as a canonical name in the table
    pub fn is_canonical(&self, name: &str) -> bool {
        self.aliases.values().any(|v| v == name)
    }

    /// Add or replace one alias; the newcomer wins
    pub fn insert(&mut self, raw: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.insert(raw.into(), canonical.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One raw catalog document plus the file it came from
#[derive(Debug, Clone)]
pub struct CatalogSource {
    pub origin: PathBuf,
    pub document: Value,
}

impl CatalogSource {
    pub fn new(origin: impl Into<PathBuf>, document: Value) -> Self {
        Self {
            origin: origin.into(),
            document,
        }
    }
}

/// Validated, merged set of application definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    apps: BTreeMap<String, CatalogEntry>,
    os_aliases: OsAliasTable,
}

impl Catalog {
    /// Build a catalog from raw documents, in order.
    ///
    /// Each source first merges its `OS_aliases` block into the running
    /// alias table, then has its application entries validated against it.
    /// When two sources define the same application key, the later source
    /// fully replaces the earlier one (shallow override, not a deep merge).
    ///
    /// Validation collects every violation instead of stopping at the
    /// first; any violation fails the build atomically.
    pub fn build(sources: &[CatalogSource]) -> Result<Self, CoreError> {
        let mut os_aliases = OsAliasTable::default();
        let mut apps: BTreeMap<String, CatalogEntry> = BTreeMap::new();
        let mut violations: Vec<String> = Vec::new();

        for source in sources {
            let origin = source.origin.display();
            let Some(doc) = source.document.as_mapping() else {
                violations.push(format!("{origin}: top level must define a mapping"));
                continue;
            };

            if let Some(decl) = doc.get(OS_ALIASES_KEY) {
                merge_alias_block(decl, &origin.to_string(), &mut os_aliases, &mut violations);
            }

            for (key, value) in doc {
                let Some(app_key) = key.as_str() else {
                    violations.push(format!("{origin}: application keys must be strings"));
                    continue;
                };
                if app_key == OS_ALIASES_KEY {
                    continue;
                }
                if let Some(entry) =
                    validate_app(app_key, value, source, &os_aliases, &mut violations)
                {
                    // Later sources win per application key.
                    apps.insert(app_key.to_string(), entry);
                }
            }
        }

        if violations.is_empty() {
            Ok(Self { apps, os_aliases })
        } else {
            Err(CoreError::Validation { violations })
        }
    }

    pub fn get(&self, application: &str) -> Option<&CatalogEntry> {
        self.apps.get(application)
    }

    /// All applications, sorted by key
    pub fn entries(&self) -> impl Iterator<Item = (&str, &CatalogEntry)> {
        self.apps.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Canonical OS name for a raw OS-release string
    pub fn canonical_os(&self, raw: &str) -> Option<&str> {
        self.os_aliases.canonical(raw)
    }

    pub fn os_aliases(&self) -> &OsAliasTable {
        &self.os_aliases
    }
}

fn merge_alias_block(
    decl: &Value,
    origin: &str,
    table: &mut OsAliasTable,
    violations: &mut Vec<String>,
) {
    let Some(map) = decl.as_mapping() else {
        violations.push(format!("{origin}/{OS_ALIASES_KEY}: must define a mapping"));
        return;
    };
    for (raw, canonical) in map {
        match (raw.as_str(), canonical.as_str()) {
            (Some(raw), Some(canonical)) => table.insert(raw, canonical),
            _ => violations.push(format!(
                "{origin}/{OS_ALIASES_KEY}: entries must map strings to strings"
            )),
        }
    }
}

/// Validate one application entry, collecting violations.
///
/// Returns the typed entry when it is structurally sound; the overall build
/// still fails if any other entry produced a violation.
fn validate_app(
    app: &str,
    value: &Value,
    source: &CatalogSource,
    aliases: &OsAliasTable,
    violations: &mut Vec<String>,
) -> Option<CatalogEntry> {
    let before = violations.len();
    let Some(map) = value.as_mapping() else {
        violations.push(format!("{app}: must define a mapping"));
        return None;
    };

    let name = require_string(map, "name", app, violations);
    let default_version = require_string(map, "default_version", app, violations);

    let mut versions: BTreeMap<String, VersionEntry> = BTreeMap::new();
    match map.get("versions") {
        None => violations.push(format!("key \"versions\" missing for {app}")),
        Some(decl) => match decl.as_mapping() {
            None => violations.push(format!("key \"versions\" for {app} must define a mapping")),
            Some(decl) => {
                let mut declared: Vec<&str> = Vec::new();
                for (ver_key, ver_value) in decl {
                    let Some(version) = ver_key.as_str() else {
                        violations.push(format!("{app}/versions: version keys must be strings"));
                        continue;
                    };
                    declared.push(version);
                    if let Some(entry) =
                        validate_version(app, version, ver_value, source, aliases, violations)
                    {
                        versions.insert(version.to_string(), entry);
                    }
                }
                // Checked against the declared keys, not the surviving
                // typed entries, so an empty or partially-invalid versions
                // mapping cannot hide a dangling default.
                if let Some(default_version) = &default_version
                    && !declared.contains(&default_version.as_str())
                {
                    violations.push(format!(
                        "default version \"{default_version}\" for {app} is not defined in \"versions\""
                    ));
                }
            }
        },
    }

    if violations.len() > before {
        return None;
    }
    Some(CatalogEntry {
        name: name?,
        default_version: default_version?,
        versions,
    })
}

fn require_string(
    map: &Mapping,
    key: &str,
    app: &str,
    violations: &mut Vec<String>,
) -> Option<String> {
    match map.get(key) {
        None => {
            violations.push(format!("key \"{key}\" missing for {app}"));
            None
        }
        Some(value) => match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                violations.push(format!("key \"{key}\" for {app} must be a string"));
                None
            }
        },
    }
}

fn validate_version(
    app: &str,
    version: &str,
    value: &Value,
    source: &CatalogSource,
    aliases: &OsAliasTable,
    violations: &mut Vec<String>,
) -> Option<VersionEntry> {
    let Some(map) = value.as_mapping() else {
        violations.push(format!("{app}/versions/{version} must define a mapping"));
        return None;
    };

    let mut entry = VersionEntry::new();
    for (os_key, os_value) in map {
        let Some(os) = os_key.as_str() else {
            violations.push(format!("{app}/versions/{version}: OS keys must be strings"));
            continue;
        };
        if !aliases.is_canonical(os) {
            violations.push(format!(
                "{app}/versions/{version}: OS \"{os}\" is not defined in the {OS_ALIASES_KEY} map"
            ));
            continue;
        }
        let context = format!("{app}/versions/{version}/{os}");
        if let Some(os_entry) = validate_os_entry(&context, os_value, source, violations) {
            entry.insert(os.to_string(), os_entry);
        }
    }
    Some(entry)
}

fn validate_os_entry(
    context: &str,
    value: &Value,
    source: &CatalogSource,
    violations: &mut Vec<String>,
) -> Option<OsEntry> {
    let Some(map) = value.as_mapping() else {
        violations.push(format!("{context} must define a mapping"));
        return None;
    };

    for (key, _) in map {
        match key.as_str() {
            Some(k) if RECOGNIZED_FIELDS.contains(&k) => {}
            Some(k) => violations.push(format!(
                "{context}: unrecognized key \"{k}\" (allowed: {})",
                RECOGNIZED_FIELDS.join(", ")
            )),
            None => violations.push(format!("{context}: keys must be strings")),
        }
    }

    let mut entry = OsEntry {
        origin: source.origin.clone(),
        ..OsEntry::default()
    };

    if let Some(pairs) = pair_list(map, "env", context, violations) {
        entry.env = pairs
            .into_iter()
            .map(|(key, value)| VarMutation::decode(&key, value))
            .collect();
    }
    if let Some(pairs) = pair_list(map, "alias_sh", context, violations) {
        entry.alias_sh = pairs;
    }
    if let Some(pairs) = pair_list(map, "alias_csh", context, violations) {
        entry.alias_csh = pairs;
    }
    if let Some(pairs) = pair_list(map, "function_def", context, violations) {
        entry.function_def = pairs;
    }
    if let Some(doc) = map.get("doc") {
        match doc.as_str() {
            Some(doc) => entry.doc = Some(doc.to_string()),
            None => violations.push(format!("{context}/doc must be a string")),
        }
    }

    Some(entry)
}

/// Extract a mutation-list field: a sequence of single-key mappings.
fn pair_list(
    map: &Mapping,
    field: &str,
    context: &str,
    violations: &mut Vec<String>,
) -> Option<Vec<(String, String)>> {
    let decl = map.get(field)?;
    let Some(seq) = decl.as_sequence() else {
        violations.push(format!("{context}/{field} must define a list"));
        return None;
    };

    let mut pairs = Vec::with_capacity(seq.len());
    for item in seq {
        let single = item.as_mapping().filter(|m| m.len() == 1);
        let Some(single) = single else {
            violations.push(format!(
                "{context}/{field}: all entries must be single key : value pairs"
            ));
            continue;
        };
        for (key, value) in single {
            match (key.as_str(), scalar_string(value)) {
                (Some(key), Some(value)) => pairs.push((key.to_string(), value)),
                _ => violations.push(format!(
                    "{context}/{field}: all entries must be single key : value pairs"
                )),
            }
        }
    }
    Some(pairs)
}

/// Render a YAML scalar as a string value
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(yaml: &str) -> CatalogSource {
        CatalogSource::new("test.yaml", serde_yaml::from_str(yaml).unwrap())
    }

    fn violations(result: Result<Catalog, CoreError>) -> Vec<String> {
        match result {
            Err(CoreError::Validation { violations }) => violations,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    const MATLAB: &str = r#"
OS_aliases:
  5.15.0-generic: jammy
matlab:
  name: MATLAB
  default_version: "2022a"
  versions:
    "2022a":
      jammy:
        env:
          - PATH: /opt/matlab/2022a/bin
          - MATLAB_LICENSE_FILE!: /opt/licenses/matlab.lic
        alias_sh:
          - ml: matlab -nodesktop
        doc: numerical computing
"#;

    #[test]
    fn test_build_valid_catalog() {
        let catalog = Catalog::build(&[source(MATLAB)]).unwrap();
        let entry = catalog.get("matlab").unwrap();
        assert_eq!(entry.name, "MATLAB");
        assert_eq!(entry.default_version, "2022a");

        let os_entry = &entry.versions["2022a"]["jammy"];
        assert_eq!(os_entry.env.len(), 2);
        assert_eq!(os_entry.env[0].variable, "PATH");
        assert_eq!(os_entry.env[0].mode, MutationMode::Append);
        assert_eq!(os_entry.env[1].variable, "MATLAB_LICENSE_FILE");
        assert_eq!(os_entry.env[1].mode, MutationMode::Overwrite);
        assert_eq!(os_entry.alias_sh, vec![("ml".into(), "matlab -nodesktop".into())]);
        assert_eq!(os_entry.doc.as_deref(), Some("numerical computing"));
        assert_eq!(os_entry.origin, PathBuf::from("test.yaml"));
    }

    #[test]
    fn test_decode_mode_suffixes() {
        let append = VarMutation::decode("PATH", "/bin");
        assert_eq!(append.variable, "PATH");
        assert_eq!(append.mode, MutationMode::Append);

        let prefix = VarMutation::decode("PATH+", "/bin");
        assert_eq!(prefix.variable, "PATH");
        assert_eq!(prefix.mode, MutationMode::Prefix);

        let overwrite = VarMutation::decode("EDITOR!", "vim");
        assert_eq!(overwrite.variable, "EDITOR");
        assert_eq!(overwrite.mode, MutationMode::Overwrite);
    }

    #[test]
    fn test_alias_table_merge_precedence() {
        let first = source("OS_aliases:\n  5.15.0: jammy\n");
        let second = source("OS_aliases:\n  5.15.0: noble\n  6.8.0: noble\n");
        let catalog = Catalog::build(&[first, second]).unwrap();
        assert_eq!(catalog.canonical_os("5.15.0"), Some("noble"));
        assert_eq!(catalog.canonical_os("6.8.0"), Some("noble"));
        // Built-in seed survives the merge.
        assert_eq!(catalog.canonical_os("linux"), Some("linux"));
    }

    #[test]
    fn test_later_source_shallow_overrides() {
        let base = source(
            r#"
tool:
  name: Tool
  default_version: "1"
  versions:
    "1":
      linux:
        env:
          - PATH: /opt/tool/1/bin
    "2":
      linux:
        env:
          - PATH: /opt/tool/2/bin
"#,
        );
        let user = source(
            r#"
tool:
  name: My Tool
  default_version: "3"
  versions:
    "3":
      linux:
        env:
          - PATH: /home/me/tool/3/bin
"#,
        );
        let catalog = Catalog::build(&[base, user]).unwrap();
        let entry = catalog.get("tool").unwrap();
        // Full replacement: version "1" from the base source is gone.
        assert_eq!(entry.name, "My Tool");
        assert_eq!(entry.default_version, "3");
        assert_eq!(entry.versions.len(), 1);
    }

    #[test]
    fn test_collects_every_violation() {
        let bad = source(
            r#"
broken:
  name: Broken
  versions:
    "1":
      atari: {}
      linux:
        env:
          - PATH: /bin
        color: red
"#,
        );
        let violations = violations(Catalog::build(&[bad]));
        assert_eq!(violations.len(), 3, "{violations:?}");
        assert!(violations.iter().any(|v| v.contains("default_version")));
        assert!(violations.iter().any(|v| v.contains("atari")));
        assert!(violations.iter().any(|v| v.contains("color")));
    }

    #[test]
    fn test_default_version_must_exist() {
        let bad = source(
            r#"
tool:
  name: Tool
  default_version: "9"
  versions:
    "1":
      linux: {}
"#,
        );
        let violations = violations(Catalog::build(&[bad]));
        assert!(violations.iter().any(|v| v.contains("\"9\"")));
    }

    #[test]
    fn test_empty_versions_mapping_fails_default_version_check() {
        let bad = source(
            r#"
tool:
  name: Tool
  default_version: "1"
  versions: {}
"#,
        );
        let violations = violations(Catalog::build(&[bad]));
        assert!(violations.iter().any(|v| v.contains("default version \"1\"")));
    }

    #[test]
    fn test_env_entries_must_be_single_pairs() {
        let bad = source(
            r#"
tool:
  name: Tool
  default_version: "1"
  versions:
    "1":
      linux:
        env:
          - PATH: /bin
            MANPATH: /man
"#,
        );
        let violations = violations(Catalog::build(&[bad]));
        assert!(violations.iter().any(|v| v.contains("single key")));
    }

    #[test]
    fn test_valid_source_does_not_rescue_bad_one() {
        let good = source(MATLAB);
        let bad = source("junk:\n  name: Junk\n");
        // One bad entry fails the whole build; nothing partial survives.
        assert!(Catalog::build(&[good, bad]).is_err());
    }
}
