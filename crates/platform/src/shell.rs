//! Shell model and script rendering
//!
//! Consumes the render contract from setapp-core: a mapping from variable
//! name to either an ordered segment list or an explicit unset marker.
//! Inherited segments become an indirect `${VAR}` reference so the live
//! shell's own value survives, whatever it was.

use crate::error::PlatformError;
use setapp_core::{EnvDelta, OsEntry, Segment, VarChange};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Supported shell families
///
/// `Bash` covers sh/ksh/bash/zsh, `Csh` covers csh/tcsh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shell {
    #[default]
    Bash,
    Csh,
}

impl Shell {
    /// Detect the current shell family from `$SHELL`, defaulting to bash
    pub fn detect() -> Self {
        env::var("SHELL")
            .map(|path| Self::from_login_shell(&path))
            .unwrap_or_default()
    }

    /// Classify a login-shell path by its basename
    fn from_login_shell(path: &str) -> Self {
        let name = PathBuf::from(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_lowercase();
        if name.contains("csh") {
            Shell::Csh
        } else {
            Shell::Bash
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Csh => "csh",
        }
    }

    /// File extension for the generated script
    pub fn script_extension(&self) -> &'static str {
        match self {
            Shell::Bash => "sh",
            Shell::Csh => "csh",
        }
    }

    fn export_line(&self, name: &str, value: &str) -> String {
        match self {
            Shell::Bash => format!("export {name}=\"{value}\""),
            Shell::Csh => format!("setenv {name} \"{value}\""),
        }
    }

    fn unset_line(&self, name: &str) -> String {
        match self {
            Shell::Bash => format!("unset {name}"),
            Shell::Csh => format!("unsetenv {name}"),
        }
    }

    fn alias_line(&self, name: &str, body: &str) -> String {
        match self {
            Shell::Bash => format!("alias {name}='{body}'"),
            Shell::Csh => format!("alias {name} '{body}'"),
        }
    }
}

impl std::fmt::Display for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Shell {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bash" | "sh" | "ksh" | "zsh" => Ok(Shell::Bash),
            "csh" | "tcsh" => Ok(Shell::Csh),
            other => Err(PlatformError::UnknownShell(other.to_string())),
        }
    }
}

/// Join segments with `:`, emitting `${VAR}` for inherited prior values
fn render_value(name: &str, segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Literal(value) => value.clone(),
            Segment::Inherit => format!("${{{name}}}"),
        })
        .collect::<Vec<_>>()
        .join(":")
}

/// Render a computed delta, plus the alias and function definitions of the
/// loaded entries, as a shell-sourceable script.
pub fn render_script(shell: Shell, delta: &EnvDelta, entries: &[&OsEntry]) -> String {
    let mut lines = vec![
        "# Generated by setapp. Source this file; do not edit.".to_string(),
        String::new(),
    ];

    for (name, change) in delta.iter() {
        match change {
            VarChange::Set(segments) => {
                lines.push(shell.export_line(name, &render_value(name, segments)));
            }
            VarChange::Unset => lines.push(shell.unset_line(name)),
        }
    }

    for entry in entries {
        let aliases = match shell {
            Shell::Bash => &entry.alias_sh,
            Shell::Csh => &entry.alias_csh,
        };
        for (name, body) in aliases {
            lines.push(shell.alias_line(name, body));
        }
        // csh has no shell functions; definitions are sh-family only.
        if shell == Shell::Bash {
            for (name, body) in &entry.function_def {
                lines.push(format!("{name}() {{ {body}; }}"));
            }
        }
    }

    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use setapp_core::VarMutation;

    fn delta() -> EnvDelta {
        let mut delta = EnvDelta::new();
        delta.insert(
            "PATH",
            VarChange::Set(vec![
                Segment::literal("/opt/tool/bin"),
                Segment::Inherit,
            ]),
        );
        delta.insert("MANPATH", VarChange::Unset);
        delta
    }

    #[test]
    fn test_from_login_shell_classifies_basename() {
        assert_eq!(Shell::from_login_shell("/bin/tcsh"), Shell::Csh);
        assert_eq!(Shell::from_login_shell("/usr/local/bin/csh"), Shell::Csh);
        assert_eq!(Shell::from_login_shell("/usr/bin/zsh"), Shell::Bash);
        assert_eq!(Shell::from_login_shell(""), Shell::Bash);
    }

    #[test]
    fn test_shell_from_str() {
        assert_eq!("bash".parse::<Shell>().unwrap(), Shell::Bash);
        assert_eq!("zsh".parse::<Shell>().unwrap(), Shell::Bash);
        assert_eq!("tcsh".parse::<Shell>().unwrap(), Shell::Csh);
        assert!("fish".parse::<Shell>().is_err());
    }

    #[test]
    fn test_render_bash() {
        let script = render_script(Shell::Bash, &delta(), &[]);
        assert!(script.contains("export PATH=\"/opt/tool/bin:${PATH}\""));
        assert!(script.contains("unset MANPATH"));
    }

    #[test]
    fn test_render_csh() {
        let script = render_script(Shell::Csh, &delta(), &[]);
        assert!(script.contains("setenv PATH \"/opt/tool/bin:${PATH}\""));
        assert!(script.contains("unsetenv MANPATH"));
    }

    #[test]
    fn test_render_aliases_per_shell() {
        let entry = OsEntry {
            env: vec![VarMutation::decode("PATH", "/opt/tool/bin")],
            alias_sh: vec![("ll".into(), "ls -l".into())],
            alias_csh: vec![("ll".into(), "ls -lF".into())],
            function_def: vec![("greet".into(), "echo hi".into())],
            ..OsEntry::default()
        };

        let bash = render_script(Shell::Bash, &EnvDelta::new(), &[&entry]);
        assert!(bash.contains("alias ll='ls -l'"));
        assert!(bash.contains("greet() { echo hi; }"));

        let csh = render_script(Shell::Csh, &EnvDelta::new(), &[&entry]);
        assert!(csh.contains("alias ll 'ls -lF'"));
        assert!(!csh.contains("greet()"));
    }
}
