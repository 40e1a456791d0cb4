//! User-facing printing for show, explain, and dump-env

use anyhow::Result;
use console::{Term, style};
use setapp_core::{Catalog, CatalogEntry, EnvDelta, Segment, VarChange};

/// Print the ambient environment, sorted; colon-separated values get one
/// numbered segment per line.
pub fn dump_env(term: &Term) -> Result<()> {
    let mut vars: Vec<(String, String)> = std::env::vars().collect();
    vars.sort();

    for (name, value) in vars {
        if value.contains(':') {
            term.write_line(&name)?;
            for (i, item) in value.split(':').enumerate() {
                term.write_line(&format!("  {:3}.  {item}", i + 1))?;
            }
        } else {
            term.write_line(&format!("{name:30} {value}"))?;
        }
    }
    Ok(())
}

/// Print catalog information for one application, or for every application
/// when `request` is `"all"`.
pub fn show(term: &Term, catalog: &Catalog, request: &str, verbose: u8) -> Result<bool> {
    if request == "all" {
        for (key, entry) in catalog.entries() {
            print_application(term, key, entry, verbose)?;
        }
        return Ok(true);
    }

    match catalog.get(request) {
        Some(entry) => {
            print_application(term, request, entry, verbose)?;
            Ok(true)
        }
        None => {
            term.write_line(&format!(
                "{} unknown application '{request}'",
                style("error:").red().bold()
            ))?;
            Ok(false)
        }
    }
}

fn print_application(term: &Term, key: &str, entry: &CatalogEntry, verbose: u8) -> Result<()> {
    term.write_line(&format!("{key:14} {}", style(&entry.name).bold()))?;
    for (version, version_entry) in &entry.versions {
        let marker = if *version == entry.default_version {
            "*"
        } else {
            " "
        };
        if verbose == 0 {
            let os_names: Vec<&str> = version_entry.keys().map(String::as_str).collect();
            term.write_line(&format!("  {marker}  {version} : {}", os_names.join(", ")))?;
            continue;
        }
        term.write_line(&format!("  {marker}  {version} :"))?;
        for (os, os_entry) in version_entry {
            term.write_line(&format!(
                "       {os} ({})",
                style(os_entry.origin.display()).dim()
            ))?;
            if let Some(doc) = &os_entry.doc {
                term.write_line(&format!("         {}", style(doc).italic()))?;
            }
            for mutation in &os_entry.env {
                term.write_line(&format!(
                    "         {} {}  {}",
                    mutation.variable,
                    mutation.value,
                    style(format!("({})", mutation.mode)).dim()
                ))?;
            }
        }
    }
    Ok(())
}

/// Print a computed delta, one variable per line
pub fn print_delta(term: &Term, delta: &EnvDelta) -> Result<()> {
    if delta.is_empty() {
        term.write_line(&format!(
            "{} no environment changes",
            style("::").cyan().bold()
        ))?;
        return Ok(());
    }
    for (variable, change) in delta.iter() {
        match change {
            VarChange::Set(segments) => {
                term.write_line(&format!(
                    "  {} {variable} = {}",
                    style("~").yellow().bold(),
                    format_segments(variable, segments)
                ))?;
            }
            VarChange::Unset => {
                term.write_line(&format!(
                    "  {} {variable} {}",
                    style("-").red().bold(),
                    style("(unset)").dim()
                ))?;
            }
        }
    }
    Ok(())
}

fn format_segments(variable: &str, segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Literal(value) => value.clone(),
            Segment::Inherit => format!("${{{variable}}}"),
        })
        .collect::<Vec<_>>()
        .join(":")
}
