//! setapp: add, show, and remove environment variables, aliases, and
//! shell functions associated with applications.
//!
//! The computed changes are written to a shell-sourceable file; nothing
//! here can alter the parent shell directly.

use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser};
use console::{Term, style};
use setapp_core::{
    Catalog, CoreError, EnvironmentSnapshot, OsEntry, REGISTRY_VAR, compute_add, compute_remove,
    parse_token, resolve,
};
use setapp_platform::{
    Shell, env_script_file, fallback_os, os_release, render_script, write_script,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod loader;
mod output;

/// Add, modify, show, and remove environment variables, aliases, and
/// shell functions associated with applications.
#[derive(Parser, Debug)]
#[command(name = "setapp", version, about)]
struct Cli {
    /// Applications to load, e.g. "matlab", "matlab/2022a", "+matlab/2022a"
    /// (a leading "+" puts the application's paths first)
    #[arg(value_name = "APP")]
    applications: Vec<String>,

    /// Print internal state (parsed arguments and the merged catalog)
    #[arg(short, long)]
    debug: bool,

    /// Print the environment, colon-separated values one entry per line
    #[arg(long)]
    dump_env: bool,

    /// Print the changes adding or removing APP would make, without
    /// writing anything
    #[arg(short, long, value_name = "APP")]
    explain: Option<String>,

    /// Read application definitions from FILE instead of the search paths
    #[arg(short, long, value_name = "FILE")]
    infile: Option<PathBuf>,

    /// Remove entries for APP from the environment ("all" removes every
    /// loaded application)
    #[arg(short, long, value_name = "APP")]
    remove: Option<String>,

    /// Shell to write changes for: bash/sh/ksh/zsh or csh/tcsh; detected
    /// from $SHELL when omitted
    #[arg(short, long, value_name = "SHELL")]
    shell: Option<Shell>,

    /// Show information about APP ("all" shows every application)
    #[arg(long, value_name = "APP")]
    show: Option<String>,

    /// Validate the YAML catalog in FILE, then exit
    #[arg(long, value_name = "FILE")]
    validate: Option<PathBuf>,

    /// Verbose output (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let term = Term::stderr();
    let out = Term::stdout();

    // Quick-exit options that need no catalog.
    if cli.dump_env {
        return output::dump_env(&out);
    }
    if let Some(file) = &cli.validate {
        return cmd_validate(&term, file);
    }

    let no_request = cli.applications.is_empty()
        && cli.remove.is_none()
        && cli.show.is_none()
        && cli.explain.is_none()
        && !cli.debug;
    if no_request {
        Cli::command().print_help()?;
        return Ok(());
    }

    let catalog = match loader::load_catalog(cli.infile.as_deref()) {
        Ok(catalog) => catalog,
        Err(e) => {
            report_error(&term, &e)?;
            std::process::exit(1);
        }
    };

    if cli.debug {
        out.write_line(&format!("{cli:#?}"))?;
        out.write_line(&serde_json::to_string_pretty(&catalog)?)?;
    }

    if let Some(request) = &cli.show {
        if output::show(&out, &catalog, request, cli.verbose)? {
            return Ok(());
        }
        std::process::exit(1);
    }

    let shell = cli.shell.unwrap_or_else(Shell::detect);
    let env = EnvironmentSnapshot::capture();
    let raw_os = os_release();
    let Some(current_os) = catalog
        .canonical_os(&raw_os)
        .or_else(|| catalog.canonical_os(fallback_os()))
    else {
        term.write_line(&format!(
            "{} OS release '{raw_os}' is not in the OS alias table",
            style("error:").red().bold()
        ))?;
        std::process::exit(1);
    };

    if let Some(token) = &cli.explain {
        return cmd_explain(&out, &term, &catalog, token, current_os, &env);
    }
    if let Some(token) = &cli.remove {
        return cmd_remove(&term, &catalog, token, current_os, &env, shell);
    }
    if !cli.applications.is_empty() {
        return cmd_add(&term, &catalog, &cli.applications, current_os, &env, shell);
    }
    Ok(())
}

fn cmd_add(
    term: &Term,
    catalog: &Catalog,
    tokens: &[String],
    current_os: &str,
    env: &EnvironmentSnapshot,
    shell: Shell,
) -> Result<()> {
    let delta = match compute_add(catalog, tokens, current_os, env) {
        Ok(delta) => delta,
        Err(e) => {
            report_error(term, &e)?;
            std::process::exit(1);
        }
    };

    // Re-resolve for the alias and function payloads; resolution is pure
    // and cannot fail after a successful compute_add.
    let mut entries: Vec<&OsEntry> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for token in tokens {
        if let Ok((selection, entry)) = resolve(catalog, token, current_os)
            && seen.insert((selection.application, selection.version))
        {
            entries.push(entry);
        }
    }

    let script = render_script(shell, &delta, &entries);
    let path = env_script_file(shell)?;
    write_script(&path, &script)?;

    term.write_line(&format!(
        "{} updated {} variable(s); source {} to apply",
        style("::").cyan().bold(),
        delta.len(),
        path.display()
    ))?;
    Ok(())
}

fn cmd_remove(
    term: &Term,
    catalog: &Catalog,
    token: &str,
    current_os: &str,
    env: &EnvironmentSnapshot,
    shell: Shell,
) -> Result<()> {
    let delta = match compute_remove(catalog, &[token], current_os, env) {
        Ok(delta) => delta,
        Err(CoreError::NothingLoaded(var)) => {
            term.write_line(&format!(
                "{} nothing is loaded ({var} is not set); nothing to remove",
                style("::").cyan().bold()
            ))?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if delta.is_empty() {
        term.write_line(&format!(
            "{} no environment changes",
            style("::").cyan().bold()
        ))?;
        return Ok(());
    }

    let script = render_script(shell, &delta, &[]);
    let path = env_script_file(shell)?;
    write_script(&path, &script)?;

    term.write_line(&format!(
        "{} updated {} variable(s); source {} to apply",
        style("::").cyan().bold(),
        delta.len(),
        path.display()
    ))?;
    Ok(())
}

fn cmd_explain(
    out: &Term,
    term: &Term,
    catalog: &Catalog,
    token: &str,
    current_os: &str,
    env: &EnvironmentSnapshot,
) -> Result<()> {
    let application = parse_token(token).application;
    let loaded = env.get(REGISTRY_VAR).is_some_and(|segments| {
        segments
            .iter()
            .any(|s| parse_token(s).application == application)
    });

    let (action, delta) = if loaded {
        ("removing", compute_remove(catalog, &[token], current_os, env)?)
    } else {
        let delta = match compute_add(catalog, &[token], current_os, env) {
            Ok(delta) => delta,
            Err(e) => {
                report_error(term, &e)?;
                std::process::exit(1);
            }
        };
        ("adding", delta)
    };

    out.write_line(&format!(
        "{} {action} {token} would change:",
        style("::").cyan().bold()
    ))?;
    output::print_delta(out, &delta)
}

fn cmd_validate(term: &Term, file: &Path) -> Result<()> {
    let source = loader::read_source(file)?;
    match Catalog::build(&[source]) {
        Ok(catalog) => {
            term.write_line(&format!(
                "{} {} is valid ({} application(s))",
                style("::").green().bold(),
                file.display(),
                catalog.len()
            ))?;
            Ok(())
        }
        Err(e) => {
            report_error(term, &e)?;
            std::process::exit(1);
        }
    }
}

fn report_error(term: &Term, err: &CoreError) -> Result<()> {
    term.write_line(&format!("{} {err}", style("error:").red().bold()))?;
    if let CoreError::Validation { violations } = err {
        for violation in violations {
            term.write_line(&format!("  {}", style(violation).red()))?;
        }
    }
    Ok(())
}
