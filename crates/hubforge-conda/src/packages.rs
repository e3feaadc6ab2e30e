//! Idempotent package convergence operations
//!
//! Three operations sharing one shape: converge the environment at a
//! prefix to include a declared package set. Conda installs go through
//! the outcome-record parser because the tool's `--json` output is
//! noisy; pip output is well-formed so a zero exit is enough.

use crate::perms::fix_permissions;
use crate::report::parse_install_report;
use hubforge_core::{Cmd, CommandRunner, Error, Outcome, Result};
use std::path::Path;
use tracing::{debug, info};

/// Absolute form of the prefix, as the underlying tools expect
fn abs_prefix(prefix: &Path) -> Result<String> {
    Ok(std::path::absolute(prefix)?.display().to_string())
}

/// Path to the python interpreter inside the prefix
fn python(prefix: &str) -> String {
    format!("{prefix}/bin/python")
}

/// Ensure `packages` (conda-forge) are installed in the conda prefix.
///
/// Permissions are normalized after the tool runs regardless of the
/// parsed verdict, since partial writes happen even on nominal
/// success.
pub fn ensure_conda_packages(
    runner: &dyn CommandRunner,
    prefix: &Path,
    packages: &[String],
) -> Result<Outcome> {
    if packages.is_empty() {
        return Ok(Outcome::AlreadySatisfied);
    }
    let abspath = abs_prefix(prefix)?;
    info!("Installing {} conda packages...", packages.len());

    let raw = runner.run(
        &Cmd::new(python(&abspath))
            .args(["-m", "conda", "install", "-c", "conda-forge", "--json", "--prefix"])
            .arg(&abspath)
            .args(packages.iter().cloned()),
    )?;

    fix_permissions(runner, prefix)?;

    let report = parse_install_report(&raw)?;
    if !report.success {
        return Err(Error::parse(format!(
            "conda reported failure: {}",
            report.message.as_deref().unwrap_or("no message")
        )));
    }
    if report.already_satisfied() {
        debug!("conda packages already installed at {}", abspath);
        return Ok(Outcome::AlreadySatisfied);
    }
    Ok(Outcome::Changed)
}

/// Ensure pip `packages` are installed in the given conda prefix.
///
/// pip is invoked with `--no-cache-dir`; its own repeated runs are
/// no-ops, so a zero exit on a non-empty set reports `Changed`.
pub fn ensure_pip_packages(
    runner: &dyn CommandRunner,
    prefix: &Path,
    packages: &[String],
) -> Result<Outcome> {
    if packages.is_empty() {
        return Ok(Outcome::AlreadySatisfied);
    }
    let abspath = abs_prefix(prefix)?;
    info!("Installing {} pip packages...", packages.len());

    runner.run(
        &Cmd::new(python(&abspath))
            .args(["-m", "pip", "install", "--no-cache-dir"])
            .args(packages.iter().cloned()),
    )?;

    fix_permissions(runner, prefix)?;
    Ok(Outcome::Changed)
}

/// Ensure packages from a requirements manifest are installed in the
/// conda prefix. `requirements` may be a local path or a URL; pip
/// resolves both.
pub fn ensure_pip_requirements(
    runner: &dyn CommandRunner,
    prefix: &Path,
    requirements: &str,
) -> Result<Outcome> {
    let abspath = abs_prefix(prefix)?;
    info!("Installing pip packages from {}...", requirements);

    runner.run(
        &Cmd::new(python(&abspath))
            .args(["-m", "pip", "install", "--no-cache-dir", "-r"])
            .arg(requirements),
    )?;

    fix_permissions(runner, prefix)?;
    Ok(Outcome::Changed)
}
