//! Environment provisioner
//!
//! Installs or upgrades a miniconda environment at a filesystem
//! prefix. The version gate makes re-runs side-effect-free: probing an
//! existing installation touches neither the network nor the prefix.

use crate::perms::fix_permissions;
use hubforge_core::{Cmd, CommandRunner, Downloader, Error, Outcome, Result};
use regex::Regex;
use std::path::Path;
use tracing::{debug, info, warn};

/// Provisions conda environments through the shared executor and
/// verified downloader.
pub struct Provisioner<'a> {
    runner: &'a dyn CommandRunner,
    downloader: &'a Downloader,
}

impl<'a> Provisioner<'a> {
    pub fn new(runner: &'a dyn CommandRunner, downloader: &'a Downloader) -> Self {
        Self { runner, downloader }
    }

    /// Ensure a conda installation of at least `min_version` exists at
    /// `prefix`.
    ///
    /// An installation that already satisfies the gate returns
    /// [`Outcome::AlreadySatisfied`] without any network access.
    /// Otherwise the installer is downloaded and digest-verified, run
    /// unattended against the prefix, and ownership/permissions are
    /// normalized.
    pub fn ensure_environment(
        &self,
        prefix: &Path,
        min_version: &str,
        installer_url: &str,
        sha256: &str,
    ) -> Result<Outcome> {
        if let Some(installed) = self.probe_version(prefix) {
            if version_at_least(&installed, min_version)? {
                debug!(
                    "conda {} at {} satisfies minimum {}",
                    installed,
                    prefix.display(),
                    min_version
                );
                return Ok(Outcome::AlreadySatisfied);
            }
            info!(
                "conda {} at {} is older than {}, reinstalling",
                installed,
                prefix.display(),
                min_version
            );
        }

        info!("Setting up environment at {}...", prefix.display());
        let installer = self.downloader.fetch_verified(installer_url, sha256)?;

        self.runner.run(
            &Cmd::new("/bin/bash")
                .arg(installer.path().display().to_string())
                .args(["-u", "-b", "-p"])
                .arg(prefix.display().to_string()),
        )?;

        // The installer leaves root-owned and world-writeable files
        // behind when run as root
        fix_permissions(self.runner, prefix)?;

        Ok(Outcome::Changed)
    }

    /// Report the version of the conda binary under `prefix`, if any.
    ///
    /// Absence of the environment is a normal "not yet satisfied"
    /// state: a missing binary never spawns a process, and a binary
    /// that fails to run or reports something unreadable is logged and
    /// treated as absent rather than raised.
    pub fn probe_version(&self, prefix: &Path) -> Option<String> {
        let conda = prefix.join("bin").join("conda");
        if !conda.exists() {
            return None;
        }

        let output = match self.runner.run(&Cmd::new(conda.display().to_string()).arg("-V")) {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    "conda exists at {} but could not report a version: {}",
                    prefix.display(),
                    err
                );
                return None;
            }
        };

        match extract_version(&output) {
            Some(version) => Some(version),
            None => {
                warn!(
                    "could not find a version in conda output: {}",
                    output.trim()
                );
                None
            }
        }
    }
}

/// Pull a dotted version number out of `conda -V` output ("conda 4.8.1")
fn extract_version(output: &str) -> Option<String> {
    let re = Regex::new(r"(\d+(?:\.\d+)+)").expect("static regex");
    re.captures(output).map(|c| c[1].to_string())
}

/// Compare two dotted versions leniently: `"4.8"` is padded to
/// `"4.8.0"` before semver comparison, and extra components beyond
/// three are ignored.
pub fn version_at_least(installed: &str, required: &str) -> Result<bool> {
    Ok(parse_loose(installed)? >= parse_loose(required)?)
}

fn parse_loose(version: &str) -> Result<semver::Version> {
    let mut parts: Vec<&str> = version.trim().split('.').collect();
    parts.truncate(3);
    while parts.len() < 3 {
        parts.push("0");
    }
    let padded = parts.join(".");
    semver::Version::parse(&padded)
        .map_err(|e| Error::parse(format!("bad version `{version}`: {e}")))
}
