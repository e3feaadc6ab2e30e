//! # hubforge-apt
//!
//! Apt source and package management. The manager is additive and
//! deduplicating: a repository line is appended at most once per
//! (name, url, section, codename), metadata refreshes run only when
//! something actually changed, and installs are non-interactive.

use hubforge_core::{Cmd, CommandRunner, Error, Outcome, Result};
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SOURCES_DIR: &str = "/etc/apt/sources.list.d";
const LISTS_DIR: &str = "/var/lib/apt/lists";
const OS_RELEASE: &str = "/etc/os-release";
const GPG_TOOL: &str = "gpg2";

/// Apt source and package manager.
///
/// Filesystem roots and the signing-key tool name default to the
/// stock Debian/Ubuntu locations and can be repointed for tests.
pub struct AptManager<'a> {
    runner: &'a dyn CommandRunner,
    sources_dir: PathBuf,
    lists_dir: PathBuf,
    os_release: PathBuf,
    gpg_tool: String,
}

impl<'a> AptManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            sources_dir: PathBuf::from(SOURCES_DIR),
            lists_dir: PathBuf::from(LISTS_DIR),
            os_release: PathBuf::from(OS_RELEASE),
            gpg_tool: GPG_TOOL.to_string(),
        }
    }

    /// Repoint the sources.list.d directory
    pub fn with_sources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sources_dir = dir.into();
        self
    }

    /// Repoint the package metadata lists directory
    pub fn with_lists_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lists_dir = dir.into();
        self
    }

    /// Repoint the os-release file
    pub fn with_os_release(mut self, path: impl Into<PathBuf>) -> Self {
        self.os_release = path.into();
        self
    }

    /// Override the signing-key tool looked up on $PATH
    pub fn with_gpg_tool(mut self, tool: impl Into<String>) -> Self {
        self.gpg_tool = tool.into();
        self
    }

    /// The running distribution's codename, from os-release
    pub fn codename(&self) -> Result<String> {
        let contents = fs::read_to_string(&self.os_release)?;
        contents
            .lines()
            .filter_map(|line| line.strip_prefix("VERSION_CODENAME="))
            .map(|value| value.trim().trim_matches('"').to_string())
            .find(|value| !value.is_empty())
            .ok_or_else(|| {
                Error::parse(format!(
                    "no VERSION_CODENAME in {}",
                    self.os_release.display()
                ))
            })
    }

    /// Ensure the canonical `deb <url> <codename> <section>` line for
    /// this source exists exactly once in its named source file.
    ///
    /// The file is read and conditionally appended through one handle,
    /// so there is no separate existence check racing the write. A
    /// metadata refresh runs only when a line was actually added.
    pub fn add_source(&self, name: &str, url: &str, section: &str) -> Result<Outcome> {
        let codename = self.codename()?;
        let line = format!("deb {url} {codename} {section}\n");

        fs::create_dir_all(&self.sources_dir)?;
        let path = self.sources_dir.join(format!("{name}.list"));
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut existing = String::new();
        file.read_to_string(&mut existing)?;
        if existing.contains(&line) {
            debug!("source {} already present in {}", name, path.display());
            return Ok(Outcome::AlreadySatisfied);
        }

        info!("Adding apt source {} ({})", name, url);
        file.write_all(line.as_bytes())?;
        self.refresh_metadata()?;
        Ok(Outcome::Changed)
    }

    /// Install OS packages non-interactively, refreshing the metadata
    /// cache first if it is empty.
    pub fn install_packages(&self, packages: &[String]) -> Result<Outcome> {
        if packages.is_empty() {
            return Ok(Outcome::AlreadySatisfied);
        }
        if self.lists_empty() {
            self.refresh_metadata()?;
        }

        info!("Installing {} apt packages...", packages.len());
        self.runner.run(
            &Cmd::new("apt-get")
                .args(["install", "--yes"])
                .args(packages.iter().cloned())
                // Stop apt from asking questions
                .env("DEBIAN_FRONTEND", "noninteractive"),
        )?;
        Ok(Outcome::Changed)
    }

    /// Import `key` as a trusted signing key, installing the key tool
    /// first if it is absent. The key bytes are piped over stdin.
    pub fn trust_key(&self, key: &[u8]) -> Result<Outcome> {
        if which::which(&self.gpg_tool).is_err() {
            info!("{} not found, installing gnupg2", self.gpg_tool);
            self.install_packages(&["gnupg2".to_string()])?;
        }
        self.runner
            .run(&Cmd::new("apt-key").args(["add", "-"]).input(key.to_vec()))?;
        Ok(Outcome::Changed)
    }

    fn refresh_metadata(&self) -> Result<()> {
        self.runner
            .run(&Cmd::new("apt-get").args(["update", "--yes"]))?;
        Ok(())
    }

    fn lists_empty(&self) -> bool {
        match fs::read_dir(&self.lists_dir) {
            Ok(entries) => entries.count() == 0,
            Err(_) => true,
        }
    }
}

/// Convenience borrow of the sources file path for a named source
pub fn source_file(sources_dir: &Path, name: &str) -> PathBuf {
    sources_dir.join(format!("{name}.list"))
}
