//! Ownership and permission normalization
//!
//! Installer and package runs can leave files owned by the wrong user
//! or world-writeable, even on nominal success. Every mutating
//! operation in this crate finishes by normalizing the prefix.

use hubforge_core::{Cmd, CommandRunner, Result};
use nix::unistd::{getgid, getuid};
use std::path::Path;

/// Chown the prefix to the current effective uid:gid and strip
/// world-write permission recursively.
pub fn fix_permissions(runner: &dyn CommandRunner, prefix: &Path) -> Result<()> {
    let owner = format!("{}:{}", getuid(), getgid());
    runner.run(
        &Cmd::new("chown")
            .arg("-R")
            .arg(owner)
            .arg(prefix.display().to_string()),
    )?;
    runner.run(
        &Cmd::new("chmod")
            .args(["-R", "o-w"])
            .arg(prefix.display().to_string()),
    )?;
    Ok(())
}
