//! Persisted configuration handling
//!
//! One YAML mapping under the install prefix. The file is created
//! empty when missing; the config directory is private to the owner.

use anyhow::{Context, Result};
use serde_yaml_ng::Mapping;
use std::fs::{self, DirBuilder};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

/// Directory holding the persisted configuration
pub fn config_dir(prefix: &Path) -> PathBuf {
    prefix.join("config")
}

/// Path of the persisted configuration mapping
pub fn config_file(prefix: &Path) -> PathBuf {
    config_dir(prefix).join("config.yaml")
}

/// Create the config directory with owner-only permissions
pub fn ensure_config_dir(prefix: &Path) -> Result<()> {
    let dir = config_dir(prefix);
    if !dir.exists() {
        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}

/// Load the configuration mapping, empty if the file does not exist
pub fn load(path: &Path) -> Result<Mapping> {
    if !path.exists() {
        return Ok(Mapping::new());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(Mapping::new());
    }
    serde_yaml_ng::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Write the configuration mapping back to disk
pub fn save(path: &Path, config: &Mapping) -> Result<()> {
    let rendered = serde_yaml_ng::to_string(config)?;
    fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))
}

/// Record the given usernames under `users.admin`, replacing the
/// previous admin list but leaving every other key untouched.
pub fn set_admins(config: &mut Mapping, admins: &[String]) {
    let users = config
        .entry("users".into())
        .or_insert_with(|| Mapping::new().into());
    if let Some(users) = users.as_mapping_mut() {
        users.insert(
            "admin".into(),
            serde_yaml_ng::Value::Sequence(
                admins.iter().map(|a| a.as_str().into()).collect(),
            ),
        );
    }
}
