//! Shared types for convergence operations

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of an idempotent convergence operation.
///
/// The failure arm lives on the `Err` side of `Result<Outcome, Error>`;
/// "already satisfied" is a normal outcome, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The target already matched the desired state; nothing was done.
    AlreadySatisfied,

    /// The target was mutated to reach the desired state.
    Changed,
}

impl Outcome {
    /// Whether this outcome mutated the target
    pub fn changed(&self) -> bool {
        matches!(self, Outcome::Changed)
    }
}

/// Which package manager a package spec is destined for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// OS-level packages (apt)
    System,

    /// Environment-native packages (conda)
    Environment,

    /// Application-level packages (pip)
    Application,
}

/// An opaque package selector plus its source kind.
///
/// The selector is passed verbatim to the underlying tool; hubforge
/// never interprets version constraints itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub selector: String,
    pub kind: SourceKind,
}

impl PackageSpec {
    /// An OS-level (apt) package
    pub fn system(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            kind: SourceKind::System,
        }
    }

    /// An environment-native (conda) package
    pub fn environment(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            kind: SourceKind::Environment,
        }
    }

    /// An application-level (pip) package
    pub fn application(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            kind: SourceKind::Application,
        }
    }
}

/// Live service configuration that extensions may customize in place
/// before the orchestrator translates it into runtime settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Free-form dotted-key settings, e.g. `spawner.mem_limit`
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl ServiceConfig {
    /// Set a single setting, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.settings.insert(key.into(), value.into());
    }

    /// Look up a setting by key
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(key)
    }
}
