//! Conda install outcome-record parsing
//!
//! `conda install --json` interleaves line-delimited fetch-progress
//! records with one final, non-delimited summary record, and sometimes
//! prefixes records with stray NUL bytes. This module strips the noise
//! and parses what remains as the single outcome record. Anything
//! other than exactly one record is a parse failure, distinct from a
//! process failure.

use hubforge_core::{Error, Result};

/// Structural marker that opens every fetch-progress record
const PROGRESS_MARKER: &str = "{\"fetch\"";

/// Phrase conda puts in the summary message when nothing had to change
const ALREADY_INSTALLED: &str = "already installed";

/// The parsed summary record of a conda install run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// The tool's authoritative success flag
    pub success: bool,

    /// Optional human-readable message from the record
    pub message: Option<String>,
}

impl InstallReport {
    /// Whether the record says the requested packages were already present
    pub fn already_satisfied(&self) -> bool {
        self.success
            && self
                .message
                .as_deref()
                .is_some_and(|m| m.contains(ALREADY_INSTALLED))
    }
}

/// Parse the captured stream of a `conda install --json` run.
///
/// Progress lines are detected by the structural marker at the start
/// of the line (after NUL-stripping), not by position. The remainder
/// must be exactly one JSON object with a boolean `success` field.
pub fn parse_install_report(raw: &str) -> Result<InstallReport> {
    // Records occasionally start with stray NUL bytes
    let stripped = raw.trim_start_matches('\0');

    let remainder = stripped
        .lines()
        .filter(|line| !line.trim_start_matches('\0').starts_with(PROGRESS_MARKER))
        .collect::<Vec<_>>()
        .join("\n");

    let body = remainder.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if body.is_empty() {
        return Err(Error::parse("no outcome record in tool output"));
    }

    // from_str rejects trailing data, so two concatenated records fail here
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::parse(format!("expected exactly one outcome record: {e}")))?;

    let success = value
        .get("success")
        .and_then(serde_json::Value::as_bool)
        .ok_or_else(|| Error::parse("outcome record has no boolean `success` field"))?;

    let message = value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);

    Ok(InstallReport { success, message })
}
