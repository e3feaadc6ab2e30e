//! Error types for hubforge-core

use thiserror::Error;

/// Result type alias using hubforge-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error taxonomy for hubforge.
///
/// Every convergence operation fails with one of these. `ProcessFailed`
/// means the external tool refused to run to completion; `Parse` means
/// the tool ran but its output contained no recognizable outcome
/// record. Callers rely on that distinction.
#[derive(Error, Debug)]
pub enum Error {
    /// An external command exited non-zero. Always fatal to the
    /// calling operation; never swallowed.
    #[error("`{command}` exited with code {code}")]
    ProcessFailed { command: String, code: i32 },

    /// A downloaded artifact's digest did not match the expected one.
    #[error("sha256 mismatch for {url}: expected {expected}, computed {computed}")]
    Integrity {
        url: String,
        expected: String,
        computed: String,
    },

    /// Tool output did not contain exactly one recognizable outcome record.
    #[error("unparseable tool output: {message}")]
    Parse { message: String },

    /// HTTP transport error
    #[error("download request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a process failure error
    pub fn process_failed(command: impl Into<String>, code: i32) -> Self {
        Self::ProcessFailed {
            command: command.into(),
            code,
        }
    }
}
