//! # hubforge-core
//!
//! Core library for the hubforge provisioning engine providing:
//! - The error taxonomy shared by every convergence operation
//! - Convergence outcome and package source types
//! - The process executor all external commands run through
//! - The integrity-verified downloader for network artifacts
//! - Logging initialization (durable installer log + stderr)

pub mod download;
pub mod error;
pub mod exec;
pub mod logging;
pub mod types;

pub use download::{Downloader, VerifiedArtifact};
pub use error::{Error, Result};
pub use exec::{Cmd, CommandRunner, SystemRunner};
pub use types::{Outcome, PackageSpec, ServiceConfig, SourceKind};
