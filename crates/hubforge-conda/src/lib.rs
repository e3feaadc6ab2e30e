//! # hubforge-conda
//!
//! Conda environment provisioning and idempotent package convergence:
//! - [`env::Provisioner`] installs miniconda at a prefix, version-gated
//!   so re-runs are no-ops
//! - [`packages`] converges conda, pip and requirements-file package
//!   sets into an existing prefix
//! - [`report`] parses conda's noisy `--json` install output into a
//!   single outcome record

pub mod env;
pub mod packages;
pub mod perms;
pub mod report;

pub use env::Provisioner;
pub use report::InstallReport;
