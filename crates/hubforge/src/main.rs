//! hubforge CLI - provisions a machine into a multi-user compute hub
//!
//! This is the orchestrator around the convergence engine: argument
//! parsing, logging initialization and the fixed provisioning order
//! live here; the engine itself lives in the library crates.

mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use hubforge_hooks::HookRegistry;

use cli::{Cli, Commands};

/// Register plugins compiled into this binary. The registry freezes
/// for the process lifetime once installed, so this runs before
/// anything consults it.
fn register_plugins() -> Result<()> {
    let registry = HookRegistry::new();
    hubforge_hooks::install(registry)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    register_plugins()?;

    match cli.command {
        Commands::Install(args) => {
            let log_file = args.prefix.join("installer.log");
            hubforge_core::logging::init(Some(&log_file), cli.verbose, cli.quiet)?;
            commands::install::run(args)
        }
    }
}
