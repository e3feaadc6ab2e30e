//! CLI argument definitions

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hubforge",
    about = "Provision this machine into a multi-user compute hub",
    version
)]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only show errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Converge the machine to the declared hub state
    Install(InstallArgs),
}

#[derive(Parser)]
pub struct InstallArgs {
    /// Usernames to set as hub admins (repeatable)
    #[arg(long = "admin")]
    pub admins: Vec<String>,

    /// URL or path of a requirements.txt installed into the user environment
    #[arg(long)]
    pub user_requirements_txt_url: Option<String>,

    /// Pid of the bootstrap progress-page server, stopped before the hub starts
    #[arg(long)]
    pub progress_page_server_pid: Option<i32>,

    /// Installation prefix
    #[arg(long, default_value = "/opt/hubforge")]
    pub prefix: PathBuf,
}
