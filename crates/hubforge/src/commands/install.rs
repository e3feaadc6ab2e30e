//! The `install` command: fixed provisioning order over the engine
//!
//! Every step is an idempotent convergence operation, so a failed run
//! can simply be re-run and resumes from the first unsatisfied step.
//! No step here retries on its own.

use crate::cli::InstallArgs;
use crate::config;
use anyhow::{Context, Result};
use hubforge_apt::AptManager;
use hubforge_conda::packages::{
    ensure_conda_packages, ensure_pip_packages, ensure_pip_requirements,
};
use hubforge_conda::Provisioner;
use hubforge_core::{CommandRunner, Downloader, Outcome, PackageSpec, SystemRunner};
use hubforge_hooks::HookRegistry;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Minimum acceptable conda version in the user environment
const MIN_CONDA_VERSION: &str = "4.7.10";

/// Pinned miniconda installer matching MIN_CONDA_VERSION
const MINICONDA_VERSION: &str = "4.7.10";
const MINICONDA_INSTALLER_SHA256: &str =
    "8a324adcc9eaf1c09e22a992bb6234d91a94146840ee6b11c114ecadafc68121";

/// Conda upgraded past the installer's bundled version right away
const USER_CONDA_PACKAGES: &[&str] = &["conda==4.8.1"];

/// Hub environment packages; everything installable from PyPI goes
/// through pip to avoid mixing python and conda packages
const HUB_PIP_PACKAGES: &[&str] = &[
    "jupyterhub==1.1.0",
    "jupyterhub-systemdspawner==0.14",
    "jupyterhub-firstuseauthenticator==0.14.1",
    "oauthenticator==0.10.0",
    "jupyterhub-idle-culler==1.0",
];

/// Build dependencies for the hub environment (pycurl needs them)
const HUB_APT_PACKAGES: &[&str] = &["libssl-dev", "libcurl4-openssl-dev", "build-essential"];

/// Node runtime repository; the hub's HTTP proxy runs on node
const NODE_SOURCE_URL: &str = "https://deb.nodesource.com/node_10.x";
const NODE_KEY_URL: &str = "https://deb.nodesource.com/gpgkey/nodesource.gpg.key";

/// Baseline user-environment packages, shipped with the binary
const BASE_REQUIREMENTS: &str = include_str!("../../resources/requirements-base.txt");

pub fn run(args: InstallArgs) -> Result<()> {
    let runner = SystemRunner::new();
    let downloader = Downloader::new()?;
    let apt = AptManager::new(&runner);
    let registry = hubforge_hooks::global();

    ensure_config(&args.prefix, &args.admins, registry)?;

    info!("Setting up user environment...");
    ensure_user_environment(
        &runner,
        &downloader,
        &args.prefix,
        args.user_requirements_txt_url.as_deref(),
    )?;

    info!("Setting up node runtime...");
    ensure_node_runtime(&downloader, &apt, NODE_KEY_URL)?;

    info!("Setting up hub environment...");
    ensure_hub_packages(&runner, &apt, &args.prefix)?;

    // The bootstrap progress page must stop before the hub takes the port
    if let Some(pid) = args.progress_page_server_pid {
        stop_progress_server(pid);
    }

    // Plugin contributions run last, once the environments exist
    run_hook_actions(&runner, &apt, &args.prefix, registry)?;

    info!("Done!");
    Ok(())
}

fn user_env(prefix: &Path) -> PathBuf {
    prefix.join("user")
}

fn hub_env(prefix: &Path) -> PathBuf {
    prefix.join("hub")
}

/// Ensure the persisted config mapping exists, apply plugin mutations
/// and record the admin list.
fn ensure_config(prefix: &Path, admins: &[String], registry: &HookRegistry) -> Result<()> {
    config::ensure_config_dir(prefix)?;
    let path = config::config_file(prefix);
    let mut mapping = config::load(&path)?;

    registry.config_post_install(&mut mapping);
    if !admins.is_empty() {
        info!("Setting up admin users");
        config::set_admins(&mut mapping, admins);
    }

    config::save(&path, &mapping)
}

/// Converge the user conda environment: miniconda at the pinned
/// version, conda upgraded, baseline requirements, then any
/// operator-supplied requirements manifest.
fn ensure_user_environment(
    runner: &dyn CommandRunner,
    downloader: &Downloader,
    prefix: &Path,
    user_requirements: Option<&str>,
) -> Result<()> {
    let env = user_env(prefix);
    let installer_url = format!(
        "https://repo.continuum.io/miniconda/Miniconda3-{MINICONDA_VERSION}-Linux-x86_64.sh"
    );

    let provisioner = Provisioner::new(runner, downloader);
    let outcome = provisioner.ensure_environment(
        &env,
        MIN_CONDA_VERSION,
        &installer_url,
        MINICONDA_INSTALLER_SHA256,
    )?;
    report_step("user environment", outcome);

    ensure_conda_packages(runner, &env, &owned(USER_CONDA_PACKAGES))?;

    // The embedded baseline manifest is handed to pip as a real file
    let mut base = tempfile::NamedTempFile::new()?;
    base.write_all(BASE_REQUIREMENTS.as_bytes())?;
    base.flush()?;
    ensure_pip_requirements(runner, &env, &base.path().display().to_string())?;

    if let Some(requirements) = user_requirements {
        ensure_pip_requirements(runner, &env, requirements)
            .context("installing operator-supplied user requirements")?;
    }
    Ok(())
}

/// Converge the hub environment: build deps from apt, then the hub's
/// pip packages (pycurl first, it needs the build deps).
fn ensure_hub_packages(
    runner: &dyn CommandRunner,
    apt: &AptManager,
    prefix: &Path,
) -> Result<()> {
    let env = hub_env(prefix);
    apt.install_packages(&owned(HUB_APT_PACKAGES))?;
    ensure_pip_packages(runner, &env, &owned(&["pycurl==7.43.*"]))?;
    ensure_pip_packages(runner, &env, &owned(HUB_PIP_PACKAGES))?;
    Ok(())
}

/// Apply package contributions collected from plugins, then their
/// post-install logic. Contribution order follows plugin discovery
/// order; duplicates are fine because every install is convergent.
fn run_hook_actions(
    runner: &dyn CommandRunner,
    apt: &AptManager,
    prefix: &Path,
    registry: &HookRegistry,
) -> Result<()> {
    let apt_specs: Vec<PackageSpec> = registry
        .extra_apt_packages()
        .into_iter()
        .map(PackageSpec::system)
        .collect();
    if !apt_specs.is_empty() {
        info!(
            "Installing {} apt packages collected from plugins",
            apt_specs.len()
        );
        apt.install_packages(&selectors(&apt_specs))?;
    }

    let hub_pip = registry.extra_hub_pip_packages();
    if !hub_pip.is_empty() {
        info!(
            "Installing {} hub pip packages collected from plugins",
            hub_pip.len()
        );
        ensure_pip_packages(runner, &hub_env(prefix), &hub_pip)?;
    }

    let conda_specs: Vec<PackageSpec> = registry
        .extra_user_conda_packages()
        .into_iter()
        .map(PackageSpec::environment)
        .collect();
    if !conda_specs.is_empty() {
        info!(
            "Installing {} user conda packages collected from plugins",
            conda_specs.len()
        );
        ensure_conda_packages(runner, &user_env(prefix), &selectors(&conda_specs))?;
    }

    let user_pip = registry.extra_user_pip_packages();
    if !user_pip.is_empty() {
        info!(
            "Installing {} user pip packages collected from plugins",
            user_pip.len()
        );
        ensure_pip_packages(runner, &user_env(prefix), &user_pip)?;
    }

    registry.post_install().context("plugin post-install hook")
}

/// Ensure the node runtime the hub's HTTP proxy needs: trust the
/// nodesource signing key, add the repository, install nodejs.
fn ensure_node_runtime(downloader: &Downloader, apt: &AptManager, key_url: &str) -> Result<()> {
    let key = downloader
        .fetch_bytes(key_url)
        .context("fetching the nodesource signing key")?;
    apt.trust_key(&key)?;
    let outcome = apt.add_source("nodesource", NODE_SOURCE_URL, "main")?;
    report_step("nodesource apt source", outcome);
    apt.install_packages(&owned(&["nodejs"]))?;
    Ok(())
}

/// One line per converged step, distinguishing mutation from no-op
fn report_step(step: &str, outcome: Outcome) {
    if outcome.changed() {
        info!("{step}: changed");
    } else {
        info!("{step}: already up to date");
    }
}

/// SIGINT the progress-page server; a failure here is logged but does
/// not abort a provisioning run that already converged.
fn stop_progress_server(pid: i32) {
    match kill(Pid::from_raw(pid), Signal::SIGINT) {
        Ok(()) => info!("Progress page server stopped successfully."),
        Err(err) => error!("Couldn't stop the progress page server: {}", err),
    }
}

fn selectors(specs: &[PackageSpec]) -> Vec<String> {
    specs.iter().map(|s| s.selector.clone()).collect()
}

fn owned(packages: &[&str]) -> Vec<String> {
    packages.iter().map(|p| p.to_string()).collect()
}
