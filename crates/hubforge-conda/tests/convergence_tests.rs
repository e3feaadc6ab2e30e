//! Convergence tests for the environment provisioner and package
//! operations, driven through a recording fake runner so no real
//! conda/pip is required.

mod common;

use common::{FakeRunner, Response};
use hubforge_conda::packages::{
    ensure_conda_packages, ensure_pip_packages, ensure_pip_requirements,
};
use hubforge_conda::Provisioner;
use hubforge_core::{Downloader, Error, Outcome};
use std::fs;

const INSTALLER_BODY: &[u8] = b"#!/bin/bash\necho fake miniconda installer\n";
// sha256 of INSTALLER_BODY
const INSTALLER_SHA256: &str = "ee546cbce63a8b27bbebecc9240ffad3d9d2e71d13eea6486c919fe0883e9e4f";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_ensure_environment_satisfied_makes_no_network_calls() {
    let prefix = tempfile::tempdir().unwrap();
    fs::create_dir_all(prefix.path().join("bin")).unwrap();
    fs::write(prefix.path().join("bin/conda"), b"").unwrap();

    let runner = FakeRunner::new().on("conda -V", Response::Output("conda 4.9.2\n".into()));
    let downloader = Downloader::new().unwrap();
    let provisioner = Provisioner::new(&runner, &downloader);

    // Unroutable URL: reaching the network here would fail the test
    let outcome = provisioner
        .ensure_environment(prefix.path(), "4.8", "http://invalid.invalid/installer.sh", "00")
        .unwrap();

    assert_eq!(outcome, Outcome::AlreadySatisfied);
    assert_eq!(runner.commands().len(), 1);
}

#[test]
fn test_ensure_environment_installs_when_missing() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/installer.sh")
        .with_status(200)
        .with_body(INSTALLER_BODY)
        .create();
    let url = format!("{}/installer.sh", server.url());

    let prefix = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new();
    let downloader = Downloader::new().unwrap();
    let provisioner = Provisioner::new(&runner, &downloader);

    let outcome = provisioner
        .ensure_environment(prefix.path(), "4.8", &url, INSTALLER_SHA256)
        .unwrap();

    assert_eq!(outcome, Outcome::Changed);
    let commands = runner.commands();
    assert_eq!(commands.len(), 3, "installer, chown, chmod: {commands:?}");
    assert!(commands[0].starts_with("/bin/bash"));
    assert!(commands[0].ends_with(&format!("-u -b -p {}", prefix.path().display())));
    assert!(commands[1].starts_with("chown -R"));
    assert!(commands[2].starts_with("chmod -R o-w"));
}

#[test]
fn test_ensure_environment_reinstalls_old_version() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/installer.sh")
        .with_status(200)
        .with_body(INSTALLER_BODY)
        .create();
    let url = format!("{}/installer.sh", server.url());

    let prefix = tempfile::tempdir().unwrap();
    fs::create_dir_all(prefix.path().join("bin")).unwrap();
    fs::write(prefix.path().join("bin/conda"), b"").unwrap();

    let runner = FakeRunner::new().on("conda -V", Response::Output("conda 4.5.8\n".into()));
    let downloader = Downloader::new().unwrap();
    let provisioner = Provisioner::new(&runner, &downloader);

    let outcome = provisioner
        .ensure_environment(prefix.path(), "4.8", &url, INSTALLER_SHA256)
        .unwrap();
    assert_eq!(outcome, Outcome::Changed);
}

#[test]
fn test_probe_tolerates_broken_binary() {
    let prefix = tempfile::tempdir().unwrap();
    fs::create_dir_all(prefix.path().join("bin")).unwrap();
    fs::write(prefix.path().join("bin/conda"), b"").unwrap();

    let runner = FakeRunner::new().on("conda -V", Response::Fail(127));
    let downloader = Downloader::new().unwrap();
    let provisioner = Provisioner::new(&runner, &downloader);

    assert_eq!(provisioner.probe_version(prefix.path()), None);
}

#[test]
fn test_conda_packages_changed_and_permissions_normalized() {
    let prefix = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new().on(
        "-m conda install",
        Response::Output(
            "{\"fetch\":\"conda-4.8.1\",\"progress\":100}\n{\"success\": true}".into(),
        ),
    );

    let outcome =
        ensure_conda_packages(&runner, prefix.path(), &strings(&["conda==4.8.1"])).unwrap();

    assert_eq!(outcome, Outcome::Changed);
    let commands = runner.commands();
    assert!(commands[0].contains("-m conda install -c conda-forge --json --prefix"));
    assert!(commands[0].ends_with("conda==4.8.1"));
    assert!(commands[1].starts_with("chown -R"));
    assert!(commands[2].starts_with("chmod -R o-w"));
}

#[test]
fn test_conda_packages_already_satisfied() {
    let prefix = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new().on(
        "-m conda install",
        Response::Output(
            r#"{"message": "All requested packages already installed.", "success": true}"#.into(),
        ),
    );

    let outcome = ensure_conda_packages(&runner, prefix.path(), &strings(&["numpy"])).unwrap();
    assert_eq!(outcome, Outcome::AlreadySatisfied);
}

#[test]
fn test_conda_packages_unparseable_output_is_parse_error() {
    let prefix = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new().on(
        "-m conda install",
        Response::Output("segfault in progress bar renderer\n".into()),
    );

    let err = ensure_conda_packages(&runner, prefix.path(), &strings(&["numpy"])).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));

    // Permissions were still normalized before the parse verdict
    let commands = runner.commands();
    assert!(commands.iter().any(|c| c.starts_with("chown -R")));
}

#[test]
fn test_conda_packages_tool_failure_is_process_failed() {
    let prefix = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new().on("-m conda install", Response::Fail(1));

    let err = ensure_conda_packages(&runner, prefix.path(), &strings(&["numpy"])).unwrap_err();
    assert!(matches!(err, Error::ProcessFailed { .. }));
}

#[test]
fn test_empty_package_sets_are_noops() {
    let prefix = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new();

    assert_eq!(
        ensure_conda_packages(&runner, prefix.path(), &[]).unwrap(),
        Outcome::AlreadySatisfied
    );
    assert_eq!(
        ensure_pip_packages(&runner, prefix.path(), &[]).unwrap(),
        Outcome::AlreadySatisfied
    );
    assert!(runner.commands().is_empty());
}

#[test]
fn test_pip_packages_no_cache_policy() {
    let prefix = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new();

    let outcome =
        ensure_pip_packages(&runner, prefix.path(), &strings(&["pycurl==7.43.*"])).unwrap();

    assert_eq!(outcome, Outcome::Changed);
    let commands = runner.commands();
    assert!(commands[0].contains("-m pip install --no-cache-dir pycurl==7.43.*"));
    assert!(commands[1].starts_with("chown -R"));
}

#[test]
fn test_pip_requirements_accepts_url_manifest() {
    let prefix = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new();

    let outcome = ensure_pip_requirements(
        &runner,
        prefix.path(),
        "https://example.org/requirements.txt",
    )
    .unwrap();

    assert_eq!(outcome, Outcome::Changed);
    assert!(runner.commands()[0]
        .contains("-m pip install --no-cache-dir -r https://example.org/requirements.txt"));
}
