use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

/// A `localca` invocation isolated from the user's configuration.
fn bare(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("localca").unwrap();
    cmd.env_remove("LOCALCA_BASE_DIR")
        .env_remove("LOCALCA_PKCS12_PASSWORD")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .arg("--base-dir")
        .arg(dir.join("pki"))
        .arg("--config")
        .arg(dir.join("config.toml"));
    cmd
}

fn localca(dir: &Path) -> Command {
    let mut cmd = bare(dir);
    cmd.args(["--key-bits", "2048"]);
    cmd
}

fn init(dir: &Path) {
    localca(dir)
        .args(["init", "--country", "US", "--common-name", "Test Root"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Root CA created"));
}

#[test]
fn layout_of_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();

    localca(dir.path())
        .arg("layout")
        .assert()
        .success()
        .stdout(predicate::str::contains("(no root CA)"))
        .stdout(predicate::str::contains("issued_certs/"));

    assert!(dir.path().join("pki").join("root_ca").is_dir());
}

#[test]
fn issue_without_root_fails() {
    let dir = tempfile::tempdir().unwrap();

    localca(dir.path())
        .args(["issue", "svc.local"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("root CA"));

    let issued = dir.path().join("pki").join("issued_certs");
    assert_eq!(fs::read_dir(issued).unwrap().count(), 0);
}

#[test]
fn init_then_issue() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());

    localca(dir.path())
        .args(["issue", "svc.local", "--ip", "10.0.0.5", "--days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Issued svc.local"))
        .stdout(predicate::str::contains("IP:10.0.0.5"));

    let bundle = dir.path().join("pki").join("issued_certs").join("svc.local");
    for file in ["privkey.pem", "cert.pem", "fullchain.pem", "bundle.p12"] {
        assert!(bundle.join(file).is_file(), "{file} missing");
    }

    localca(dir.path())
        .arg("layout")
        .assert()
        .success()
        .stdout(predicate::str::contains("svc.local/"))
        .stdout(predicate::str::contains("Test Root"));
}

#[test]
fn second_init_needs_force() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());
    let cert = dir.path().join("pki").join("root_ca").join("rootCA.crt");
    let before = fs::read(&cert).unwrap();

    localca(dir.path())
        .args(["init", "--country", "US", "--common-name", "Other Root"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(fs::read(&cert).unwrap(), before);

    localca(dir.path())
        .args(["init", "--country", "US", "--common-name", "Other Root", "--force"])
        .assert()
        .success();
    assert_ne!(fs::read(&cert).unwrap(), before);
}

#[test]
fn invalid_domain_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());

    localca(dir.path())
        .args(["issue", "**.example.com"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid input"));
}

#[test]
fn renew_of_unknown_domain_fails() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());

    localca(dir.path())
        .args(["renew", "never.local"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No certificate has been issued for never.local"));
}

#[test]
fn undersized_keys_are_refused() {
    let dir = tempfile::tempdir().unwrap();

    bare(dir.path())
        .args(["--key-bits", "1024", "layout"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("at least 2048"));
}
