use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const METADATA: &str = r#"
version: "5"
containers:
  - name: web-1
    primary_ip: 10.0.0.11
    stack_name: shop
    service_name: web
    labels: { role: web }
  - name: web-2
    primary_ip: 10.0.0.12
    stack_name: shop
    service_name: web
    labels: { role: web }
self:
  stack_name: shop
"#;

const UPSTREAM: &str = r#"{% set web = containers(service="web") -%}
upstream web {
{%- for c in web %}
  server {{ c.address }}:8080;
{%- endfor %}
}
"#;

const RENDERED: &str = "upstream web {\n  server 10.0.0.11:8080;\n  server 10.0.0.12:8080;\n}\n";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(template: &str) -> Self {
        let dir = TempDir::new().expect("tmp");
        fs::write(dir.path().join("metadata.yaml"), METADATA).expect("metadata");
        fs::write(dir.path().join("upstream.tera"), template).expect("template");
        let config = format!(
            "metadata_file: {root}/metadata.yaml\nlog_level: warn\ntemplates:\n  - source: {root}/upstream.tera\n    dest: {root}/upstream.conf\n    notify_cmd: \"echo reloaded >> {root}/notify.log\"\n",
            root = dir.path().display()
        );
        fs::write(dir.path().join("config.yaml"), config).expect("config");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("topogen"));
        cmd.arg(subcommand)
            .arg("--config")
            .arg(self.path("config.yaml"))
            .env_remove("RUST_LOG");
        cmd
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

#[test]
fn onetime_run_writes_destination_and_notifies() {
    let fx = Fixture::new(UPSTREAM);
    fx.cmd("run").arg("--onetime").assert().success();

    assert_eq!(read(&fx.path("upstream.conf")), RENDERED);
    assert_eq!(read(&fx.path("notify.log")), "reloaded\n");

    // Second run: same content, so no notify.
    fx.cmd("run").arg("--onetime").assert().success();
    assert_eq!(read(&fx.path("notify.log")), "reloaded\n");
}

#[test]
fn diff_shows_changes_without_writing() {
    let fx = Fixture::new(UPSTREAM);
    fs::write(fx.path("upstream.conf"), "upstream web {\n  server 10.0.0.11:8080;\n}\n").unwrap();

    fx.cmd("diff")
        .assert()
        .success()
        .stdout(contains("+++ b"))
        .stdout(contains("+  server 10.0.0.12:8080;"));

    assert!(read(&fx.path("upstream.conf")).ends_with("10.0.0.11:8080;\n}\n"));
    assert!(!fx.path("notify.log").exists());
}

#[test]
fn dry_run_leaves_destination_alone() {
    let fx = Fixture::new(UPSTREAM);
    fx.cmd("run")
        .args(["--onetime", "--dry-run"])
        .assert()
        .success();
    assert!(!fx.path("upstream.conf").exists());
    assert!(!fx.path("notify.log").exists());
}

#[test]
fn status_json_reports_missing_then_up_to_date() {
    let fx = Fixture::new(UPSTREAM);
    fx.cmd("status")
        .arg("--json")
        .assert()
        .success()
        .stdout(contains("\"status\": \"missing\""))
        .stdout(contains("\"version\": \"5\""));

    fx.cmd("run").arg("--onetime").assert().success();
    fx.cmd("status")
        .arg("--json")
        .assert()
        .success()
        .stdout(contains("\"status\": \"up_to_date\""));
}

#[test]
fn render_error_fails_the_run() {
    let fx = Fixture::new("{% for %}");
    fx.cmd("run")
        .arg("--onetime")
        .assert()
        .failure()
        .stderr(contains("upstream.tera"));
    assert!(!fx.path("upstream.conf").exists());
}

#[test]
fn missing_config_is_reported() {
    let dir = TempDir::new().unwrap();
    Command::new(assert_cmd::cargo::cargo_bin!("topogen"))
        .args(["status", "--config"])
        .arg(dir.path().join("absent.yaml"))
        .assert()
        .failure()
        .stderr(contains("failed to load config"));
}

#[test]
fn metadata_file_flag_overrides_config() {
    let fx = Fixture::new(UPSTREAM);
    let other = fx.path("other.yaml");
    fs::write(&other, "version: \"9\"\n").unwrap();
    fx.cmd("status")
        .arg("--json")
        .arg("--metadata-file")
        .arg(&other)
        .assert()
        .success()
        .stdout(contains("\"version\": \"9\""));
}
