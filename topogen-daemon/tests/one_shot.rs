//! One-shot scheduler run against a metadata document on disk.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::broadcast;
use topogen_core::{Config, TemplateConfig};
use topogen_daemon::{open_metadata_source, run, DaemonError, Mode, Poller};
use topogen_sync::ProcessOptions;

const METADATA: &str = r#"
version: "1"
services:
  - name: cache
    stack_name: infra
    ports: ["6379:6379/tcp"]
containers:
  - name: infra-cache-1
    primary_ip: 10.1.0.5
    stack_name: infra
    service_name: cache
self:
  stack_name: infra
"#;

fn config(dir: &TempDir, template_body: &str) -> Config {
    let metadata = dir.path().join("metadata.yaml");
    let source = dir.path().join("cache.tera");
    fs::write(&metadata, METADATA).unwrap();
    fs::write(&source, template_body).unwrap();
    Config {
        metadata_file: Some(metadata),
        onetime: true,
        templates: vec![TemplateConfig {
            source: Some(source),
            dest: Some(dir.path().join("cache.conf")),
            check_cmd: "test -s {{staging}} || true".to_string(),
            notify_cmd: format!("echo notified >> {}", dir.path().join("notify.log").display()),
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn one_shot_writes_and_notifies() {
    let dir = TempDir::new().unwrap();
    let config = config(
        &dir,
        r#"{% set s = service(name="cache") %}{% for c in s.containers %}{{ c.address }}:{{ s.ports.0.internal_port }}{% endfor %}"#,
    );
    let source = open_metadata_source(&config).unwrap();
    let poller = Poller::new(config.templates.clone(), Arc::clone(&source), ProcessOptions::default());
    let (_tx, rx) = broadcast::channel(1);

    run(poller, Mode::from_config(&config), rx).await.unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("cache.conf")).unwrap(),
        "10.1.0.5:6379"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("notify.log")).unwrap(),
        "notified\n"
    );
}

#[tokio::test]
async fn one_shot_propagates_render_failure() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, "{% for %}");
    let source = open_metadata_source(&config).unwrap();
    let poller = Poller::new(config.templates.clone(), source, ProcessOptions::default());
    let (_tx, rx) = broadcast::channel(1);

    let err = run(poller, Mode::OneShot, rx).await.unwrap_err();
    assert!(matches!(err, DaemonError::Sync(ref e) if e.is_fatal()), "got {err}");
    assert!(!dir.path().join("cache.conf").exists());
    assert!(!dir.path().join("notify.log").exists());
}
