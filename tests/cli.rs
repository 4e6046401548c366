// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const PIPELINE: &str = r#"
- type: producer-app
  name: source
  namespace: data
  to:
    topics:
      ${output_topic_name}:
        type: output
- type: kafka-sink-connector
  name: sink
  config:
    connector.class: io.confluent.connect.jdbc.JdbcSinkConnector
"#;

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let pipeline_dir = dir.path().join("orders");
    fs::create_dir_all(&pipeline_dir).unwrap();
    fs::write(pipeline_dir.join("pipeline.yaml"), PIPELINE).unwrap();
    dir
}

fn kaflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kaflow").unwrap();
    cmd.current_dir(dir)
        .env_remove("KAFLOW_ENVIRONMENT")
        .env_remove("KAFLOW_CONFIG")
        .env_remove("KAFLOW_DEFAULT_PATH")
        .env("KAFLOW_KAFKA_BROKERS", "broker:9092")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_generate_prints_resolved_pipeline() {
    let dir = workspace();

    kaflow(dir.path())
        .args(["generate", "orders/pipeline.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("name: orders-source"))
        .stdout(predicate::str::contains("name: orders-sink"))
        .stdout(predicate::str::contains("topics: orders-source"));
}

#[test]
fn test_generate_searches_directories() {
    let dir = workspace();

    kaflow(dir.path())
        .args(["generate", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("orders-sink"));
}

#[test]
fn test_validate_reports_valid_pipeline() {
    let dir = workspace();

    kaflow(dir.path())
        .args(["validate", "orders"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid!"));
}

#[test]
fn test_validate_fails_on_unwired_sink() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("pipeline.yaml"),
        "- type: kafka-sink-connector\n  name: sink\n  config:\n    connector.class: C\n",
    )
    .unwrap();

    kaflow(dir.path())
        .args(["validate", "pipeline.yaml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("reads no topics"));
}

#[test]
fn test_graph_mermaid() {
    let dir = workspace();

    kaflow(dir.path())
        .args(["graph", "orders", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("graph LR"));
}

#[test]
fn test_missing_pipeline_fails() {
    let dir = tempfile::tempdir().unwrap();

    kaflow(dir.path())
        .args(["generate", "missing.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_missing_brokers_fails() {
    let dir = workspace();

    kaflow(dir.path())
        .env_remove("KAFLOW_KAFKA_BROKERS")
        .args(["generate", "orders"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("kafka_brokers"));
}

#[test]
fn test_unknown_component_type_names_component() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("pipeline.yaml"),
        "- type: spaceship\n  name: apollo\n",
    )
    .unwrap();

    kaflow(dir.path())
        .args(["generate", "pipeline.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("spaceship"));
}
