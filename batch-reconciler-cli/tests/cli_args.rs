use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

// Test manifest constants
const VALID_MANIFEST: &str = r#"
[[compute_environment]]
name = "ce-ec2"
type = "MANAGED"
service_role_arn = "arn:aws:iam::123456789012:role/AWSBatchServiceRole"

[compute_environment.compute_resources]
type = "EC2"
min_vcpus = 0
max_vcpus = 1
instance_types = ["m3.medium"]
instance_role_arn = "arn:aws:iam::123456789012:instance-profile/ecsInstanceRole"
security_group_ids = ["sg-0123456789abcdef0"]
subnets = ["subnet-0123456789abcdef0"]

[[job_queue]]
name = "q1"
state = "ENABLED"
priority = 1
compute_environments = ["ce-ec2"]
"#;

const INVALID_MANIFEST: &str = r#"
[[job_queue]]
name = "bad name!"
state = "ENABLED"
priority = 1
compute_environments = []
"#;

fn manifest_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("failed to create manifest");
    file.write_all(content.as_bytes())
        .expect("failed to write manifest");
    file
}

#[test]
fn help_lists_subcommands() {
    let out = Command::new(env!("CARGO_BIN_EXE_batch-reconciler"))
        .arg("--help")
        .output()
        .expect("failed to run --help");
    let s = String::from_utf8_lossy(&out.stdout);
    for command in ["validate", "render", "plan", "apply", "destroy", "read"] {
        assert!(s.contains(command), "help should list {command}: {}", s);
    }
}

#[test]
fn test_validate_accepts_valid_manifest() {
    let manifest = manifest_file(VALID_MANIFEST);
    let output = Command::new(env!("CARGO_BIN_EXE_batch-reconciler"))
        .arg("validate")
        .arg(manifest.path())
        .output()
        .expect("failed to run validate");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr was: {}", stderr);
    assert!(
        stderr.contains("1 compute environment(s), 1 job queue(s)"),
        "stderr was: {}",
        stderr
    );
}

#[test]
fn test_validate_reports_every_problem() {
    let manifest = manifest_file(INVALID_MANIFEST);
    let output = Command::new(env!("CARGO_BIN_EXE_batch-reconciler"))
        .arg("validate")
        .arg(manifest.path())
        .output()
        .expect("failed to run validate with invalid manifest");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bad name!"), "stderr was: {}", stderr);
}

#[test]
fn test_validate_missing_file() {
    AssertCommand::cargo_bin("batch-reconciler")
        .expect("binary should build")
        .args(["validate", "/nonexistent/manifest.toml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_render_prints_create_requests() {
    let manifest = manifest_file(VALID_MANIFEST);
    let output = AssertCommand::cargo_bin("batch-reconciler")
        .expect("binary should build")
        .arg("render")
        .arg(manifest.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let rendered: serde_json::Value =
        serde_json::from_slice(&output).expect("render should print JSON");
    let ce = &rendered["compute_environments"][0];
    assert_eq!(ce["computeEnvironmentName"], "ce-ec2");
    assert_eq!(ce["computeResources"]["minvCpus"], 0);
    assert_eq!(ce["computeResources"]["maxvCpus"], 1);

    let order = &rendered["job_queues"][0]["computeEnvironmentOrder"][0];
    assert_eq!(order["order"], 1);
    assert_eq!(order["computeEnvironment"], "ce-ec2");
}

#[test]
fn test_apply_refuses_without_tty() {
    let manifest = manifest_file(VALID_MANIFEST);
    AssertCommand::cargo_bin("batch-reconciler")
        .expect("binary should build")
        .arg("apply")
        .arg(manifest.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("run interactively in a TTY"));
}

#[test]
fn test_destroy_refuses_without_tty() {
    let manifest = manifest_file(VALID_MANIFEST);
    AssertCommand::cargo_bin("batch-reconciler")
        .expect("binary should build")
        .arg("destroy")
        .arg(manifest.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("pass --yes"));
}

#[test]
fn test_read_rejects_unknown_kind() {
    AssertCommand::cargo_bin("batch-reconciler")
        .expect("binary should build")
        .args(["read", "scheduling-policy", "p1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("compute-environment"));
}
