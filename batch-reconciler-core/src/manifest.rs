//! Manifest files: the desired resources plus optional reconciler settings.
//!
//! ```toml
//! [settings.create]
//! timeout_secs = 900
//!
//! [[compute_environment]]
//! name = "ce-spot"
//! type = "MANAGED"
//! service_role_arn = "arn:aws:iam::123456789012:role/AWSBatchServiceRole"
//!
//! [compute_environment.compute_resources]
//! type = "EC2"
//! min_vcpus = 0
//! max_vcpus = 16
//! # ...
//!
//! [[job_queue]]
//! name = "default"
//! state = "ENABLED"
//! priority = 1
//! compute_environments = ["ce-spot"]
//! ```

use crate::config::ReconcilerConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::types::{ComputeEnvironmentSpec, JobQueueSpec, ResourceKind};
use crate::validation::{validate_compute_environment, validate_job_queue};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub settings: ReconcilerConfig,
    #[serde(default, rename = "compute_environment")]
    pub compute_environments: Vec<ComputeEnvironmentSpec>,
    #[serde(default, rename = "job_queue")]
    pub job_queues: Vec<JobQueueSpec>,
}

impl Manifest {
    pub fn from_toml_str(content: &str) -> ReconcileResult<Self> {
        toml::from_str(content)
            .map_err(|e| ReconcileError::manifest(format!("Failed to parse TOML manifest: {e}")))
    }

    pub fn from_json_str(content: &str) -> ReconcileResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| ReconcileError::manifest(format!("Failed to parse JSON manifest: {e}")))
    }

    /// Load from disk; `.json` files are read as JSON, anything else as TOML.
    pub fn load(path: &Path) -> ReconcileResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReconcileError::manifest(format!("Failed to read {}: {e}", path.display()))
        })?;
        debug!("Loaded manifest {} ({} bytes)", path.display(), content.len());

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.compute_environments.is_empty() && self.job_queues.is_empty()
    }

    /// Every problem in the manifest: duplicate names, then per-resource issues.
    pub fn problems(&self) -> Vec<ReconcileError> {
        let mut problems = Vec::new();

        let names = self
            .compute_environments
            .iter()
            .map(|ce| (ResourceKind::ComputeEnvironment, ce.name.as_str()))
            .chain(
                self.job_queues
                    .iter()
                    .map(|jq| (ResourceKind::JobQueue, jq.name.as_str())),
            );
        let mut seen = HashSet::new();
        for (kind, name) in names {
            if !seen.insert((kind, name)) {
                problems.push(ReconcileError::manifest(format!(
                    "{kind} '{name}' is declared more than once"
                )));
            }
        }

        problems.extend(
            self.compute_environments
                .iter()
                .filter_map(|ce| validate_compute_environment(ce).err()),
        );
        problems.extend(
            self.job_queues
                .iter()
                .filter_map(|jq| validate_job_queue(jq).err()),
        );
        problems
    }

    /// First problem found, if any.
    pub fn validate(&self) -> ReconcileResult<()> {
        match self.problems().into_iter().next() {
            Some(problem) => Err(problem),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComputeEnvironmentType, ResourceState};
    use std::io::Write;

    const SAMPLE: &str = r#"
[settings]
wait_on_update = false

[[compute_environment]]
name = "tf_acctest_batch_compute_environment_1"
type = "managed"
state = "ENABLED"
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
name = "tf_acctest_batch_job_queue_1"
state = "ENABLED"
priority = 1
compute_environments = ["tf_acctest_batch_compute_environment_1"]
"#;

    #[test]
    fn test_parse_toml_manifest() {
        let manifest = Manifest::from_toml_str(SAMPLE).unwrap();
        assert_eq!(manifest.compute_environments.len(), 1);
        assert_eq!(
            manifest.compute_environments[0].kind,
            ComputeEnvironmentType::Managed
        );
        assert_eq!(manifest.job_queues[0].state, ResourceState::Enabled);
        assert!(!manifest.settings.wait_on_update);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_bad_literal_is_a_parse_error() {
        let content = SAMPLE.replace("type = \"EC2\"", "type = \"FARGATE\"");
        let err = Manifest::from_toml_str(&content).unwrap_err();
        assert!(err.to_string().contains("EC2, SPOT"), "error was: {err}");
    }

    #[test]
    fn test_duplicate_names_are_reported() {
        let mut manifest = Manifest::from_toml_str(SAMPLE).unwrap();
        manifest
            .compute_environments
            .push(manifest.compute_environments[0].clone());
        let problems = manifest.problems();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].to_string().contains("more than once"));
    }

    #[test]
    fn test_load_json_by_extension() {
        let manifest = Manifest::from_toml_str(SAMPLE).unwrap();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(serde_json::to_string(&manifest).unwrap().as_bytes())
            .unwrap();

        let loaded = Manifest::load(file.path()).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_missing_file_is_a_manifest_error() {
        let err = Manifest::load(Path::new("/nonexistent/manifest.toml")).unwrap_err();
        assert!(matches!(err, ReconcileError::Manifest(_)));
    }
}
