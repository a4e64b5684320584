//! Static validation of resource specifications.
//!
//! Allow-listed literals are already enforced when a spec is parsed; this
//! module covers everything that needs more than one field or a pattern.
//! Every problem is reported, not just the first.

use crate::error::{ReconcileError, ReconcileResult};
use crate::types::{
    ComputeEnvironmentSpec, ComputeEnvironmentType, ComputeResourceType, ComputeResourcesSpec,
    JobQueueSpec,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

const MAX_NAME_LEN: usize = 128;
const MAX_COMPUTE_ENVIRONMENTS_PER_QUEUE: usize = 3;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("Invalid name regex"));

static ARN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:[\w-]+:[A-Za-z0-9-]+:([a-z]{2}-(gov-)?[a-z]+-\d)?:(\d{12})?:.+$")
        .expect("Invalid ARN regex")
});

pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LEN && NAME_PATTERN.is_match(name)
}

pub fn is_valid_arn(arn: &str) -> bool {
    ARN_PATTERN.is_match(arn)
}

fn check_name(field: &str, name: &str, problems: &mut Vec<String>) {
    if !is_valid_name(name) {
        problems.push(format!(
            "{field} '{name}' must be 1 to {MAX_NAME_LEN} letters, numbers, hyphens or underscores"
        ));
    }
}

fn check_arn(field: &str, arn: &str, problems: &mut Vec<String>) {
    if !is_valid_arn(arn) {
        problems.push(format!("{field} '{arn}' is not a valid ARN"));
    }
}

fn into_result(name: &str, problems: Vec<String>) -> ReconcileResult<()> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::InvalidSpec {
            name: name.to_string(),
            problems,
        })
    }
}

pub fn validate_compute_environment(spec: &ComputeEnvironmentSpec) -> ReconcileResult<()> {
    let mut problems = Vec::new();
    check_name("name", &spec.name, &mut problems);
    check_arn("service_role_arn", &spec.service_role_arn, &mut problems);

    match (spec.kind, &spec.compute_resources) {
        (ComputeEnvironmentType::Managed, None) => {
            problems.push("MANAGED compute environments require compute_resources".to_string());
        }
        (ComputeEnvironmentType::Unmanaged, Some(_)) => {
            problems.push("UNMANAGED compute environments cannot set compute_resources".to_string());
        }
        (_, Some(resources)) => check_compute_resources(resources, &mut problems),
        (ComputeEnvironmentType::Unmanaged, None) => {}
    }

    into_result(&spec.name, problems)
}

fn check_compute_resources(resources: &ComputeResourcesSpec, problems: &mut Vec<String>) {
    if resources.min_vcpus < 0 {
        problems.push(format!(
            "min_vcpus must not be negative, got {}",
            resources.min_vcpus
        ));
    }
    if resources.max_vcpus <= 0 {
        problems.push(format!(
            "max_vcpus must be positive, got {}",
            resources.max_vcpus
        ));
    }
    if resources.min_vcpus > resources.max_vcpus {
        problems.push(format!(
            "min_vcpus ({}) exceeds max_vcpus ({})",
            resources.min_vcpus, resources.max_vcpus
        ));
    }
    if let Some(desired) = resources.desired_vcpus {
        if desired < resources.min_vcpus || desired > resources.max_vcpus {
            problems.push(format!(
                "desired_vcpus ({desired}) must lie between min_vcpus ({}) and max_vcpus ({})",
                resources.min_vcpus, resources.max_vcpus
            ));
        }
    }

    for (field, values) in [
        ("instance_types", &resources.instance_types),
        ("subnets", &resources.subnets),
        ("security_group_ids", &resources.security_group_ids),
    ] {
        if values.is_empty() {
            problems.push(format!("{field} must not be empty"));
        }
    }

    check_arn("instance_role_arn", &resources.instance_role_arn, problems);

    if let Some(role) = &resources.spot_iam_fleet_role_arn {
        check_arn("spot_iam_fleet_role_arn", role, problems);
    } else if resources.kind == ComputeResourceType::Spot {
        problems.push("SPOT compute resources require spot_iam_fleet_role_arn".to_string());
    }

    if let Some(bid) = resources.bid_percentage {
        if !(0..=100).contains(&bid) {
            problems.push(format!("bid_percentage must be between 0 and 100, got {bid}"));
        }
    }
}

pub fn validate_job_queue(spec: &JobQueueSpec) -> ReconcileResult<()> {
    let mut problems = Vec::new();
    check_name("name", &spec.name, &mut problems);

    if spec.priority < 0 {
        problems.push(format!("priority must not be negative, got {}", spec.priority));
    }

    let count = spec.compute_environments.len();
    if count == 0 || count > MAX_COMPUTE_ENVIRONMENTS_PER_QUEUE {
        problems.push(format!(
            "compute_environments must list 1 to {MAX_COMPUTE_ENVIRONMENTS_PER_QUEUE} entries, got {count}"
        ));
    }

    let mut seen = HashSet::new();
    for environment in &spec.compute_environments {
        if !seen.insert(environment.as_str()) {
            problems.push(format!("compute environment '{environment}' is listed twice"));
        }
        if environment.starts_with("arn:") {
            check_arn("compute_environments entry", environment, &mut problems);
        } else {
            check_name("compute_environments entry", environment, &mut problems);
        }
    }

    into_result(&spec.name, problems)
}
