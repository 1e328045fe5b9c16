//! Resource descriptors loaded from YAML.
//!
//! A descriptor captures the per-resource knobs that vary across the
//! backend's endpoints without touching code: which error codes mean
//! "not found", which fields force replacement, and the status tables
//! each lifecycle operation waits on.

use crate::poll::{AbsenceRule, WaitSpec};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("failed to parse descriptor YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("resource {0} is declared more than once")]
    DuplicateResource(String),

    #[error("descriptor for {resource} is invalid: {detail}")]
    Invalid { resource: String, detail: String },
}

/// Status table for one lifecycle operation's convergence wait.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct WaitTable {
    #[serde(default)]
    pub pending: Vec<String>,
    #[serde(default)]
    pub target: Vec<String>,
    #[serde(default)]
    pub failure: Vec<String>,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub initial_delay_secs: u64,
}

impl WaitTable {
    pub fn to_spec(&self, operation: impl Into<String>, absence: AbsenceRule) -> WaitSpec {
        WaitSpec::new(operation)
            .pending(self.pending.iter().cloned())
            .target(self.target.iter().cloned())
            .failure(self.failure.iter().cloned())
            .timeout(Duration::from_secs(self.timeout_secs))
            .poll_interval(Duration::from_secs(self.poll_interval_secs))
            .initial_delay(Duration::from_secs(self.initial_delay_secs))
            .absence(absence)
    }

    fn validate(&self, resource: &str, operation: &str) -> Result<(), DescriptorError> {
        let invalid = |detail: String| DescriptorError::Invalid {
            resource: resource.to_string(),
            detail,
        };

        if self.timeout_secs == 0 {
            return Err(invalid(format!("{operation} wait has a zero timeout")));
        }
        if self.poll_interval_secs == 0 {
            return Err(invalid(format!("{operation} wait has a zero poll interval")));
        }
        if let Some(status) = self.target.iter().find(|s| self.failure.contains(s)) {
            return Err(invalid(format!(
                "{operation} wait lists {status} as both target and failure"
            )));
        }
        // Deletes converge on absence, so an empty target set is fine there.
        if operation != "delete" && self.target.is_empty() {
            return Err(invalid(format!("{operation} wait has no target statuses")));
        }
        Ok(())
    }
}

/// Everything the orchestrator needs to know about one resource kind.
#[derive(Clone, Debug, Deserialize)]
pub struct OperationDescriptor {
    pub resource: String,
    /// Field whose value identifies a record uniquely within a listing.
    pub unique_key: String,
    /// Where the convergence status lives in a read response. Required
    /// whenever any wait table is declared.
    #[serde(default)]
    pub status_path: Option<String>,
    /// Fields that cannot be changed on a live resource.
    #[serde(default)]
    pub non_updatable: Vec<String>,
    /// Backend error codes remapped to "not found", beyond the built-in
    /// marker heuristics.
    #[serde(default)]
    pub not_found_codes: Vec<String>,
    /// Wait tables keyed by operation name: create, update, delete.
    #[serde(default)]
    pub waits: HashMap<String, WaitTable>,
}

impl OperationDescriptor {
    /// First changed field that forces replacement, if any.
    pub fn replacement_required<'a>(&'a self, changed: &[&str]) -> Option<&'a str> {
        self.non_updatable
            .iter()
            .map(String::as_str)
            .find(|field| changed.contains(field))
    }

    pub fn wait(&self, operation: &str) -> Option<&WaitTable> {
        self.waits.get(operation)
    }

    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.unique_key.is_empty() {
            return Err(DescriptorError::Invalid {
                resource: self.resource.clone(),
                detail: "unique_key is empty".into(),
            });
        }
        if !self.waits.is_empty() && self.status_path.is_none() {
            return Err(DescriptorError::Invalid {
                resource: self.resource.clone(),
                detail: "waits are declared but status_path is not set".into(),
            });
        }
        for (operation, table) in &self.waits {
            table.validate(&self.resource, operation)?;
        }
        Ok(())
    }
}

/// All descriptors known to a deployment, loaded from one YAML document.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DescriptorSet {
    pub resources: Vec<OperationDescriptor>,
}

impl DescriptorSet {
    pub fn from_yaml(text: &str) -> Result<Self, DescriptorError> {
        let set: DescriptorSet = serde_yaml::from_str(text)?;
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<(), DescriptorError> {
        let mut seen = std::collections::HashSet::new();
        for descriptor in &self.resources {
            if !seen.insert(descriptor.resource.as_str()) {
                return Err(DescriptorError::DuplicateResource(
                    descriptor.resource.clone(),
                ));
            }
            descriptor.validate()?;
        }
        Ok(())
    }

    pub fn get(&self, resource: &str) -> Option<&OperationDescriptor> {
        self.resources.iter().find(|d| d.resource == resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST_PROTECTION: &str = r#"
resources:
  - resource: host_protection
    unique_key: host_id
    status_path: protect_status
    non_updatable: [host_id, charging_mode]
    not_found_codes: ["00000005"]
    waits:
      create:
        pending: [opening, upgrading]
        target: [opened, protected]
        failure: [error_protect]
        timeout_secs: 600
        poll_interval_secs: 10
      delete:
        pending: [closing]
        timeout_secs: 300
        poll_interval_secs: 10
        initial_delay_secs: 5
  - resource: protection_policy
    unique_key: policy_name
"#;

    #[test]
    fn test_parses_descriptor_yaml() {
        let set = DescriptorSet::from_yaml(HOST_PROTECTION).unwrap();
        assert_eq!(set.resources.len(), 2);

        let host = set.get("host_protection").unwrap();
        assert_eq!(host.unique_key, "host_id");
        assert_eq!(host.status_path.as_deref(), Some("protect_status"));
        assert_eq!(host.not_found_codes, ["00000005"]);

        let create = host.wait("create").unwrap();
        assert_eq!(create.timeout_secs, 600);
        assert_eq!(create.pending, ["opening", "upgrading"]);

        let delete = host.wait("delete").unwrap();
        assert!(delete.target.is_empty());
        assert_eq!(delete.initial_delay_secs, 5);

        let policy = set.get("protection_policy").unwrap();
        assert!(policy.waits.is_empty());
        assert!(policy.status_path.is_none());
    }

    #[test]
    fn test_wait_table_to_spec() {
        let set = DescriptorSet::from_yaml(HOST_PROTECTION).unwrap();
        let table = set.get("host_protection").unwrap().wait("create").unwrap();
        let spec = table.to_spec("create host_protection", AbsenceRule::Failure);

        assert!(spec.target.contains("opened"));
        assert!(spec.failure.contains("error_protect"));
        assert_eq!(spec.timeout, Duration::from_secs(600));
        assert_eq!(spec.poll_interval, Duration::from_secs(10));
        assert_eq!(spec.absence, AbsenceRule::Failure);
    }

    #[test]
    fn test_replacement_required() {
        let set = DescriptorSet::from_yaml(HOST_PROTECTION).unwrap();
        let host = set.get("host_protection").unwrap();

        assert_eq!(
            host.replacement_required(&["version", "charging_mode"]),
            Some("charging_mode")
        );
        assert_eq!(host.replacement_required(&["version"]), None);
    }

    #[test]
    fn test_rejects_duplicate_resources() {
        let err = DescriptorSet::from_yaml(
            r#"
resources:
  - resource: host_protection
    unique_key: host_id
  - resource: host_protection
    unique_key: host_id
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DescriptorError::DuplicateResource(ref r) if r == "host_protection"));
    }

    #[test]
    fn test_rejects_waits_without_status_path() {
        let err = DescriptorSet::from_yaml(
            r#"
resources:
  - resource: host_protection
    unique_key: host_id
    waits:
      create:
        target: [opened]
        timeout_secs: 60
        poll_interval_secs: 5
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("status_path"));
    }

    #[test]
    fn test_rejects_overlapping_target_and_failure() {
        let err = DescriptorSet::from_yaml(
            r#"
resources:
  - resource: host_protection
    unique_key: host_id
    status_path: protect_status
    waits:
      create:
        target: [opened]
        failure: [opened]
        timeout_secs: 60
        poll_interval_secs: 5
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("both target and failure"));
    }

    #[test]
    fn test_rejects_zero_durations_and_empty_targets() {
        let err = DescriptorSet::from_yaml(
            r#"
resources:
  - resource: host_protection
    unique_key: host_id
    status_path: protect_status
    waits:
      create:
        target: [opened]
        timeout_secs: 0
        poll_interval_secs: 5
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("zero timeout"));

        let err = DescriptorSet::from_yaml(
            r#"
resources:
  - resource: host_protection
    unique_key: host_id
    status_path: protect_status
    waits:
      update:
        timeout_secs: 60
        poll_interval_secs: 5
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no target statuses"));
    }
}
