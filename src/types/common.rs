// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Types shared by the Gardener API groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition types used on Shoots, Seeds and ManagedSeeds
pub mod condition_types {
    pub const API_SERVER_AVAILABLE: &str = "APIServerAvailable";
    pub const CONTROL_PLANE_HEALTHY: &str = "ControlPlaneHealthy";
    pub const EVERY_NODE_READY: &str = "EveryNodeReady";
    pub const SYSTEM_COMPONENTS_HEALTHY: &str = "SystemComponentsHealthy";
    pub const GARDENLET_READY: &str = "GardenletReady";
    pub const BACKUP_BUCKETS_READY: &str = "BackupBucketsReady";
    pub const SEED_REGISTERED: &str = "SeedRegistered";
    pub const RESOURCES_APPLIED: &str = "ResourcesApplied";
    pub const RESOURCES_HEALTHY: &str = "ResourcesHealthy";
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
    Progressing,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<ErrorCode>,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Gardener error codes attached to last errors and conditions
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, schemars::JsonSchema)]
pub enum ErrorCode {
    #[serde(rename = "ERR_INFRA_UNAUTHORIZED")]
    InfraUnauthorized,
    #[serde(rename = "ERR_INFRA_INSUFFICIENT_PRIVILEGES")]
    InfraInsufficientPrivileges,
    #[serde(rename = "ERR_INFRA_QUOTA_EXCEEDED")]
    InfraQuotaExceeded,
    #[serde(rename = "ERR_INFRA_RATE_LIMITS_EXCEEDED")]
    InfraRateLimitsExceeded,
    #[serde(rename = "ERR_INFRA_REQUEST_THROTTLING")]
    InfraRequestThrottling,
    #[serde(rename = "ERR_INFRA_DEPENDENCIES")]
    InfraDependencies,
    #[serde(rename = "ERR_RETRYABLE_INFRA_DEPENDENCIES")]
    RetryableInfraDependencies,
    #[serde(rename = "ERR_INFRA_RESOURCES_DEPLETED")]
    InfraResourcesDepleted,
    #[serde(rename = "ERR_CLEANUP_CLUSTER_RESOURCES")]
    CleanupClusterResources,
    #[serde(rename = "ERR_CONFIGURATION_PROBLEM")]
    ConfigurationProblem,
    #[serde(rename = "ERR_RETRYABLE_CONFIGURATION_PROBLEM")]
    RetryableConfigurationProblem,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InfraUnauthorized => "ERR_INFRA_UNAUTHORIZED",
            ErrorCode::InfraInsufficientPrivileges => "ERR_INFRA_INSUFFICIENT_PRIVILEGES",
            ErrorCode::InfraQuotaExceeded => "ERR_INFRA_QUOTA_EXCEEDED",
            ErrorCode::InfraRateLimitsExceeded => "ERR_INFRA_RATE_LIMITS_EXCEEDED",
            ErrorCode::InfraRequestThrottling => "ERR_INFRA_REQUEST_THROTTLING",
            ErrorCode::InfraDependencies => "ERR_INFRA_DEPENDENCIES",
            ErrorCode::RetryableInfraDependencies => "ERR_RETRYABLE_INFRA_DEPENDENCIES",
            ErrorCode::InfraResourcesDepleted => "ERR_INFRA_RESOURCES_DEPLETED",
            ErrorCode::CleanupClusterResources => "ERR_CLEANUP_CLUSTER_RESOURCES",
            ErrorCode::ConfigurationProblem => "ERR_CONFIGURATION_PROBLEM",
            ErrorCode::RetryableConfigurationProblem => "ERR_RETRYABLE_CONFIGURATION_PROBLEM",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub enum LastOperationType {
    Create,
    Reconcile,
    Delete,
    Migrate,
    Restore,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub enum LastOperationState {
    Processing,
    Succeeded,
    Error,
    Failed,
    Pending,
    Aborted,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    #[serde(rename = "type")]
    pub operation_type: LastOperationType,
    pub state: LastOperationState,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

impl LastOperation {
    pub fn new(
        operation_type: LastOperationType,
        state: LastOperationState,
        progress: i32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            operation_type,
            state,
            progress,
            description: description.into(),
            last_update_time: Some(Utc::now()),
        }
    }

    pub fn is(&self, operation_type: LastOperationType, state: LastOperationState) -> bool {
        self.operation_type == operation_type && self.state == state
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    pub description: String,
    #[serde(rename = "taskID", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

/// Reference to a secret in another namespace
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    pub name: String,
}

/// Labels and annotations of an object created from a template
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}
