// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resources of `extensions.gardener.cloud` consumed by provider extensions.

use crate::types::common::{LastError, LastOperation, LastOperationState, LastOperationType};
use crate::types::shoot::Shoot;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "extensions.gardener.cloud", version = "v1alpha1", kind = "Worker")]
#[kube(namespaced)]
#[kube(status = "WorkerStatus")]
#[serde(rename_all = "camelCase")]
pub struct WorkerSpec {
    #[serde(rename = "type")]
    pub worker_type: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub pools: Vec<WorkerPool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPool {
    pub name: String,
    #[serde(default)]
    pub minimum: i32,
    #[serde(default)]
    pub maximum: i32,
    #[serde(default)]
    pub machine_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    #[serde(default)]
    pub observed_generation: i64,
}

impl Worker {
    pub fn last_operation(&self) -> Option<&LastOperation> {
        self.status.as_ref().and_then(|s| s.last_operation.as_ref())
    }

    /// The worker was handed over to another seed and must not be touched here
    pub fn is_migrated(&self) -> bool {
        self.last_operation()
            .is_some_and(|op| op.is(LastOperationType::Migrate, LastOperationState::Succeeded))
    }
}

/// Cluster-scoped view on the shoot, seed and cloud profile of a control plane namespace
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "extensions.gardener.cloud", version = "v1alpha1", kind = "Cluster")]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub cloud_profile: serde_json::Value,
    #[serde(default)]
    pub seed: serde_json::Value,
    #[serde(default)]
    pub shoot: serde_json::Value,
}

impl Cluster {
    /// Decode the embedded shoot, if any
    pub fn shoot(&self) -> crate::error::Result<Option<Shoot>> {
        if self.spec.shoot.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(self.spec.shoot.clone())?))
    }
}
