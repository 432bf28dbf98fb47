// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::common::{condition_types, Condition};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "resources.gardener.cloud", version = "v1alpha1", kind = "ManagedResource")]
#[kube(namespaced)]
#[kube(status = "ManagedResourceStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default)]
    pub keep_objects: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: i64,
}

impl ManagedResource {
    /// Returns the first of ResourcesApplied/ResourcesHealthy that is not true
    pub fn unhealthy_condition(&self) -> Option<(&'static str, Option<&Condition>)> {
        let conditions = self
            .status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default();
        [condition_types::RESOURCES_APPLIED, condition_types::RESOURCES_HEALTHY]
            .into_iter()
            .find_map(|t| {
                let found = conditions.iter().find(|c| c.condition_type == t);
                match found {
                    Some(c) if c.is_true() => None,
                    other => Some((t, other)),
                }
            })
    }
}
