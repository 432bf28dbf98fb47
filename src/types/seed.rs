// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::common::{condition_types, Condition, SecretReference, TemplateMetadata};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "core.gardener.cloud", version = "v1beta1", kind = "Seed")]
#[kube(status = "SeedStatus")]
#[serde(rename_all = "camelCase")]
pub struct SeedSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<SeedBackup>,
    #[serde(default)]
    pub provider: SeedProvider,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeedBackup {
    #[serde(default)]
    pub provider: String,
    pub secret_ref: SecretReference,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeedProvider {
    #[serde(rename = "type", default)]
    pub provider_type: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeedStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Seed specification used by ManagedSeeds to register a shoot as seed
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeedTemplate {
    #[serde(default)]
    pub metadata: TemplateMetadata,
    pub spec: SeedSpec,
}

impl Seed {
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// A seed is ready when its gardenlet reports in and its backup buckets are usable
    pub fn is_ready(&self) -> bool {
        let conditions = self.conditions();
        let gardenlet_ready = conditions
            .iter()
            .any(|c| c.condition_type == condition_types::GARDENLET_READY && c.is_true());
        let buckets_ok = conditions
            .iter()
            .find(|c| c.condition_type == condition_types::BACKUP_BUCKETS_READY)
            .map_or(true, |c| c.is_true());
        gardenlet_ready && buckets_ok
    }
}
