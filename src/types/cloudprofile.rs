// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "core.gardener.cloud", version = "v1beta1", kind = "CloudProfile")]
#[serde(rename_all = "camelCase")]
pub struct CloudProfileSpec {
    #[serde(rename = "type", default)]
    pub provider_type: String,
    pub kubernetes: KubernetesSettings,
    #[serde(default)]
    pub machine_images: Vec<MachineImage>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesSettings {
    #[serde(default)]
    pub versions: Vec<ExpirableVersion>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineImage {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<ExpirableVersion>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpirableVersion {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<VersionClassification>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VersionClassification {
    Preview,
    Supported,
    Deprecated,
}

impl ExpirableVersion {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|d| d <= now)
    }

    pub fn is_preview(&self) -> bool {
        self.classification == Some(VersionClassification::Preview)
    }
}

impl CloudProfile {
    pub fn machine_image(&self, name: &str) -> Option<&MachineImage> {
        self.spec.machine_images.iter().find(|i| i.name == name)
    }
}
