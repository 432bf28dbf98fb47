// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::common::{LastError, LastOperation, SecretReference};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "core.gardener.cloud", version = "v1beta1", kind = "BackupBucket")]
#[kube(status = "BackupBucketStatus")]
#[serde(rename_all = "camelCase")]
pub struct BackupBucketSpec {
    #[serde(default)]
    pub provider: BackupProvider,
    pub secret_ref: SecretReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupProvider {
    #[serde(rename = "type", default)]
    pub provider_type: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupBucketStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "core.gardener.cloud", version = "v1beta1", kind = "BackupEntry", plural = "backupentries")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntrySpec {
    pub bucket_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,
}
