// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::common::LocalObjectReference;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "operations.gardener.cloud", version = "v1alpha1", kind = "Bastion")]
#[kube(namespaced)]
#[kube(status = "BastionStatus")]
#[serde(rename_all = "camelCase")]
pub struct BastionSpec {
    pub shoot_ref: LocalObjectReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,
    #[serde(rename = "sshPublicKey", default)]
    pub ssh_public_key: String,
    #[serde(default)]
    pub ingress: Vec<BastionIngressPolicy>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BastionIngressPolicy {
    pub ip_block: IpBlock,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpBlock {
    pub cidr: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BastionStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<DateTime<Utc>>,
}
