// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! SecretBinding and Quota resources.
//!
//! SecretBindings carry their fields at the top level instead of under `spec`,
//! so they are wired to kube through the k8s-openapi resource traits rather
//! than the `CustomResource` derive.

use crate::types::common::{ObjectReference, SecretReference};
use k8s_openapi::{apimachinery::pkg::apis::meta::v1::ObjectMeta, NamespaceResourceScope};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretBinding {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub secret_ref: SecretReference,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quotas: Vec<ObjectReference>,
}

impl k8s_openapi::Resource for SecretBinding {
    const API_VERSION: &'static str = "core.gardener.cloud/v1beta1";
    const GROUP: &'static str = "core.gardener.cloud";
    const KIND: &'static str = "SecretBinding";
    const VERSION: &'static str = "v1beta1";
    const URL_PATH_SEGMENT: &'static str = "secretbindings";
    type Scope = NamespaceResourceScope;
}

impl k8s_openapi::Metadata for SecretBinding {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl SecretBinding {
    /// Namespace of the referenced secret, defaulting to the binding's own namespace
    pub fn secret_namespace(&self) -> String {
        if self.secret_ref.namespace.is_empty() {
            self.metadata.namespace.clone().unwrap_or_default()
        } else {
            self.secret_ref.namespace.clone()
        }
    }
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "core.gardener.cloud", version = "v1beta1", kind = "Quota")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_lifetime_days: Option<i32>,
    #[serde(default)]
    pub metrics: BTreeMap<String, String>,
}

/// A cluster registered with Gardener that Gardener does not manage
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "core.gardener.cloud", version = "v1beta1", kind = "Plant")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct PlantSpec {
    pub secret_ref: crate::types::common::LocalObjectReference,
}
