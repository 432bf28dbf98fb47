// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ManagedSeed and ManagedSeedSet resources of `seedmanagement.gardener.cloud`.

use crate::types::common::{condition_types, Condition, TemplateMetadata};
use crate::types::seed::SeedTemplate;
use crate::types::shoot::ShootSpec;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "seedmanagement.gardener.cloud", version = "v1alpha1", kind = "ManagedSeed")]
#[kube(namespaced)]
#[kube(status = "ManagedSeedStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedSeedSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shoot: Option<ShootReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_template: Option<SeedTemplate>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShootReference {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSeedStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: i64,
}

impl ManagedSeed {
    /// The seed is registered and the status reflects the current generation
    pub fn is_registered(&self) -> bool {
        let Some(status) = self.status.as_ref() else {
            return false;
        };
        status.observed_generation == self.metadata.generation.unwrap_or_default()
            && status
                .conditions
                .iter()
                .any(|c| c.condition_type == condition_types::SEED_REGISTERED && c.is_true())
    }
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "seedmanagement.gardener.cloud", version = "v1alpha1", kind = "ManagedSeedSet")]
#[kube(namespaced)]
#[kube(status = "ManagedSeedSetStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedSeedSetSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub selector: LabelSelector,
    pub template: ManagedSeedTemplate,
    pub shoot_template: ShootTemplate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<UpdateStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_history_limit: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSeedTemplate {
    #[serde(default)]
    pub metadata: TemplateMetadata,
    pub spec: ManagedSeedSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShootTemplate {
    #[serde(default)]
    pub metadata: TemplateMetadata,
    pub spec: ShootSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStrategy {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<UpdateStrategyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolling_update: Option<RollingUpdateStrategy>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub enum UpdateStrategyType {
    RollingUpdate,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollingUpdateStrategy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSeedSetStatus {
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(default)]
    pub next_replica_number: i32,
    #[serde(default)]
    pub current_replicas: i32,
    #[serde(default)]
    pub updated_replicas: i32,
    #[serde(default)]
    pub current_revision: String,
    #[serde(default)]
    pub update_revision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collision_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_replica: Option<PendingReplica>,
}

/// The replica the set is currently waiting on
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingReplica {
    pub name: String,
    pub reason: PendingReplicaReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub enum PendingReplicaReason {
    ShootReconciling,
    ShootDeleting,
    ShootReconcileFailed,
    ShootDeleteFailed,
    ShootNotHealthy,
    ManagedSeedPreparing,
    ManagedSeedDeleting,
    SeedNotReady,
}

impl ManagedSeedSet {
    /// Fill in the API defaults for unset fields
    pub fn set_defaults(&mut self) {
        let spec = &mut self.spec;
        spec.replicas.get_or_insert(1);
        spec.revision_history_limit.get_or_insert(10);

        let strategy = spec.update_strategy.get_or_insert_with(UpdateStrategy::default);
        let strategy_type = *strategy
            .strategy_type
            .get_or_insert(UpdateStrategyType::RollingUpdate);
        if strategy_type == UpdateStrategyType::RollingUpdate {
            let rolling = strategy
                .rolling_update
                .get_or_insert_with(RollingUpdateStrategy::default);
            rolling.partition.get_or_insert(0);
        }
    }

    pub fn replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(1)
    }

    pub fn pending_replica(&self) -> Option<&PendingReplica> {
        self.status.as_ref().and_then(|s| s.pending_replica.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_set() -> ManagedSeedSet {
        ManagedSeedSet::new(
            "set",
            ManagedSeedSetSpec {
                template: ManagedSeedTemplate::default(),
                shoot_template: ShootTemplate::default(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_set_defaults_fills_unset_fields() {
        let mut set = make_set();
        set.set_defaults();

        assert_eq!(set.spec.replicas, Some(1));
        assert_eq!(set.spec.revision_history_limit, Some(10));
        let strategy = set.spec.update_strategy.unwrap();
        assert_eq!(strategy.strategy_type, Some(UpdateStrategyType::RollingUpdate));
        assert_eq!(strategy.rolling_update.unwrap().partition, Some(0));
    }

    #[test]
    fn test_set_defaults_keeps_explicit_values() {
        let mut set = make_set();
        set.spec.replicas = Some(3);
        set.spec.revision_history_limit = Some(2);
        set.spec.update_strategy = Some(UpdateStrategy {
            strategy_type: Some(UpdateStrategyType::RollingUpdate),
            rolling_update: Some(RollingUpdateStrategy { partition: Some(1) }),
        });
        set.set_defaults();

        assert_eq!(set.spec.replicas, Some(3));
        assert_eq!(set.spec.revision_history_limit, Some(2));
        assert_eq!(
            set.spec.update_strategy.unwrap().rolling_update.unwrap().partition,
            Some(1)
        );
    }

    #[test]
    fn test_managed_seed_registered_requires_current_generation() {
        let mut ms = ManagedSeed::new("ms", ManagedSeedSpec::default());
        ms.metadata.generation = Some(2);
        ms.status = Some(ManagedSeedStatus {
            conditions: vec![Condition {
                condition_type: condition_types::SEED_REGISTERED.to_string(),
                status: crate::types::common::ConditionStatus::True,
                last_transition_time: None,
                last_update_time: None,
                reason: String::new(),
                message: String::new(),
                codes: vec![],
            }],
            observed_generation: 1,
        });
        assert!(!ms.is_registered());

        ms.status.as_mut().unwrap().observed_generation = 2;
        assert!(ms.is_registered());
    }
}
