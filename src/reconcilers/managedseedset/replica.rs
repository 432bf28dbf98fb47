// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! A replica of a ManagedSeedSet: its shoot, managed seed and seed.

use crate::constants::labels;
use crate::types::common::TemplateMetadata;
use crate::types::managedseed::{
    ManagedSeed, ManagedSeedSet, PendingReplica, PendingReplicaReason, ShootReference,
};
use crate::types::seed::Seed;
use crate::types::shoot::{Shoot, ShootHealth};
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct Replica {
    pub name: String,
    pub ordinal: i32,
    pub shoot: Option<Shoot>,
    pub managed_seed: Option<ManagedSeed>,
    pub seed: Option<Seed>,
}

/// Ordinal of a replica named `<set>-<ordinal>`
pub fn replica_ordinal(set_name: &str, name: &str) -> Option<i32> {
    name.strip_prefix(set_name)?
        .strip_prefix('-')?
        .parse()
        .ok()
}

pub fn replica_name(set_name: &str, ordinal: i32) -> String {
    format!("{}-{}", set_name, ordinal)
}

fn is_deleting<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

impl Replica {
    pub fn is_deleting(&self) -> bool {
        self.shoot.as_ref().is_some_and(is_deleting)
            || self.managed_seed.as_ref().is_some_and(is_deleting)
    }

    /// Why the set has to wait for this replica, or `None` when it is ready
    pub fn pending_reason(&self) -> Option<PendingReplicaReason> {
        let Some(shoot) = &self.shoot else {
            return self
                .managed_seed
                .as_ref()
                .map(|_| PendingReplicaReason::ManagedSeedDeleting);
        };

        if is_deleting(shoot) {
            return Some(if shoot.delete_failed() {
                PendingReplicaReason::ShootDeleteFailed
            } else {
                PendingReplicaReason::ShootDeleting
            });
        }
        if let Some(ms) = &self.managed_seed {
            if is_deleting(ms) {
                return Some(PendingReplicaReason::ManagedSeedDeleting);
            }
        }
        if shoot.reconcile_failed() {
            return Some(PendingReplicaReason::ShootReconcileFailed);
        }
        if !shoot.reconcile_succeeded() {
            return Some(PendingReplicaReason::ShootReconciling);
        }
        match &self.managed_seed {
            Some(ms) if ms.is_registered() => {}
            _ => return Some(PendingReplicaReason::ManagedSeedPreparing),
        }
        if shoot.health() != ShootHealth::Healthy {
            return Some(PendingReplicaReason::ShootNotHealthy);
        }
        if !self.seed.as_ref().is_some_and(Seed::is_ready) {
            return Some(PendingReplicaReason::SeedNotReady);
        }
        None
    }

    pub fn is_ready(&self) -> bool {
        self.pending_reason().is_none()
    }
}

/// Group shoots, managed seeds and seeds into replicas ordered by ordinal
pub fn collect_replicas(
    set_name: &str,
    shoots: Vec<Shoot>,
    managed_seeds: Vec<ManagedSeed>,
    seeds: &[Seed],
) -> Vec<Replica> {
    let mut replicas: BTreeMap<i32, Replica> = BTreeMap::new();
    for shoot in shoots {
        let name = shoot.name_any();
        let Some(ordinal) = replica_ordinal(set_name, &name) else {
            continue;
        };
        replicas
            .entry(ordinal)
            .or_insert_with(|| Replica {
                name,
                ordinal,
                ..Default::default()
            })
            .shoot = Some(shoot);
    }
    for ms in managed_seeds {
        let name = ms.name_any();
        let Some(ordinal) = replica_ordinal(set_name, &name) else {
            continue;
        };
        replicas
            .entry(ordinal)
            .or_insert_with(|| Replica {
                name,
                ordinal,
                ..Default::default()
            })
            .managed_seed = Some(ms);
    }
    for replica in replicas.values_mut() {
        replica.seed = seeds.iter().find(|s| s.name_any() == replica.name).cloned();
    }
    replicas.into_values().collect()
}

/// Pending replica to record, keeping `since` and `retries` while the reason is unchanged
pub fn next_pending_replica(
    replicas: &[Replica],
    current: Option<&PendingReplica>,
    now: DateTime<Utc>,
) -> Option<PendingReplica> {
    let (replica, reason) = replicas
        .iter()
        .find_map(|r| r.pending_reason().map(|reason| (r, reason)))?;
    match current {
        Some(p) if p.name == replica.name && p.reason == reason => Some(p.clone()),
        _ => Some(PendingReplica {
            name: replica.name.clone(),
            reason,
            since: Some(now),
            retries: None,
        }),
    }
}

fn owner_reference(set: &ManagedSeedSet) -> Option<OwnerReference> {
    set.controller_owner_ref(&())
}

fn replica_metadata(set: &ManagedSeedSet, name: &str, template: &TemplateMetadata) -> ObjectMeta {
    let mut labels = template.labels.clone();
    labels.insert(labels::MANAGED_SEED_SET.to_string(), set.name_any());
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: set.namespace(),
        labels: Some(labels),
        annotations: (!template.annotations.is_empty()).then(|| template.annotations.clone()),
        owner_references: owner_reference(set).map(|o| vec![o]),
        ..Default::default()
    }
}

/// Shoot of a new replica, built from the shoot template
pub fn new_shoot(set: &ManagedSeedSet, ordinal: i32) -> Shoot {
    let name = replica_name(&set.name_any(), ordinal);
    let template = &set.spec.shoot_template;
    let mut shoot = Shoot::new(&name, template.spec.clone());
    shoot.metadata = replica_metadata(set, &name, &template.metadata);
    shoot
}

/// ManagedSeed registering the shoot of a replica as seed
pub fn new_managed_seed(set: &ManagedSeedSet, name: &str) -> ManagedSeed {
    let template = &set.spec.template;
    let mut spec = template.spec.clone();
    spec.shoot = Some(ShootReference {
        name: name.to_string(),
    });
    let mut ms = ManagedSeed::new(name, spec);
    ms.metadata = replica_metadata(set, name, &template.metadata);
    ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::common::{
        condition_types, Condition, ConditionStatus, LastOperation, LastOperationState,
        LastOperationType,
    };
    use crate::types::managedseed::{
        ManagedSeedSetSpec, ManagedSeedSpec, ManagedSeedStatus, ManagedSeedTemplate,
        ShootTemplate,
    };
    use crate::types::seed::{SeedSpec, SeedStatus};
    use crate::types::shoot::{ShootSpec, ShootStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn cond(t: &str, status: ConditionStatus) -> Condition {
        Condition {
            condition_type: t.to_string(),
            status,
            last_transition_time: None,
            last_update_time: None,
            reason: String::new(),
            message: String::new(),
            codes: vec![],
        }
    }

    fn shoot(name: &str, state: LastOperationState) -> Shoot {
        let mut shoot = Shoot::new(name, ShootSpec::default());
        shoot.metadata.namespace = Some("garden".to_string());
        shoot.status = Some(ShootStatus {
            last_operation: Some(LastOperation::new(LastOperationType::Reconcile, state, 100, "")),
            conditions: vec![cond(condition_types::EVERY_NODE_READY, ConditionStatus::True)],
            ..Default::default()
        });
        shoot
    }

    fn registered_managed_seed(name: &str) -> ManagedSeed {
        let mut ms = ManagedSeed::new(name, ManagedSeedSpec::default());
        ms.status = Some(ManagedSeedStatus {
            conditions: vec![cond(condition_types::SEED_REGISTERED, ConditionStatus::True)],
            observed_generation: 0,
        });
        ms
    }

    fn ready_seed(name: &str) -> Seed {
        let mut seed = Seed::new(name, SeedSpec::default());
        seed.status = Some(SeedStatus {
            conditions: vec![cond(condition_types::GARDENLET_READY, ConditionStatus::True)],
            observed_generation: None,
        });
        seed
    }

    fn set() -> ManagedSeedSet {
        let mut set = ManagedSeedSet::new(
            "infra",
            ManagedSeedSetSpec {
                template: ManagedSeedTemplate::default(),
                shoot_template: ShootTemplate::default(),
                ..Default::default()
            },
        );
        set.metadata.namespace = Some("garden".to_string());
        set.metadata.uid = Some("set-uid".to_string());
        set
    }

    #[test]
    fn test_replica_ordinal() {
        assert_eq!(replica_ordinal("infra", "infra-3"), Some(3));
        assert_eq!(replica_ordinal("infra", "infra-x"), None);
        assert_eq!(replica_ordinal("infra", "other-1"), None);
        assert_eq!(replica_ordinal("infra", "infra3"), None);
    }

    #[test]
    fn test_pending_reason_progression() {
        let mut replica = Replica {
            name: "infra-0".to_string(),
            ordinal: 0,
            shoot: Some(shoot("infra-0", LastOperationState::Processing)),
            ..Default::default()
        };
        assert_eq!(replica.pending_reason(), Some(PendingReplicaReason::ShootReconciling));

        replica.shoot = Some(shoot("infra-0", LastOperationState::Failed));
        assert_eq!(replica.pending_reason(), Some(PendingReplicaReason::ShootReconcileFailed));

        replica.shoot = Some(shoot("infra-0", LastOperationState::Succeeded));
        assert_eq!(replica.pending_reason(), Some(PendingReplicaReason::ManagedSeedPreparing));

        replica.managed_seed = Some(registered_managed_seed("infra-0"));
        assert_eq!(replica.pending_reason(), Some(PendingReplicaReason::SeedNotReady));

        replica.seed = Some(ready_seed("infra-0"));
        assert!(replica.is_ready());
    }

    #[test]
    fn test_pending_reason_while_deleting() {
        let mut deleting = shoot("infra-0", LastOperationState::Processing);
        deleting.metadata.deletion_timestamp = Some(Time(Utc::now()));
        let replica = Replica {
            name: "infra-0".to_string(),
            shoot: Some(deleting),
            ..Default::default()
        };
        assert_eq!(replica.pending_reason(), Some(PendingReplicaReason::ShootDeleting));

        let orphan = Replica {
            name: "infra-1".to_string(),
            managed_seed: Some(registered_managed_seed("infra-1")),
            ..Default::default()
        };
        assert_eq!(orphan.pending_reason(), Some(PendingReplicaReason::ManagedSeedDeleting));
    }

    #[test]
    fn test_collect_replicas_orders_by_ordinal() {
        let replicas = collect_replicas(
            "infra",
            vec![
                shoot("infra-10", LastOperationState::Succeeded),
                shoot("infra-2", LastOperationState::Succeeded),
            ],
            vec![registered_managed_seed("infra-2")],
            &[ready_seed("infra-2")],
        );

        let names: Vec<_> = replicas.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["infra-2", "infra-10"]);
        assert!(replicas[0].is_ready());
        assert!(replicas[1].seed.is_none());
    }

    #[test]
    fn test_next_pending_replica_keeps_since() {
        let since = Utc::now() - chrono::Duration::minutes(5);
        let replicas = vec![Replica {
            name: "infra-0".to_string(),
            shoot: Some(shoot("infra-0", LastOperationState::Processing)),
            ..Default::default()
        }];
        let current = PendingReplica {
            name: "infra-0".to_string(),
            reason: PendingReplicaReason::ShootReconciling,
            since: Some(since),
            retries: None,
        };

        let next = next_pending_replica(&replicas, Some(&current), Utc::now()).unwrap();
        assert_eq!(next.since, Some(since));

        let changed = PendingReplica {
            reason: PendingReplicaReason::ShootDeleting,
            ..current
        };
        let now = Utc::now();
        let next = next_pending_replica(&replicas, Some(&changed), now).unwrap();
        assert_eq!(next.since, Some(now));
        assert_eq!(next.reason, PendingReplicaReason::ShootReconciling);
    }

    #[test]
    fn test_new_shoot_and_managed_seed_carry_set_label() {
        let set = set();
        let shoot = new_shoot(&set, 4);
        assert_eq!(shoot.name_any(), "infra-4");
        assert_eq!(shoot.namespace().as_deref(), Some("garden"));
        assert_eq!(
            shoot.labels().get(labels::MANAGED_SEED_SET).map(String::as_str),
            Some("infra")
        );
        assert_eq!(shoot.owner_references()[0].uid, "set-uid");

        let ms = new_managed_seed(&set, "infra-4");
        assert_eq!(ms.spec.shoot.unwrap().name, "infra-4");
    }
}
