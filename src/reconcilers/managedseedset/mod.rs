// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ManagedSeedSet reconciler - keeps a set of shoots registered as seeds at the
//! desired replica count, creating and removing one replica at a time.

mod predicates;
mod replica;

pub use predicates::{managed_seed_event_relevant, seed_event_relevant, shoot_event_relevant};
pub use replica::{collect_replicas, next_pending_replica, replica_name, replica_ordinal, Replica};

use crate::config::controller_manager::ManagedSeedSetControllerConfiguration;
use crate::constants::{annotations, finalizers, labels, operation};
use crate::error::{GardenerError, Result};
use crate::kubernetes::{confirm_deletion, ensure_finalizer, patch_annotation, patch_status, remove_finalizer};
use crate::types::managedseed::{ManagedSeed, ManagedSeedSet, PendingReplica, PendingReplicaReason};
use crate::types::seed::Seed;
use crate::types::shoot::Shoot;
use chrono::Utc;
use futures::StreamExt;
use kube::{
    api::{DeleteParams, ListParams, PostParams},
    runtime::{controller::Action, reflector::ObjectRef, reflector::Store, watcher, Controller},
    Api, Client, Resource, ResourceExt,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const DELETION_REQUEUE: Duration = Duration::from_secs(10);

pub struct ManagedSeedSetReconciler {
    client: Client,
    config: ManagedSeedSetControllerConfiguration,
}

impl ManagedSeedSetReconciler {
    pub fn new(client: Client, config: ManagedSeedSetControllerConfiguration) -> Self {
        Self { client, config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let sets: Api<ManagedSeedSet> = Api::all(self.client.clone());
        let shoots: Api<Shoot> = Api::all(self.client.clone());
        let managed_seeds: Api<ManagedSeed> = Api::all(self.client.clone());
        let seeds: Api<Seed> = Api::all(self.client.clone());
        let context = Arc::new(self);

        let controller = Controller::new(sets, watcher::Config::default());
        let store = controller.store();
        let (shoot_store, ms_store, seed_store) = (store.clone(), store.clone(), store);

        controller
            .watches(
                shoots,
                watcher::Config::default().labels(labels::MANAGED_SEED_SET),
                move |shoot: Shoot| {
                    owning_set(&shoot_store, &shoot)
                        .filter(|set| shoot_event_relevant(set.pending_replica(), &shoot))
                        .map(|set| ObjectRef::from_obj(&*set))
                },
            )
            .watches(
                managed_seeds,
                watcher::Config::default().labels(labels::MANAGED_SEED_SET),
                move |ms: ManagedSeed| {
                    owning_set(&ms_store, &ms)
                        .filter(|set| managed_seed_event_relevant(set.pending_replica(), &ms))
                        .map(|set| ObjectRef::from_obj(&*set))
                },
            )
            .watches(seeds, watcher::Config::default(), move |seed: Seed| {
                seed_store
                    .state()
                    .into_iter()
                    .find(|set| seed_event_relevant(set.pending_replica(), &seed))
                    .map(|set| ObjectRef::from_obj(&*set))
            })
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled managed seed set: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

/// The set named by the replica's label, looked up in the reflector store
fn owning_set<K: Resource>(store: &Store<ManagedSeedSet>, child: &K) -> Option<Arc<ManagedSeedSet>> {
    let set_name = child.meta().labels.as_ref()?.get(labels::MANAGED_SEED_SET)?;
    let namespace = child.meta().namespace.as_deref()?;
    store.get(&ObjectRef::new(set_name).within(namespace))
}

/// What a reconcile run changes on the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaAction {
    CreateShoot(i32),
    CreateManagedSeed(String),
    RetryShoot(String),
    DeleteManagedSeed(String),
    DeleteShoot(String),
    None,
}

/// Replicas that count towards the desired number
fn active_replicas(replicas: &[Replica]) -> Vec<&Replica> {
    replicas
        .iter()
        .filter(|r| r.shoot.is_some() && !r.is_deleting())
        .collect()
}

/// Pick the single action for this run
pub fn next_action(
    replicas: &[Replica],
    pending: Option<&PendingReplica>,
    desired: i32,
    next_replica_number: i32,
    max_shoot_retries: i32,
) -> ReplicaAction {
    let active = active_replicas(replicas);

    if active.len() as i32 > desired {
        if let Some(victim) = active.iter().max_by_key(|r| r.ordinal) {
            if pending.map_or(true, |p| p.name == victim.name) {
                return match &victim.managed_seed {
                    Some(_) => ReplicaAction::DeleteManagedSeed(victim.name.clone()),
                    None => ReplicaAction::DeleteShoot(victim.name.clone()),
                };
            }
        }
    }

    let Some(pending) = pending else {
        if (active.len() as i32) < desired {
            return ReplicaAction::CreateShoot(next_replica_number);
        }
        return ReplicaAction::None;
    };

    let replica = replicas.iter().find(|r| r.name == pending.name);
    match pending.reason {
        PendingReplicaReason::ManagedSeedPreparing
            if replica.is_some_and(|r| r.managed_seed.is_none()) =>
        {
            ReplicaAction::CreateManagedSeed(pending.name.clone())
        }
        PendingReplicaReason::ShootReconcileFailed
            if pending.retries.unwrap_or(0) < max_shoot_retries =>
        {
            ReplicaAction::RetryShoot(pending.name.clone())
        }
        _ => ReplicaAction::None,
    }
}

#[instrument(skip(set, ctx), fields(managedseedset = %set.name_any()))]
async fn reconcile(set: Arc<ManagedSeedSet>, ctx: Arc<ManagedSeedSetReconciler>) -> Result<Action> {
    let namespace = set
        .namespace()
        .ok_or_else(|| GardenerError::MissingField("metadata.namespace".to_string()))?;
    let name = set.name_any();
    let mut set = (*set).clone();
    set.set_defaults();

    let sets: Api<ManagedSeedSet> = Api::namespaced(ctx.client.clone(), &namespace);
    let shoots: Api<Shoot> = Api::namespaced(ctx.client.clone(), &namespace);
    let managed_seeds: Api<ManagedSeed> = Api::namespaced(ctx.client.clone(), &namespace);
    let seeds: Api<Seed> = Api::all(ctx.client.clone());

    let selector = ListParams::default().labels(&format!("{}={}", labels::MANAGED_SEED_SET, name));
    let shoot_list = shoots.list(&selector).await?.items;
    let ms_list = managed_seeds.list(&selector).await?.items;

    if set.metadata.deletion_timestamp.is_some() {
        return delete_replicas(&set, &sets, &shoots, &managed_seeds, shoot_list, ms_list).await;
    }
    ensure_finalizer(&sets, &set, finalizers::GARDENER).await?;

    let seed_list = seeds.list(&ListParams::default()).await?.items;
    let replicas = collect_replicas(&name, shoot_list, ms_list, &seed_list);

    let now = Utc::now();
    let mut pending = next_pending_replica(&replicas, set.pending_replica(), now);
    let mut next_replica_number = set
        .status
        .as_ref()
        .map(|s| s.next_replica_number)
        .unwrap_or_default();
    let mut replica_count = replicas.iter().filter(|r| r.shoot.is_some()).count() as i32;

    let action = next_action(
        &replicas,
        pending.as_ref(),
        set.replicas(),
        next_replica_number,
        ctx.config.max_shoot_retries,
    );
    match action {
        ReplicaAction::CreateShoot(ordinal) => {
            let shoot = replica::new_shoot(&set, ordinal);
            info!("Creating shoot {}", shoot.name_any());
            shoots.create(&PostParams::default(), &shoot).await?;
            next_replica_number = ordinal + 1;
            replica_count += 1;
            pending = Some(PendingReplica {
                name: shoot.name_any(),
                reason: PendingReplicaReason::ShootReconciling,
                since: Some(now),
                retries: None,
            });
        }
        ReplicaAction::CreateManagedSeed(target) => {
            info!("Creating managed seed {}", target);
            let ms = replica::new_managed_seed(&set, &target);
            managed_seeds.create(&PostParams::default(), &ms).await?;
        }
        ReplicaAction::RetryShoot(target) => {
            info!("Retrying failed shoot {}", target);
            patch_annotation(
                &shoots,
                &target,
                annotations::GARDENER_OPERATION,
                Some(operation::RETRY),
            )
            .await?;
            if let Some(p) = pending.as_mut() {
                p.retries = Some(p.retries.unwrap_or(0) + 1);
            }
        }
        ReplicaAction::DeleteManagedSeed(target) => {
            info!("Scaling down, deleting managed seed {}", target);
            delete_ignore_missing(&managed_seeds, &target).await?;
            pending = Some(PendingReplica {
                name: target,
                reason: PendingReplicaReason::ManagedSeedDeleting,
                since: Some(now),
                retries: None,
            });
        }
        ReplicaAction::DeleteShoot(target) => {
            info!("Scaling down, deleting shoot {}", target);
            confirm_deletion(&shoots, &target).await?;
            delete_ignore_missing(&shoots, &target).await?;
            pending = Some(PendingReplica {
                name: target,
                reason: PendingReplicaReason::ShootDeleting,
                since: Some(now),
                retries: None,
            });
        }
        ReplicaAction::None => {}
    }

    let ready = replicas.iter().filter(|r| r.is_ready()).count() as i32;
    patch_status(
        &sets,
        &name,
        json!({
            "observedGeneration": set.metadata.generation.unwrap_or_default(),
            "replicas": replica_count,
            "readyReplicas": ready,
            "nextReplicaNumber": next_replica_number,
            "pendingReplica": pending,
        }),
    )
    .await?;

    Ok(Action::requeue(ctx.config.sync_period.0))
}

async fn delete_ignore_missing<K>(api: &Api<K>, name: &str) -> Result<()>
where
    K: Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove every replica, managed seeds before their shoots, then release the set
async fn delete_replicas(
    set: &ManagedSeedSet,
    sets: &Api<ManagedSeedSet>,
    shoots: &Api<Shoot>,
    managed_seeds: &Api<ManagedSeed>,
    shoot_list: Vec<Shoot>,
    ms_list: Vec<ManagedSeed>,
) -> Result<Action> {
    if shoot_list.is_empty() && ms_list.is_empty() {
        info!("All replicas are gone, removing finalizer");
        remove_finalizer(sets, set, finalizers::GARDENER).await?;
        return Ok(Action::await_change());
    }

    for ms in ms_list.iter().filter(|ms| ms.metadata.deletion_timestamp.is_none()) {
        debug!("Deleting managed seed {}", ms.name_any());
        delete_ignore_missing(managed_seeds, &ms.name_any()).await?;
    }
    for shoot in &shoot_list {
        let name = shoot.name_any();
        if shoot.metadata.deletion_timestamp.is_some() || ms_list.iter().any(|ms| ms.name_any() == name) {
            continue;
        }
        debug!("Deleting shoot {}", name);
        confirm_deletion(shoots, &name).await?;
        delete_ignore_missing(shoots, &name).await?;
    }
    Ok(Action::requeue(DELETION_REQUEUE))
}

fn error_policy(_set: Arc<ManagedSeedSet>, error: &GardenerError, _ctx: Arc<ManagedSeedSetReconciler>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{list_json, requests_with_method, to_json, MockService};
    use crate::types::common::{LastOperation, LastOperationState, LastOperationType};
    use crate::types::managedseed::{
        ManagedSeedSetSpec, ManagedSeedSetStatus, ManagedSeedSpec, ManagedSeedTemplate,
        ShootTemplate,
    };
    use crate::types::shoot::{ShootSpec, ShootStatus};
    use std::collections::BTreeMap;

    const SHOOTS: &str = "/apis/core.gardener.cloud/v1beta1/namespaces/garden/shoots";
    const MANAGED_SEEDS: &str = "/apis/seedmanagement.gardener.cloud/v1alpha1/namespaces/garden/managedseeds";
    const SEEDS: &str = "/apis/core.gardener.cloud/v1beta1/seeds";
    const SET_STATUS: &str =
        "/apis/seedmanagement.gardener.cloud/v1alpha1/namespaces/garden/managedseedsets/infra/status";

    fn make_set(replicas: i32, pending: Option<PendingReplica>) -> ManagedSeedSet {
        let mut set = ManagedSeedSet::new(
            "infra",
            ManagedSeedSetSpec {
                replicas: Some(replicas),
                template: ManagedSeedTemplate::default(),
                shoot_template: ShootTemplate::default(),
                ..Default::default()
            },
        );
        set.metadata.namespace = Some("garden".to_string());
        set.metadata.uid = Some("set-uid".to_string());
        set.metadata.finalizers = Some(vec![finalizers::GARDENER.to_string()]);
        set.status = Some(ManagedSeedSetStatus {
            next_replica_number: 1,
            pending_replica: pending,
            ..Default::default()
        });
        set
    }

    fn replica_shoot(name: &str, state: LastOperationState) -> Shoot {
        let mut shoot = Shoot::new(name, ShootSpec::default());
        shoot.metadata.namespace = Some("garden".to_string());
        shoot.metadata.labels = Some(BTreeMap::from([(
            labels::MANAGED_SEED_SET.to_string(),
            "infra".to_string(),
        )]));
        shoot.status = Some(ShootStatus {
            last_operation: Some(LastOperation::new(LastOperationType::Reconcile, state, 100, "")),
            ..Default::default()
        });
        shoot
    }

    fn replica(name: &str, ordinal: i32, with_managed_seed: bool) -> Replica {
        Replica {
            name: name.to_string(),
            ordinal,
            shoot: Some(replica_shoot(name, LastOperationState::Succeeded)),
            managed_seed: with_managed_seed.then(|| ManagedSeed::new(name, ManagedSeedSpec::default())),
            seed: None,
        }
    }

    fn pending(name: &str, reason: PendingReplicaReason, retries: Option<i32>) -> PendingReplica {
        PendingReplica {
            name: name.to_string(),
            reason,
            since: None,
            retries,
        }
    }

    #[test]
    fn test_next_action_scales_up_when_idle() {
        assert_eq!(next_action(&[], None, 2, 0, 3), ReplicaAction::CreateShoot(0));
        assert_eq!(next_action(&[], None, 0, 0, 3), ReplicaAction::None);
    }

    #[test]
    fn test_next_action_waits_for_pending_replica() {
        let replicas = vec![replica("infra-0", 0, false)];
        let p = pending("infra-0", PendingReplicaReason::ShootReconciling, None);
        assert_eq!(next_action(&replicas, Some(&p), 2, 1, 3), ReplicaAction::None);

        let p = pending("infra-0", PendingReplicaReason::ManagedSeedPreparing, None);
        assert_eq!(
            next_action(&replicas, Some(&p), 2, 1, 3),
            ReplicaAction::CreateManagedSeed("infra-0".to_string())
        );
    }

    #[test]
    fn test_next_action_retries_failed_shoot_up_to_limit() {
        let replicas = vec![replica("infra-0", 0, false)];
        let p = pending("infra-0", PendingReplicaReason::ShootReconcileFailed, Some(2));
        assert_eq!(
            next_action(&replicas, Some(&p), 1, 1, 3),
            ReplicaAction::RetryShoot("infra-0".to_string())
        );

        let p = pending("infra-0", PendingReplicaReason::ShootReconcileFailed, Some(3));
        assert_eq!(next_action(&replicas, Some(&p), 1, 1, 3), ReplicaAction::None);
    }

    #[test]
    fn test_next_action_scales_down_highest_ordinal() {
        let replicas = vec![replica("infra-0", 0, true), replica("infra-3", 3, true)];
        assert_eq!(
            next_action(&replicas, None, 1, 4, 3),
            ReplicaAction::DeleteManagedSeed("infra-3".to_string())
        );

        let replicas = vec![replica("infra-0", 0, true), replica("infra-3", 3, false)];
        let p = pending("infra-3", PendingReplicaReason::ManagedSeedPreparing, None);
        assert_eq!(
            next_action(&replicas, Some(&p), 1, 4, 3),
            ReplicaAction::DeleteShoot("infra-3".to_string())
        );
    }

    #[tokio::test]
    async fn test_reconcile_creates_first_shoot() {
        let set = make_set(1, None);
        let created = replica_shoot("infra-1", LastOperationState::Processing);
        let (client, log) = MockService::new()
            .on_get(SHOOTS, 200, &list_json::<Shoot>("Shoot", &[]))
            .on_get(MANAGED_SEEDS, 200, &list_json::<ManagedSeed>("ManagedSeed", &[]))
            .on_get(SEEDS, 200, &list_json::<Seed>("Seed", &[]))
            .on_post(SHOOTS, 201, &to_json(&created))
            .on_patch(SET_STATUS, 200, &to_json(&set))
            .into_client_with_log();
        let ctx = Arc::new(ManagedSeedSetReconciler::new(
            client,
            ManagedSeedSetControllerConfiguration::default(),
        ));

        reconcile(Arc::new(set), ctx).await.unwrap();

        let posts = requests_with_method(&log, "POST");
        assert_eq!(posts.len(), 1);
        assert!(posts[0].body.contains("\"infra-1\""));
        assert!(posts[0].body.contains(labels::MANAGED_SEED_SET));

        let patches = requests_with_method(&log, "PATCH");
        let status: serde_json::Value = serde_json::from_str(&patches[0].body).unwrap();
        assert_eq!(status["status"]["nextReplicaNumber"], 2);
        assert_eq!(status["status"]["replicas"], 1);
        assert_eq!(status["status"]["pendingReplica"]["reason"], "ShootReconciling");
    }

    #[tokio::test]
    async fn test_reconcile_registers_reconciled_shoot() {
        let set = make_set(
            1,
            Some(pending("infra-0", PendingReplicaReason::ShootReconciling, None)),
        );
        let shoot = replica_shoot("infra-0", LastOperationState::Succeeded);
        let (client, log) = MockService::new()
            .on_get(SHOOTS, 200, &list_json("Shoot", &[shoot]))
            .on_get(MANAGED_SEEDS, 200, &list_json::<ManagedSeed>("ManagedSeed", &[]))
            .on_get(SEEDS, 200, &list_json::<Seed>("Seed", &[]))
            .on_post(
                MANAGED_SEEDS,
                201,
                &to_json(&ManagedSeed::new("infra-0", ManagedSeedSpec::default())),
            )
            .on_patch(SET_STATUS, 200, &to_json(&set))
            .into_client_with_log();
        let ctx = Arc::new(ManagedSeedSetReconciler::new(
            client,
            ManagedSeedSetControllerConfiguration::default(),
        ));

        reconcile(Arc::new(set), ctx).await.unwrap();

        let posts = requests_with_method(&log, "POST");
        assert_eq!(posts.len(), 1);
        assert!(posts[0].path.ends_with("/managedseeds"));
        let patches = requests_with_method(&log, "PATCH");
        assert!(patches[0].body.contains("ManagedSeedPreparing"));
    }

    #[tokio::test]
    async fn test_deleted_set_without_replicas_drops_finalizer() {
        let mut set = make_set(1, None);
        set.metadata.deletion_timestamp = Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(Utc::now()));
        let (client, log) = MockService::new()
            .on_get(SHOOTS, 200, &list_json::<Shoot>("Shoot", &[]))
            .on_get(MANAGED_SEEDS, 200, &list_json::<ManagedSeed>("ManagedSeed", &[]))
            .on_patch(
                "/apis/seedmanagement.gardener.cloud/v1alpha1/namespaces/garden/managedseedsets/infra",
                200,
                &to_json(&set),
            )
            .into_client_with_log();
        let ctx = Arc::new(ManagedSeedSetReconciler::new(
            client,
            ManagedSeedSetControllerConfiguration::default(),
        ));

        let action = reconcile(Arc::new(set), ctx).await.unwrap();

        assert_eq!(action, Action::await_change());
        let patches = requests_with_method(&log, "PATCH");
        assert_eq!(patches.len(), 1);
        assert!(patches[0].body.contains("remove"));
    }
}
