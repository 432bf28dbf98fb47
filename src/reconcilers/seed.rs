// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Seed reconciler - keeps the `seed-<name>` namespace in the garden cluster
//! filled with the garden secrets that seeds need.

use crate::constants::{labels, OPERATOR_NAME, SEED_NAMESPACE_PREFIX};
use crate::error::{GardenerError, Result};
use crate::kubernetes::ensure_namespace_exists;
use crate::types::seed::Seed;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{DeleteParams, ListParams, ObjectMeta, Patch, PatchParams},
    runtime::{controller::Action, reflector::ObjectRef, watcher, Controller},
    Api, Client, ResourceExt,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct SeedReconciler {
    client: Client,
    garden_namespace: String,
}

impl SeedReconciler {
    pub fn new(client: Client, garden_namespace: String) -> Self {
        Self {
            client,
            garden_namespace,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let seeds: Api<Seed> = Api::all(self.client.clone());
        let garden_secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.garden_namespace);
        let context = Arc::new(self);

        let controller = Controller::new(seeds, watcher::Config::default());
        let store = controller.store();

        controller
            .watches(
                garden_secrets,
                watcher::Config::default().labels(labels::GARDEN_ROLE),
                move |secret: Secret| seeds_for_garden_secret(&secret, &store.state()),
            )
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled seed: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

pub fn seed_namespace(seed_name: &str) -> String {
    format!("{}{}", SEED_NAMESPACE_PREFIX, seed_name)
}

/// Copy of a garden secret placed into the seed namespace
pub fn create_seed_secret(secret: &Secret, target_namespace: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: secret.metadata.name.clone(),
            namespace: Some(target_namespace.to_string()),
            labels: secret.metadata.labels.clone(),
            annotations: secret.metadata.annotations.clone(),
            ..Default::default()
        },
        data: secret.data.clone(),
        string_data: secret.string_data.clone(),
        type_: secret.type_.clone(),
        immutable: secret.immutable,
    }
}

/// Every seed needs a resync when one of the garden secrets changes
pub fn seeds_for_garden_secret(secret: &Secret, seeds: &[Arc<Seed>]) -> Vec<ObjectRef<Seed>> {
    if !secret.labels().contains_key(labels::GARDEN_ROLE) {
        return vec![];
    }
    seeds.iter().map(|seed| ObjectRef::from_obj(seed.as_ref())).collect()
}

/// Copies in the seed namespace whose source secret is gone
pub fn stale_copies(sources: &[Secret], copies: &[Secret]) -> Vec<String> {
    let wanted: BTreeSet<String> = sources.iter().map(|s| s.name_any()).collect();
    copies
        .iter()
        .map(|s| s.name_any())
        .filter(|name| !wanted.contains(name))
        .collect()
}

#[instrument(skip(seed, ctx), fields(seed = %seed.name_any()))]
async fn reconcile(seed: Arc<Seed>, ctx: Arc<SeedReconciler>) -> Result<Action> {
    if seed.metadata.deletion_timestamp.is_some() {
        debug!("Seed is being deleted");
        return Ok(Action::await_change());
    }

    let target_namespace = seed_namespace(&seed.name_any());
    ensure_namespace_exists(
        &ctx.client,
        &target_namespace,
        BTreeMap::from([(labels::GARDEN_ROLE.to_string(), "seed".to_string())]),
    )
    .await?;

    let selector = ListParams::default().labels(labels::GARDEN_ROLE);
    let garden_secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &ctx.garden_namespace);
    let sources = garden_secrets.list(&selector).await?.items;

    let seed_secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &target_namespace);
    let pp = PatchParams::apply(OPERATOR_NAME).force();
    for secret in &sources {
        let copy = create_seed_secret(secret, &target_namespace);
        seed_secrets
            .patch(&secret.name_any(), &pp, &Patch::Apply(&copy))
            .await?;
    }
    info!(
        "Synced {} garden secrets to namespace {}",
        sources.len(),
        target_namespace
    );

    let copies = seed_secrets.list(&selector).await?.items;
    for name in stale_copies(&sources, &copies) {
        info!("Deleting secret {}/{} whose source is gone", target_namespace, name);
        match seed_secrets.delete(&name, &DeleteParams::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Action::await_change())
}

fn error_policy(_seed: Arc<Seed>, error: &GardenerError, _ctx: Arc<SeedReconciler>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}
