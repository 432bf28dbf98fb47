// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Seed lifecycle reconciler - watches gardenlet heartbeats and marks seeds and
//! their shoots as unknown once the heartbeats stop.

use crate::config::controller_manager::SeedControllerConfiguration;
use crate::constants::SEED_LEASE_NAMESPACE;
use crate::error::{GardenerError, Result};
use crate::helper::conditions::{
    conditions_equal_ignoring_timestamps, get_or_init_condition, merge_conditions, updated_condition,
};
use crate::kubernetes::patch_status;
use crate::types::common::{condition_types, Condition, ConditionStatus};
use crate::types::seed::Seed;
use crate::types::shoot::Shoot;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::coordination::v1::Lease;
use kube::{
    api::ListParams,
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const SEED_STATUS_UNKNOWN_REASON: &str = "SeedStatusUnknown";
const SEED_STATUS_UNKNOWN_MESSAGE: &str = "Gardenlet stopped posting seed status.";
const SHOOT_STATUS_UNKNOWN_REASON: &str = "StatusUnknown";
const SHOOT_STATUS_UNKNOWN_MESSAGE: &str = "Gardenlet stopped sending heartbeats.";

/// Shoot conditions owned by the gardenlet's care controller
pub const SHOOT_HEALTH_CONDITIONS: [&str; 4] = [
    condition_types::API_SERVER_AVAILABLE,
    condition_types::CONTROL_PLANE_HEALTHY,
    condition_types::EVERY_NODE_READY,
    condition_types::SYSTEM_COMPONENTS_HEALTHY,
];

pub struct SeedLifecycleReconciler {
    client: Client,
    config: SeedControllerConfiguration,
}

impl SeedLifecycleReconciler {
    pub fn new(client: Client, config: SeedControllerConfiguration) -> Self {
        Self { client, config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let seeds: Api<Seed> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(seeds, watcher::Config::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled seed lifecycle: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
}

/// The heartbeat is missing or older than the monitor period
pub fn heartbeat_expired(renew_time: Option<DateTime<Utc>>, now: DateTime<Utc>, monitor_period: Duration) -> bool {
    match renew_time {
        Some(t) => t + to_chrono(monitor_period) < now,
        None => true,
    }
}

/// Shoots are marked once the gardenlet has been unknown for the shoot monitor period
pub fn should_mark_shoots(gardenlet_ready: &Condition, now: DateTime<Utc>, shoot_monitor_period: Duration) -> bool {
    if gardenlet_ready.status != ConditionStatus::Unknown {
        return false;
    }
    let deadline = now - to_chrono(shoot_monitor_period);
    gardenlet_ready
        .last_transition_time
        .map_or(true, |t| t <= deadline)
}

/// Health conditions of a shoot with every one set to Unknown
pub fn unknown_shoot_conditions(existing: &[Condition]) -> Vec<Condition> {
    let updated: Vec<Condition> = SHOOT_HEALTH_CONDITIONS
        .iter()
        .map(|t| {
            updated_condition(
                &get_or_init_condition(existing, t),
                ConditionStatus::Unknown,
                SHOOT_STATUS_UNKNOWN_REASON,
                SHOOT_STATUS_UNKNOWN_MESSAGE,
            )
        })
        .collect();
    merge_conditions(existing, &updated)
}

#[instrument(skip(seed, ctx), fields(seed = %seed.name_any()))]
async fn reconcile(seed: Arc<Seed>, ctx: Arc<SeedLifecycleReconciler>) -> Result<Action> {
    let requeue = Action::requeue(ctx.config.sync_period.0);
    let name = seed.name_any();
    let now = Utc::now();

    let leases: Api<Lease> = Api::namespaced(ctx.client.clone(), SEED_LEASE_NAMESPACE);
    let renew_time = leases
        .get_opt(&name)
        .await?
        .and_then(|l| l.spec)
        .and_then(|s| s.renew_time)
        .map(|t| t.0);

    if !heartbeat_expired(renew_time, now, ctx.config.monitor_period.0) {
        debug!("Gardenlet heartbeat is recent");
        return Ok(requeue);
    }

    let conditions = seed.conditions();
    let mut gardenlet_ready = get_or_init_condition(conditions, condition_types::GARDENLET_READY);
    if gardenlet_ready.status != ConditionStatus::Unknown
        || gardenlet_ready.reason != SEED_STATUS_UNKNOWN_REASON
    {
        info!("Gardenlet stopped posting seed status, setting GardenletReady to Unknown");
        gardenlet_ready = updated_condition(
            &gardenlet_ready,
            ConditionStatus::Unknown,
            SEED_STATUS_UNKNOWN_REASON,
            SEED_STATUS_UNKNOWN_MESSAGE,
        );
        let merged = merge_conditions(conditions, std::slice::from_ref(&gardenlet_ready));
        let seeds: Api<Seed> = Api::all(ctx.client.clone());
        patch_status(&seeds, &name, json!({ "conditions": merged })).await?;
    }

    if !should_mark_shoots(&gardenlet_ready, now, ctx.config.shoot_monitor_period.0) {
        return Ok(requeue);
    }

    let shoots: Api<Shoot> = Api::all(ctx.client.clone());
    for shoot in shoots.list(&ListParams::default()).await?.items {
        if shoot.spec.seed_name.as_deref() != Some(name.as_str()) {
            continue;
        }
        let conditions = unknown_shoot_conditions(shoot.conditions());
        if conditions_equal_ignoring_timestamps(shoot.conditions(), &conditions) {
            continue;
        }
        let namespaced: Api<Shoot> =
            Api::namespaced(ctx.client.clone(), &shoot.namespace().unwrap_or_default());
        debug!("Setting conditions of shoot {} to Unknown", shoot.name_any());
        patch_status(&namespaced, &shoot.name_any(), json!({ "conditions": conditions })).await?;
    }

    Ok(requeue)
}

fn error_policy(_seed: Arc<Seed>, error: &GardenerError, _ctx: Arc<SeedLifecycleReconciler>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}
