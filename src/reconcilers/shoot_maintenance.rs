// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Shoot maintenance reconciler - moves shoots to newer Kubernetes and machine
//! image versions inside their maintenance window or on request.

use crate::config::controller_manager::ShootMaintenanceControllerConfiguration;
use crate::constants::{annotations, operation};
use crate::error::{GardenerError, Result};
use crate::helper::versions::{kubernetes_update_target, machine_image_update_target};
use crate::types::cloudprofile::CloudProfile;
use crate::types::shoot::{Shoot, Worker};
use chrono::{DateTime, Timelike, Utc};
use futures::StreamExt;
use kube::{
    api::{Patch, PatchParams},
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const SECONDS_PER_DAY: i64 = 24 * 3600;

pub struct ShootMaintenanceReconciler {
    client: Client,
    config: ShootMaintenanceControllerConfiguration,
}

impl ShootMaintenanceReconciler {
    pub fn new(client: Client, config: ShootMaintenanceControllerConfiguration) -> Self {
        Self { client, config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let shoots: Api<Shoot> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(shoots, watcher::Config::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled shoot maintenance: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

/// Daily window in UTC seconds of the day; `begin > end` wraps around midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceWindow {
    begin: i64,
    end: i64,
}

/// Parse `HHMMSS+ZZZZ` into UTC seconds of the day
fn parse_window_time(raw: &str) -> Result<i64> {
    let invalid = || GardenerError::MaintenanceWindow(format!("{:?} is not of the form HHMMSS+ZZZZ", raw));
    if raw.len() != 11 || !raw.is_ascii() {
        return Err(invalid());
    }
    let number = |range: std::ops::Range<usize>| raw[range].parse::<i64>().map_err(|_| invalid());
    let (hours, minutes, seconds) = (number(0..2)?, number(2..4)?, number(4..6)?);
    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err(invalid());
    }
    let sign = match &raw[6..7] {
        "+" => 1,
        "-" => -1,
        _ => return Err(invalid()),
    };
    let offset = sign * (number(7..9)? * 3600 + number(9..11)? * 60);

    let local = hours * 3600 + minutes * 60 + seconds;
    Ok((local - offset).rem_euclid(SECONDS_PER_DAY))
}

impl MaintenanceWindow {
    pub fn parse(begin: &str, end: &str) -> Result<Self> {
        Ok(Self {
            begin: parse_window_time(begin)?,
            end: parse_window_time(end)?,
        })
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let t = i64::from(now.num_seconds_from_midnight());
        if self.begin <= self.end {
            self.begin <= t && t < self.end
        } else {
            t >= self.begin || t < self.end
        }
    }
}

/// Version changes maintenance applies to a shoot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintenanceUpdate {
    pub kubernetes_version: Option<String>,
    pub workers: Option<Vec<Worker>>,
}

impl MaintenanceUpdate {
    pub fn is_empty(&self) -> bool {
        self.kubernetes_version.is_none() && self.workers.is_none()
    }
}

pub fn compute_maintenance(shoot: &Shoot, profile: &CloudProfile, now: DateTime<Utc>) -> MaintenanceUpdate {
    let auto_update = shoot
        .spec
        .maintenance
        .as_ref()
        .and_then(|m| m.auto_update.clone())
        .unwrap_or_default();

    let kubernetes_version = kubernetes_update_target(
        &profile.spec.kubernetes.versions,
        &shoot.spec.kubernetes.version,
        auto_update.kubernetes_version,
        now,
    );

    let mut workers = shoot.spec.provider.workers.clone();
    let mut changed = false;
    for worker in workers.iter_mut() {
        let Some(image) = worker.machine.image.as_mut() else {
            continue;
        };
        let (Some(current), Some(offered)) = (image.version.as_deref(), profile.machine_image(&image.name)) else {
            continue;
        };
        if let Some(target) =
            machine_image_update_target(&offered.versions, current, auto_update.machine_image_version, now)
        {
            debug!("Worker {} moves image {} to {}", worker.name, image.name, target);
            image.version = Some(target);
            changed = true;
        }
    }

    MaintenanceUpdate {
        kubernetes_version,
        workers: changed.then_some(workers),
    }
}

/// Merge patch applying the update and consuming the maintain annotation
pub fn maintenance_patch(update: &MaintenanceUpdate, clear_annotation: bool) -> Option<Value> {
    let mut spec = Map::new();
    if let Some(version) = &update.kubernetes_version {
        spec.insert("kubernetes".to_string(), json!({ "version": version }));
    }
    if let Some(workers) = &update.workers {
        spec.insert("provider".to_string(), json!({ "workers": workers }));
    }

    let mut patch = Map::new();
    if !spec.is_empty() {
        patch.insert("spec".to_string(), Value::Object(spec));
    }
    if clear_annotation {
        let key = annotations::GARDENER_OPERATION;
        patch.insert("metadata".to_string(), json!({ "annotations": { key: null } }));
    }
    (!patch.is_empty()).then_some(Value::Object(patch))
}

fn maintenance_requested(shoot: &Shoot) -> bool {
    shoot
        .annotations()
        .get(annotations::GARDENER_OPERATION)
        .is_some_and(|op| op == operation::MAINTAIN)
}

#[instrument(skip(shoot, ctx), fields(shoot = %shoot.name_any()))]
async fn reconcile(shoot: Arc<Shoot>, ctx: Arc<ShootMaintenanceReconciler>) -> Result<Action> {
    let requeue = Action::requeue(ctx.config.sync_period.0);
    if shoot.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    let now = Utc::now();
    let requested = maintenance_requested(&shoot);
    let in_window = match shoot.spec.maintenance.as_ref().and_then(|m| m.time_window.as_ref()) {
        Some(w) => MaintenanceWindow::parse(&w.begin, &w.end)?.contains(now),
        None => false,
    };
    if !requested && !in_window {
        return Ok(requeue);
    }

    let profiles: Api<CloudProfile> = Api::all(ctx.client.clone());
    let profile = profiles.get(&shoot.spec.cloud_profile_name).await?;
    let update = compute_maintenance(&shoot, &profile, now);
    let Some(patch) = maintenance_patch(&update, requested) else {
        debug!("Nothing to maintain");
        return Ok(requeue);
    };

    if let Some(version) = &update.kubernetes_version {
        info!(
            "Updating Kubernetes version from {} to {}",
            shoot.spec.kubernetes.version, version
        );
    }
    let shoots: Api<Shoot> = Api::namespaced(ctx.client.clone(), &shoot.namespace().unwrap_or_default());
    shoots
        .patch(&shoot.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(requeue)
}

fn error_policy(_shoot: Arc<Shoot>, error: &GardenerError, _ctx: Arc<ShootMaintenanceReconciler>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}
