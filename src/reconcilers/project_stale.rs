// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Project stale reconciler - marks unused projects as stale and deletes them
//! once their auto-delete timestamp has passed.

use crate::config::controller_manager::ProjectControllerConfiguration;
use crate::constants::annotations;
use crate::error::{GardenerError, Result};
use crate::kubernetes::{confirm_deletion, patch_status};
use crate::types::backup::BackupEntry;
use crate::types::project::{Project, ProjectStatus};
use crate::types::secretbinding::{Plant, Quota, SecretBinding};
use crate::types::shoot::Shoot;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::{
    api::{DeleteParams, ListParams},
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const SHOOT_API_VERSION: &str = "core.gardener.cloud/v1beta1";

pub struct ProjectStaleReconciler {
    client: Client,
    config: ProjectControllerConfiguration,
}

impl ProjectStaleReconciler {
    pub fn new(client: Client, config: ProjectControllerConfiguration) -> Self {
        Self { client, config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let projects: Api<Project> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(projects, watcher::Config::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled project: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

/// Stale timestamps a project should carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleTimestamps {
    pub stale_since: Option<DateTime<Utc>>,
    pub auto_delete: Option<DateTime<Utc>>,
}

impl StaleTimestamps {
    pub fn not_stale() -> Self {
        Self {
            stale_since: None,
            auto_delete: None,
        }
    }
}

/// Compute the timestamps of a project that is not in use
pub fn compute_stale_timestamps(
    current: Option<&ProjectStatus>,
    now: DateTime<Utc>,
    config: &ProjectControllerConfiguration,
) -> StaleTimestamps {
    let stale_since = current
        .and_then(|s| s.stale_since_timestamp)
        .unwrap_or(now);

    if stale_since + ChronoDuration::days(config.stale_grace_period_days) > now {
        return StaleTimestamps {
            stale_since: Some(stale_since),
            auto_delete: None,
        };
    }

    let computed = stale_since + ChronoDuration::days(config.stale_expiration_time_days);
    let auto_delete = match current.and_then(|s| s.stale_auto_delete_timestamp) {
        Some(existing) if existing > computed => existing,
        _ => computed,
    };
    StaleTimestamps {
        stale_since: Some(stale_since),
        auto_delete: Some(auto_delete),
    }
}

fn owned_by_shoot(secret: &Secret) -> bool {
    secret
        .owner_references()
        .iter()
        .any(|o| o.api_version == SHOOT_API_VERSION && o.kind == "Shoot")
}

/// Names of the secrets that may be used through secret bindings
pub fn relevant_secret_names(secrets: &[Secret]) -> BTreeSet<String> {
    secrets
        .iter()
        .filter(|s| s.type_.as_deref() == Some("Opaque"))
        .filter(|s| !owned_by_shoot(s))
        .map(|s| s.name_any())
        .collect()
}

/// Secret bindings that at least one shoot refers to
pub fn bindings_in_use<'a>(bindings: &'a [SecretBinding], shoots: &[Shoot]) -> Vec<&'a SecretBinding> {
    bindings
        .iter()
        .filter(|b| {
            shoots.iter().any(|s| {
                s.namespace() == b.namespace() && s.spec.secret_binding_name == b.name_any()
            })
        })
        .collect()
}

pub fn secrets_in_use(namespace: &str, secret_names: &BTreeSet<String>, used: &[&SecretBinding]) -> bool {
    used.iter().any(|b| {
        b.secret_namespace() == namespace && secret_names.contains(&b.secret_ref.name)
    })
}

pub fn quotas_in_use(namespace: &str, quota_names: &BTreeSet<String>, used: &[&SecretBinding]) -> bool {
    used.iter().any(|b| {
        b.quotas.iter().any(|q| {
            q.namespace.as_deref().unwrap_or_default() == namespace && quota_names.contains(&q.name)
        })
    })
}

fn skip_stale_check(namespace: &Namespace) -> bool {
    namespace
        .annotations()
        .get(annotations::PROJECT_SKIP_STALE_CHECK)
        .is_some_and(|v| v == "true")
}

async fn project_in_use(client: &Client, namespace: &str) -> Result<bool> {
    let one = ListParams::default().limit(1);

    let shoots: Api<Shoot> = Api::namespaced(client.clone(), namespace);
    if !shoots.list(&one).await?.items.is_empty() {
        debug!("Namespace {} still has shoots", namespace);
        return Ok(true);
    }
    let plants: Api<Plant> = Api::namespaced(client.clone(), namespace);
    if !plants.list(&one).await?.items.is_empty() {
        debug!("Namespace {} still has plants", namespace);
        return Ok(true);
    }
    let entries: Api<BackupEntry> = Api::namespaced(client.clone(), namespace);
    if !entries.list(&one).await?.items.is_empty() {
        debug!("Namespace {} still has backup entries", namespace);
        return Ok(true);
    }

    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret_names = relevant_secret_names(&secrets.list(&ListParams::default()).await?.items);
    let quotas: Api<Quota> = Api::namespaced(client.clone(), namespace);
    let quota_names: BTreeSet<String> = quotas
        .list(&ListParams::default())
        .await?
        .items
        .iter()
        .map(|q| q.name_any())
        .collect();
    if secret_names.is_empty() && quota_names.is_empty() {
        return Ok(false);
    }

    let all_bindings: Api<SecretBinding> = Api::all(client.clone());
    let bindings = all_bindings.list(&ListParams::default()).await?.items;
    let all_shoots: Api<Shoot> = Api::all(client.clone());
    let shoots = all_shoots.list(&ListParams::default()).await?.items;
    let used = bindings_in_use(&bindings, &shoots);

    Ok(secrets_in_use(namespace, &secret_names, &used)
        || quotas_in_use(namespace, &quota_names, &used))
}

fn status_patch(timestamps: &StaleTimestamps) -> serde_json::Value {
    json!({
        "staleSinceTimestamp": timestamps.stale_since,
        "staleAutoDeleteTimestamp": timestamps.auto_delete,
    })
}

fn current_timestamps(project: &Project) -> StaleTimestamps {
    let status = project.status.as_ref();
    StaleTimestamps {
        stale_since: status.and_then(|s| s.stale_since_timestamp),
        auto_delete: status.and_then(|s| s.stale_auto_delete_timestamp),
    }
}

async fn update_timestamps(projects: &Api<Project>, project: &Project, wanted: &StaleTimestamps) -> Result<()> {
    if current_timestamps(project) == *wanted {
        return Ok(());
    }
    patch_status(projects, &project.name_any(), status_patch(wanted)).await?;
    Ok(())
}

#[instrument(skip(project, ctx), fields(project = %project.name_any()))]
async fn reconcile(project: Arc<Project>, ctx: Arc<ProjectStaleReconciler>) -> Result<Action> {
    let requeue = Action::requeue(ctx.config.stale_sync_period.0);
    if project.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }
    let Some(namespace) = project.spec.namespace.clone() else {
        debug!("Project has no namespace yet");
        return Ok(requeue);
    };
    let projects: Api<Project> = Api::all(ctx.client.clone());
    let now = Utc::now();

    let namespaces: Api<Namespace> = Api::all(ctx.client.clone());
    let ns = namespaces.get(&namespace).await?;
    if skip_stale_check(&ns) {
        debug!("Namespace {} is marked to skip the stale check", namespace);
        update_timestamps(&projects, &project, &StaleTimestamps::not_stale()).await?;
        return Ok(requeue);
    }

    let created = project
        .creation_timestamp()
        .map(|t| t.0)
        .unwrap_or(now);
    if created + ChronoDuration::days(ctx.config.minimum_lifetime_days) > now {
        debug!("Project is younger than the minimum lifetime");
        update_timestamps(&projects, &project, &StaleTimestamps::not_stale()).await?;
        return Ok(requeue);
    }

    if project_in_use(&ctx.client, &namespace).await? {
        update_timestamps(&projects, &project, &StaleTimestamps::not_stale()).await?;
        return Ok(requeue);
    }

    let wanted = compute_stale_timestamps(project.status.as_ref(), now, &ctx.config);
    info!("Project is stale, auto delete at {:?}", wanted.auto_delete);
    update_timestamps(&projects, &project, &wanted).await?;

    if wanted.auto_delete.is_some_and(|t| t <= now) {
        info!("Stale project reached its auto delete timestamp, deleting it");
        confirm_deletion(&projects, &project.name_any()).await?;
        match projects.delete(&project.name_any(), &DeleteParams::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(e.into()),
        }
        return Ok(requeue);
    }

    Ok(requeue)
}

fn error_policy(
    _project: Arc<Project>,
    error: &GardenerError,
    _ctx: Arc<ProjectStaleReconciler>,
) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}
