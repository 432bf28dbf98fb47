// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Generic Worker reconciler for provider extensions. The provider specific work
//! is done by an [`Actuator`]; this reconciler drives its lifecycle and status.

use crate::constants::{annotations, finalizers, operation};
use crate::error::{GardenerError, Result};
use crate::helper::conditions::compute_operation_type;
use crate::helper::errors::{determine_error, format_last_err_description, has_error_code, last_error};
use crate::kubernetes::{ensure_finalizer, has_finalizer, patch_annotation, patch_status, remove_finalizer};
use crate::types::common::{ErrorCode, LastError, LastOperation, LastOperationState, LastOperationType};
use crate::types::worker::{Cluster, Worker};
use futures::future::BoxFuture;
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, reflector, watcher, Controller, WatchStreamExt},
    Api, Client, ResourceExt,
};
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Backoff when the cloud provider throttles our requests
pub const THROTTLING_BACKOFF: Duration = Duration::from_secs(10 * 60);

/// Provider specific handling of Worker resources
pub trait Actuator: Send + Sync {
    fn reconcile<'a>(&'a self, worker: &'a Worker, cluster: &'a Cluster) -> BoxFuture<'a, Result<()>>;
    fn delete<'a>(&'a self, worker: &'a Worker, cluster: &'a Cluster) -> BoxFuture<'a, Result<()>>;
    fn migrate<'a>(&'a self, worker: &'a Worker, cluster: &'a Cluster) -> BoxFuture<'a, Result<()>>;
    fn restore<'a>(&'a self, worker: &'a Worker, cluster: &'a Cluster) -> BoxFuture<'a, Result<()>>;
}

pub struct WorkerReconciler<A> {
    client: Client,
    actuator: A,
}

impl<A: Actuator + 'static> WorkerReconciler<A> {
    pub fn new(client: Client, actuator: A) -> Self {
        Self { client, actuator }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let workers: Api<Worker> = Api::all(self.client.clone());
        let context = Arc::new(self);

        // Status writes of this controller must not trigger it again
        let (reader, writer) = reflector::store();
        let events = watcher(workers, watcher::Config::default())
            .default_backoff()
            .reflect(writer)
            .applied_objects()
            .predicate_filter(worker_event_key);

        Controller::for_stream(events, reader)
            .run(reconcile::<A>, error_policy::<A>, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled worker: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

/// Changes with the generation, the requested operation or the deletion state
pub fn worker_event_key(worker: &Worker) -> Option<u64> {
    let mut hasher = DefaultHasher::new();
    worker.metadata.generation.hash(&mut hasher);
    worker.annotations().get(annotations::GARDENER_OPERATION).hash(&mut hasher);
    worker.metadata.deletion_timestamp.is_some().hash(&mut hasher);
    Some(hasher.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOperation {
    Skip,
    Migrate,
    Delete,
    Restore,
    Reconcile(LastOperationType),
}

pub fn worker_operation(worker: &Worker) -> WorkerOperation {
    if worker.is_migrated() {
        return WorkerOperation::Skip;
    }
    let operation_type = compute_operation_type(&worker.metadata, worker.last_operation());
    if operation_type == LastOperationType::Migrate {
        return WorkerOperation::Migrate;
    }
    if worker.metadata.deletion_timestamp.is_some() {
        return WorkerOperation::Delete;
    }
    let restore = worker
        .annotations()
        .get(annotations::GARDENER_OPERATION)
        .is_some_and(|op| op == operation::RESTORE);
    if restore {
        return WorkerOperation::Restore;
    }
    WorkerOperation::Reconcile(operation_type)
}

fn shoot_failed(cluster: &Cluster) -> Result<bool> {
    Ok(cluster
        .shoot()?
        .and_then(|s| s.status)
        .and_then(|s| s.last_operation)
        .is_some_and(|op| op.state == LastOperationState::Failed))
}

struct StatusWriter<'a> {
    api: &'a Api<Worker>,
    worker: &'a Worker,
    operation_type: LastOperationType,
}

impl StatusWriter<'_> {
    async fn processing(&self, description: &str) -> Result<()> {
        info!("{}", description);
        let op = LastOperation::new(self.operation_type, LastOperationState::Processing, 1, description);
        patch_status(self.api, &self.worker.name_any(), json!({ "lastOperation": op })).await?;
        Ok(())
    }

    async fn error(&self, err: &GardenerError, description: &str) -> LastError {
        let codes = determine_error(err, "").codes;
        let text = format_last_err_description(&format!("{}: {}", description, err));
        let op = LastOperation::new(self.operation_type, LastOperationState::Error, 50, text.clone());
        let failure = last_error(text, codes);
        let status = json!({
            "observedGeneration": self.worker.metadata.generation.unwrap_or_default(),
            "lastOperation": op,
            "lastError": failure,
        });
        if let Err(e) = patch_status(self.api, &self.worker.name_any(), status).await {
            error!("Could not update worker status: {}", e);
        }
        failure
    }

    async fn succeeded(&self, description: &str) -> Result<()> {
        info!("{}", description);
        let op = LastOperation::new(self.operation_type, LastOperationState::Succeeded, 100, description);
        let status = json!({
            "observedGeneration": self.worker.metadata.generation.unwrap_or_default(),
            "lastOperation": op,
            "lastError": Value::Null,
        });
        patch_status(self.api, &self.worker.name_any(), status).await?;
        Ok(())
    }
}

fn throttled(last_errors: &[LastError]) -> bool {
    has_error_code(last_errors, ErrorCode::InfraRateLimitsExceeded)
        || has_error_code(last_errors, ErrorCode::InfraRequestThrottling)
}

#[instrument(skip(worker, ctx), fields(worker = %worker.name_any()))]
async fn reconcile<A: Actuator>(worker: Arc<Worker>, ctx: Arc<WorkerReconciler<A>>) -> Result<Action> {
    let namespace = worker.namespace().unwrap_or_default();
    let clusters: Api<Cluster> = Api::all(ctx.client.clone());
    let cluster = clusters.get(&namespace).await?;
    if shoot_failed(&cluster)? {
        info!("Stop reconciling Worker of failed Shoot");
        return Ok(Action::await_change());
    }

    let api: Api<Worker> = Api::namespaced(ctx.client.clone(), &namespace);
    let op = worker_operation(&worker);
    let operation_type = match op {
        WorkerOperation::Skip => {
            info!("Stop reconciling Worker of migrated Shoot");
            return Ok(Action::await_change());
        }
        WorkerOperation::Migrate => LastOperationType::Migrate,
        WorkerOperation::Delete => {
            if !has_finalizer(worker.as_ref(), finalizers::WORKER) {
                info!("Deleting worker causes a no-op as there is no finalizer");
                return Ok(Action::await_change());
            }
            LastOperationType::Delete
        }
        WorkerOperation::Restore => LastOperationType::Restore,
        WorkerOperation::Reconcile(t) => t,
    };
    let status = StatusWriter {
        api: &api,
        worker: &worker,
        operation_type,
    };

    let (processing, failed, succeeded) = match op {
        WorkerOperation::Migrate => (
            "Starting Migration of the worker",
            "Error migrating worker",
            "Successfully migrate worker",
        ),
        WorkerOperation::Delete => (
            "Deleting the worker",
            "Error deleting worker",
            "Successfully deleted worker",
        ),
        WorkerOperation::Restore => (
            "Restoring the worker",
            "Error restoring worker",
            "Successfully reconciled worker",
        ),
        _ => (
            "Reconciling the worker",
            "Error reconciling worker",
            "Successfully reconciled worker",
        ),
    };

    if matches!(op, WorkerOperation::Reconcile(_)) {
        ensure_finalizer(&api, worker.as_ref(), finalizers::WORKER).await?;
    }
    status.processing(processing).await?;

    let result = match op {
        WorkerOperation::Migrate => ctx.actuator.migrate(&worker, &cluster).await,
        WorkerOperation::Delete => ctx.actuator.delete(&worker, &cluster).await,
        WorkerOperation::Restore => ctx.actuator.restore(&worker, &cluster).await,
        _ => ctx.actuator.reconcile(&worker, &cluster).await,
    };
    if let Err(e) = result {
        let failure = status.error(&e, failed).await;
        if throttled(std::slice::from_ref(&failure)) {
            info!("Requeue due to cloud provider request throttling: {}", e);
            return Ok(Action::requeue(THROTTLING_BACKOFF));
        }
        return Err(e);
    }
    status.succeeded(succeeded).await?;

    match op {
        WorkerOperation::Migrate => {
            remove_finalizer(&api, worker.as_ref(), finalizers::WORKER).await?;
            patch_annotation(&api, &worker.name_any(), annotations::GARDENER_OPERATION, None).await?;
            Ok(Action::await_change())
        }
        WorkerOperation::Delete => {
            remove_finalizer(&api, worker.as_ref(), finalizers::WORKER).await?;
            Ok(Action::await_change())
        }
        WorkerOperation::Restore => {
            patch_annotation(&api, &worker.name_any(), annotations::GARDENER_OPERATION, None).await?;
            Ok(Action::requeue(Duration::ZERO))
        }
        _ => Ok(Action::await_change()),
    }
}

fn error_policy<A: Actuator>(_worker: Arc<Worker>, error: &GardenerError, _ctx: Arc<WorkerReconciler<A>>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}
