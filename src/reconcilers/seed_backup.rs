// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Seed backup bucket reconciler - reflects the state of a seed's backup
//! buckets in its `BackupBucketsReady` condition.

use crate::error::{GardenerError, Result};
use crate::helper::conditions::{get_or_init_condition, merge_conditions, updated_condition};
use crate::kubernetes::patch_status;
use crate::types::backup::BackupBucket;
use crate::types::common::{condition_types, Condition, ConditionStatus};
use crate::types::seed::Seed;
use futures::StreamExt;
use kube::{
    api::ListParams,
    runtime::{controller::Action, reflector::ObjectRef, watcher, Controller},
    Api, Client, ResourceExt,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct SeedBackupBucketsReconciler {
    client: Client,
}

impl SeedBackupBucketsReconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let seeds: Api<Seed> = Api::all(self.client.clone());
        let buckets: Api<BackupBucket> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(seeds, watcher::Config::default())
            .watches(buckets, watcher::Config::default(), |bucket: BackupBucket| {
                bucket
                    .spec
                    .seed_name
                    .as_deref()
                    .map(ObjectRef::<Seed>::new)
            })
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled seed backup buckets: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

/// Compute the `BackupBucketsReady` condition from the buckets of a seed
pub fn backup_buckets_condition(existing: &Condition, buckets: &[&BackupBucket]) -> Condition {
    if buckets.is_empty() {
        return updated_condition(
            existing,
            ConditionStatus::Unknown,
            "BackupBucketsGone",
            "Backup Buckets are gone.",
        );
    }

    let failing: Vec<String> = buckets
        .iter()
        .filter_map(|b| {
            b.status
                .as_ref()
                .and_then(|s| s.last_error.as_ref())
                .map(|e| format!("* {}: {}", b.name_any(), e.description))
        })
        .collect();
    if failing.is_empty() {
        return updated_condition(
            existing,
            ConditionStatus::True,
            "BackupBucketsAvailable",
            "Backup Buckets are available.",
        );
    }

    let message = format!(
        "The following BackupBuckets have issues:\n{}",
        failing.join("\n")
    );
    updated_condition(existing, ConditionStatus::False, "BackupBucketsError", &message)
}

#[instrument(skip(seed, ctx), fields(seed = %seed.name_any()))]
async fn reconcile(seed: Arc<Seed>, ctx: Arc<SeedBackupBucketsReconciler>) -> Result<Action> {
    if seed.spec.backup.is_none() {
        debug!("Seed has no backup configured");
        return Ok(Action::await_change());
    }
    let name = seed.name_any();

    let buckets: Api<BackupBucket> = Api::all(ctx.client.clone());
    let all = buckets.list(&ListParams::default()).await?.items;
    let own: Vec<&BackupBucket> = all
        .iter()
        .filter(|b| b.spec.seed_name.as_deref() == Some(name.as_str()))
        .collect();

    let conditions = seed.conditions();
    let existing = get_or_init_condition(conditions, condition_types::BACKUP_BUCKETS_READY);
    let wanted = backup_buckets_condition(&existing, &own);
    if wanted.status == existing.status
        && wanted.reason == existing.reason
        && wanted.message == existing.message
    {
        return Ok(Action::await_change());
    }

    info!("BackupBucketsReady is now {:?}: {}", wanted.status, wanted.reason);
    let merged = merge_conditions(conditions, &[wanted]);
    let seeds: Api<Seed> = Api::all(ctx.client.clone());
    patch_status(&seeds, &name, json!({ "conditions": merged })).await?;
    Ok(Action::await_change())
}

fn error_policy(
    _seed: Arc<Seed>,
    error: &GardenerError,
    _ctx: Arc<SeedBackupBucketsReconciler>,
) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::conditions::init_condition;
    use crate::helper::errors::last_error;
    use crate::types::backup::{BackupBucketSpec, BackupBucketStatus};

    fn bucket(name: &str, error: Option<&str>) -> BackupBucket {
        let mut b = BackupBucket::new(
            name,
            BackupBucketSpec {
                seed_name: Some("aws".to_string()),
                ..Default::default()
            },
        );
        b.status = Some(BackupBucketStatus {
            last_operation: None,
            last_error: error.map(|e| last_error(e, vec![])),
        });
        b
    }

    #[test]
    fn test_no_buckets_is_unknown() {
        let cond = backup_buckets_condition(
            &init_condition(condition_types::BACKUP_BUCKETS_READY),
            &[],
        );
        assert_eq!(cond.status, ConditionStatus::Unknown);
        assert_eq!(cond.reason, "BackupBucketsGone");
    }

    #[test]
    fn test_all_buckets_fine() {
        let a = bucket("a", None);
        let cond = backup_buckets_condition(
            &init_condition(condition_types::BACKUP_BUCKETS_READY),
            &[&a],
        );
        assert_eq!(cond.status, ConditionStatus::True);
        assert_eq!(cond.reason, "BackupBucketsAvailable");
    }

    #[test]
    fn test_failing_bucket_is_listed() {
        let a = bucket("a", None);
        let b = bucket("b", Some("access denied"));
        let cond = backup_buckets_condition(
            &init_condition(condition_types::BACKUP_BUCKETS_READY),
            &[&a, &b],
        );
        assert_eq!(cond.status, ConditionStatus::False);
        assert_eq!(cond.reason, "BackupBucketsError");
        assert!(cond.message.contains("* b: access denied"));
        assert!(!cond.message.contains("* a"));
    }
}
