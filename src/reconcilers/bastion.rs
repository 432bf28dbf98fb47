// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bastion reconciler - removes bastions that outlived their shoot, seed or lifetime.

use crate::config::controller_manager::BastionControllerConfiguration;
use crate::error::{GardenerError, Result};
use crate::types::bastion::Bastion;
use crate::types::shoot::Shoot;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use kube::{
    api::DeleteParams,
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct BastionReconciler {
    client: Client,
    config: BastionControllerConfiguration,
}

impl BastionReconciler {
    pub fn new(client: Client, config: BastionControllerConfiguration) -> Self {
        Self { client, config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let bastions: Api<Bastion> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(bastions, watcher::Config::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled bastion: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BastionDecision {
    Delete(&'static str),
    RequeueAfter(Duration),
}

/// Decide whether a bastion has to go, or when to look at it again
pub fn bastion_decision(
    bastion: &Bastion,
    shoot: Option<&Shoot>,
    now: DateTime<Utc>,
    max_lifetime: Duration,
) -> BastionDecision {
    let Some(shoot) = shoot else {
        return BastionDecision::Delete("referenced Shoot does not exist anymore");
    };
    if shoot.metadata.deletion_timestamp.is_some() {
        return BastionDecision::Delete("referenced Shoot is in deletion");
    }
    if shoot.spec.seed_name != bastion.spec.seed_name {
        return BastionDecision::Delete("referenced Shoot was migrated to another Seed");
    }

    let expires_at = bastion
        .status
        .as_ref()
        .and_then(|s| s.expiration_timestamp);
    if expires_at.is_some_and(|t| t < now) {
        return BastionDecision::Delete("bastion has expired");
    }

    let lifetime_end = bastion.metadata.creation_timestamp.as_ref().and_then(|t| {
        chrono::Duration::from_std(max_lifetime)
            .ok()
            .and_then(|d| t.0.checked_add_signed(d))
    });
    if lifetime_end.is_some_and(|t| t < now) {
        return BastionDecision::Delete("bastion has reached its maximum lifetime");
    }

    let next = [expires_at, lifetime_end].into_iter().flatten().min();
    match next {
        Some(t) => BastionDecision::RequeueAfter((t - now).to_std().unwrap_or(Duration::ZERO)),
        None => BastionDecision::RequeueAfter(max_lifetime),
    }
}

#[instrument(skip(bastion, ctx), fields(bastion = %bastion.name_any()))]
async fn reconcile(bastion: Arc<Bastion>, ctx: Arc<BastionReconciler>) -> Result<Action> {
    if bastion.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }
    let namespace = bastion.namespace().unwrap_or_default();
    let shoots: Api<Shoot> = Api::namespaced(ctx.client.clone(), &namespace);
    let shoot = shoots.get_opt(&bastion.spec.shoot_ref.name).await?;

    match bastion_decision(&bastion, shoot.as_ref(), Utc::now(), ctx.config.max_lifetime.0) {
        BastionDecision::Delete(reason) => {
            info!("Deleting bastion: {}", reason);
            let bastions: Api<Bastion> = Api::namespaced(ctx.client.clone(), &namespace);
            match bastions.delete(&bastion.name_any(), &DeleteParams::default()).await {
                Ok(_) => Ok(Action::await_change()),
                Err(kube::Error::Api(e)) if e.code == 404 => Ok(Action::await_change()),
                Err(e) => Err(e.into()),
            }
        }
        BastionDecision::RequeueAfter(after) => {
            debug!("Requeueing bastion after {:?}", after);
            Ok(Action::requeue(after))
        }
    }
}

fn error_policy(_bastion: Arc<Bastion>, error: &GardenerError, _ctx: Arc<BastionReconciler>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{requests_with_method, to_json, MockService};
    use crate::types::bastion::{BastionSpec, BastionStatus};
    use crate::types::common::LocalObjectReference;
    use crate::types::shoot::ShootSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn make_bastion(created: DateTime<Utc>, expires: Option<DateTime<Utc>>) -> Bastion {
        let mut bastion = Bastion::new(
            "b",
            BastionSpec {
                shoot_ref: LocalObjectReference {
                    name: "my-shoot".to_string(),
                },
                seed_name: Some("aws".to_string()),
                ..Default::default()
            },
        );
        bastion.metadata.namespace = Some("garden-dev".to_string());
        bastion.metadata.creation_timestamp = Some(Time(created));
        bastion.status = Some(BastionStatus {
            last_heartbeat_timestamp: None,
            expiration_timestamp: expires,
        });
        bastion
    }

    fn make_shoot(seed: &str) -> Shoot {
        let mut shoot = Shoot::new(
            "my-shoot",
            ShootSpec {
                seed_name: Some(seed.to_string()),
                ..Default::default()
            },
        );
        shoot.metadata.namespace = Some("garden-dev".to_string());
        shoot
    }

    #[test]
    fn test_delete_when_shoot_missing_or_moved() {
        let now = Utc::now();
        let bastion = make_bastion(now, None);

        assert!(matches!(
            bastion_decision(&bastion, None, now, DAY),
            BastionDecision::Delete(_)
        ));
        assert!(matches!(
            bastion_decision(&bastion, Some(&make_shoot("gcp")), now, DAY),
            BastionDecision::Delete(_)
        ));

        let mut deleting = make_shoot("aws");
        deleting.metadata.deletion_timestamp = Some(Time(now));
        assert!(matches!(
            bastion_decision(&bastion, Some(&deleting), now, DAY),
            BastionDecision::Delete(_)
        ));
    }

    #[test]
    fn test_delete_when_expired_or_too_old() {
        let now = Utc::now();
        let expired = make_bastion(now, Some(now - chrono::Duration::minutes(1)));
        assert_eq!(
            bastion_decision(&expired, Some(&make_shoot("aws")), now, DAY),
            BastionDecision::Delete("bastion has expired")
        );

        let old = make_bastion(now - chrono::Duration::days(2), None);
        assert_eq!(
            bastion_decision(&old, Some(&make_shoot("aws")), now, DAY),
            BastionDecision::Delete("bastion has reached its maximum lifetime")
        );
    }

    #[test]
    fn test_deadline_reached_exactly_is_not_expired() {
        let now = Utc::now();
        let expiring = make_bastion(now - chrono::Duration::hours(1), Some(now));
        assert_eq!(
            bastion_decision(&expiring, Some(&make_shoot("aws")), now, DAY),
            BastionDecision::RequeueAfter(Duration::ZERO)
        );

        let aging = make_bastion(now - chrono::Duration::days(1), None);
        assert_eq!(
            bastion_decision(&aging, Some(&make_shoot("aws")), now, DAY),
            BastionDecision::RequeueAfter(Duration::ZERO)
        );
    }

    #[test]
    fn test_requeue_at_earliest_deadline() {
        let now = Utc::now();
        let bastion = make_bastion(now, Some(now + chrono::Duration::hours(1)));

        assert_eq!(
            bastion_decision(&bastion, Some(&make_shoot("aws")), now, DAY),
            BastionDecision::RequeueAfter(Duration::from_secs(3600))
        );

        let bastion = make_bastion(now - chrono::Duration::hours(23), Some(now + chrono::Duration::hours(5)));
        assert_eq!(
            bastion_decision(&bastion, Some(&make_shoot("aws")), now, DAY),
            BastionDecision::RequeueAfter(Duration::from_secs(3600))
        );
    }

    #[tokio::test]
    async fn test_reconcile_deletes_bastion_of_missing_shoot() {
        let bastion = make_bastion(Utc::now(), None);
        let (client, log) = MockService::new()
            .on_delete(
                "/apis/operations.gardener.cloud/v1alpha1/namespaces/garden-dev/bastions/b",
                200,
                &to_json(&bastion),
            )
            .into_client_with_log();
        let ctx = Arc::new(BastionReconciler::new(
            client,
            BastionControllerConfiguration::default(),
        ));

        reconcile(Arc::new(bastion), ctx).await.unwrap();
        assert_eq!(requests_with_method(&log, "DELETE").len(), 1);
    }
}
