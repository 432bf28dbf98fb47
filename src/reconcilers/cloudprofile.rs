// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CloudProfile reconciler - guards profiles that are still referenced by shoots.

use crate::constants::finalizers;
use crate::error::{GardenerError, Result};
use crate::kubernetes::{ensure_finalizer, has_finalizer, remove_finalizer};
use crate::types::cloudprofile::CloudProfile;
use crate::types::shoot::Shoot;
use futures::StreamExt;
use kube::{
    api::ListParams,
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct CloudProfileReconciler {
    client: Client,
}

impl CloudProfileReconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let profiles: Api<CloudProfile> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(profiles, watcher::Config::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled cloud profile: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

/// Names (`namespace/name`) of the shoots using the given cloud profile
pub fn referencing_shoots(profile_name: &str, shoots: &[Shoot]) -> Vec<String> {
    shoots
        .iter()
        .filter(|s| s.spec.cloud_profile_name == profile_name)
        .map(|s| format!("{}/{}", s.namespace().unwrap_or_default(), s.name_any()))
        .collect()
}

#[instrument(skip(profile, ctx), fields(cloudprofile = %profile.name_any()))]
async fn reconcile(profile: Arc<CloudProfile>, ctx: Arc<CloudProfileReconciler>) -> Result<Action> {
    let name = profile.name_any();
    let profiles: Api<CloudProfile> = Api::all(ctx.client.clone());

    if profile.metadata.deletion_timestamp.is_none() {
        ensure_finalizer(&profiles, profile.as_ref(), finalizers::GARDENER).await?;
        return Ok(Action::await_change());
    }

    if !has_finalizer(profile.as_ref(), finalizers::GARDENER) {
        return Ok(Action::await_change());
    }

    let shoots: Api<Shoot> = Api::all(ctx.client.clone());
    let shoot_list = shoots.list(&ListParams::default()).await?;
    let referencing = referencing_shoots(&name, &shoot_list.items);
    if !referencing.is_empty() {
        let message = format!(
            "Can't delete CloudProfile, because the following Shoots are still referencing it: {:?}",
            referencing
        );
        info!("{}", message);
        return Err(GardenerError::StillReferenced(message));
    }

    info!("No Shoots are referencing the CloudProfile. Deletion accepted.");
    remove_finalizer(&profiles, profile.as_ref(), finalizers::GARDENER).await?;
    Ok(Action::await_change())
}

fn error_policy(
    _profile: Arc<CloudProfile>,
    error: &GardenerError,
    _ctx: Arc<CloudProfileReconciler>,
) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{list_json, to_json, MockService};
    use crate::types::cloudprofile::CloudProfileSpec;
    use crate::types::shoot::ShootSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn make_shoot(namespace: &str, name: &str, profile: &str) -> Shoot {
        let mut shoot = Shoot::new(
            name,
            ShootSpec {
                cloud_profile_name: profile.to_string(),
                ..Default::default()
            },
        );
        shoot.metadata.namespace = Some(namespace.to_string());
        shoot
    }

    fn deleting_profile() -> CloudProfile {
        let mut profile = CloudProfile::new("aws", CloudProfileSpec::default());
        profile.metadata.finalizers = Some(vec![finalizers::GARDENER.to_string()]);
        profile.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        profile
    }

    #[test]
    fn test_referencing_shoots() {
        let shoots = vec![
            make_shoot("garden-dev", "a", "aws"),
            make_shoot("garden-dev", "b", "gcp"),
            make_shoot("garden-prod", "c", "aws"),
        ];

        assert_eq!(
            referencing_shoots("aws", &shoots),
            vec!["garden-dev/a".to_string(), "garden-prod/c".to_string()]
        );
        assert!(referencing_shoots("azure", &shoots).is_empty());
    }

    #[tokio::test]
    async fn test_deletion_blocked_while_referenced() {
        let shoots = vec![make_shoot("garden-dev", "a", "aws")];
        let client = MockService::new()
            .on_get(
                "/apis/core.gardener.cloud/v1beta1/shoots",
                200,
                &list_json("Shoot", &shoots),
            )
            .into_client();
        let ctx = Arc::new(CloudProfileReconciler::new(client));

        let err = reconcile(Arc::new(deleting_profile()), ctx).await.unwrap_err();
        assert!(matches!(err, GardenerError::StillReferenced(_)));
        assert!(err.to_string().contains("garden-dev/a"));
    }

    #[tokio::test]
    async fn test_deletion_releases_finalizer() {
        let profile = deleting_profile();
        let (client, log) = MockService::new()
            .on_get(
                "/apis/core.gardener.cloud/v1beta1/shoots",
                200,
                &list_json::<Shoot>("Shoot", &[]),
            )
            .on_patch(
                "/apis/core.gardener.cloud/v1beta1/cloudprofiles/aws",
                200,
                &to_json(&profile),
            )
            .into_client_with_log();
        let ctx = Arc::new(CloudProfileReconciler::new(client));

        reconcile(Arc::new(profile), ctx).await.unwrap();

        let patches = crate::test_utils::requests_with_method(&log, "PATCH");
        assert_eq!(patches.len(), 1);
        assert!(patches[0].body.contains("\"remove\""));
    }
}
