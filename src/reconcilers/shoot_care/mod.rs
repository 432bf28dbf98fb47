// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Shoot care reconciler - periodically checks a shoot's control plane, nodes and
//! system components and records the outcome in its health conditions.

mod checker;

pub use checker::{
    condition_or_error, control_plane_not_running_message, hibernated_conditions, pardon_conditions,
    ExtensionCondition, HealthChecker,
};

use crate::config::controller_manager::ShootCareControllerConfiguration;
use crate::error::{GardenerError, Result};
use crate::helper::conditions::{
    conditions_equal_ignoring_timestamps, get_or_init_condition, merge_conditions,
    updated_condition_unknown_error_message,
};
use crate::kubernetes::{patch_status, seed_client, shoot_client};
use crate::types::common::{condition_types, Condition};
use crate::types::managedresource::ManagedResource;
use crate::types::seed::Seed;
use crate::types::shoot::Shoot;
use checker::SHOOT_MANAGED_RESOURCES;
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::{
    api::{ApiResource, DynamicObject, GroupVersionKind, ListParams},
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Extension kinds in the seed namespace that report shoot health conditions
const EXTENSION_KINDS: [&str; 7] = [
    "ContainerRuntime",
    "ControlPlane",
    "Extension",
    "Infrastructure",
    "Network",
    "OperatingSystemConfig",
    "Worker",
];

pub struct ShootCareReconciler {
    client: Client,
    config: ShootCareControllerConfiguration,
}

impl ShootCareReconciler {
    pub fn new(client: Client, config: ShootCareControllerConfiguration) -> Self {
        Self { client, config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let shoots: Api<Shoot> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(shoots, watcher::Config::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Checked shoot health: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    fn checker(&self) -> HealthChecker {
        let thresholds = self
            .config
            .condition_thresholds
            .iter()
            .map(|t| (t.condition_type.clone(), t.duration.0))
            .collect();
        let stale = &self.config.stale_extension_health_checks;
        HealthChecker::new(thresholds, stale.enabled.then_some(stale.threshold.0), Utc::now())
    }
}

/// Conditions reported by the extension resources in a seed namespace
async fn extension_conditions(seed: &Client, namespace: &str) -> Vec<ExtensionCondition> {
    let mut result = Vec::new();
    for kind in EXTENSION_KINDS {
        let gvk = GroupVersionKind::gvk("extensions.gardener.cloud", "v1alpha1", kind);
        let api: Api<DynamicObject> =
            Api::namespaced_with(seed.clone(), namespace, &ApiResource::from_gvk(&gvk));
        let objects = match api.list(&ListParams::default()).await {
            Ok(list) => list.items,
            Err(e) => {
                warn!("Could not list {} extensions in {}: {}", kind, namespace, e);
                continue;
            }
        };
        for obj in objects {
            let conditions: Vec<Condition> = obj
                .data
                .pointer("/status/conditions")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();
            for condition in conditions {
                result.push(ExtensionCondition {
                    condition,
                    kind: kind.to_string(),
                    name: obj.name_any(),
                    namespace: namespace.to_string(),
                });
            }
        }
    }
    result
}

fn of_type(extensions: &[ExtensionCondition], condition_type: &str) -> Vec<ExtensionCondition> {
    extensions
        .iter()
        .filter(|e| e.condition.condition_type == condition_type)
        .cloned()
        .collect()
}

async fn check_control_plane(
    checker: &HealthChecker,
    condition: &Condition,
    seed: &Client,
    namespace: &str,
    extensions: &[ExtensionCondition],
) -> Result<Condition> {
    let deployments: Api<Deployment> = Api::namespaced(seed.clone(), namespace);
    let deployments = deployments.list(&ListParams::default()).await?.items;
    if let Some(c) = checker.check_deployments(condition, &deployments) {
        return Ok(c);
    }

    let statefulsets: Api<StatefulSet> = Api::namespaced(seed.clone(), namespace);
    let statefulsets = statefulsets.list(&ListParams::default()).await?.items;
    if let Some(c) = checker.check_etcds(condition, &statefulsets) {
        return Ok(c);
    }

    if let Some(c) = checker.check_extension_conditions(condition, extensions) {
        return Ok(c);
    }
    Ok(checker.succeeded(
        condition,
        "ControlPlaneRunning",
        "All control plane components are healthy.",
    ))
}

async fn check_api_server(checker: &HealthChecker, condition: &Condition, shoot: &Client) -> Condition {
    match shoot.apiserver_version().await {
        Ok(_) => checker.succeeded(
            condition,
            "HealthzRequestSucceeded",
            "API server /healthz endpoint responded with success status code.",
        ),
        Err(e) => checker.failed_condition(
            condition,
            "HealthzRequestFailed",
            &format!("Request to API server /healthz endpoint failed: {}", e),
        ),
    }
}

async fn check_nodes(
    checker: &HealthChecker,
    condition: &Condition,
    shoot_client: &Client,
    shoot: &Shoot,
    extensions: &[ExtensionCondition],
) -> Result<Condition> {
    let nodes: Api<Node> = Api::all(shoot_client.clone());
    let nodes = nodes.list(&ListParams::default()).await?.items;
    if let Some(c) = checker.check_nodes(condition, &nodes, &shoot.spec.provider.workers) {
        return Ok(c);
    }
    if let Some(c) = checker.check_extension_conditions(condition, extensions) {
        return Ok(c);
    }
    Ok(checker.succeeded(
        condition,
        "EveryNodeReady",
        "Every node registered to the cluster is ready.",
    ))
}

async fn check_system_components(
    checker: &HealthChecker,
    condition: &Condition,
    seed: &Client,
    shoot_client: &Client,
    namespace: &str,
    extensions: &[ExtensionCondition],
) -> Result<Condition> {
    let managed_resources: Api<ManagedResource> = Api::namespaced(seed.clone(), namespace);
    for name in SHOOT_MANAGED_RESOURCES {
        let mr = managed_resources.get(name).await?;
        if let Some(c) = checker.check_managed_resource(condition, &mr) {
            return Ok(c);
        }
    }
    if let Some(c) = checker.check_extension_conditions(condition, extensions) {
        return Ok(c);
    }

    let pods: Api<Pod> = Api::namespaced(shoot_client.clone(), "kube-system");
    let tunnels = pods.list(&ListParams::default().labels("type=tunnel")).await?;
    if tunnels.items.is_empty() {
        return Ok(checker.failed_condition(
            condition,
            "NoTunnelDeployed",
            "no tunnels are currently deployed to perform health-check on",
        ));
    }
    Ok(checker.succeeded(
        condition,
        "SystemComponentsRunning",
        "All system components are healthy.",
    ))
}

/// Run the four health checks against the shoot's seed namespace and API server
pub async fn health_checks(
    checker: &HealthChecker,
    shoot: &Shoot,
    seed: &Client,
    namespace: &str,
) -> Vec<Condition> {
    let existing = shoot.conditions();
    let api_server = get_or_init_condition(existing, condition_types::API_SERVER_AVAILABLE);
    let control_plane = get_or_init_condition(existing, condition_types::CONTROL_PLANE_HEALTHY);
    let nodes = get_or_init_condition(existing, condition_types::EVERY_NODE_READY);
    let system_components = get_or_init_condition(existing, condition_types::SYSTEM_COMPONENTS_HEALTHY);

    let extensions = extension_conditions(seed, namespace).await;
    let control_plane_extensions = of_type(&extensions, condition_types::CONTROL_PLANE_HEALTHY);

    let shoot_client = match shoot_client(seed, namespace).await {
        Ok(c) => c,
        Err(e) => {
            let message = format!("Could not initialize Shoot client for health check: {}", e);
            error!("{}", message);
            let control_plane = condition_or_error(
                &control_plane,
                check_control_plane(checker, &control_plane, seed, namespace, &control_plane_extensions).await,
            );
            return vec![
                checker.failed_condition(
                    &api_server,
                    "APIServerDown",
                    "Could not reach API server during client initialization.",
                ),
                control_plane,
                updated_condition_unknown_error_message(&nodes, &message),
                updated_condition_unknown_error_message(&system_components, &message),
            ];
        }
    };

    let node_extensions = of_type(&extensions, condition_types::EVERY_NODE_READY);
    let system_extensions = of_type(&extensions, condition_types::SYSTEM_COMPONENTS_HEALTHY);
    let (api_server, new_control_plane, new_nodes, new_system_components) = tokio::join!(
        check_api_server(checker, &api_server, &shoot_client),
        check_control_plane(checker, &control_plane, seed, namespace, &control_plane_extensions),
        check_nodes(checker, &nodes, &shoot_client, shoot, &node_extensions),
        check_system_components(
            checker,
            &system_components,
            seed,
            &shoot_client,
            namespace,
            &system_extensions
        ),
    );

    vec![
        api_server,
        condition_or_error(&control_plane, new_control_plane),
        condition_or_error(&nodes, new_nodes),
        condition_or_error(&system_components, new_system_components),
    ]
}

#[instrument(skip(shoot, ctx), fields(shoot = %shoot.name_any()))]
async fn reconcile(shoot: Arc<Shoot>, ctx: Arc<ShootCareReconciler>) -> Result<Action> {
    let requeue = Action::requeue(ctx.config.sync_period.0);
    if shoot.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }
    let Some(seed_name) = shoot.spec.seed_name.as_deref() else {
        debug!("Shoot is not scheduled yet");
        return Ok(requeue);
    };
    let Some(namespace) = shoot.technical_id() else {
        debug!("Shoot has no technical id yet");
        return Ok(requeue);
    };

    let existing = shoot.conditions();
    let checked = if shoot.is_hibernated() {
        hibernated_conditions(existing, Utc::now())
    } else {
        let seeds: Api<Seed> = Api::all(ctx.client.clone());
        let seed = seeds.get(seed_name).await?;
        let seed = seed_client(&ctx.client, &seed).await?;
        let status = shoot.status.as_ref();
        pardon_conditions(
            health_checks(&ctx.checker(), &shoot, &seed, namespace).await,
            status.and_then(|s| s.last_operation.as_ref()),
            shoot.last_errors(),
        )
    };

    let merged = merge_conditions(existing, &checked);
    if conditions_equal_ignoring_timestamps(existing, &merged) {
        debug!("Shoot health unchanged");
        return Ok(requeue);
    }
    let shoots: Api<Shoot> = Api::namespaced(ctx.client.clone(), &shoot.namespace().unwrap_or_default());
    patch_status(&shoots, &shoot.name_any(), json!({ "conditions": merged })).await?;
    Ok(requeue)
}

fn error_policy(_shoot: Arc<Shoot>, error: &GardenerError, _ctx: Arc<ShootCareReconciler>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::conditions::REASON_CONDITION_NOT_CHECKED;
    use crate::test_utils::{list_json, requests_with_method, to_json, MockService};
    use crate::types::common::ConditionStatus;
    use crate::types::shoot::{Hibernation, ShootSpec, ShootStatus};
    use k8s_openapi::api::apps::v1::{
        DeploymentCondition, DeploymentSpec, DeploymentStatus, StatefulSetSpec, StatefulSetStatus,
    };
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    const NAMESPACE: &str = "shoot--dev--a";

    fn make_shoot() -> Shoot {
        let mut shoot = Shoot::new(
            "a",
            ShootSpec {
                seed_name: Some("aws".to_string()),
                ..Default::default()
            },
        );
        shoot.metadata.namespace = Some("garden-dev".to_string());
        shoot.status = Some(ShootStatus {
            technical_id: NAMESPACE.to_string(),
            ..Default::default()
        });
        shoot
    }

    fn healthy_deployment(name: &str) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                available_replicas: Some(1),
                conditions: Some(vec![DeploymentCondition {
                    type_: "Available".to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
        }
    }

    fn healthy_etcd(name: &str) -> StatefulSet {
        StatefulSet {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                replicas: Some(1),
                ..Default::default()
            }),
            status: Some(StatefulSetStatus {
                ready_replicas: Some(1),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn test_unreachable_api_server_still_checks_control_plane() {
        let deployments: Vec<Deployment> = checker::REQUIRED_CONTROL_PLANE_DEPLOYMENTS
            .iter()
            .map(|n| healthy_deployment(n))
            .collect();
        let etcds: Vec<StatefulSet> = checker::REQUIRED_ETCDS.iter().map(|n| healthy_etcd(n)).collect();
        let seed = MockService::new()
            .on_get(
                "/apis/apps/v1/namespaces/shoot--dev--a/deployments",
                200,
                &list_json("Deployment", &deployments),
            )
            .on_get(
                "/apis/apps/v1/namespaces/shoot--dev--a/statefulsets",
                200,
                &list_json("StatefulSet", &etcds),
            )
            .into_client();
        let checker = HealthChecker::new(BTreeMap::new(), None, Utc::now());

        let conditions = health_checks(&checker, &make_shoot(), &seed, NAMESPACE).await;

        assert_eq!(conditions[0].status, ConditionStatus::False);
        assert_eq!(conditions[0].reason, "APIServerDown");
        assert_eq!(
            conditions[0].message,
            "Could not reach API server during client initialization."
        );
        assert_eq!(conditions[1].status, ConditionStatus::True);
        assert_eq!(conditions[1].reason, "ControlPlaneRunning");
        assert_eq!(conditions[2].status, ConditionStatus::Unknown);
        assert_eq!(conditions[3].status, ConditionStatus::Unknown);
        assert!(conditions[3]
            .message
            .starts_with("Could not initialize Shoot client for health check"));
    }

    #[tokio::test]
    async fn test_hibernated_shoot_is_not_checked() {
        let mut shoot = make_shoot();
        shoot.spec.hibernation = Some(Hibernation { enabled: Some(true) });
        let (client, log) = MockService::new()
            .on_patch(
                "/apis/core.gardener.cloud/v1beta1/namespaces/garden-dev/shoots/a/status",
                200,
                &to_json(&shoot),
            )
            .into_client_with_log();
        let ctx = Arc::new(ShootCareReconciler::new(
            client,
            ShootCareControllerConfiguration::default(),
        ));

        reconcile(Arc::new(shoot), ctx).await.unwrap();

        let patches = requests_with_method(&log, "PATCH");
        assert_eq!(patches.len(), 1);
        let body: serde_json::Value = serde_json::from_str(&patches[0].body).unwrap();
        let conditions = body["status"]["conditions"].as_array().unwrap();
        assert_eq!(conditions.len(), 4);
        assert!(conditions
            .iter()
            .all(|c| c["reason"] == REASON_CONDITION_NOT_CHECKED && c["status"] == "True"));
    }

    #[tokio::test]
    async fn test_unchanged_health_is_not_patched() {
        let mut shoot = make_shoot();
        shoot.spec.hibernation = Some(Hibernation { enabled: Some(true) });
        let earlier = Utc::now() - chrono::Duration::minutes(10);
        if let Some(status) = shoot.status.as_mut() {
            status.conditions = hibernated_conditions(&[], earlier);
        }
        let (client, log) = MockService::new().into_client_with_log();
        let config = ShootCareControllerConfiguration::default();
        let sync_period = config.sync_period.0;
        let ctx = Arc::new(ShootCareReconciler::new(client, config));

        let action = reconcile(Arc::new(shoot), ctx).await.unwrap();

        assert_eq!(action, Action::requeue(sync_period));
        assert!(requests_with_method(&log, "PATCH").is_empty());
    }
}
