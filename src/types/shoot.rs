// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::common::{
    Condition, ConditionStatus, LastError, LastOperation, LastOperationState, LastOperationType,
    LocalObjectReference,
};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "core.gardener.cloud", version = "v1beta1", kind = "Shoot")]
#[kube(namespaced)]
#[kube(status = "ShootStatus")]
#[serde(rename_all = "camelCase")]
pub struct ShootSpec {
    pub cloud_profile_name: String,
    #[serde(default)]
    pub secret_binding_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,
    #[serde(default)]
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub kubernetes: Kubernetes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<Dns>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<NamedResourceReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hibernation: Option<Hibernation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<Maintenance>,
    #[serde(default)]
    pub provider: Provider,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Kubernetes {
    pub version: String,
    #[serde(rename = "kubeAPIServer", skip_serializing_if = "Option::is_none")]
    pub kube_api_server: Option<KubeApiServerConfig>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubeApiServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_config: Option<AuditConfig>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_policy: Option<AuditPolicy>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<LocalObjectReference>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dns {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<DnsProvider>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnsProvider {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
}

/// Reference to a resource in the project namespace that is needed by the shoot
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamedResourceReference {
    pub name: String,
    pub resource_ref: CrossVersionObjectReference,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrossVersionObjectReference {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub api_version: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Hibernation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Maintenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_update: Option<MaintenanceAutoUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_window: Option<MaintenanceTimeWindow>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceAutoUpdate {
    #[serde(default)]
    pub kubernetes_version: bool,
    #[serde(default)]
    pub machine_image_version: bool,
}

/// Daily maintenance window, both ends formatted as `HHMMSS+ZZZZ`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceTimeWindow {
    pub begin: String,
    pub end: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    #[serde(rename = "type", default)]
    pub provider_type: String,
    #[serde(default)]
    pub workers: Vec<Worker>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub name: String,
    #[serde(default)]
    pub minimum: i32,
    #[serde(default)]
    pub maximum: i32,
    pub machine: Machine,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    #[serde(rename = "type")]
    pub machine_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ShootMachineImage>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShootMachineImage {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShootStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub last_errors: Vec<LastError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,
    #[serde(rename = "technicalID", default)]
    pub technical_id: String,
    #[serde(default)]
    pub is_hibernated: bool,
}

/// Aggregated health of a shoot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShootHealth {
    Healthy,
    Progressing,
    Unhealthy,
}

impl Shoot {
    fn last_operation(&self) -> Option<&LastOperation> {
        self.status.as_ref().and_then(|s| s.last_operation.as_ref())
    }

    /// Check whether hibernation is requested or already in effect
    pub fn is_hibernated(&self) -> bool {
        let requested = self
            .spec
            .hibernation
            .as_ref()
            .and_then(|h| h.enabled)
            .unwrap_or(false);
        requested || self.status.as_ref().is_some_and(|s| s.is_hibernated)
    }

    /// Namespace of the shoot's control plane in its seed
    pub fn technical_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.technical_id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    pub fn last_errors(&self) -> &[LastError] {
        self.status
            .as_ref()
            .map(|s| s.last_errors.as_slice())
            .unwrap_or_default()
    }

    pub fn reconcile_failed(&self) -> bool {
        self.last_operation().is_some_and(|op| {
            matches!(
                op.operation_type,
                LastOperationType::Create | LastOperationType::Reconcile
            ) && op.state == LastOperationState::Failed
        })
    }

    pub fn reconcile_succeeded(&self) -> bool {
        self.last_operation().is_some_and(|op| {
            matches!(
                op.operation_type,
                LastOperationType::Create | LastOperationType::Reconcile
            ) && op.state == LastOperationState::Succeeded
        })
    }

    pub fn delete_failed(&self) -> bool {
        self.last_operation()
            .is_some_and(|op| op.is(LastOperationType::Delete, LastOperationState::Failed))
    }

    /// Compute the health from the last operation and the health conditions
    pub fn health(&self) -> ShootHealth {
        let from_conditions = conditions_health(self.conditions());
        match self.last_operation().map(|op| op.state) {
            None | Some(LastOperationState::Succeeded) => from_conditions,
            Some(LastOperationState::Processing) | Some(LastOperationState::Pending) => {
                if from_conditions == ShootHealth::Unhealthy {
                    ShootHealth::Unhealthy
                } else {
                    ShootHealth::Progressing
                }
            }
            Some(_) => ShootHealth::Unhealthy,
        }
    }
}

fn conditions_health(conditions: &[Condition]) -> ShootHealth {
    let mut health = ShootHealth::Healthy;
    for condition in conditions {
        match condition.status {
            ConditionStatus::False => return ShootHealth::Unhealthy,
            ConditionStatus::Progressing | ConditionStatus::Unknown => {
                health = ShootHealth::Progressing
            }
            ConditionStatus::True => {}
        }
    }
    health
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn make_shoot(last_operation: Option<LastOperation>, conditions: Vec<Condition>) -> Shoot {
        Shoot {
            metadata: ObjectMeta {
                name: Some("my-shoot".to_string()),
                namespace: Some("garden-dev".to_string()),
                ..Default::default()
            },
            spec: ShootSpec {
                cloud_profile_name: "aws".to_string(),
                ..Default::default()
            },
            status: Some(ShootStatus {
                conditions,
                last_operation,
                technical_id: "shoot--dev--my-shoot".to_string(),
                ..Default::default()
            }),
        }
    }

    fn make_condition(status: ConditionStatus) -> Condition {
        Condition {
            condition_type: "EveryNodeReady".to_string(),
            status,
            last_transition_time: None,
            last_update_time: None,
            reason: String::new(),
            message: String::new(),
            codes: vec![],
        }
    }

    fn op(t: LastOperationType, s: LastOperationState) -> Option<LastOperation> {
        Some(LastOperation::new(t, s, 100, ""))
    }

    #[test]
    fn test_reconcile_failed_for_create_and_reconcile() {
        let create = make_shoot(op(LastOperationType::Create, LastOperationState::Failed), vec![]);
        let reconcile = make_shoot(
            op(LastOperationType::Reconcile, LastOperationState::Failed),
            vec![],
        );
        let delete = make_shoot(op(LastOperationType::Delete, LastOperationState::Failed), vec![]);

        assert!(create.reconcile_failed());
        assert!(reconcile.reconcile_failed());
        assert!(!delete.reconcile_failed());
        assert!(delete.delete_failed());
    }

    #[test]
    fn test_health_healthy_when_succeeded_and_all_true() {
        let shoot = make_shoot(
            op(LastOperationType::Reconcile, LastOperationState::Succeeded),
            vec![make_condition(ConditionStatus::True)],
        );

        assert_eq!(shoot.health(), ShootHealth::Healthy);
    }

    #[test]
    fn test_health_unhealthy_on_false_condition() {
        let shoot = make_shoot(
            op(LastOperationType::Reconcile, LastOperationState::Processing),
            vec![make_condition(ConditionStatus::False)],
        );

        assert_eq!(shoot.health(), ShootHealth::Unhealthy);
    }

    #[test]
    fn test_health_progressing_while_processing() {
        let shoot = make_shoot(
            op(LastOperationType::Reconcile, LastOperationState::Processing),
            vec![make_condition(ConditionStatus::True)],
        );

        assert_eq!(shoot.health(), ShootHealth::Progressing);
    }

    #[test]
    fn test_health_unhealthy_on_error_state() {
        let shoot = make_shoot(
            op(LastOperationType::Reconcile, LastOperationState::Error),
            vec![make_condition(ConditionStatus::True)],
        );

        assert_eq!(shoot.health(), ShootHealth::Unhealthy);
    }

    #[test]
    fn test_is_hibernated_from_spec_or_status() {
        let mut shoot = make_shoot(None, vec![]);
        assert!(!shoot.is_hibernated());

        shoot.spec.hibernation = Some(Hibernation { enabled: Some(true) });
        assert!(shoot.is_hibernated());

        shoot.spec.hibernation = None;
        shoot.status.as_mut().unwrap().is_hibernated = true;
        assert!(shoot.is_hibernated());
    }

    #[test]
    fn test_technical_id_empty_is_none() {
        let mut shoot = make_shoot(None, vec![]);
        assert_eq!(shoot.technical_id(), Some("shoot--dev--my-shoot"));

        shoot.status.as_mut().unwrap().technical_id = String::new();
        assert_eq!(shoot.technical_id(), None);
    }
}
