// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pure health checks that turn observed objects into shoot conditions.

use crate::helper::conditions::{
    get_or_init_condition, updated_condition_at, updated_condition_unknown_error_message,
    REASON_CONDITION_NOT_CHECKED,
};
use crate::reconcilers::seed_lifecycle::SHOOT_HEALTH_CONDITIONS;
use crate::types::common::{
    Condition, ConditionStatus, LastError, LastOperation, LastOperationState, LastOperationType,
};
use crate::types::managedresource::ManagedResource;
use crate::types::shoot::Worker;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::time::Duration;

pub const REQUIRED_CONTROL_PLANE_DEPLOYMENTS: [&str; 4] = [
    "gardener-resource-manager",
    "kube-apiserver",
    "kube-controller-manager",
    "kube-scheduler",
];

pub const REQUIRED_ETCDS: [&str; 2] = ["etcd-main", "etcd-events"];

pub const SHOOT_MANAGED_RESOURCES: [&str; 2] = ["shoot-core", "addons"];

/// A condition reported by an extension resource in the shoot's seed namespace
#[derive(Debug, Clone)]
pub struct ExtensionCondition {
    pub condition: Condition,
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

pub struct HealthChecker {
    thresholds: BTreeMap<String, Duration>,
    outdated_threshold: Option<Duration>,
    now: DateTime<Utc>,
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
}

impl HealthChecker {
    pub fn new(
        thresholds: BTreeMap<String, Duration>,
        outdated_threshold: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            thresholds,
            outdated_threshold,
            now,
        }
    }

    fn updated(&self, condition: &Condition, status: ConditionStatus, reason: &str, message: &str) -> Condition {
        updated_condition_at(condition, status, reason, message, self.now)
    }

    pub fn succeeded(&self, condition: &Condition, reason: &str, message: &str) -> Condition {
        self.updated(condition, ConditionStatus::True, reason, message)
    }

    /// A failing check. Conditions with a threshold stay Progressing until it elapses.
    pub fn failed_condition(&self, condition: &Condition, reason: &str, message: &str) -> Condition {
        let Some(threshold) = self.thresholds.get(&condition.condition_type) else {
            return self.updated(condition, ConditionStatus::False, reason, message);
        };

        match condition.status {
            ConditionStatus::True => self.updated(condition, ConditionStatus::Progressing, reason, message),
            ConditionStatus::Progressing => {
                let within = condition
                    .last_transition_time
                    .is_some_and(|t| t + to_chrono(*threshold) > self.now);
                let status = if within {
                    ConditionStatus::Progressing
                } else {
                    ConditionStatus::False
                };
                self.updated(condition, status, reason, message)
            }
            _ => self.updated(condition, ConditionStatus::False, reason, message),
        }
    }

    pub fn check_deployments(&self, condition: &Condition, deployments: &[Deployment]) -> Option<Condition> {
        let missing: Vec<&str> = REQUIRED_CONTROL_PLANE_DEPLOYMENTS
            .into_iter()
            .filter(|name| !deployments.iter().any(|d| d.name_any() == *name))
            .collect();
        if !missing.is_empty() {
            return Some(self.failed_condition(
                condition,
                "DeploymentMissing",
                &format!("Missing required deployments: {:?}", missing),
            ));
        }

        deployments
            .iter()
            .filter(|d| REQUIRED_CONTROL_PLANE_DEPLOYMENTS.contains(&d.name_any().as_str()))
            .find_map(|d| deployment_unhealthy(d).map(|why| (d.name_any(), why)))
            .map(|(name, why)| {
                self.failed_condition(
                    condition,
                    "DeploymentUnhealthy",
                    &format!("Deployment {:?} is unhealthy: {}", name, why),
                )
            })
    }

    pub fn check_etcds(&self, condition: &Condition, statefulsets: &[StatefulSet]) -> Option<Condition> {
        let missing: Vec<&str> = REQUIRED_ETCDS
            .into_iter()
            .filter(|name| !statefulsets.iter().any(|s| s.name_any() == *name))
            .collect();
        if !missing.is_empty() {
            return Some(self.failed_condition(
                condition,
                "EtcdMissing",
                &format!("Missing required etcds: {:?}", missing),
            ));
        }

        statefulsets
            .iter()
            .filter(|s| REQUIRED_ETCDS.contains(&s.name_any().as_str()))
            .find_map(|s| statefulset_unhealthy(s).map(|why| (s.name_any(), why)))
            .map(|(name, why)| {
                self.failed_condition(
                    condition,
                    "EtcdUnhealthy",
                    &format!("Etcd {:?} is unhealthy: {}", name, why),
                )
            })
    }

    pub fn check_nodes(&self, condition: &Condition, nodes: &[Node], workers: &[Worker]) -> Option<Condition> {
        if let Some(node) = nodes.iter().find(|n| !node_ready(n)) {
            return Some(self.failed_condition(
                condition,
                "NodeUnhealthy",
                &format!("Node {:?} is unhealthy: not ready", node.name_any()),
            ));
        }

        let desired: i32 = workers.iter().map(|w| w.minimum).sum();
        let registered = nodes.len() as i32;
        if registered < desired {
            return Some(self.failed_condition(
                condition,
                "MissingNodes",
                &format!(
                    "Not enough worker nodes registered in the cluster ({}/{}).",
                    registered, desired
                ),
            ));
        }
        None
    }

    pub fn check_managed_resource(&self, condition: &Condition, mr: &ManagedResource) -> Option<Condition> {
        if mr.metadata.generation.unwrap_or_default()
            != mr.status.as_ref().map(|s| s.observed_generation).unwrap_or_default()
        {
            return Some(self.failed_condition(
                condition,
                "ManagedResourceOutdatedStatus",
                &format!("observed generation of managed resource {:?} outdated", mr.name_any()),
            ));
        }

        let (condition_type, found) = mr.unhealthy_condition()?;
        Some(match found {
            Some(c) => self.failed_condition(condition, &c.reason, &c.message),
            None => self.failed_condition(
                condition,
                &format!("{}Missing", condition_type),
                &format!(
                    "condition {:?} of managed resource {:?} is missing",
                    condition_type,
                    mr.name_any()
                ),
            ),
        })
    }

    /// Outdated extension conditions become Unknown, failing ones fail the condition
    pub fn check_extension_conditions(
        &self,
        condition: &Condition,
        extensions: &[ExtensionCondition],
    ) -> Option<Condition> {
        for ext in extensions {
            if let Some(threshold) = self.outdated_threshold {
                let outdated = ext
                    .condition
                    .last_update_time
                    .map_or(true, |t| t + to_chrono(threshold) < self.now);
                if outdated {
                    let message = format!(
                        "{} extension ({}/{}) reports an outdated health status (last updated {} ago).",
                        ext.kind,
                        ext.namespace,
                        ext.name,
                        ext.condition
                            .last_update_time
                            .map(|t| format!("{}s", (self.now - t).num_seconds()))
                            .unwrap_or_else(|| "never".to_string()),
                    );
                    return Some(self.updated(
                        condition,
                        ConditionStatus::Unknown,
                        "OutdatedHealthCheckReport",
                        &message,
                    ));
                }
            }

            if ext.condition.status == ConditionStatus::False {
                let message = format!(
                    "{} extension ({}/{}) reports failing health check: {}",
                    ext.kind, ext.namespace, ext.name, ext.condition.message
                );
                return Some(self.failed_condition(condition, &ext.condition.reason, &message));
            }
        }
        None
    }
}

fn deployment_unhealthy(d: &Deployment) -> Option<String> {
    let Some(status) = d.status.as_ref() else {
        return Some("no status".to_string());
    };
    let generation = d.metadata.generation.unwrap_or_default();
    if status.observed_generation.unwrap_or_default() < generation {
        return Some(format!(
            "observed generation outdated ({}/{})",
            status.observed_generation.unwrap_or_default(),
            generation
        ));
    }
    let available = status
        .conditions
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|c| c.type_ == "Available" && c.status == "True");
    if !available {
        return Some("condition \"Available\" is missing or not true".to_string());
    }
    let desired = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let ready = status.available_replicas.unwrap_or_default();
    if ready < desired {
        return Some(format!("not enough available replicas ({}/{})", ready, desired));
    }
    None
}

fn statefulset_unhealthy(s: &StatefulSet) -> Option<String> {
    let Some(status) = s.status.as_ref() else {
        return Some("no status".to_string());
    };
    let desired = s.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let ready = status.ready_replicas.unwrap_or_default();
    if ready < desired {
        return Some(format!("not enough ready replicas ({}/{})", ready, desired));
    }
    None
}

fn node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conds| conds.iter().any(|c| c.type_ == "Ready" && c.status == "True"))
}

/// All health conditions True without checking, for hibernated shoots
pub fn hibernated_conditions(existing: &[Condition], now: DateTime<Utc>) -> Vec<Condition> {
    SHOOT_HEALTH_CONDITIONS
        .iter()
        .map(|t| {
            updated_condition_at(
                &get_or_init_condition(existing, t),
                ConditionStatus::True,
                REASON_CONDITION_NOT_CHECKED,
                "Shoot cluster has been hibernated.",
                now,
            )
        })
        .collect()
}

/// Message for nodes and system components when the shoot API server can't be reached
pub fn control_plane_not_running_message(last_operation: Option<&LastOperation>) -> &'static str {
    match last_operation {
        Some(op) if op.operation_type == LastOperationType::Delete => {
            "Shoot control plane has been deleted."
        }
        None => "Shoot control plane has not been fully created yet.",
        Some(op)
            if op.operation_type == LastOperationType::Create
                && op.state != LastOperationState::Succeeded =>
        {
            "Shoot control plane has not been fully created yet."
        }
        Some(_) => "Shoot control plane is not running.",
    }
}

fn unstable_last_operation(last_operation: Option<&LastOperation>) -> bool {
    match last_operation {
        None => true,
        Some(op) => {
            (op.operation_type == LastOperationType::Create && op.state != LastOperationState::Succeeded)
                || op.operation_type == LastOperationType::Delete
        }
    }
}

/// While a shoot is being created or deleted without errors, failures are only progressing
pub fn pardon_conditions(
    conditions: Vec<Condition>,
    last_operation: Option<&LastOperation>,
    last_errors: &[LastError],
) -> Vec<Condition> {
    if !unstable_last_operation(last_operation) || !last_errors.is_empty() {
        return conditions;
    }
    conditions
        .into_iter()
        .map(|mut c| {
            if c.status == ConditionStatus::False {
                c.status = ConditionStatus::Progressing;
            }
            c
        })
        .collect()
}

/// The checked condition, or the previous one turned Unknown when the check errored
pub fn condition_or_error(previous: &Condition, result: crate::error::Result<Condition>) -> Condition {
    match result {
        Ok(c) => c,
        Err(e) => updated_condition_unknown_error_message(previous, &e.to_string()),
    }
}
