// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Field-path validation of configuration documents.

use crate::config::controller_manager::{ControllerManagerConfiguration, GoDuration};
use serde::Deserialize;
use std::fmt;

/// A validation failure at a field path such as `controllers.seed.syncPeriod`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub value: String,
    pub detail: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: Invalid value: {:?}: {}", self.path, self.value, self.detail)
    }
}

/// Dotted path builder
#[derive(Debug, Clone)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(root: &str) -> Self {
        FieldPath(root.to_string())
    }

    pub fn child(&self, name: &str) -> Self {
        FieldPath(format!("{}.{}", self.0, name))
    }

    pub fn invalid(&self, value: impl fmt::Display, detail: impl Into<String>) -> FieldError {
        FieldError {
            path: self.0.clone(),
            value: value.to_string(),
            detail: detail.into(),
        }
    }
}

fn validate_positive_duration(d: &GoDuration, path: FieldPath, errors: &mut Vec<FieldError>) {
    if d.0.is_zero() {
        errors.push(path.invalid(d, "must be greater than zero"));
    }
}

fn validate_non_negative(v: i64, path: FieldPath, errors: &mut Vec<FieldError>) {
    if v < 0 {
        errors.push(path.invalid(v, "must not be negative"));
    }
}

pub fn validate_controller_manager_configuration(
    config: &ControllerManagerConfiguration,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let controllers = &config.controllers;
    let path = FieldPath::new("controllers");

    let project = path.child("project");
    validate_non_negative(
        controllers.project.minimum_lifetime_days,
        project.child("minimumLifetimeDays"),
        &mut errors,
    );
    validate_non_negative(
        controllers.project.stale_grace_period_days,
        project.child("staleGracePeriodDays"),
        &mut errors,
    );
    validate_non_negative(
        controllers.project.stale_expiration_time_days,
        project.child("staleExpirationTimeDays"),
        &mut errors,
    );
    if controllers.project.stale_expiration_time_days < controllers.project.stale_grace_period_days {
        errors.push(project.child("staleExpirationTimeDays").invalid(
            controllers.project.stale_expiration_time_days,
            "must not be smaller than staleGracePeriodDays",
        ));
    }
    validate_positive_duration(
        &controllers.project.stale_sync_period,
        project.child("staleSyncPeriod"),
        &mut errors,
    );

    validate_positive_duration(
        &controllers.bastion.max_lifetime,
        path.child("bastion").child("maxLifetime"),
        &mut errors,
    );

    let seed = path.child("seed");
    validate_positive_duration(&controllers.seed.sync_period, seed.child("syncPeriod"), &mut errors);
    validate_positive_duration(
        &controllers.seed.monitor_period,
        seed.child("monitorPeriod"),
        &mut errors,
    );
    validate_positive_duration(
        &controllers.seed.shoot_monitor_period,
        seed.child("shootMonitorPeriod"),
        &mut errors,
    );

    let care = path.child("shootCare");
    validate_positive_duration(&controllers.shoot_care.sync_period, care.child("syncPeriod"), &mut errors);
    for (i, threshold) in controllers.shoot_care.condition_thresholds.iter().enumerate() {
        if threshold.condition_type.is_empty() {
            errors.push(
                care.child(&format!("conditionThresholds[{}]", i))
                    .child("type")
                    .invalid("", "must not be empty"),
            );
        }
    }

    validate_positive_duration(
        &controllers.shoot_maintenance.sync_period,
        path.child("shootMaintenance").child("syncPeriod"),
        &mut errors,
    );
    validate_positive_duration(
        &controllers.managed_seed_set.sync_period,
        path.child("managedSeedSet").child("syncPeriod"),
        &mut errors,
    );

    errors
}

/// Landscaper imports for deploying the Gardener Admission Controller
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GardenerAdmissionController {
    pub enabled: bool,
    pub deployment_configuration: Option<CommonDeploymentConfiguration>,
    pub component_configuration: AdmissionControllerComponentConfiguration,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommonDeploymentConfiguration {
    pub replica_count: Option<i32>,
    pub service_account_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdmissionControllerComponentConfiguration {
    pub tls: TlsAdmissionController,
    pub component_configuration: AdmissionControllerConfiguration,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsAdmissionController {
    pub ca_bundle: String,
    pub certificate: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdmissionControllerConfiguration {
    pub garden_client_connection: ClientConnection,
    pub server: ServerConfiguration,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConnection {
    pub kubeconfig: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfiguration {
    pub https: HttpsServer,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpsServer {
    pub tls: ServerTls,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerTls {
    pub server_cert_dir: String,
}

pub fn validate_admission_controller(
    config: &GardenerAdmissionController,
    path: &FieldPath,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Some(deployment) = &config.deployment_configuration {
        if let Some(replicas) = deployment.replica_count {
            validate_non_negative(
                i64::from(replicas),
                path.child("deploymentConfiguration").child("replicaCount"),
                &mut errors,
            );
        }
    }

    let component = path.child("componentConfiguration");
    let tls = &config.component_configuration.tls;
    if tls.ca_bundle.is_empty() {
        errors.push(component.child("tls").child("caBundle").invalid(
            &tls.ca_bundle,
            "The CA Bundle of the Gardener Admission Controller must be set",
        ));
    }
    if tls.certificate.is_empty() {
        errors.push(component.child("tls").child("certificate").invalid(
            &tls.certificate,
            "The TLS certificate of the Gardener Admission Controller must be set",
        ));
    }
    if tls.key.is_empty() {
        errors.push(component.child("tls").child("key").invalid(
            "",
            "The TLS key of the Gardener Admission Controller must be set",
        ));
    }

    let inner = component.child("componentConfiguration");
    let admission = &config.component_configuration.component_configuration;
    if !admission.garden_client_connection.kubeconfig.is_empty() {
        errors.push(inner.child("gardenClientConnection").child("kubeconfig").invalid(
            &admission.garden_client_connection.kubeconfig,
            "The path to the kubeconfig for the Garden cluster in the Gardener Admission Controller must not be set. Instead the provided runtime cluster or virtual garden cluster kubeconfig will be used.",
        ));
    }
    if !admission.server.https.tls.server_cert_dir.is_empty() {
        errors.push(
            inner
                .child("server")
                .child("https")
                .child("tls")
                .child("serverCertDir")
                .invalid(
                    &admission.server.https.tls.server_cert_dir,
                    "The path to the TLS serving certificate of the Gardener Admission Controller must not be set. Instead, directly provide the certificates via the landscaper imports field gardenerAdmissionController.componentConfiguration.tls.certificate and gardenerAdmissionController.componentConfiguration.tls.key.",
                ),
        );
    }
    errors
}
