// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

use gardener::admission::{graph::feed_all, Graph, SeedAuthorizer, SeedRestriction, WebhookServer};
use gardener::config::Config;
use gardener::kubernetes::wait_for_gardener_crds;
use gardener::reconcilers::{
    BastionReconciler, CloudProfileReconciler, ManagedSeedSetReconciler, ProjectStaleReconciler,
    SeedBackupBucketsReconciler, SeedLifecycleReconciler, SeedReconciler, ShootCareReconciler,
    ShootMaintenanceReconciler,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Gardener controller manager");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: garden_namespace={}, webhook_bind_address={}",
        config.garden_namespace, config.webhook_bind_address
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to garden cluster");

    info!("Waiting for Gardener CRDs to become available...");
    wait_for_gardener_crds(&client).await?;

    // The authorizer answers from the dependency graph kept current by the feeders
    let graph = Arc::new(Graph::new());
    let authorizer = SeedAuthorizer::new(graph.clone());
    let restriction = config
        .controllers
        .admission
        .seed_restriction
        .enabled
        .then(|| SeedRestriction::new(client.clone(), config.garden_namespace.clone()));
    let webhook_server = WebhookServer::new(config.webhook_bind_address, authorizer, restriction);

    let controllers = config.controllers.controllers.clone();
    let project = ProjectStaleReconciler::new(client.clone(), controllers.project);
    let bastion = BastionReconciler::new(client.clone(), controllers.bastion);
    let seed = SeedReconciler::new(client.clone(), config.garden_namespace.clone());
    let seed_lifecycle = SeedLifecycleReconciler::new(client.clone(), controllers.seed);
    let seed_backup = SeedBackupBucketsReconciler::new(client.clone());
    let shoot_care = ShootCareReconciler::new(client.clone(), controllers.shoot_care);
    let shoot_maintenance = ShootMaintenanceReconciler::new(client.clone(), controllers.shoot_maintenance);
    let managed_seed_set = ManagedSeedSetReconciler::new(client.clone(), controllers.managed_seed_set);
    let cloud_profile = CloudProfileReconciler::new(client.clone());

    info!("Starting webhooks and reconcilers...");

    tokio::try_join!(
        feed_all(graph, client.clone()),
        webhook_server.run(),
        project.run(),
        bastion.run(),
        seed.run(),
        seed_lifecycle.run(),
        seed_backup.run(),
        shoot_care.run(),
        shoot_maintenance.run(),
        managed_seed_set.run(),
        cloud_profile.run()
    )?;

    // This should never be reached as reconcilers run forever
    warn!("All reconcilers stopped unexpectedly");
    Ok(())
}
