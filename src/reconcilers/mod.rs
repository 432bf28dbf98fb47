// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod bastion;
pub mod cloudprofile;
pub mod managedseedset;
pub mod project_stale;
pub mod seed;
pub mod seed_backup;
pub mod seed_lifecycle;
pub mod shoot_care;
pub mod shoot_maintenance;
pub mod worker;

pub use bastion::BastionReconciler;
pub use cloudprofile::CloudProfileReconciler;
pub use managedseedset::ManagedSeedSetReconciler;
pub use project_stale::ProjectStaleReconciler;
pub use seed::SeedReconciler;
pub use seed_backup::SeedBackupBucketsReconciler;
pub use seed_lifecycle::SeedLifecycleReconciler;
pub use shoot_care::ShootCareReconciler;
pub use shoot_maintenance::ShootMaintenanceReconciler;
pub use worker::{Actuator, WorkerReconciler};
