// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Filters for child events. A ManagedSeedSet only cares about its pending
//! replica, and only about changes that can end the wait.

use crate::types::managedseed::{ManagedSeed, PendingReplica, PendingReplicaReason};
use crate::types::seed::Seed;
use crate::types::shoot::{Shoot, ShootHealth};
use kube::{Resource, ResourceExt};

/// An object carrying a deletion timestamp and no finalizers is about to disappear
pub fn is_deleted<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some() && obj.finalizers().is_empty()
}

fn pending_for<'a>(pending: Option<&'a PendingReplica>, name: &str) -> Option<&'a PendingReplica> {
    pending.filter(|p| p.name == name)
}

pub fn shoot_event_relevant(pending: Option<&PendingReplica>, shoot: &Shoot) -> bool {
    let Some(pending) = pending_for(pending, &shoot.name_any()) else {
        return false;
    };
    match pending.reason {
        PendingReplicaReason::ShootReconciling => {
            shoot.reconcile_failed()
                || shoot.reconcile_succeeded()
                || shoot.metadata.deletion_timestamp.is_some()
        }
        PendingReplicaReason::ShootDeleting => is_deleted(shoot) || shoot.delete_failed(),
        PendingReplicaReason::ShootReconcileFailed => !shoot.reconcile_failed(),
        PendingReplicaReason::ShootDeleteFailed => !shoot.delete_failed(),
        PendingReplicaReason::ShootNotHealthy => shoot.health() == ShootHealth::Healthy,
        _ => false,
    }
}

pub fn managed_seed_event_relevant(pending: Option<&PendingReplica>, managed_seed: &ManagedSeed) -> bool {
    let Some(pending) = pending_for(pending, &managed_seed.name_any()) else {
        return false;
    };
    match pending.reason {
        PendingReplicaReason::ManagedSeedPreparing => {
            managed_seed.is_registered() || managed_seed.metadata.deletion_timestamp.is_some()
        }
        PendingReplicaReason::ManagedSeedDeleting => is_deleted(managed_seed),
        _ => false,
    }
}

pub fn seed_event_relevant(pending: Option<&PendingReplica>, seed: &Seed) -> bool {
    pending_for(pending, &seed.name_any()).is_some_and(|p| {
        p.reason == PendingReplicaReason::SeedNotReady && seed.is_ready()
    })
}
