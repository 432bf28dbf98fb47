// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes annotation keys used by Gardener
pub mod annotations {
    /// Operation requested on an object, see the `operation` module for values
    pub const GARDENER_OPERATION: &str = "gardener.cloud/operation";
    /// Must be "true" before a Project may be deleted
    pub const CONFIRMATION_DELETION: &str = "confirmation.gardener.cloud/deletion";
    /// When "true" on a project namespace, the stale check is skipped
    pub const PROJECT_SKIP_STALE_CHECK: &str = "project.gardener.cloud/skip-stale-check";
    /// Marks the etcd encryption secret when shoot secrets have to be rewritten
    pub const ETCD_ENCRYPTION_REWRITE_SECRETS: &str = "garden.sapcloud.io/rewrite-shoot-secrets";

    pub const DNS_PROVIDER: &str = "dns.gardener.cloud/provider";
    pub const DNS_DOMAIN: &str = "dns.gardener.cloud/domain";
    pub const DNS_INCLUDE_ZONES: &str = "dns.gardener.cloud/include-zones";
    pub const DNS_EXCLUDE_ZONES: &str = "dns.gardener.cloud/exclude-zones";
}

/// Values of the `gardener.cloud/operation` annotation
pub mod operation {
    pub const MAINTAIN: &str = "maintain";
    pub const RESTORE: &str = "restore";
    pub const MIGRATE: &str = "migrate";
    pub const RETRY: &str = "retry";
}

/// Kubernetes label keys used by Gardener
pub mod labels {
    /// Role of a secret in the garden namespace
    pub const GARDEN_ROLE: &str = "gardener.cloud/role";
    /// Name of the ManagedSeedSet that owns a replica
    pub const MANAGED_SEED_SET: &str = "seedmanagement.gardener.cloud/managed-seed-set";
}

pub mod finalizers {
    pub const GARDENER: &str = "gardener";
    pub const WORKER: &str = "extensions.gardener.cloud/worker";
}

/// Identity of gardenlets acting on behalf of a seed
pub mod seed_identity {
    pub const USER_NAME_PREFIX: &str = "gardener.cloud:system:seed:";
    pub const GROUP: &str = "gardener.cloud:system:seeds";
    /// Suffix used when a gardenlet is responsible for more than one seed
    pub const AMBIGUOUS_SUFFIX: &str = "<ambiguous>";
}

/// The operator name used for server-side apply
pub const OPERATOR_NAME: &str = "gardener-controller-manager";

/// Namespace holding the gardenlet heartbeat leases
pub const SEED_LEASE_NAMESPACE: &str = "gardener-system-seed-lease";

/// Lease used by gardenlets for leader election
pub const GARDENLET_LEADER_ELECTION_LEASE: &str = "gardenlet-leader-election";

/// Prefix of the per-seed namespace in the garden cluster
pub const SEED_NAMESPACE_PREFIX: &str = "seed-";

/// Cluster-internal DNS domain
pub const DEFAULT_DOMAIN: &str = "cluster.local";

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRDs
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
