// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery, client creation, namespaces and patches.

pub mod client;
pub mod crd;
pub mod finalizers;
pub mod namespaces;

pub use client::{client_from_kubeconfig_secret, seed_client, shoot_client};
pub use crd::wait_for_gardener_crds;
pub use finalizers::{
    confirm_deletion, ensure_finalizer, has_finalizer, patch_annotation, patch_status,
    remove_finalizer,
};
pub use namespaces::ensure_namespace_exists;
