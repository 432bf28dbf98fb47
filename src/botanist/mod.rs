// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deployment helpers for shoot control plane components on the seed.

pub mod etcd_encryption;
pub mod kube_apiserver_sni;
pub mod logging;

pub use etcd_encryption::{EncryptionConfiguration, EtcdEncryption};
pub use kube_apiserver_sni::{any_deployed_sni, DeployWaiter, Sni, SniPhase};
pub use logging::{central_logging_configuration, CentralLoggingConfiguration};
