// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Operator configuration.
//!
//! Process settings come from environment variables. Controller tunables are
//! read from an optional `ControllerManagerConfiguration` YAML file.

pub mod controller_manager;
pub mod validation;

use anyhow::{bail, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub use controller_manager::ControllerManagerConfiguration;

const DEFAULT_WEBHOOK_BIND_ADDRESS: &str = "0.0.0.0:9443";
const DEFAULT_GARDEN_NAMESPACE: &str = "garden";

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the admission and authorization webhooks listen on
    pub webhook_bind_address: SocketAddr,
    /// Namespace holding the garden secrets that are synced to seeds
    pub garden_namespace: String,
    pub config_file: Option<PathBuf>,
    pub controllers: ControllerManagerConfiguration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind = lookup("WEBHOOK_BIND_ADDRESS")
            .unwrap_or_else(|| DEFAULT_WEBHOOK_BIND_ADDRESS.to_string());
        let webhook_bind_address = bind
            .parse()
            .with_context(|| format!("WEBHOOK_BIND_ADDRESS {:?} is not a socket address", bind))?;

        let garden_namespace =
            lookup("GARDEN_NAMESPACE").unwrap_or_else(|| DEFAULT_GARDEN_NAMESPACE.to_string());

        let config_file = lookup("GARDENER_CONFIG_FILE")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let controllers = match &config_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                ControllerManagerConfiguration::from_yaml(&raw)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => ControllerManagerConfiguration::default(),
        };

        let errors = validation::validate_controller_manager_configuration(&controllers);
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("invalid controller manager configuration: {}", messages.join("; "));
        }

        Ok(Config {
            webhook_bind_address,
            garden_namespace,
            config_file,
            controllers,
        })
    }
}
