// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Encryption of shoot secrets at rest in etcd.
//!
//! The kube-apiserver `EncryptionConfiguration` lives in a secret in the shoot's
//! control plane namespace on the seed, with a copy in the project namespace of
//! the garden cluster. A new configuration starts passive (identity first) and
//! is activated (aescbc first) on the next reconciliation once both copies agree.

use crate::constants::{annotations, OPERATOR_NAME};
use crate::error::{GardenerError, Result};
use crate::kubernetes::patch_annotation;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use k8s_openapi::{api::core::v1::Secret, ByteString};
use kube::{
    api::{ListParams, ObjectMeta, Patch, PatchParams, PostParams},
    Api, Client, ResourceExt,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

pub const SECRET_NAME: &str = "etcd-encryption-secret";
pub const SECRET_FILE_NAME: &str = "encryption-configuration.yaml";

const API_VERSION: &str = "apiserver.config.k8s.io/v1";
const KIND: &str = "EncryptionConfiguration";
const ENCRYPTED_RESOURCE: &str = "secrets";
const KEY_LENGTH: usize = 32;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionConfiguration {
    pub api_version: String,
    pub kind: String,
    pub resources: Vec<ResourceConfiguration>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ResourceConfiguration {
    pub resources: Vec<String>,
    pub providers: Vec<ProviderConfiguration>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aescbc: Option<KeyConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityConfiguration>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyConfiguration {
    pub keys: Vec<Key>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Key {
    pub name: String,
    /// Base64 encoded AES key
    pub secret: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentityConfiguration {}

impl ProviderConfiguration {
    fn identity() -> Self {
        Self {
            identity: Some(IdentityConfiguration {}),
            ..Default::default()
        }
    }

    fn aescbc(key: Key) -> Self {
        Self {
            aescbc: Some(KeyConfiguration { keys: vec![key] }),
            ..Default::default()
        }
    }
}

fn new_key() -> Key {
    let mut secret = [0u8; KEY_LENGTH];
    rand::thread_rng().fill_bytes(&mut secret);
    Key {
        name: format!("key{}", Utc::now().timestamp()),
        secret: STANDARD.encode(secret),
    }
}

fn valid_key(key: &Key) -> bool {
    !key.name.is_empty()
        && STANDARD
            .decode(&key.secret)
            .is_ok_and(|k| matches!(k.len(), 16 | 24 | 32))
}

impl EncryptionConfiguration {
    /// Identity first: data is still written unencrypted but can already be read encrypted
    pub fn new_passive() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            resources: vec![ResourceConfiguration {
                resources: vec![ENCRYPTED_RESOURCE.to_string()],
                providers: vec![ProviderConfiguration::identity(), ProviderConfiguration::aescbc(new_key())],
            }],
        }
    }

    pub fn from_yaml(data: &[u8]) -> Result<Self> {
        Ok(serde_yaml::from_slice(data)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn providers(&self) -> Option<&[ProviderConfiguration]> {
        self.resources
            .iter()
            .find(|r| r.resources.iter().any(|res| res == ENCRYPTED_RESOURCE))
            .map(|r| r.providers.as_slice())
    }

    pub fn is_active(&self) -> bool {
        self.providers()
            .and_then(|p| p.first())
            .is_some_and(|p| p.aescbc.is_some())
    }

    /// Move the aescbc provider to the front (active) or to the back (passive)
    pub fn set_active(&mut self, active: bool) {
        for resource in &mut self.resources {
            resource.providers.sort_by_key(|p| p.aescbc.is_some() != active);
        }
    }

    /// The secrets resource is configured with exactly one identity and one aescbc provider with valid keys
    pub fn is_consistent(&self) -> bool {
        if self.api_version != API_VERSION || self.kind != KIND || self.resources.len() != 1 {
            return false;
        }
        let Some(providers) = self.providers() else {
            return false;
        };
        if providers.len() != 2 {
            return false;
        }
        let identities = providers.iter().filter(|p| p.identity.is_some() && p.aescbc.is_none()).count();
        let aescbc: Vec<&KeyConfiguration> = providers
            .iter()
            .filter(|p| p.identity.is_none())
            .filter_map(|p| p.aescbc.as_ref())
            .collect();
        identities == 1
            && aescbc.len() == 1
            && !aescbc[0].keys.is_empty()
            && aescbc[0].keys.iter().all(valid_key)
    }
}

fn configuration_from_secret(secret: &Secret) -> Result<EncryptionConfiguration> {
    let data = secret
        .data
        .as_ref()
        .and_then(|d| d.get(SECRET_FILE_NAME))
        .ok_or_else(|| {
            GardenerError::EncryptionConfig(format!(
                "secret {} does not contain expected element: {}",
                secret.name_any(),
                SECRET_FILE_NAME
            ))
        })?;
    EncryptionConfiguration::from_yaml(&data.0).map_err(|e| {
        GardenerError::EncryptionConfig(format!("secret {} is not consistent: {}", secret.name_any(), e))
    })
}

/// Manages the encryption configuration of one shoot
pub struct EtcdEncryption {
    seed_secrets: Api<Secret>,
    garden_secrets: Api<Secret>,
    shoot_name: String,
}

impl EtcdEncryption {
    /// `seed_namespace` is the shoot's control plane namespace on the seed
    pub fn new(seed_client: Client, seed_namespace: &str, garden_client: Client, shoot_namespace: &str, shoot_name: &str) -> Self {
        Self {
            seed_secrets: Api::namespaced(seed_client, seed_namespace),
            garden_secrets: Api::namespaced(garden_client, shoot_namespace),
            shoot_name: shoot_name.to_string(),
        }
    }

    fn garden_secret_name(&self) -> String {
        format!("{}.{}", self.shoot_name, SECRET_NAME)
    }

    async fn read_seed(&self) -> Result<Option<EncryptionConfiguration>> {
        match self.seed_secrets.get_opt(SECRET_NAME).await? {
            Some(secret) => Ok(Some(configuration_from_secret(&secret)?)),
            None => Ok(None),
        }
    }

    async fn read_garden(&self) -> Result<Option<EncryptionConfiguration>> {
        match self.garden_secrets.get_opt(&self.garden_secret_name()).await? {
            Some(secret) => Ok(Some(configuration_from_secret(&secret)?)),
            None => Ok(None),
        }
    }

    /// Both copies exist, are equal and consistent
    async fn ensure_consistent(&self) -> Result<EncryptionConfiguration> {
        let seed = self.read_seed().await?.ok_or_else(|| {
            GardenerError::EncryptionConfig("configuration is missing in the seed cluster".to_string())
        })?;
        let garden = self.read_garden().await?.ok_or_else(|| {
            GardenerError::EncryptionConfig("configuration is missing in the garden cluster".to_string())
        })?;
        if seed != garden {
            return Err(GardenerError::EncryptionConfig(
                "configuration in seed cluster and garden cluster are not equal".to_string(),
            ));
        }
        if !seed.is_consistent() {
            return Err(GardenerError::EncryptionConfig(
                "configuration in seed cluster is not consistent".to_string(),
            ));
        }
        Ok(seed)
    }

    #[instrument(skip(self), fields(shoot = %self.shoot_name))]
    pub async fn create_etcd_encryption_configuration(&self) -> Result<()> {
        let configuration = match self.read_seed().await? {
            None => {
                info!("Creating passive etcd encryption configuration");
                EncryptionConfiguration::new_passive()
            }
            Some(_) => {
                let mut configuration = self.ensure_consistent().await?;
                if configuration.is_active() {
                    debug!("Etcd encryption configuration is already active");
                    return Ok(());
                }
                info!("Activating etcd encryption configuration");
                configuration.set_active(true);
                configuration
            }
        };
        self.write(&configuration).await
    }

    async fn write(&self, configuration: &EncryptionConfiguration) -> Result<()> {
        let data = BTreeMap::from([(
            SECRET_FILE_NAME.to_string(),
            ByteString(configuration.to_yaml()?.into_bytes()),
        )]);
        let pp = PatchParams::apply(OPERATOR_NAME).force();

        // The secrets are rewritten once the shoot's kube-apiserver runs with the new configuration
        let seed_secret = Secret {
            metadata: ObjectMeta {
                name: Some(SECRET_NAME.to_string()),
                annotations: Some(BTreeMap::from([(
                    annotations::ETCD_ENCRYPTION_REWRITE_SECRETS.to_string(),
                    "true".to_string(),
                )])),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(data.clone()),
            ..Default::default()
        };
        self.seed_secrets
            .patch(SECRET_NAME, &pp, &Patch::Apply(&seed_secret))
            .await?;

        let garden_name = self.garden_secret_name();
        let garden_secret = Secret {
            metadata: ObjectMeta {
                name: Some(garden_name.clone()),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(data),
            ..Default::default()
        };
        self.garden_secrets
            .patch(&garden_name, &pp, &Patch::Apply(&garden_secret))
            .await?;
        Ok(())
    }

    /// Replace every secret of the shoot so it is stored with the current configuration
    #[instrument(skip(self, shoot_client), fields(shoot = %self.shoot_name))]
    pub async fn rewrite_shoot_secrets(&self, shoot_client: &Client) -> Result<()> {
        self.ensure_consistent().await?;
        let Some(seed_secret) = self.seed_secrets.get_opt(SECRET_NAME).await? else {
            return Ok(());
        };
        let marked = seed_secret
            .annotations()
            .get(annotations::ETCD_ENCRYPTION_REWRITE_SECRETS)
            .is_some_and(|v| v == "true");
        if !marked {
            return Ok(());
        }

        let secrets = Api::<Secret>::all(shoot_client.clone()).list(&ListParams::default()).await?;
        for secret in &secrets.items {
            let namespace = secret.namespace().unwrap_or_default();
            Api::<Secret>::namespaced(shoot_client.clone(), &namespace)
                .replace(&secret.name_any(), &PostParams::default(), secret)
                .await?;
        }
        info!("Rewrote {} shoot secrets", secrets.items.len());

        patch_annotation(&self.seed_secrets, SECRET_NAME, annotations::ETCD_ENCRYPTION_REWRITE_SECRETS, None).await
    }
}
