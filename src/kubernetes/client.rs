// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Clients for seed and shoot clusters built from kubeconfig secrets

use crate::error::{GardenerError, Result};
use crate::types::seed::Seed;
use k8s_openapi::api::core::v1::Secret;
use kube::{config::KubeConfigOptions, Api, Client, ResourceExt};
use tracing::{info, instrument};

/// Key holding the kubeconfig in gardener-managed secrets
pub const KUBECONFIG_KEY: &str = "kubeconfig";
/// Secret in a shoot's control plane namespace holding its admin kubeconfig
pub const SHOOT_KUBECONFIG_SECRET: &str = "gardener";

/// Build a client from a kubeconfig stored in a secret
#[instrument(skip(client))]
pub async fn client_from_kubeconfig_secret(
    client: &Client,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<Client> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    info!("Getting kubeconfig secret '{}/{}'...", namespace, name);

    let secret = secrets.get(name).await.map_err(|e| {
        GardenerError::KubeconfigError(format!(
            "Failed to get kubeconfig secret {}/{}: {}",
            namespace, name, e
        ))
    })?;
    let kubeconfig = kubeconfig_from_secret(&secret, key)?;
    create_client_from_kubeconfig(&kubeconfig).await
}

/// Extract the kubeconfig text under `key` from a secret
pub fn kubeconfig_from_secret(secret: &Secret, key: &str) -> Result<String> {
    let name = secret.name_any();
    let Some(data) = secret.data.as_ref() else {
        return Err(GardenerError::KubeconfigError(format!(
            "Kubeconfig secret {} has no data",
            name
        )));
    };

    let Some(kubeconfig_data) = data.get(key) else {
        return Err(GardenerError::KubeconfigError(format!(
            "Kubeconfig secret {} does not contain '{}' key",
            name, key
        )));
    };

    String::from_utf8(kubeconfig_data.0.clone()).map_err(|e| {
        GardenerError::KubeconfigError(format!("Failed to decode kubeconfig of {}: {}", name, e))
    })
}

/// Client for a seed cluster, using the secret referenced by `spec.secretRef`
#[instrument(skip(garden_client, seed), fields(seed = %seed.name_any()))]
pub async fn seed_client(garden_client: &Client, seed: &Seed) -> Result<Client> {
    let Some(secret_ref) = seed.spec.secret_ref.as_ref() else {
        return Err(GardenerError::MissingField(format!(
            "seed {} has no spec.secretRef",
            seed.name_any()
        )));
    };
    client_from_kubeconfig_secret(
        garden_client,
        &secret_ref.namespace,
        &secret_ref.name,
        KUBECONFIG_KEY,
    )
    .await
}

/// Client for a shoot cluster, read from its control plane namespace in the seed
pub async fn shoot_client(seed_client: &Client, technical_id: &str) -> Result<Client> {
    client_from_kubeconfig_secret(
        seed_client,
        technical_id,
        SHOOT_KUBECONFIG_SECRET,
        KUBECONFIG_KEY,
    )
    .await
}

/// Create a Kubernetes client from a kubeconfig string
async fn create_client_from_kubeconfig(kubeconfig: &str) -> Result<Client> {
    use kube::config::Kubeconfig;

    let kubeconfig_parsed: Kubeconfig = serde_yaml::from_str(kubeconfig)
        .map_err(|e| GardenerError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e)))?;

    let client_config =
        kube::Config::from_custom_kubeconfig(kubeconfig_parsed, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                GardenerError::KubeconfigError(format!("Failed to create config: {}", e))
            })?;

    Client::try_from(client_config)
        .map_err(|e| GardenerError::KubeconfigError(format!("Failed to create client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockService;
    use crate::types::seed::SeedSpec;
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn secret_with(key: &str, value: &[u8]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("seed-kubeconfig".to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(key.to_string(), ByteString(value.to_vec()))])),
            ..Default::default()
        }
    }

    #[test]
    fn test_kubeconfig_from_secret() {
        let secret = secret_with(KUBECONFIG_KEY, b"apiVersion: v1");
        assert_eq!(kubeconfig_from_secret(&secret, KUBECONFIG_KEY).unwrap(), "apiVersion: v1");
    }

    #[test]
    fn test_kubeconfig_from_secret_missing_key() {
        let secret = secret_with("other", b"x");
        let err = kubeconfig_from_secret(&secret, KUBECONFIG_KEY).unwrap_err();
        assert!(err.to_string().contains("does not contain 'kubeconfig' key"));
    }

    #[test]
    fn test_kubeconfig_from_secret_without_data() {
        let secret = Secret::default();
        assert!(kubeconfig_from_secret(&secret, KUBECONFIG_KEY).is_err());
    }

    #[tokio::test]
    async fn test_seed_client_requires_secret_ref() {
        let client = MockService::new().into_client();
        let seed = Seed::new("aws", SeedSpec::default());

        let err = seed_client(&client, &seed).await.err().unwrap();
        assert!(matches!(err, GardenerError::MissingField(_)));
    }

    #[tokio::test]
    async fn test_client_from_missing_secret() {
        let client = MockService::new().into_client();

        let err = client_from_kubeconfig_secret(&client, "garden", "missing", KUBECONFIG_KEY)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GardenerError::KubeconfigError(_)));
    }
}
