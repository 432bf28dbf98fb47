// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace management utilities

use crate::error::{GardenerError, Result};
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{ObjectMeta, PostParams},
    Api, Client,
};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Ensure a namespace exists in the cluster, create it with `labels` if it doesn't
#[instrument(skip(client, labels))]
pub async fn ensure_namespace_exists(
    client: &Client,
    namespace: &str,
    labels: BTreeMap<String, String>,
) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.get(namespace).await {
        Ok(_) => {
            debug!("Namespace {} already exists", namespace);
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            info!("Creating namespace {}", namespace);
            let ns = Namespace {
                metadata: ObjectMeta {
                    name: Some(namespace.to_string()),
                    labels: (!labels.is_empty()).then_some(labels),
                    ..Default::default()
                },
                ..Default::default()
            };
            namespaces.create(&PostParams::default(), &ns).await?;
            info!("Namespace {} created successfully", namespace);
            Ok(())
        }
        Err(e) => Err(GardenerError::NamespaceError(format!(
            "Failed to check/create namespace {}: {}",
            namespace, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{namespace_json, MockService};

    #[tokio::test]
    async fn test_existing_namespace_is_left_alone() {
        let client = MockService::new()
            .on_get("/api/v1/namespaces/seed-aws", 200, &namespace_json("seed-aws"))
            .into_client();

        ensure_namespace_exists(&client, "seed-aws", BTreeMap::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_namespace_is_created() {
        let client = MockService::new()
            .on_post("/api/v1/namespaces", 201, &namespace_json("seed-aws"))
            .into_client();

        ensure_namespace_exists(
            &client,
            "seed-aws",
            BTreeMap::from([("gardener.cloud/role".to_string(), "seed".to_string())]),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_namespace_error() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/seed-aws",
                500,
                r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"boom","reason":"InternalError","code":500}"#,
            )
            .into_client();

        let err = ensure_namespace_exists(&client, "seed-aws", BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GardenerError::NamespaceError(_)));
    }
}
